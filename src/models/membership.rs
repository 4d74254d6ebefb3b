// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Membership record model for storage and API.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use validator::{Validate, ValidationError};

/// Minimum age (in whole years) required to register.
pub const MIN_MEMBER_AGE: u32 = 13;

/// Number of trailing digits kept when storing a phone number.
const STORED_PHONE_DIGITS: usize = 10;

/// One club member, stored in the `users` collection.
///
/// Field names are camelCase to stay compatible with documents written by the
/// mobile client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipRecord {
    /// Globally unique membership identifier (encoded in the member's QR code).
    ///
    /// Empty only while a generated-id post-step is still pending.
    #[serde(default)]
    pub membership_id: String,
    /// Auth subject the record is bound to.
    ///
    /// Older documents keyed by uid do not carry this field; the locator fills
    /// it in from the document id.
    #[serde(default)]
    pub auth_subject_id: String,
    pub first_name: String,
    pub last_name: String,
    /// Always `first_name + " " + last_name`, trimmed.
    pub display_name: String,
    /// `MM/DD/YYYY`
    pub date_of_birth: String,
    pub gender: String,
    pub email: String,
    /// Last 10 digits of the phone number, digits only.
    #[serde(default)]
    pub phone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    // Presence fields belong to the check-in system; never written here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_checked_in: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_entry_time: Option<String>,
}

fn default_active() -> bool {
    true
}

impl MembershipRecord {
    /// Build a new record from validated registration input.
    pub fn new(
        membership_id: String,
        auth_subject_id: String,
        input: &RegistrationInput,
        now: DateTime<Utc>,
    ) -> Self {
        let first_name = input.first_name.trim().to_string();
        let last_name = input.last_name.trim().to_string();
        let display_name = derive_display_name(&first_name, &last_name);

        Self {
            membership_id,
            auth_subject_id,
            first_name,
            last_name,
            display_name,
            date_of_birth: input.date_of_birth.trim().to_string(),
            gender: input.gender.trim().to_string(),
            email: input.email.trim().to_string(),
            phone: normalize_phone(&input.phone),
            created_at: now,
            updated_at: now,
            is_active: true,
            is_checked_in: None,
            last_entry_time: None,
        }
    }
}

/// Profile fields supplied at sign-up.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationInput {
    #[validate(custom(function = "validate_name"))]
    pub first_name: String,
    #[validate(custom(function = "validate_name"))]
    pub last_name: String,
    #[validate(
        email(message = "invalid email address"),
        custom(function = "validate_email_domain")
    )]
    pub email: String,
    #[validate(custom(function = "validate_date_of_birth"))]
    pub date_of_birth: String,
    #[validate(length(min = 1, max = 50, message = "gender is required"))]
    pub gender: String,
    #[validate(custom(function = "validate_phone"))]
    pub phone: String,
}

/// Partial profile update. Absent fields are left untouched.
///
/// Unknown fields (including `membershipId`) are rejected at deserialization.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProfileUpdate {
    #[validate(custom(function = "validate_name"))]
    pub first_name: Option<String>,
    #[validate(custom(function = "validate_name"))]
    pub last_name: Option<String>,
    #[validate(custom(function = "validate_date_of_birth"))]
    pub date_of_birth: Option<String>,
    #[validate(length(min = 1, max = 50, message = "gender must not be empty"))]
    pub gender: Option<String>,
    #[validate(
        email(message = "invalid email address"),
        custom(function = "validate_email_domain")
    )]
    pub email: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.date_of_birth.is_none()
            && self.gender.is_none()
            && self.email.is_none()
    }

    pub fn touches_name(&self) -> bool {
        self.first_name.is_some() || self.last_name.is_some()
    }
}

/// `firstName + " " + lastName`, trimmed.
pub fn derive_display_name(first_name: &str, last_name: &str) -> String {
    format!("{} {}", first_name, last_name).trim().to_string()
}

/// Strip everything but digits and keep the last 10 (drops the country code).
pub fn normalize_phone(raw: &str) -> String {
    let digits: Vec<char> = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    let start = digits.len().saturating_sub(STORED_PHONE_DIGITS);
    digits[start..].iter().collect()
}

/// Whole years between `birth` and `today`.
pub fn age_on(birth: NaiveDate, today: NaiveDate) -> u32 {
    let mut years = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        years -= 1;
    }
    years.max(0) as u32
}

/// Parse a `MM/DD/YYYY` date of birth.
pub fn parse_date_of_birth(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%m/%d/%Y").ok()
}

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

fn validate_name(value: &str) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(invalid("name", "name must not be empty"));
    }
    if trimmed.chars().count() > 100 {
        return Err(invalid("name", "name must be at most 100 characters"));
    }
    Ok(())
}

/// Addresses must name a dotted domain (`user@localhost` is rejected).
fn validate_email_domain(value: &str) -> Result<(), ValidationError> {
    match value.rsplit_once('@') {
        Some((_, domain))
            if domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.') =>
        {
            Ok(())
        }
        _ => Err(invalid("email", "invalid email domain")),
    }
}

fn validate_date_of_birth(value: &str) -> Result<(), ValidationError> {
    let Some(birth) = parse_date_of_birth(value) else {
        return Err(invalid(
            "date_of_birth",
            "date of birth must be a valid MM/DD/YYYY date",
        ));
    };

    let today = Utc::now().date_naive();
    if birth.year() < 1900 {
        return Err(invalid("date_of_birth", "birth year must be 1900 or later"));
    }
    if birth > today {
        return Err(invalid(
            "date_of_birth",
            "date of birth cannot be in the future",
        ));
    }
    if age_on(birth, today) < MIN_MEMBER_AGE {
        return Err(invalid(
            "date_of_birth",
            "member must be at least 13 years old",
        ));
    }
    Ok(())
}

fn validate_phone(value: &str) -> Result<(), ValidationError> {
    if normalize_phone(value).len() < STORED_PHONE_DIGITS {
        return Err(invalid("phone", "phone number must have at least 10 digits"));
    }
    Ok(())
}
