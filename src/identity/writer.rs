// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Record writer: creates and updates membership records.

use super::allocator::IdAllocator;
use super::error::{IdentityError, Result};
use super::locator::RecordLocator;
use super::strategy::IdentityStrategy;
use crate::db::{fields, generate_document_id, RecordStore, StoreError, StoredRecord};
use crate::models::membership::derive_display_name;
use crate::models::{MembershipRecord, ProfileUpdate, RegistrationInput, VerifiedPrincipal};
use crate::time_utils::{next_write_time, now_micros};
use std::sync::Arc;
use validator::Validate;

pub struct RecordWriter {
    store: Arc<dyn RecordStore>,
    strategy: IdentityStrategy,
    allocator: IdAllocator,
}

impl RecordWriter {
    pub fn new(
        store: Arc<dyn RecordStore>,
        strategy: IdentityStrategy,
        allocator: IdAllocator,
    ) -> Self {
        Self {
            store,
            strategy,
            allocator,
        }
    }

    /// Create the membership record for `principal`.
    ///
    /// The record, its membership id and its binding are written in a single
    /// create-only document write.
    pub async fn create(
        &self,
        principal: Option<&VerifiedPrincipal>,
        locator: &mut RecordLocator,
        input: &RegistrationInput,
    ) -> Result<StoredRecord> {
        let principal = principal.ok_or(IdentityError::NotAuthenticated)?;
        let subject = principal.auth_subject_id.as_str();

        input.validate()?;

        if locator.locate(subject).await?.is_some() {
            return Err(IdentityError::AlreadyRegistered);
        }

        let (doc_id, membership_id) = match self.strategy {
            IdentityStrategy::UidAsId => (subject.to_string(), subject.to_string()),
            IdentityStrategy::GeneratedId => {
                let membership_id = self.allocator.allocate(self.store.as_ref()).await?;
                (subject.to_string(), membership_id)
            }
            IdentityStrategy::AutoIdWithFieldBinding => {
                let doc_id = generate_document_id();
                (doc_id.clone(), doc_id)
            }
        };

        let record =
            MembershipRecord::new(membership_id, subject.to_string(), input, now_micros());

        match self.store.create_at_id(&doc_id, &record).await {
            Ok(()) => {}
            Err(StoreError::AlreadyExists(_)) if self.strategy.keyed_by_subject() => {
                return Err(IdentityError::AlreadyRegistered);
            }
            Err(e) => return Err(IdentityError::LookupFailed(e)),
        }

        locator.remember(subject, &doc_id);

        tracing::info!(
            auth_subject_id = subject,
            doc_id = %doc_id,
            membership_id = %record.membership_id,
            strategy = self.strategy.as_str(),
            "Membership record created"
        );

        Ok(StoredRecord { doc_id, record })
    }

    /// Apply a partial profile update to the subject's existing record.
    ///
    /// Only the supplied fields, the derived display name (when a name
    /// changes) and `updatedAt` are written.
    pub async fn update(
        &self,
        locator: &mut RecordLocator,
        auth_subject_id: &str,
        update: &ProfileUpdate,
    ) -> Result<MembershipRecord> {
        if update.is_empty() {
            return Err(IdentityError::InvalidInput(
                "profile update contains no fields".to_string(),
            ));
        }
        update.validate()?;

        let stored = locator
            .locate(auth_subject_id)
            .await?
            .ok_or(IdentityError::RecordNotFound)?;

        let mut record = stored.record.clone();
        let mut paths: Vec<&str> = Vec::new();

        if let Some(first_name) = &update.first_name {
            record.first_name = first_name.trim().to_string();
            paths.push(fields::FIRST_NAME);
        }
        if let Some(last_name) = &update.last_name {
            record.last_name = last_name.trim().to_string();
            paths.push(fields::LAST_NAME);
        }
        if let Some(date_of_birth) = &update.date_of_birth {
            record.date_of_birth = date_of_birth.trim().to_string();
            paths.push(fields::DATE_OF_BIRTH);
        }
        if let Some(gender) = &update.gender {
            record.gender = gender.trim().to_string();
            paths.push(fields::GENDER);
        }
        if let Some(email) = &update.email {
            record.email = email.trim().to_string();
            paths.push(fields::EMAIL);
        }
        if update.touches_name() {
            record.display_name = derive_display_name(&record.first_name, &record.last_name);
            paths.push(fields::DISPLAY_NAME);
        }

        record.updated_at = next_write_time(stored.record.updated_at);
        paths.push(fields::UPDATED_AT);

        match self
            .store
            .update_fields(&stored.doc_id, &record, &paths)
            .await
        {
            Ok(()) => {}
            Err(StoreError::NotFound(_)) => {
                locator.invalidate();
                return Err(IdentityError::RecordNotFound);
            }
            Err(e) => return Err(IdentityError::LookupFailed(e)),
        }

        tracing::info!(
            auth_subject_id,
            doc_id = %stored.doc_id,
            fields = ?paths,
            "Membership profile updated"
        );

        Ok(record)
    }
}
