// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Deployment-wide identity binding strategy.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How a membership record is keyed and how its membership id is assigned.
///
/// Exactly one strategy is active per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdentityStrategy {
    /// Document id and membership id are both the auth subject id.
    UidAsId,
    /// Document id is the auth subject id; membership id is a random
    /// fixed-width number.
    #[default]
    GeneratedId,
    /// Document id is auto-generated and doubles as the membership id; the
    /// subject is bound through the `authSubjectId` field.
    #[serde(rename = "auto-id")]
    AutoIdWithFieldBinding,
}

/// One step of the record locator's resolution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupStep {
    /// Fetch the session's cached document id.
    CachedLocation,
    /// Fetch the document whose id is the auth subject id.
    DirectBySubject,
    /// Query on the `authSubjectId` field, limit 1.
    QueryBySubjectField,
}

impl IdentityStrategy {
    /// Resolution order used by the record locator under this strategy.
    pub fn lookup_steps(self) -> &'static [LookupStep] {
        match self {
            IdentityStrategy::UidAsId | IdentityStrategy::GeneratedId => {
                &[LookupStep::CachedLocation, LookupStep::DirectBySubject]
            }
            IdentityStrategy::AutoIdWithFieldBinding => {
                &[LookupStep::CachedLocation, LookupStep::QueryBySubjectField]
            }
        }
    }

    /// Whether new records need an allocated membership id.
    pub fn allocates_membership_id(self) -> bool {
        matches!(self, IdentityStrategy::GeneratedId)
    }

    /// Whether the document id is the auth subject id.
    pub fn keyed_by_subject(self) -> bool {
        !matches!(self, IdentityStrategy::AutoIdWithFieldBinding)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IdentityStrategy::UidAsId => "uid-as-id",
            IdentityStrategy::GeneratedId => "generated-id",
            IdentityStrategy::AutoIdWithFieldBinding => "auto-id",
        }
    }
}

impl FromStr for IdentityStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "uid-as-id" | "uid" => Ok(IdentityStrategy::UidAsId),
            "generated-id" | "generated" => Ok(IdentityStrategy::GeneratedId),
            "auto-id" | "auto" => Ok(IdentityStrategy::AutoIdWithFieldBinding),
            other => Err(format!("unknown identity strategy: {}", other)),
        }
    }
}
