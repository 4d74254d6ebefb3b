// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Membership id allocation with bounded collision retry.

use super::error::{IdentityError, Result};
use crate::db::{fields, RecordStore};
use rand::Rng;
use std::sync::Arc;

pub const DEFAULT_ID_DIGITS: u32 = 10;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
/// Largest width whose range still fits in a u64.
pub const MAX_ID_DIGITS: u32 = 18;

type CandidateFn = dyn Fn(u32) -> String + Send + Sync;

/// Generates membership ids that are unique within the record store.
#[derive(Clone)]
pub struct IdAllocator {
    digits: u32,
    max_attempts: u32,
    generate: Arc<CandidateFn>,
}

impl std::fmt::Debug for IdAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdAllocator")
            .field("digits", &self.digits)
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_ID_DIGITS, DEFAULT_MAX_ATTEMPTS)
    }
}

impl IdAllocator {
    /// Allocator producing random zero-padded ids of `digits` width.
    pub fn new(digits: u32, max_attempts: u32) -> Self {
        Self {
            digits: digits.clamp(1, MAX_ID_DIGITS),
            max_attempts: max_attempts.max(1),
            generate: Arc::new(random_numeric_id),
        }
    }

    /// Replace the candidate source (receives the configured width).
    pub fn with_generator<F>(mut self, generate: F) -> Self
    where
        F: Fn(u32) -> String + Send + Sync + 'static,
    {
        self.generate = Arc::new(generate);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Return a membership id no existing record carries.
    ///
    /// Performs no writes. A store failure during the uniqueness check aborts
    /// allocation rather than assuming the candidate is free.
    pub async fn allocate(&self, store: &dyn RecordStore) -> Result<String> {
        for attempt in 1..=self.max_attempts {
            let candidate = (self.generate)(self.digits);

            let existing = store
                .query_by_field(fields::MEMBERSHIP_ID, &candidate, 1)
                .await?;

            if existing.is_empty() {
                tracing::debug!(attempt, "Allocated membership id");
                return Ok(candidate);
            }

            tracing::warn!(
                attempt,
                max_attempts = self.max_attempts,
                "Membership id collision, regenerating"
            );
        }

        tracing::error!(
            attempts = self.max_attempts,
            "Membership id allocation exhausted"
        );
        Err(IdentityError::AllocationExhausted {
            attempts: self.max_attempts,
        })
    }
}

/// Uniformly random number in `[0, 10^digits)`, zero-padded to `digits`.
pub fn random_numeric_id(digits: u32) -> String {
    let digits = digits.clamp(1, MAX_ID_DIGITS);
    let upper = 10u64.pow(digits);
    let value = rand::thread_rng().gen_range(0..upper);
    format!("{:0width$}", value, width = digits as usize)
}
