// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Record locator: finds the one membership record bound to a subject.
//!
//! Resolution walks the strategy's [`LookupStep`]s in order and stops at the
//! first hit. The last resolved document id is cached on the locator itself;
//! the locator belongs to one session and is the only writer of that cache.

use super::error::{IdentityError, Result};
use super::strategy::{IdentityStrategy, LookupStep};
use crate::db::{fields, RecordStore, StoreError, StoredRecord};
use std::sync::Arc;

/// Last resolved binding for this session.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CachedLocation {
    auth_subject_id: String,
    doc_id: String,
}

pub struct RecordLocator {
    store: Arc<dyn RecordStore>,
    strategy: IdentityStrategy,
    permission_denied_as_absent: bool,
    cached: Option<CachedLocation>,
}

impl RecordLocator {
    pub fn new(
        store: Arc<dyn RecordStore>,
        strategy: IdentityStrategy,
        permission_denied_as_absent: bool,
    ) -> Self {
        Self {
            store,
            strategy,
            permission_denied_as_absent,
            cached: None,
        }
    }

    /// Find the record bound to `auth_subject_id`, or `None` if the subject
    /// has not registered yet.
    pub async fn locate(&mut self, auth_subject_id: &str) -> Result<Option<StoredRecord>> {
        for step in self.strategy.lookup_steps() {
            let found = match step {
                LookupStep::CachedLocation => self.lookup_cached(auth_subject_id).await?,
                LookupStep::DirectBySubject => self.lookup_direct(auth_subject_id).await?,
                LookupStep::QueryBySubjectField => self.lookup_by_field(auth_subject_id).await?,
            };

            if let Some(stored) = found {
                tracing::debug!(
                    auth_subject_id,
                    doc_id = %stored.doc_id,
                    step = ?step,
                    "Membership record located"
                );
                self.remember(auth_subject_id, &stored.doc_id);
                return Ok(Some(self.normalize(auth_subject_id, stored)));
            }
        }

        tracing::debug!(auth_subject_id, "No membership record for subject");
        Ok(None)
    }

    /// Record where `auth_subject_id`'s record lives.
    pub fn remember(&mut self, auth_subject_id: &str, doc_id: &str) {
        self.cached = Some(CachedLocation {
            auth_subject_id: auth_subject_id.to_string(),
            doc_id: doc_id.to_string(),
        });
    }

    /// Cached document id for `auth_subject_id`, if any.
    pub fn cached_doc_id(&self, auth_subject_id: &str) -> Option<&str> {
        self.cached
            .as_ref()
            .filter(|c| c.auth_subject_id == auth_subject_id)
            .map(|c| c.doc_id.as_str())
    }

    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    async fn lookup_cached(&mut self, auth_subject_id: &str) -> Result<Option<StoredRecord>> {
        let Some(doc_id) = self.cached_doc_id(auth_subject_id).map(str::to_string) else {
            return Ok(None);
        };

        match self.store.get_by_id(&doc_id).await? {
            Some(stored) if self.is_bound(&stored, auth_subject_id) => Ok(Some(stored)),
            _ => {
                tracing::debug!(
                    auth_subject_id,
                    doc_id = %doc_id,
                    "Discarding stale cached location"
                );
                self.invalidate();
                Ok(None)
            }
        }
    }

    async fn lookup_direct(&self, auth_subject_id: &str) -> Result<Option<StoredRecord>> {
        Ok(self
            .store
            .get_by_id(auth_subject_id)
            .await?
            .filter(|stored| self.is_bound(stored, auth_subject_id)))
    }

    async fn lookup_by_field(&self, auth_subject_id: &str) -> Result<Option<StoredRecord>> {
        match self
            .store
            .query_by_field(fields::AUTH_SUBJECT_ID, auth_subject_id, 1)
            .await
        {
            Ok(hits) => Ok(hits.into_iter().next()),
            Err(StoreError::PermissionDenied(msg)) if self.permission_denied_as_absent => {
                tracing::warn!(
                    auth_subject_id,
                    error = %msg,
                    "Permission denied querying membership records; treating as unregistered"
                );
                Ok(None)
            }
            Err(e) => Err(IdentityError::LookupFailed(e)),
        }
    }

    /// Whether `stored` belongs to `auth_subject_id`.
    ///
    /// Documents keyed by uid that predate the `authSubjectId` field are bound
    /// through their document id.
    fn is_bound(&self, stored: &StoredRecord, auth_subject_id: &str) -> bool {
        if stored.record.auth_subject_id.is_empty() {
            self.strategy.keyed_by_subject() && stored.doc_id == auth_subject_id
        } else {
            stored.record.auth_subject_id == auth_subject_id
        }
    }

    /// Fill in bindings implied by the strategy but missing from the document.
    fn normalize(&self, auth_subject_id: &str, mut stored: StoredRecord) -> StoredRecord {
        if stored.record.auth_subject_id.is_empty() {
            stored.record.auth_subject_id = auth_subject_id.to_string();
        }
        if stored.record.membership_id.is_empty() {
            match self.strategy {
                IdentityStrategy::AutoIdWithFieldBinding => {
                    stored.record.membership_id = stored.doc_id.clone();
                }
                IdentityStrategy::UidAsId => {
                    stored.record.membership_id = auth_subject_id.to_string();
                }
                IdentityStrategy::GeneratedId => {
                    tracing::warn!(
                        auth_subject_id,
                        doc_id = %stored.doc_id,
                        "Membership record has no membership id yet"
                    );
                }
            }
        }
        stored
    }
}
