// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory record store.
//!
//! Used by tests and local runs without Firestore. Supports injecting the
//! failure modes the resolver has to handle (permission-denied queries and
//! backend outages).

use super::{RecordStore, StoreError, StoredRecord};
use crate::models::MembershipRecord;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// In-memory document store keyed by document id.
#[derive(Clone, Default)]
pub struct MemoryStore {
    docs: Arc<DashMap<String, MembershipRecord>>,
    deny_queries: Arc<AtomicBool>,
    offline: Arc<AtomicBool>,
    writes: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make field queries fail with [`StoreError::PermissionDenied`].
    pub fn deny_queries(&self, deny: bool) {
        self.deny_queries.store(deny, Ordering::SeqCst);
    }

    /// Make every operation fail with [`StoreError::Backend`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Insert a document directly, bypassing write accounting.
    pub fn seed(&self, doc_id: &str, record: MembershipRecord) {
        self.docs.insert(doc_id.to_string(), record);
    }

    /// Snapshot of a stored document.
    pub fn get(&self, doc_id: &str) -> Option<MembershipRecord> {
        self.docs.get(doc_id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Number of successful writes performed through [`RecordStore`].
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("store unavailable".to_string()));
        }
        Ok(())
    }
}

fn to_json(record: &MembershipRecord) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(record).map_err(|e| StoreError::Serialization(e.to_string()))
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get_by_id(&self, doc_id: &str) -> Result<Option<StoredRecord>, StoreError> {
        self.check_online()?;
        Ok(self.get(doc_id).map(|record| StoredRecord {
            doc_id: doc_id.to_string(),
            record,
        }))
    }

    async fn query_by_field(
        &self,
        field: &str,
        value: &str,
        limit: u32,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        self.check_online()?;
        if self.deny_queries.load(Ordering::SeqCst) {
            return Err(StoreError::PermissionDenied(format!(
                "query on {} is not allowed",
                field
            )));
        }

        let mut matches = Vec::new();
        for entry in self.docs.iter() {
            if matches.len() >= limit as usize {
                break;
            }
            let doc = to_json(entry.value())?;
            if doc.get(field).and_then(|v| v.as_str()) == Some(value) {
                matches.push(StoredRecord {
                    doc_id: entry.key().clone(),
                    record: entry.value().clone(),
                });
            }
        }
        Ok(matches)
    }

    async fn create_at_id(
        &self,
        doc_id: &str,
        record: &MembershipRecord,
    ) -> Result<(), StoreError> {
        self.check_online()?;
        match self.docs.entry(doc_id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(StoreError::AlreadyExists(doc_id.to_string()))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(record.clone());
                self.writes.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }
    }

    async fn update_fields(
        &self,
        doc_id: &str,
        record: &MembershipRecord,
        field_paths: &[&str],
    ) -> Result<(), StoreError> {
        self.check_online()?;
        let patch = to_json(record)?;

        let mut entry = self
            .docs
            .get_mut(doc_id)
            .ok_or_else(|| StoreError::NotFound(doc_id.to_string()))?;

        let mut doc = to_json(entry.value())?;
        if let (Some(target), Some(source)) = (doc.as_object_mut(), patch.as_object()) {
            for path in field_paths {
                match source.get(*path) {
                    Some(value) => {
                        target.insert(path.to_string(), value.clone());
                    }
                    None => {
                        target.remove(*path);
                    }
                }
            }
        }

        *entry.value_mut() =
            serde_json::from_value(doc).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
