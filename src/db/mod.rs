// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer (Firestore, plus an in-memory store for tests).

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryStore;

use crate::models::MembershipRecord;
use async_trait::async_trait;

/// Collection names as constants.
pub mod collections {
    /// Membership records
    pub const USERS: &str = "users";
}

/// Document field paths used in queries and partial updates.
pub mod fields {
    pub const MEMBERSHIP_ID: &str = "membershipId";
    pub const AUTH_SUBJECT_ID: &str = "authSubjectId";
    pub const FIRST_NAME: &str = "firstName";
    pub const LAST_NAME: &str = "lastName";
    pub const DISPLAY_NAME: &str = "displayName";
    pub const DATE_OF_BIRTH: &str = "dateOfBirth";
    pub const GENDER: &str = "gender";
    pub const EMAIL: &str = "email";
    pub const UPDATED_AT: &str = "updatedAt";
}

/// Record store errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// The caller lacks read/write grants for the document or query.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// A create-only write hit an existing document.
    #[error("Document already exists: {0}")]
    AlreadyExists(String),

    /// The document to update does not exist.
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Record serialization failed: {0}")]
    Serialization(String),

    #[error("Store backend error: {0}")]
    Backend(String),
}

const AUTO_ID_LEN: usize = 20;

/// Generate a 20-character alphanumeric document id, the same shape the
/// Firestore client SDKs use for auto ids.
pub fn generate_document_id() -> String {
    use rand::{distributions::Alphanumeric, Rng};

    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(AUTO_ID_LEN)
        .map(char::from)
        .collect()
}

/// A membership record together with the id of the document holding it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub doc_id: String,
    pub record: MembershipRecord,
}

/// Document-oriented access to the membership collection.
///
/// Each call is a single request; reads issued after a write in the same
/// operation must observe that write.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch a record by document id.
    async fn get_by_id(&self, doc_id: &str) -> Result<Option<StoredRecord>, StoreError>;

    /// Records whose string `field` equals `value`, at most `limit` of them.
    async fn query_by_field(
        &self,
        field: &str,
        value: &str,
        limit: u32,
    ) -> Result<Vec<StoredRecord>, StoreError>;

    /// Create a document at `doc_id` in one write; fails with
    /// [`StoreError::AlreadyExists`] if one is already there.
    async fn create_at_id(&self, doc_id: &str, record: &MembershipRecord)
        -> Result<(), StoreError>;

    /// Overwrite only `field_paths` of an existing document with the values in
    /// `record`; fails with [`StoreError::NotFound`] if the document is gone.
    async fn update_fields(
        &self,
        doc_id: &str,
        record: &MembershipRecord,
        field_paths: &[&str],
    ) -> Result<(), StoreError>;
}
