// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper implementing [`RecordStore`].
//!
//! Membership records live in the `users` collection. Creates use
//! create-only inserts so an existing document is never overwritten, and
//! partial updates carry an exists precondition so they never resurrect a
//! deleted record.

use super::{collections, RecordStore, StoreError, StoredRecord};
use crate::models::MembershipRecord;
use async_trait::async_trait;
use firestore::errors::FirestoreError;
use firestore::FirestoreWritePrecondition;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, StoreError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, StoreError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            StoreError::Backend(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create an offline client. Every operation returns an error.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    fn get_client(&self) -> Result<&firestore::FirestoreDb, StoreError> {
        self.client
            .as_ref()
            .ok_or_else(|| StoreError::Backend("Database not connected (offline mode)".to_string()))
    }
}

/// Classify a Firestore error into the store taxonomy.
///
/// Permission failures arrive as gRPC `PermissionDenied` database errors.
fn map_firestore_error(err: FirestoreError) -> StoreError {
    let message = err.to_string();
    match err {
        FirestoreError::DataConflictError(_) => StoreError::AlreadyExists(message),
        FirestoreError::DataNotFoundError(_) => StoreError::NotFound(message),
        FirestoreError::DeserializeError(_) | FirestoreError::SerializeError(_) => {
            StoreError::Serialization(message)
        }
        _ if is_permission_denied(&message) => StoreError::PermissionDenied(message),
        _ => StoreError::Backend(message),
    }
}

fn is_permission_denied(message: &str) -> bool {
    message.contains("PermissionDenied") || message.contains("PERMISSION_DENIED")
}

/// Document id is the last segment of the full resource name.
fn document_id(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

#[async_trait]
impl RecordStore for FirestoreDb {
    async fn get_by_id(&self, doc_id: &str) -> Result<Option<StoredRecord>, StoreError> {
        let record: Option<MembershipRecord> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(doc_id)
            .await
            .map_err(map_firestore_error)?;

        Ok(record.map(|record| StoredRecord {
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
        let field = field.to_string();
        let value = value.to_string();

        let docs = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(move |q| q.field(field.clone()).eq(value.clone()))
            .limit(limit)
            .query()
            .await
            .map_err(map_firestore_error)?;

        docs.iter()
            .map(|doc| {
                let record = firestore::FirestoreDb::deserialize_doc_to::<MembershipRecord>(doc)
                    .map_err(map_firestore_error)?;
                Ok(StoredRecord {
                    doc_id: document_id(&doc.name).to_string(),
                    record,
                })
            })
            .collect()
    }

    async fn create_at_id(
        &self,
        doc_id: &str,
        record: &MembershipRecord,
    ) -> Result<(), StoreError> {
        let _: MembershipRecord = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::USERS)
            .document_id(doc_id)
            .object(record)
            .execute()
            .await
            .map_err(map_firestore_error)?;

        tracing::debug!(doc_id, "Membership document created");
        Ok(())
    }

    async fn update_fields(
        &self,
        doc_id: &str,
        record: &MembershipRecord,
        field_paths: &[&str],
    ) -> Result<(), StoreError> {
        let _: MembershipRecord = self
            .get_client()?
            .fluent()
            .update()
            .fields(field_paths.iter().copied())
            .in_col(collections::USERS)
            .precondition(FirestoreWritePrecondition::Exists(true))
            .document_id(doc_id)
            .object(record)
            .execute()
            .await
            .map_err(map_firestore_error)?;

        tracing::debug!(doc_id, fields = field_paths.len(), "Membership document updated");
        Ok(())
    }
}
