// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity sessions: the per-principal state machine and UI-facing API.
//!
//! A session moves `Unauthenticated → Authenticated → Registered` and never
//! back. It owns the record locator, so the resolved-location cache lives and
//! dies with the session.

use super::allocator::IdAllocator;
use super::error::{IdentityError, Result};
use super::locator::RecordLocator;
use super::strategy::IdentityStrategy;
use super::verifier::CredentialVerifier;
use super::writer::RecordWriter;
use crate::db::RecordStore;
use crate::models::{
    Credential, MembershipRecord, ProfileUpdate, RegistrationInput, VerifiedPrincipal,
};
use std::sync::Arc;

/// Settings shared by every session of a deployment.
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub strategy: IdentityStrategy,
    pub membership_id_digits: u32,
    pub max_allocation_attempts: u32,
    /// Treat permission-denied field queries as "not registered".
    pub permission_denied_as_absent: bool,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            strategy: IdentityStrategy::default(),
            membership_id_digits: super::allocator::DEFAULT_ID_DIGITS,
            max_allocation_attempts: super::allocator::DEFAULT_MAX_ATTEMPTS,
            permission_denied_as_absent: true,
        }
    }
}

/// Factory for identity sessions over one record store.
#[derive(Clone)]
pub struct IdentityResolver {
    store: Arc<dyn RecordStore>,
    strategy: IdentityStrategy,
    permission_denied_as_absent: bool,
    allocator: IdAllocator,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn RecordStore>, settings: &ResolverSettings) -> Self {
        Self {
            store,
            strategy: settings.strategy,
            permission_denied_as_absent: settings.permission_denied_as_absent,
            allocator: IdAllocator::new(
                settings.membership_id_digits,
                settings.max_allocation_attempts,
            ),
        }
    }

    /// Replace the membership id allocator.
    pub fn with_allocator(mut self, allocator: IdAllocator) -> Self {
        self.allocator = allocator;
        self
    }

    pub fn strategy(&self) -> IdentityStrategy {
        self.strategy
    }

    /// Start a fresh, unauthenticated session with an empty location cache.
    pub fn session(&self) -> IdentitySession {
        IdentitySession {
            state: SessionState::Unauthenticated,
            locator: RecordLocator::new(
                self.store.clone(),
                self.strategy,
                self.permission_denied_as_absent,
            ),
            writer: RecordWriter::new(self.store.clone(), self.strategy, self.allocator.clone()),
        }
    }

    /// Start a session for an already verified principal.
    pub fn session_for(&self, principal: VerifiedPrincipal) -> IdentitySession {
        let mut session = self.session();
        session.attach(principal);
        session
    }
}

/// Where a principal stands with respect to registration.
#[derive(Debug, Clone)]
pub enum SessionState {
    Unauthenticated,
    /// Verified, no membership record known yet.
    Authenticated(VerifiedPrincipal),
    Registered {
        principal: VerifiedPrincipal,
        membership_id: String,
    },
}

/// One authenticated run of the client.
///
/// Methods take `&mut self`: a session serves one identity operation at a
/// time.
pub struct IdentitySession {
    state: SessionState,
    locator: RecordLocator,
    writer: RecordWriter,
}

impl IdentitySession {
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn principal(&self) -> Option<&VerifiedPrincipal> {
        match &self.state {
            SessionState::Unauthenticated => None,
            SessionState::Authenticated(principal) => Some(principal),
            SessionState::Registered { principal, .. } => Some(principal),
        }
    }

    pub fn is_registered(&self) -> bool {
        matches!(self.state, SessionState::Registered { .. })
    }

    /// Verify `credential` and bind the session to the resulting principal.
    pub async fn sign_in<V>(
        &mut self,
        verifier: &V,
        credential: &Credential,
    ) -> Result<&VerifiedPrincipal>
    where
        V: CredentialVerifier + ?Sized,
    {
        let principal = verifier.verify(credential).await?;
        self.attach(principal);
        self.principal().ok_or(IdentityError::NotAuthenticated)
    }

    /// Bind the session to a principal verified elsewhere (e.g. an ID token).
    ///
    /// The same subject refreshes the stored principal without losing
    /// registration. A different subject starts over with an empty cache.
    pub fn attach(&mut self, principal: VerifiedPrincipal) {
        let same_subject = self
            .principal()
            .is_some_and(|current| current.auth_subject_id == principal.auth_subject_id);

        if same_subject {
            match &mut self.state {
                SessionState::Authenticated(current)
                | SessionState::Registered {
                    principal: current, ..
                } => *current = principal,
                SessionState::Unauthenticated => {}
            }
            return;
        }

        tracing::debug!(
            auth_subject_id = %principal.auth_subject_id,
            "Identity session authenticated"
        );
        self.locator.invalidate();
        self.state = SessionState::Authenticated(principal);
    }

    /// Look up the membership record bound to `auth_subject_id`.
    ///
    /// `None` means the subject has not registered yet.
    pub async fn resolve(&mut self, auth_subject_id: &str) -> Result<Option<MembershipRecord>> {
        let found = self.locator.locate(auth_subject_id).await?;

        if let Some(stored) = &found {
            self.mark_registered(auth_subject_id, &stored.record.membership_id);
        }

        Ok(found.map(|stored| stored.record))
    }

    /// Create the membership record for the session's principal.
    pub async fn register(
        &mut self,
        auth_subject_id: &str,
        input: &RegistrationInput,
    ) -> Result<MembershipRecord> {
        let principal = self.principal_for(auth_subject_id)?.clone();

        if self.is_registered() {
            return Err(IdentityError::AlreadyRegistered);
        }

        let stored = self
            .writer
            .create(Some(&principal), &mut self.locator, input)
            .await?;

        self.mark_registered(auth_subject_id, &stored.record.membership_id);
        Ok(stored.record)
    }

    /// Apply a partial profile update to the principal's record and return
    /// the record as written.
    pub async fn update_profile(
        &mut self,
        auth_subject_id: &str,
        update: &ProfileUpdate,
    ) -> Result<MembershipRecord> {
        self.principal_for(auth_subject_id)?;

        let record = self
            .writer
            .update(&mut self.locator, auth_subject_id, update)
            .await?;

        self.mark_registered(auth_subject_id, &record.membership_id);
        Ok(record)
    }

    fn principal_for(&self, auth_subject_id: &str) -> Result<&VerifiedPrincipal> {
        self.principal()
            .filter(|p| p.auth_subject_id == auth_subject_id)
            .ok_or(IdentityError::NotAuthenticated)
    }

    fn mark_registered(&mut self, auth_subject_id: &str, membership_id: &str) {
        let state = std::mem::replace(&mut self.state, SessionState::Unauthenticated);
        self.state = match state {
            SessionState::Authenticated(principal)
                if principal.auth_subject_id == auth_subject_id =>
            {
                tracing::debug!(auth_subject_id, membership_id, "Identity session registered");
                SessionState::Registered {
                    principal,
                    membership_id: membership_id.to_string(),
                }
            }
            other => other,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    fn input() -> RegistrationInput {
        RegistrationInput {
            first_name: "Ann".to_string(),
            last_name: "Lee".to_string(),
            email: "a@example.com".to_string(),
            date_of_birth: "01/02/1990".to_string(),
            gender: "F".to_string(),
            phone: "+15551234567".to_string(),
        }
    }

    #[tokio::test]
    async fn test_state_machine_transitions() {
        let store = MemoryStore::new();
        let resolver = IdentityResolver::new(Arc::new(store.clone()), &ResolverSettings::default());
        let mut session = resolver.session();
        assert!(matches!(session.state(), SessionState::Unauthenticated));

        session.attach(VerifiedPrincipal::new("auth-1"));
        assert!(matches!(session.state(), SessionState::Authenticated(_)));

        assert!(session.resolve("auth-1").await.unwrap().is_none());
        assert!(matches!(session.state(), SessionState::Authenticated(_)));

        let record = session.register("auth-1", &input()).await.unwrap();
        match session.state() {
            SessionState::Registered { membership_id, .. } => {
                assert_eq!(membership_id, &record.membership_id)
            }
            other => panic!("unexpected state {:?}", other),
        }

        // Re-attaching the same subject keeps the registration.
        session.attach(VerifiedPrincipal::new("auth-1"));
        assert!(session.is_registered());
    }

    #[tokio::test]
    async fn test_register_requires_matching_principal() {
        let store = MemoryStore::new();
        let resolver = IdentityResolver::new(Arc::new(store.clone()), &ResolverSettings::default());

        let mut anonymous = resolver.session();
        let err = anonymous.register("auth-1", &input()).await.unwrap_err();
        assert!(matches!(err, IdentityError::NotAuthenticated));

        let mut other = resolver.session_for(VerifiedPrincipal::new("auth-2"));
        let err = other.register("auth-1", &input()).await.unwrap_err();
        assert!(matches!(err, IdentityError::NotAuthenticated));

        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_existing_registration_found_on_resolve() {
        let store = MemoryStore::new();
        let resolver = IdentityResolver::new(Arc::new(store.clone()), &ResolverSettings::default());

        let mut first = resolver.session_for(VerifiedPrincipal::new("auth-1"));
        first.register("auth-1", &input()).await.unwrap();

        let mut second = resolver.session_for(VerifiedPrincipal::new("auth-1"));
        assert!(!second.is_registered());
        assert!(second.resolve("auth-1").await.unwrap().is_some());
        assert!(second.is_registered());

        let err = second.register("auth-1", &input()).await.unwrap_err();
        assert!(matches!(err, IdentityError::AlreadyRegistered));
    }

    #[tokio::test]
    async fn test_switching_subject_resets_session() {
        let store = MemoryStore::new();
        let resolver = IdentityResolver::new(Arc::new(store.clone()), &ResolverSettings::default());

        let mut session = resolver.session_for(VerifiedPrincipal::new("auth-1"));
        session.register("auth-1", &input()).await.unwrap();

        session.attach(VerifiedPrincipal::new("auth-2"));
        assert!(matches!(
            session.state(),
            SessionState::Authenticated(p) if p.auth_subject_id == "auth-2"
        ));
    }
}
