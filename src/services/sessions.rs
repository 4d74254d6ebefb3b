// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Live identity sessions, keyed by auth subject id.
//!
//! A principal presenting a token from a newer sign-in (different
//! `auth_time`) gets a fresh session, which drops the old location cache.
//! Each session sits behind its own async mutex so one identity operation
//! per session is in flight.
//!
//! Sessions unused for longer than the idle TTL are evicted. The sweep runs
//! from `session_for`, at most once per TTL.

use crate::identity::{IdentityResolver, IdentitySession};
use crate::models::VerifiedPrincipal;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Matches the lifetime of a Firebase ID token.
pub const DEFAULT_SESSION_IDLE_TTL: Duration = Duration::from_secs(3600);

struct SessionEntry {
    auth_time: Option<i64>,
    last_used: Instant,
    session: Arc<Mutex<IdentitySession>>,
}

/// Server-side registry of identity sessions.
pub struct SessionRegistry {
    resolver: IdentityResolver,
    sessions: DashMap<String, SessionEntry>,
    idle_ttl: Duration,
    last_sweep: std::sync::Mutex<Instant>,
}

impl SessionRegistry {
    pub fn new(resolver: IdentityResolver) -> Self {
        Self {
            resolver,
            sessions: DashMap::new(),
            idle_ttl: DEFAULT_SESSION_IDLE_TTL,
            last_sweep: std::sync::Mutex::new(Instant::now()),
        }
    }

    /// Evict sessions after `idle_ttl` without use.
    pub fn with_idle_ttl(mut self, idle_ttl: Duration) -> Self {
        self.idle_ttl = idle_ttl;
        self
    }

    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    /// Session for `principal`, created (or restarted) as needed.
    pub fn session_for(&self, principal: &VerifiedPrincipal) -> Arc<Mutex<IdentitySession>> {
        self.maybe_sweep();

        let new_entry = || SessionEntry {
            auth_time: principal.auth_time,
            last_used: Instant::now(),
            session: Arc::new(Mutex::new(self.resolver.session_for(principal.clone()))),
        };

        let mut entry = self
            .sessions
            .entry(principal.auth_subject_id.clone())
            .or_insert_with(new_entry);

        if principal.auth_time.is_some() && entry.auth_time != principal.auth_time {
            tracing::debug!(
                auth_subject_id = %principal.auth_subject_id,
                "Principal re-authenticated, starting new identity session"
            );
            *entry = new_entry();
        }

        entry.last_used = Instant::now();
        entry.session.clone()
    }

    /// Drop sessions idle for longer than the TTL. Sessions held by an
    /// in-flight request are kept. Returns the number evicted.
    pub fn evict_idle(&self) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, entry| {
            entry.last_used.elapsed() < self.idle_ttl || Arc::strong_count(&entry.session) > 1
        });

        let evicted = before.saturating_sub(self.sessions.len());
        if evicted > 0 {
            tracing::debug!(
                evicted,
                remaining = self.sessions.len(),
                "Evicted idle identity sessions"
            );
        }
        evicted
    }

    fn maybe_sweep(&self) {
        // Skip if another caller is sweeping.
        let Ok(mut last_sweep) = self.last_sweep.try_lock() else {
            return;
        };
        if last_sweep.elapsed() < self.idle_ttl {
            return;
        }
        *last_sweep = Instant::now();
        drop(last_sweep);

        self.evict_idle();
    }

    /// Drop the session for `auth_subject_id`. Returns whether one existed.
    pub fn end(&self, auth_subject_id: &str) -> bool {
        let removed = self.sessions.remove(auth_subject_id).is_some();
        if removed {
            tracing::info!(auth_subject_id, "Identity session ended");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
