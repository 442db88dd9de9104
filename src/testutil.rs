// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory [`CoreDriver`] double for tests.
//!
//! Models just enough of the core to exercise the engine: session records
//! with rotation counters (replaying a rotated refresh token is reported as
//! theft), idempotent revocation, and scripted signing-key fetch failures.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::core::{
    CoreDriver, CoreError, NewSessionRequest, RefreshOutcome, SessionRecord, SigningKeySet,
};
use crate::keys::{KeyKind, KeyMaterial, SigningAlgorithm, SigningKey};

/// HMAC signing key for tests; the secret is derived from the kid so two
/// keys never share material by accident.
pub(crate) fn test_hmac_key(kid: &str, kind: KeyKind, created_at: i64) -> SigningKey {
    SigningKey {
        kid: kid.to_string(),
        algorithm: SigningAlgorithm::HS256,
        kind,
        created_at,
        material: KeyMaterial::Hmac {
            secret: format!("test-material-{kid}-test-material"),
        },
    }
}

struct MockSession {
    record: SessionRecord,
    revoked: bool,
    rotation_counter: u64,
}

struct MockState {
    keys: Vec<SigningKey>,
    sessions: HashMap<String, MockSession>,
    /// refresh token -> (session handle, counter it was issued at)
    refresh_tokens: HashMap<String, (String, u64)>,
    session_validity: Duration,
}

/// Scriptable in-memory authorization core.
pub(crate) struct MockCore {
    state: Mutex<MockState>,
    key_fetch_calls: AtomicUsize,
    key_fetch_fails: AtomicBool,
    /// Successful revoke_session calls.
    revoke_calls: AtomicUsize,
    revoke_fails_next: AtomicBool,
}

impl MockCore {
    pub(crate) fn with_keys(keys: Vec<SigningKey>) -> Self {
        Self {
            state: Mutex::new(MockState {
                keys,
                sessions: HashMap::new(),
                refresh_tokens: HashMap::new(),
                session_validity: Duration::from_secs(3600),
            }),
            key_fetch_calls: AtomicUsize::new(0),
            key_fetch_fails: AtomicBool::new(false),
            revoke_calls: AtomicUsize::new(0),
            revoke_fails_next: AtomicBool::new(false),
        }
    }

    pub(crate) fn set_keys(&self, keys: Vec<SigningKey>) {
        self.state.lock().unwrap().keys = keys;
    }

    pub(crate) fn set_session_validity(&self, validity: Duration) {
        self.state.lock().unwrap().session_validity = validity;
    }

    pub(crate) fn set_key_fetch_fails(&self, fails: bool) {
        self.key_fetch_fails.store(fails, Ordering::SeqCst);
    }

    pub(crate) fn fail_next_revoke(&self) {
        self.revoke_fails_next.store(true, Ordering::SeqCst);
    }

    pub(crate) fn key_fetch_calls(&self) -> usize {
        self.key_fetch_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn revoke_calls(&self) -> usize {
        self.revoke_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CoreDriver for MockCore {
    async fn create_session(&self, request: NewSessionRequest) -> Result<SessionRecord, CoreError> {
        let mut state = self.state.lock().unwrap();
        let now = Utc::now().timestamp_millis();
        let handle = format!("h-{}", Uuid::new_v4());
        let refresh_token = format!("rt-{}", Uuid::new_v4());
        let record = SessionRecord {
            session_handle: handle.clone(),
            user_id: request.user_id,
            recipe_user_id: request.recipe_user_id,
            tenant_id: request.tenant_id,
            refresh_token: refresh_token.clone(),
            expires_at: now + state.session_validity.as_millis() as i64,
            time_created: now,
            custom_claims: request.initial_claims,
        };
        state
            .refresh_tokens
            .insert(refresh_token, (handle.clone(), 0));
        state.sessions.insert(
            handle,
            MockSession {
                record: record.clone(),
                revoked: false,
                rotation_counter: 0,
            },
        );
        Ok(record)
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<RefreshOutcome, CoreError> {
        let mut state = self.state.lock().unwrap();
        let Some((handle, issued_at)) = state.refresh_tokens.get(refresh_token).cloned() else {
            return Ok(RefreshOutcome::Invalid);
        };
        let now = Utc::now().timestamp_millis();
        let validity = state.session_validity.as_millis() as i64;
        let Some(session) = state.sessions.get_mut(&handle) else {
            return Ok(RefreshOutcome::Invalid);
        };
        if session.revoked {
            return Ok(RefreshOutcome::Invalid);
        }
        if issued_at != session.rotation_counter {
            return Ok(RefreshOutcome::Theft {
                session_handle: handle.clone(),
                user_id: session.record.user_id.clone(),
            });
        }

        session.rotation_counter += 1;
        let new_token = format!("rt-{}", Uuid::new_v4());
        session.record.refresh_token = new_token.clone();
        session.record.expires_at = now + validity;
        let record = session.record.clone();
        let counter = session.rotation_counter;
        state.refresh_tokens.insert(new_token, (handle, counter));
        Ok(RefreshOutcome::Rotated(record))
    }

    async fn get_signing_keys(&self, kind: KeyKind) -> Result<SigningKeySet, CoreError> {
        // Widen the race window so coalescing tests actually overlap.
        tokio::time::sleep(Duration::from_millis(2)).await;
        self.key_fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.key_fetch_fails.load(Ordering::SeqCst) {
            return Err(CoreError::Request("core unreachable (simulated)".to_string()));
        }
        let state = self.state.lock().unwrap();
        Ok(SigningKeySet {
            keys: state
                .keys
                .iter()
                .filter(|key| key.kind == kind)
                .cloned()
                .collect(),
            validity_ttl_seconds: None,
        })
    }

    async fn revoke_session(&self, session_handle: &str) -> Result<(), CoreError> {
        if self.revoke_fails_next.swap(false, Ordering::SeqCst) {
            return Err(CoreError::Request("transient failure (simulated)".to_string()));
        }
        let mut state = self.state.lock().unwrap();
        if let Some(session) = state.sessions.get_mut(session_handle) {
            session.revoked = true;
        }
        self.revoke_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn revoke_all_for_user(&self, user_id: &str) -> Result<Vec<String>, CoreError> {
        let mut state = self.state.lock().unwrap();
        let mut revoked = Vec::new();
        for session in state.sessions.values_mut() {
            if session.record.user_id == user_id && !session.revoked {
                session.revoked = true;
                revoked.push(session.record.session_handle.clone());
            }
        }
        Ok(revoked)
    }

    async fn update_session_claims(
        &self,
        session_handle: &str,
        claims: &serde_json::Map<String, Value>,
    ) -> Result<SessionRecord, CoreError> {
        let mut state = self.state.lock().unwrap();
        let session = state
            .sessions
            .get_mut(session_handle)
            .filter(|s| !s.revoked)
            .ok_or_else(|| CoreError::Request(format!("unknown session '{session_handle}'")))?;
        for (name, value) in claims {
            session
                .record
                .custom_claims
                .insert(name.clone(), value.clone());
        }
        Ok(session.record.clone())
    }

    async fn get_session(
        &self,
        session_handle: &str,
    ) -> Result<Option<SessionRecord>, CoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .sessions
            .get(session_handle)
            .filter(|s| !s.revoked)
            .map(|s| s.record.clone()))
    }

    async fn get_session_handles_for_user(&self, user_id: &str) -> Result<Vec<String>, CoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .sessions
            .values()
            .filter(|s| s.record.user_id == user_id && !s.revoked)
            .map(|s| s.record.session_handle.clone())
            .collect())
    }
}
