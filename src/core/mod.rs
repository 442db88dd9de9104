// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authorization core boundary.
//!
//! The core is the single source of truth for user accounts, refresh-token
//! rotation state, theft detection, and signing-key generation. This engine
//! never reimplements rotation-counter bookkeeping locally; it only consumes
//! the core's typed verdicts through [`CoreDriver`].

pub mod client;

pub use client::RemoteCoreClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::keys::{KeyKind, SigningKey};

/// Transport-level errors from the core client.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("core request failed: {0}")]
    Request(String),

    #[error("core response was invalid: {0}")]
    InvalidResponse(String),
}

/// A session record as the core stores it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub session_handle: String,
    pub user_id: String,
    pub recipe_user_id: String,
    pub tenant_id: String,
    /// Opaque refresh credential. Never decoded by the SDK.
    pub refresh_token: String,
    /// Access token expiry in unix milliseconds.
    pub expires_at: i64,
    /// Session creation time in unix milliseconds.
    pub time_created: i64,
    /// Claims the core merges into every access token for this session.
    #[serde(default)]
    pub custom_claims: serde_json::Map<String, Value>,
}

/// Inputs for a new session record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSessionRequest {
    pub user_id: String,
    pub recipe_user_id: String,
    pub tenant_id: String,
    pub initial_claims: serde_json::Map<String, Value>,
}

/// The core's verdict on a refresh attempt.
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    /// Rotation succeeded; the record carries the new refresh token.
    Rotated(SessionRecord),
    /// The presented token's rotation counter was already advanced: theft.
    Theft {
        session_handle: String,
        user_id: String,
    },
    /// Unknown, expired, or revoked refresh token.
    Invalid,
}

/// Signing keys of one kind, with the cache validity the core grants them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningKeySet {
    pub keys: Vec<SigningKey>,
    /// How long the fetched set may be cached. Absent means "use the
    /// configured fallback".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validity_ttl_seconds: Option<u64>,
}

/// Narrow query interface to the authorization core.
///
/// Implemented over HTTP by [`RemoteCoreClient`]; tests substitute an
/// in-memory double.
#[async_trait]
pub trait CoreDriver: Send + Sync {
    async fn create_session(&self, request: NewSessionRequest) -> Result<SessionRecord, CoreError>;

    /// Forward a refresh token for rotation. The core owns theft detection;
    /// the SDK must not retry this call (a duplicate rotation attempt is
    /// indistinguishable from a replay).
    async fn refresh_session(&self, refresh_token: &str) -> Result<RefreshOutcome, CoreError>;

    async fn get_signing_keys(&self, kind: KeyKind) -> Result<SigningKeySet, CoreError>;

    /// Revoke one session. Idempotent core-side.
    async fn revoke_session(&self, session_handle: &str) -> Result<(), CoreError>;

    /// Revoke every session of a user. Returns the revoked handles.
    async fn revoke_all_for_user(&self, user_id: &str) -> Result<Vec<String>, CoreError>;

    /// Merge claims into the session record and return the updated record.
    async fn update_session_claims(
        &self,
        session_handle: &str,
        claims: &serde_json::Map<String, Value>,
    ) -> Result<SessionRecord, CoreError>;

    /// Fetch a session record. `None` for unknown or revoked handles.
    async fn get_session(&self, session_handle: &str)
        -> Result<Option<SessionRecord>, CoreError>;

    async fn get_session_handles_for_user(&self, user_id: &str)
        -> Result<Vec<String>, CoreError>;
}
