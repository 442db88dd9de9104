// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Access token claims.
//!
//! The access token body is a flat JSON object with camelCase fields. Custom
//! claims ride alongside the session fields and are kept in a sorted map so
//! re-encoding the same payload is byte-stable.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SessionError;

/// Claims carried in a signed access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenClaims {
    /// Handle of the session record core-side.
    pub session_handle: String,
    /// Primary user id.
    pub user_id: String,
    /// Recipe-level user id (equals `user_id` unless accounts are linked).
    pub recipe_user_id: String,
    pub tenant_id: String,
    /// Expiry in unix milliseconds. Checked by the verifier, not the codec.
    pub expires_at: i64,
    /// Issuance time in unix milliseconds.
    pub time_created: i64,
    /// Expected anti-CSRF value, present when the session was issued with
    /// anti-CSRF protection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anti_csrf_token: Option<String>,
    /// Application claims merged into the token payload.
    #[serde(flatten)]
    pub custom_claims: serde_json::Map<String, Value>,
}

impl AccessTokenClaims {
    /// Structural invariant: a token must expire after it was created.
    pub fn validate_invariants(&self) -> Result<(), SessionError> {
        if self.expires_at <= self.time_created {
            return Err(SessionError::MalformedToken);
        }
        Ok(())
    }

    /// Whether the token is expired at `now_millis`. Zero leeway.
    pub fn is_expired_at(&self, now_millis: i64) -> bool {
        self.expires_at <= now_millis
    }

    /// Look up a custom claim by name.
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.custom_claims.get(name)
    }
}
