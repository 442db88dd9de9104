// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Typed errors for the session engine.
//!
//! Verification errors (`MalformedToken`, `InvalidSignature`, `ExpiredToken`,
//! `AntiCsrf`, `ClaimValidation`) are definitive judgments about the presented
//! token and are never retried internally. Transport-class errors
//! (`SigningKeyFetch`, `CoreUnavailable`) are kept distinct so a core outage
//! is never reported to the caller as "token invalid".

use thiserror::Error;

/// A single failing claim validator, as reported back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ClaimFailure {
    /// Validator id (e.g. `email-verified`).
    pub id: String,
    /// Optional human-readable reason supplied by the validator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Error type for all session engine operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Token is structurally invalid (wrong segment count, bad base64,
    /// non-JSON body, unknown key-version prefix).
    #[error("access token is malformed")]
    MalformedToken,

    /// Signature check failed. Deliberately does not distinguish "wrong key"
    /// from "tampered payload" to avoid an oracle.
    #[error("access token signature is invalid")]
    InvalidSignature,

    /// Token `expiresAt` is in the past. Expiry has zero leeway at this
    /// layer; refresh is a distinct operation.
    #[error("access token has expired")]
    ExpiredToken,

    /// The token's `kid` did not match any cached signing key, even after a
    /// forced refresh.
    #[error("no signing key matches kid '{kid}'")]
    UnknownSigningKey { kid: String },

    /// Signing keys could not be fetched from the core on a cache miss.
    #[error("failed to fetch signing keys: {0}")]
    SigningKeyFetch(String),

    /// Anti-CSRF token was required but missing or did not match.
    #[error("anti-CSRF token missing or mismatched")]
    AntiCsrf,

    /// One or more claim validators rejected the session payload.
    #[error("claim validation failed for {} claim(s)", failing.len())]
    ClaimValidation { failing: Vec<ClaimFailure> },

    /// At least one claim validator asked for fresh claims from the core.
    /// The caller should refresh the session and re-verify.
    #[error("session claims require a refresh: {}", claim_ids.join(", "))]
    SessionRequiresRefresh { claim_ids: Vec<String> },

    /// A rotated refresh token was replayed. All sessions under the handle
    /// have already been revoked by the time this error is returned.
    #[error("refresh token reuse detected for session '{session_handle}'")]
    TokenTheftDetected {
        session_handle: String,
        user_id: String,
    },

    /// Refresh token is unknown, expired core-side, or the session has been
    /// revoked.
    #[error("refresh token is invalid or the session has been revoked")]
    RefreshTokenInvalid,

    /// The authorization core could not be reached or returned garbage.
    #[error("authorization core unavailable: {0}")]
    CoreUnavailable(String),

    /// Engine misconfiguration (bad URL, missing key material, bad env value).
    #[error("configuration error: {0}")]
    Config(String),

    /// Local token signing failed (missing private material, bad PEM).
    #[error("token signing failed: {0}")]
    Signing(String),
}

impl SessionError {
    /// Stable machine-readable code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            SessionError::MalformedToken => "malformed_token",
            SessionError::InvalidSignature => "invalid_signature",
            SessionError::ExpiredToken => "expired_token",
            SessionError::UnknownSigningKey { .. } => "unknown_signing_key",
            SessionError::SigningKeyFetch(_) => "signing_key_fetch_error",
            SessionError::AntiCsrf => "anti_csrf_error",
            SessionError::ClaimValidation { .. } => "claim_validation_error",
            SessionError::SessionRequiresRefresh { .. } => "session_requires_refresh",
            SessionError::TokenTheftDetected { .. } => "token_theft_detected",
            SessionError::RefreshTokenInvalid => "refresh_token_invalid",
            SessionError::CoreUnavailable(_) => "core_unavailable",
            SessionError::Config(_) => "config_error",
            SessionError::Signing(_) => "signing_error",
        }
    }

    /// Whether this error is a definitive verdict on the presented token
    /// (as opposed to a transport or configuration failure).
    pub fn is_token_verdict(&self) -> bool {
        matches!(
            self,
            SessionError::MalformedToken
                | SessionError::InvalidSignature
                | SessionError::ExpiredToken
                | SessionError::AntiCsrf
                | SessionError::ClaimValidation { .. }
        )
    }
}
