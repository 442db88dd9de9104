// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session lifecycle orchestration.
//!
//! All state-changing operations go through the authorization core, which is
//! the single authority on refresh-token rotation and theft detection. This
//! module never reimplements rotation-counter logic; it signs access tokens
//! locally and maps the core's typed verdicts onto [`SessionError`].
//!
//! ## Retry policy
//!
//! Revocation is idempotent and retried once on transport failure. Refresh
//! is never retried: a duplicate rotation call is indistinguishable from a
//! replay and could itself trip theft detection.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use super::IssuedTokens;
use crate::config::{AntiCsrfMode, SessionConfig};
use crate::core::{CoreDriver, CoreError, NewSessionRequest, RefreshOutcome, SessionRecord};
use crate::error::SessionError;
use crate::keys::SigningKeyCache;
use crate::token::{codec::encode_access_token, AccessTokenClaims};

/// Orchestrates create/refresh/revoke against the core.
pub struct SessionLifecycleManager {
    driver: Arc<dyn CoreDriver>,
    keys: Arc<SigningKeyCache>,
    config: SessionConfig,
}

impl SessionLifecycleManager {
    pub fn new(
        driver: Arc<dyn CoreDriver>,
        keys: Arc<SigningKeyCache>,
        config: SessionConfig,
    ) -> Self {
        Self {
            driver,
            keys,
            config,
        }
    }

    /// Create a session core-side and sign its first access token locally.
    pub async fn create_session(
        &self,
        user_id: &str,
        recipe_user_id: &str,
        tenant_id: &str,
        initial_payload: serde_json::Map<String, Value>,
    ) -> Result<IssuedTokens, SessionError> {
        let record = self
            .driver
            .create_session(NewSessionRequest {
                user_id: user_id.to_string(),
                recipe_user_id: recipe_user_id.to_string(),
                tenant_id: tenant_id.to_string(),
                initial_claims: initial_payload,
            })
            .await
            .map_err(core_unavailable)?;

        let anti_csrf_token = self.new_anti_csrf();
        let access_token = self.sign_for_record(&record, anti_csrf_token.clone()).await?;

        info!(
            session_handle = %record.session_handle,
            user_id = %record.user_id,
            tenant_id = %record.tenant_id,
            "session created"
        );
        Ok(IssuedTokens {
            access_token,
            refresh_token: record.refresh_token,
            anti_csrf_token,
        })
    }

    /// Rotate a refresh token into a new token pair.
    ///
    /// On theft the entire session family is revoked before the error is
    /// surfaced, so a caller cannot race the theft window.
    pub async fn refresh_session(&self, refresh_token: &str) -> Result<IssuedTokens, SessionError> {
        let outcome = self
            .driver
            .refresh_session(refresh_token)
            .await
            .map_err(core_unavailable)?;

        match outcome {
            RefreshOutcome::Rotated(record) => {
                let anti_csrf_token = self.new_anti_csrf();
                let access_token =
                    self.sign_for_record(&record, anti_csrf_token.clone()).await?;
                info!(session_handle = %record.session_handle, "session refreshed");
                Ok(IssuedTokens {
                    access_token,
                    refresh_token: record.refresh_token,
                    anti_csrf_token,
                })
            }
            RefreshOutcome::Theft {
                session_handle,
                user_id,
            } => {
                warn!(
                    session_handle = %session_handle,
                    user_id = %user_id,
                    "refresh token reuse detected, revoking session family"
                );
                self.revoke_session(&session_handle).await?;
                Err(SessionError::TokenTheftDetected {
                    session_handle,
                    user_id,
                })
            }
            RefreshOutcome::Invalid => Err(SessionError::RefreshTokenInvalid),
        }
    }

    /// Revoke one session. Idempotent: revoking an already-revoked handle
    /// succeeds.
    pub async fn revoke_session(&self, session_handle: &str) -> Result<(), SessionError> {
        match self.driver.revoke_session(session_handle).await {
            Ok(()) => Ok(()),
            Err(first) => {
                warn!(session_handle, error = %first, "revoke failed, retrying once");
                self.driver
                    .revoke_session(session_handle)
                    .await
                    .map_err(core_unavailable)
            }
        }
    }

    /// Revoke every session of a user. Returns the revoked handles.
    pub async fn revoke_all_sessions_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<String>, SessionError> {
        let handles = match self.driver.revoke_all_for_user(user_id).await {
            Ok(handles) => handles,
            Err(first) => {
                warn!(user_id, error = %first, "revoke-all failed, retrying once");
                self.driver
                    .revoke_all_for_user(user_id)
                    .await
                    .map_err(core_unavailable)?
            }
        };
        info!(user_id, revoked = handles.len(), "revoked all sessions for user");
        Ok(handles)
    }

    /// Merge claims into the session record and sign a fresh access token
    /// reflecting the merge, without rotating the refresh token.
    pub async fn regenerate_access_token_payload(
        &self,
        session_handle: &str,
        new_claims: serde_json::Map<String, Value>,
    ) -> Result<String, SessionError> {
        let record = self
            .driver
            .update_session_claims(session_handle, &new_claims)
            .await
            .map_err(core_unavailable)?;
        let access_token = self.sign_for_record(&record, None).await?;
        info!(session_handle = %record.session_handle, "access token payload regenerated");
        Ok(access_token)
    }

    /// Fetch the core's record for a session handle.
    pub async fn get_session_information(
        &self,
        session_handle: &str,
    ) -> Result<SessionRecord, SessionError> {
        self.driver
            .get_session(session_handle)
            .await
            .map_err(core_unavailable)?
            .ok_or(SessionError::RefreshTokenInvalid)
    }

    /// List the handles of a user's live sessions.
    pub async fn get_all_session_handles_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<String>, SessionError> {
        self.driver
            .get_session_handles_for_user(user_id)
            .await
            .map_err(core_unavailable)
    }

    /// Sign an access token for `record` with the configured key kind.
    async fn sign_for_record(
        &self,
        record: &SessionRecord,
        anti_csrf_token: Option<String>,
    ) -> Result<String, SessionError> {
        let key = self
            .keys
            .get_current_signing_key(self.config.signing_kind)
            .await?;
        let claims = AccessTokenClaims {
            session_handle: record.session_handle.clone(),
            user_id: record.user_id.clone(),
            recipe_user_id: record.recipe_user_id.clone(),
            tenant_id: record.tenant_id.clone(),
            expires_at: record.expires_at,
            time_created: Utc::now().timestamp_millis(),
            anti_csrf_token,
            custom_claims: record.custom_claims.clone(),
        };
        encode_access_token(&claims, &key)
    }

    fn new_anti_csrf(&self) -> Option<String> {
        match self.config.anti_csrf {
            AntiCsrfMode::ViaToken => Some(Uuid::new_v4().to_string()),
            AntiCsrfMode::Disabled => None,
        }
    }
}

fn core_unavailable(e: CoreError) -> SessionError {
    SessionError::CoreUnavailable(e.to_string())
}
