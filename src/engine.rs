// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Engine facade for host adapters.
//!
//! One engine instance owns one core driver and one signing-key cache; the
//! cache is passed by handle to the verifier and lifecycle manager rather
//! than living in process-global state. Key population is lazy (first
//! lookup) and there is no teardown; process exit reclaims everything.
//!
//! The host adapter extracts tokens from transport (cookies/headers), calls
//! into this surface, and writes results back. Timeouts around these calls
//! are the adapter's responsibility.

use std::sync::Arc;

use serde_json::Value;

use crate::config::SessionConfig;
use crate::core::{CoreDriver, RemoteCoreClient, SessionRecord};
use crate::error::SessionError;
use crate::keys::SigningKeyCache;
use crate::session::{IssuedTokens, Session, SessionLifecycleManager, SessionVerifier};
use crate::validators::ClaimValidator;

/// The session engine: verification plus lifecycle over one shared key cache.
pub struct SessionEngine {
    verifier: SessionVerifier,
    lifecycle: SessionLifecycleManager,
}

impl SessionEngine {
    /// Build an engine talking to the core over HTTP.
    pub fn new(config: SessionConfig) -> Result<Self, SessionError> {
        let driver = Arc::new(RemoteCoreClient::from_config(&config)?);
        Self::with_driver(config, driver)
    }

    /// Build an engine over any [`CoreDriver`] implementation.
    pub fn with_driver(
        config: SessionConfig,
        driver: Arc<dyn CoreDriver>,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let keys = Arc::new(SigningKeyCache::new(
            driver.clone(),
            config.key_cache_ttl,
            config.dynamic_key_grace,
        ));
        Ok(Self {
            verifier: SessionVerifier::new(keys.clone()),
            lifecycle: SessionLifecycleManager::new(driver, keys, config),
        })
    }

    /// Verify an access token locally. See [`SessionVerifier::verify`].
    pub async fn verify(
        &self,
        access_token: &str,
        anti_csrf_token: Option<&str>,
        require_anti_csrf: bool,
        validators: &[Box<dyn ClaimValidator>],
    ) -> Result<Session, SessionError> {
        self.verifier
            .verify(access_token, anti_csrf_token, require_anti_csrf, validators)
            .await
    }

    pub async fn create_session(
        &self,
        user_id: &str,
        recipe_user_id: &str,
        tenant_id: &str,
        initial_payload: serde_json::Map<String, Value>,
    ) -> Result<IssuedTokens, SessionError> {
        self.lifecycle
            .create_session(user_id, recipe_user_id, tenant_id, initial_payload)
            .await
    }

    pub async fn refresh_session(&self, refresh_token: &str) -> Result<IssuedTokens, SessionError> {
        self.lifecycle.refresh_session(refresh_token).await
    }

    pub async fn revoke_session(&self, session_handle: &str) -> Result<(), SessionError> {
        self.lifecycle.revoke_session(session_handle).await
    }

    pub async fn revoke_all_sessions_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<String>, SessionError> {
        self.lifecycle.revoke_all_sessions_for_user(user_id).await
    }

    pub async fn regenerate_access_token_payload(
        &self,
        session_handle: &str,
        new_claims: serde_json::Map<String, Value>,
    ) -> Result<String, SessionError> {
        self.lifecycle
            .regenerate_access_token_payload(session_handle, new_claims)
            .await
    }

    pub async fn get_session_information(
        &self,
        session_handle: &str,
    ) -> Result<SessionRecord, SessionError> {
        self.lifecycle.get_session_information(session_handle).await
    }

    pub async fn get_all_session_handles_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<String>, SessionError> {
        self.lifecycle.get_all_session_handles_for_user(user_id).await
    }
}
