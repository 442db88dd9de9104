// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signing key cache.
//!
//! ## Security
//!
//! - Keys are fetched from the core and cached with the TTL the core grants
//! - Stale entries keep serving signature *verification* so a brief core
//!   outage never rejects already-issued tokens; they are never used to sign
//! - An unknown `kid` triggers at most one forced refresh before the token
//!   is rejected, bounding cache-busting floods from attacker-chosen kids
//!
//! ## Concurrency
//!
//! Read-mostly `RwLock` state plus a dedicated refresh gate: N concurrent
//! cache misses produce exactly one outbound core call, with the other N-1
//! callers re-checking the cache once the first refresh lands.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use super::{KeyKind, SigningKey};
use crate::core::CoreDriver;
use crate::error::SessionError;

struct KindState {
    /// Kid of the key currently used for new signing, if any.
    current: Option<String>,
    fetched_at: Option<Instant>,
    ttl: Duration,
}

impl KindState {
    fn new(ttl: Duration) -> Self {
        Self {
            current: None,
            fetched_at: None,
            ttl,
        }
    }

    fn is_fresh(&self) -> bool {
        matches!(self.fetched_at, Some(at) if at.elapsed() < self.ttl)
    }
}

struct CacheState {
    keys: HashMap<String, Arc<SigningKey>>,
    statics: KindState,
    dynamics: KindState,
}

impl CacheState {
    fn kind_state(&self, kind: KeyKind) -> &KindState {
        match kind {
            KeyKind::Static => &self.statics,
            KeyKind::Dynamic => &self.dynamics,
        }
    }

    fn kind_state_mut(&mut self, kind: KeyKind) -> &mut KindState {
        match kind {
            KeyKind::Static => &mut self.statics,
            KeyKind::Dynamic => &mut self.dynamics,
        }
    }

    fn current_key(&self, kind: KeyKind) -> Option<Arc<SigningKey>> {
        self.kind_state(kind)
            .current
            .as_ref()
            .and_then(|kid| self.keys.get(kid))
            .cloned()
    }
}

/// Rotating signing key cache, one per engine instance.
pub struct SigningKeyCache {
    state: RwLock<CacheState>,
    /// Serializes refreshes; holders double-check the cache before fetching.
    refresh_gate: Mutex<()>,
    driver: Arc<dyn CoreDriver>,
    fallback_ttl: Duration,
    dynamic_key_grace: Duration,
}

impl SigningKeyCache {
    /// Create an empty cache. Population is lazy, on the first lookup.
    pub fn new(
        driver: Arc<dyn CoreDriver>,
        fallback_ttl: Duration,
        dynamic_key_grace: Duration,
    ) -> Self {
        Self {
            state: RwLock::new(CacheState {
                keys: HashMap::new(),
                statics: KindState::new(fallback_ttl),
                dynamics: KindState::new(fallback_ttl),
            }),
            refresh_gate: Mutex::new(()),
            driver,
            fallback_ttl,
            dynamic_key_grace,
        }
    }

    /// Look up a verification key by `kid`.
    ///
    /// TTL expiry is a soft deadline here: a stale hit triggers a refresh,
    /// but the stale key keeps verifying if the core is unreachable or
    /// another caller is already refreshing. A miss attempts one coalesced
    /// refresh of the kid's kind, then rejects.
    pub async fn get_key_by_id(&self, kid: &str) -> Result<Arc<SigningKey>, SessionError> {
        let cached = {
            let state = self.state.read().await;
            state
                .keys
                .get(kid)
                .map(|key| (key.clone(), state.kind_state(key.kind).is_fresh()))
        };
        if let Some((key, fresh)) = cached {
            if fresh {
                return Ok(key);
            }
            return self.revalidate(kid, key).await;
        }

        let kind = KeyKind::from_kid(kid)?;

        let _gate = self.refresh_gate.lock().await;
        {
            let state = self.state.read().await;
            if let Some(key) = state.keys.get(kid) {
                return Ok(key.clone());
            }
        }
        self.refresh_kind(kind).await?;

        let state = self.state.read().await;
        state
            .keys
            .get(kid)
            .cloned()
            .ok_or_else(|| SessionError::UnknownSigningKey {
                kid: kid.to_string(),
            })
    }

    /// Refresh behind a stale hit. Never turns a cached key into a failure
    /// unless the refresh itself succeeded and dropped the key (rotated out
    /// of its grace window).
    async fn revalidate(
        &self,
        kid: &str,
        stale: Arc<SigningKey>,
    ) -> Result<Arc<SigningKey>, SessionError> {
        let Ok(_gate) = self.refresh_gate.try_lock() else {
            // Someone else is already refreshing; stale verification is fine.
            return Ok(stale);
        };
        {
            let state = self.state.read().await;
            if state.kind_state(stale.kind).is_fresh() {
                return Ok(state.keys.get(kid).cloned().unwrap_or(stale));
            }
        }
        if self.refresh_kind(stale.kind).await.is_err() {
            return Ok(stale);
        }
        let state = self.state.read().await;
        state
            .keys
            .get(kid)
            .cloned()
            .ok_or_else(|| SessionError::UnknownSigningKey {
                kid: kid.to_string(),
            })
    }

    /// Get the key currently used to sign new tokens of `kind`.
    ///
    /// Unlike verification lookups this requires a fresh cache: stale or
    /// missing state triggers a blocking refresh, and a refresh failure is
    /// surfaced rather than signing with a possibly-superseded key.
    pub async fn get_current_signing_key(
        &self,
        kind: KeyKind,
    ) -> Result<Arc<SigningKey>, SessionError> {
        {
            let state = self.state.read().await;
            if state.kind_state(kind).is_fresh() {
                if let Some(key) = state.current_key(kind) {
                    return Ok(key);
                }
            }
        }

        let _gate = self.refresh_gate.lock().await;
        {
            let state = self.state.read().await;
            if state.kind_state(kind).is_fresh() {
                if let Some(key) = state.current_key(kind) {
                    return Ok(key);
                }
            }
        }
        self.refresh_kind(kind).await?;

        let state = self.state.read().await;
        state.current_key(kind).ok_or_else(|| {
            SessionError::SigningKeyFetch(format!("core returned no current {kind} signing key"))
        })
    }

    /// Fetch and store keys of `kind`. Caller must hold the refresh gate.
    async fn refresh_kind(&self, kind: KeyKind) -> Result<(), SessionError> {
        let set = self.driver.get_signing_keys(kind).await.map_err(|e| {
            warn!(kind = kind.as_str(), error = %e, "signing key refresh failed");
            SessionError::SigningKeyFetch(e.to_string())
        })?;

        let ttl = set
            .validity_ttl_seconds
            .map(Duration::from_secs)
            .unwrap_or(self.fallback_ttl);
        let now = chrono::Utc::now().timestamp_millis();
        let grace_millis = i64::try_from(self.dynamic_key_grace.as_millis()).unwrap_or(i64::MAX);

        let mut state = self.state.write().await;

        // Superseded dynamic keys stay verifiable until their grace window
        // closes; static keys are replaced wholesale.
        state.keys.retain(|_, key| {
            key.kind != kind || (kind == KeyKind::Dynamic && key.within_window(now, grace_millis))
        });

        let mut current: Option<(i64, String)> = None;
        for key in set.keys.into_iter().filter(|k| k.kind == kind) {
            if key.can_sign() && current.as_ref().is_none_or(|(at, _)| key.created_at > *at) {
                current = Some((key.created_at, key.kid.clone()));
            }
            state.keys.insert(key.kid.clone(), Arc::new(key));
        }

        let total = state.keys.values().filter(|k| k.kind == kind).count();
        let kind_state = state.kind_state_mut(kind);
        kind_state.current = current.map(|(_, kid)| kid);
        kind_state.fetched_at = Some(Instant::now());
        kind_state.ttl = ttl;

        info!(
            kind = kind.as_str(),
            keys = total,
            ttl_secs = ttl.as_secs(),
            "signing key cache refreshed"
        );
        Ok(())
    }
}
