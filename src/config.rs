// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Engine Configuration
//!
//! Configuration is loaded from the environment at engine construction, with
//! builder-style overrides for embedding hosts that configure in code.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `RELATIONAL_CORE_URL` | Base URL of the authorization core | Required |
//! | `RELATIONAL_CORE_API_KEY` | API key sent on every core call | Optional |
//! | `RELATIONAL_CORE_TIMEOUT_SECS` | Core HTTP request timeout | `15` |
//! | `RELATIONAL_SIGNING_ALG` | Access token algorithm (`HS256`/`RS256`) | `RS256` |
//! | `RELATIONAL_SIGNING_KIND` | Key kind for new tokens (`static`/`dynamic`) | `dynamic` |
//! | `RELATIONAL_ANTI_CSRF` | Anti-CSRF mode (`disabled`/`via-token`) | `via-token` |
//! | `RELATIONAL_KEY_CACHE_TTL_SECS` | Key cache TTL when the core omits one | `86400` |
//! | `RELATIONAL_DYNAMIC_KEY_GRACE_SECS` | Retention window for superseded dynamic keys | `604800` |

use std::time::Duration;

use url::Url;

use crate::error::SessionError;
use crate::keys::{KeyKind, SigningAlgorithm};

const DEFAULT_CORE_TIMEOUT: Duration = Duration::from_secs(15);

/// Fallback key cache TTL when the core response omits `validityTtlSeconds`.
const DEFAULT_KEY_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default retention window for superseded dynamic signing keys. In-flight
/// access tokens signed with a previous key must keep verifying until they
/// naturally expire, so this must exceed the access token lifetime.
const DEFAULT_DYNAMIC_KEY_GRACE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Anti-CSRF protection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AntiCsrfMode {
    /// No anti-CSRF token is issued or checked.
    Disabled,
    /// An anti-CSRF token is issued with every session and bound into the
    /// access token payload; state-changing callers pass `require_anti_csrf`.
    ViaToken,
}

impl AntiCsrfMode {
    fn parse(value: &str) -> Result<Self, SessionError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "disabled" => Ok(AntiCsrfMode::Disabled),
            "via-token" | "via_token" => Ok(AntiCsrfMode::ViaToken),
            other => Err(SessionError::Config(format!(
                "unsupported anti-CSRF mode '{other}' (expected disabled or via-token)"
            ))),
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Base URL of the authorization core, e.g. `https://core.internal:3567`.
    pub core_base_url: String,
    /// API key sent as the `Api-Key` header on every core call.
    pub core_api_key: Option<String>,
    /// HTTP timeout for core calls.
    pub core_timeout: Duration,
    /// Algorithm used when signing new access tokens.
    pub signing_algorithm: SigningAlgorithm,
    /// Key kind used when signing new access tokens.
    pub signing_kind: KeyKind,
    pub anti_csrf: AntiCsrfMode,
    /// Key cache TTL used when the core response carries no TTL of its own.
    pub key_cache_ttl: Duration,
    /// How long superseded dynamic keys remain usable for verification,
    /// measured from the key's `created_at`.
    pub dynamic_key_grace: Duration,
}

impl SessionConfig {
    /// Create a configuration with defaults for everything but the core URL.
    pub fn new(core_base_url: impl Into<String>) -> Self {
        Self {
            core_base_url: core_base_url.into(),
            core_api_key: None,
            core_timeout: DEFAULT_CORE_TIMEOUT,
            signing_algorithm: SigningAlgorithm::RS256,
            signing_kind: KeyKind::Dynamic,
            anti_csrf: AntiCsrfMode::ViaToken,
            key_cache_ttl: DEFAULT_KEY_CACHE_TTL,
            dynamic_key_grace: DEFAULT_DYNAMIC_KEY_GRACE,
        }
    }

    /// Load configuration from `RELATIONAL_*` environment variables.
    pub fn from_env() -> Result<Self, SessionError> {
        let mut config = Self::new(env_required("RELATIONAL_CORE_URL")?);
        config.core_api_key = env_optional("RELATIONAL_CORE_API_KEY");

        if let Some(secs) = env_optional("RELATIONAL_CORE_TIMEOUT_SECS") {
            config.core_timeout = Duration::from_secs(parse_secs("RELATIONAL_CORE_TIMEOUT_SECS", &secs)?);
        }
        if let Some(alg) = env_optional("RELATIONAL_SIGNING_ALG") {
            config.signing_algorithm = SigningAlgorithm::parse(&alg)?;
        }
        if let Some(kind) = env_optional("RELATIONAL_SIGNING_KIND") {
            config.signing_kind = parse_kind(&kind)?;
        }
        if let Some(mode) = env_optional("RELATIONAL_ANTI_CSRF") {
            config.anti_csrf = AntiCsrfMode::parse(&mode)?;
        }
        if let Some(secs) = env_optional("RELATIONAL_KEY_CACHE_TTL_SECS") {
            config.key_cache_ttl =
                Duration::from_secs(parse_secs("RELATIONAL_KEY_CACHE_TTL_SECS", &secs)?);
        }
        if let Some(secs) = env_optional("RELATIONAL_DYNAMIC_KEY_GRACE_SECS") {
            config.dynamic_key_grace =
                Duration::from_secs(parse_secs("RELATIONAL_DYNAMIC_KEY_GRACE_SECS", &secs)?);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.core_api_key = Some(api_key.into());
        self
    }

    pub fn with_core_timeout(mut self, timeout: Duration) -> Self {
        self.core_timeout = timeout;
        self
    }

    pub fn with_signing_algorithm(mut self, algorithm: SigningAlgorithm) -> Self {
        self.signing_algorithm = algorithm;
        self
    }

    pub fn with_signing_kind(mut self, kind: KeyKind) -> Self {
        self.signing_kind = kind;
        self
    }

    pub fn with_anti_csrf(mut self, mode: AntiCsrfMode) -> Self {
        self.anti_csrf = mode;
        self
    }

    pub fn with_key_cache_ttl(mut self, ttl: Duration) -> Self {
        self.key_cache_ttl = ttl;
        self
    }

    pub fn with_dynamic_key_grace(mut self, grace: Duration) -> Self {
        self.dynamic_key_grace = grace;
        self
    }

    /// Check the configuration for values that can only fail at runtime.
    pub fn validate(&self) -> Result<(), SessionError> {
        let url = Url::parse(&self.core_base_url).map_err(|e| {
            SessionError::Config(format!("invalid core URL '{}': {e}", self.core_base_url))
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(SessionError::Config(format!(
                "core URL must be http(s), got '{}'",
                url.scheme()
            )));
        }
        if self.core_timeout.is_zero() {
            return Err(SessionError::Config(
                "core timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_kind(value: &str) -> Result<KeyKind, SessionError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "static" => Ok(KeyKind::Static),
        "dynamic" => Ok(KeyKind::Dynamic),
        other => Err(SessionError::Config(format!(
            "unsupported signing kind '{other}' (expected static or dynamic)"
        ))),
    }
}

fn parse_secs(name: &str, value: &str) -> Result<u64, SessionError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| SessionError::Config(format!("{name} must be an integer, got '{value}'")))
}

fn env_required(name: &str) -> Result<String, SessionError> {
    env_optional(name).ok_or_else(|| SessionError::Config(format!("{name} is not set")))
}

fn env_optional(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) => {
            let trimmed = value.trim().to_string();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed)
            }
        }
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = SessionConfig::new("https://core.internal:3567");
        assert_eq!(config.signing_algorithm, SigningAlgorithm::RS256);
        assert_eq!(config.signing_kind, KeyKind::Dynamic);
        assert_eq!(config.anti_csrf, AntiCsrfMode::ViaToken);
        assert_eq!(config.core_timeout, Duration::from_secs(15));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_overrides_apply() {
        let config = SessionConfig::new("http://localhost:3567")
            .with_api_key("secret")
            .with_signing_algorithm(SigningAlgorithm::HS256)
            .with_signing_kind(KeyKind::Static)
            .with_anti_csrf(AntiCsrfMode::Disabled)
            .with_dynamic_key_grace(Duration::from_secs(3600));
        assert_eq!(config.core_api_key.as_deref(), Some("secret"));
        assert_eq!(config.signing_algorithm, SigningAlgorithm::HS256);
        assert_eq!(config.signing_kind, KeyKind::Static);
        assert_eq!(config.anti_csrf, AntiCsrfMode::Disabled);
        assert_eq!(config.dynamic_key_grace, Duration::from_secs(3600));
    }

    #[test]
    fn validate_rejects_bad_urls() {
        assert!(matches!(
            SessionConfig::new("not a url").validate(),
            Err(SessionError::Config(_))
        ));
        assert!(matches!(
            SessionConfig::new("ftp://core.internal").validate(),
            Err(SessionError::Config(_))
        ));
    }

    #[test]
    fn anti_csrf_mode_parses_both_spellings() {
        assert_eq!(
            AntiCsrfMode::parse("via-token").unwrap(),
            AntiCsrfMode::ViaToken
        );
        assert_eq!(
            AntiCsrfMode::parse("VIA_TOKEN").unwrap(),
            AntiCsrfMode::ViaToken
        );
        assert_eq!(
            AntiCsrfMode::parse("disabled").unwrap(),
            AntiCsrfMode::Disabled
        );
        assert!(AntiCsrfMode::parse("maybe").is_err());
    }

    #[test]
    fn parse_secs_rejects_garbage() {
        assert_eq!(parse_secs("X", "30").unwrap(), 30);
        assert!(parse_secs("X", "thirty").is_err());
    }
}
