// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signing key model and the rotating key cache.
//!
//! Access tokens are signed with either a long-lived *static* key (rotated
//! only by explicit configuration change core-side) or a *dynamic* key that
//! rotates on a schedule. The key version travels in the JWT `kid` header:
//! `s-…` for static keys, `d-<unixMillis>-<n>` for dynamic keys. Several
//! dynamic keys may verify simultaneously during a rotation grace window;
//! exactly one key per kind is current for new signing.

pub mod cache;

pub use cache::SigningKeyCache;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Signature algorithm for access tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SigningAlgorithm {
    HS256,
    RS256,
}

impl SigningAlgorithm {
    /// Map to the `jsonwebtoken` algorithm.
    pub fn to_jwt(self) -> Algorithm {
        match self {
            SigningAlgorithm::HS256 => Algorithm::HS256,
            SigningAlgorithm::RS256 => Algorithm::RS256,
        }
    }

    /// Parse from a config/env value.
    pub fn parse(value: &str) -> Result<Self, SessionError> {
        match value.trim().to_ascii_uppercase().as_str() {
            "HS256" => Ok(SigningAlgorithm::HS256),
            "RS256" => Ok(SigningAlgorithm::RS256),
            other => Err(SessionError::Config(format!(
                "unsupported signing algorithm '{other}' (expected HS256 or RS256)"
            ))),
        }
    }
}

/// Key kind, encoded as the `kid` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyKind {
    Static,
    Dynamic,
}

impl KeyKind {
    /// Resolve the kind from a token's `kid` header.
    ///
    /// Anything other than the `s-`/`d-` prefixes is a malformed token, not
    /// an unknown key: the prefix is part of the wire format.
    pub fn from_kid(kid: &str) -> Result<Self, SessionError> {
        if kid.starts_with("s-") {
            Ok(KeyKind::Static)
        } else if kid.starts_with("d-") {
            Ok(KeyKind::Dynamic)
        } else {
            Err(SessionError::MalformedToken)
        }
    }

    /// Name used in core API queries and log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            KeyKind::Static => "static",
            KeyKind::Dynamic => "dynamic",
        }
    }
}

impl std::fmt::Display for KeyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key material as delivered by the core.
///
/// Only the key currently used for signing carries private material; grace
/// keys are verification-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum KeyMaterial {
    Hmac {
        secret: String,
    },
    Rsa {
        #[serde(rename = "publicPem")]
        public_pem: String,
        #[serde(rename = "privatePem", default, skip_serializing_if = "Option::is_none")]
        private_pem: Option<String>,
    },
}

/// A signing key as cached by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningKey {
    /// Key id, also the JWT `kid` header (`s-…` or `d-<unixMillis>-<n>`).
    pub kid: String,
    pub algorithm: SigningAlgorithm,
    pub kind: KeyKind,
    /// Creation time in unix milliseconds; anchors the rotation grace window.
    pub created_at: i64,
    pub material: KeyMaterial,
}

impl SigningKey {
    /// Build the verification key.
    pub fn decoding_key(&self) -> Result<DecodingKey, SessionError> {
        match &self.material {
            KeyMaterial::Hmac { secret } => Ok(DecodingKey::from_secret(secret.as_bytes())),
            KeyMaterial::Rsa { public_pem, .. } => DecodingKey::from_rsa_pem(public_pem.as_bytes())
                .map_err(|e| {
                    SessionError::Signing(format!("invalid RSA public key '{}': {e}", self.kid))
                }),
        }
    }

    /// Build the signing key. Fails for verification-only keys.
    pub fn encoding_key(&self) -> Result<EncodingKey, SessionError> {
        match &self.material {
            KeyMaterial::Hmac { secret } => Ok(EncodingKey::from_secret(secret.as_bytes())),
            KeyMaterial::Rsa {
                private_pem: Some(pem),
                ..
            } => EncodingKey::from_rsa_pem(pem.as_bytes()).map_err(|e| {
                SessionError::Signing(format!("invalid RSA private key '{}': {e}", self.kid))
            }),
            KeyMaterial::Rsa {
                private_pem: None, ..
            } => Err(SessionError::Signing(format!(
                "signing key '{}' carries no private material",
                self.kid
            ))),
        }
    }

    /// Whether this key can mint new tokens.
    pub fn can_sign(&self) -> bool {
        match &self.material {
            KeyMaterial::Hmac { .. } => true,
            KeyMaterial::Rsa { private_pem, .. } => private_pem.is_some(),
        }
    }

    /// Whether the key is still inside its retention window at `now_millis`.
    pub fn within_window(&self, now_millis: i64, window_millis: i64) -> bool {
        self.created_at.saturating_add(window_millis) > now_millis
    }
}
