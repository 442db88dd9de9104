// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Local access token verification.
//!
//! ## Security
//!
//! - The signature check runs before any payload field is trusted
//! - Wrong-key and tampered-token failures are indistinguishable to callers
//! - Expiry has zero leeway; refresh is a separate, explicit operation
//! - Anti-CSRF comparison is constant-time
//!
//! The verify path performs no network I/O except a signing-key cache miss,
//! which is what keeps verification cheap at request volume.

use chrono::Utc;
use jsonwebtoken::{decode, errors::ErrorKind, Validation};
use std::sync::Arc;

use super::Session;
use crate::error::SessionError;
use crate::keys::{KeyKind, SigningKey, SigningKeyCache};
use crate::token::{codec::decode_access_token, AccessTokenClaims};
use crate::validators::{run_validators, ClaimValidator, ValidatorsOutcome};

/// Verifies access tokens against the engine's signing key cache.
pub struct SessionVerifier {
    keys: Arc<SigningKeyCache>,
}

impl SessionVerifier {
    pub fn new(keys: Arc<SigningKeyCache>) -> Self {
        Self { keys }
    }

    /// Verify an access token and produce a request-scoped [`Session`].
    ///
    /// `require_anti_csrf` is the caller's policy knob: pass `true` for
    /// state-changing requests. `validators` all run; failures aggregate,
    /// and a refetch request from any validator yields
    /// [`SessionError::SessionRequiresRefresh`] so the caller can refresh
    /// against the core and re-verify.
    pub async fn verify(
        &self,
        access_token: &str,
        anti_csrf_token: Option<&str>,
        require_anti_csrf: bool,
        validators: &[Box<dyn ClaimValidator>],
    ) -> Result<Session, SessionError> {
        let decoded = decode_access_token(access_token)?;
        decoded.claims.validate_invariants()?;

        // Kid prefix is part of the wire format; reject before key lookup.
        KeyKind::from_kid(&decoded.header.kid)?;
        let key = self.keys.get_key_by_id(&decoded.header.kid).await?;

        let claims = check_signature(access_token, &key)?;

        if claims.is_expired_at(Utc::now().timestamp_millis()) {
            return Err(SessionError::ExpiredToken);
        }

        if require_anti_csrf {
            check_anti_csrf(&claims, anti_csrf_token)?;
        }

        match run_validators(&claims, validators) {
            ValidatorsOutcome::Ok => {}
            ValidatorsOutcome::RequiresRefetch { claim_ids } => {
                return Err(SessionError::SessionRequiresRefresh { claim_ids });
            }
            ValidatorsOutcome::Failed { failing } => {
                return Err(SessionError::ClaimValidation { failing });
            }
        }

        Ok(Session::from_claims(claims))
    }
}

/// Cryptographic signature check. Claims come back from the verified decode,
/// never from the structural parse.
fn check_signature(token: &str, key: &SigningKey) -> Result<AccessTokenClaims, SessionError> {
    let decoding_key = key.decoding_key()?;

    let mut validation = Validation::new(key.algorithm.to_jwt());
    // Expiry and payload semantics are this module's job, not the JWT layer's.
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = decode::<AccessTokenClaims>(token, &decoding_key, &validation).map_err(|e| {
        match e.kind() {
            ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::ImmatureSignature
            | ErrorKind::ExpiredSignature => SessionError::InvalidSignature,
            ErrorKind::InvalidKeyFormat => {
                SessionError::Signing(format!("bad key material for '{}'", key.kid))
            }
            _ => SessionError::MalformedToken,
        }
    })?;
    Ok(data.claims)
}

fn check_anti_csrf(
    claims: &AccessTokenClaims,
    provided: Option<&str>,
) -> Result<(), SessionError> {
    // Tokens issued with anti-CSRF disabled carry no expected value; the
    // check is a no-op for them.
    let Some(expected) = &claims.anti_csrf_token else {
        return Ok(());
    };
    match provided {
        Some(value)
            if ring::constant_time::verify_slices_are_equal(
                expected.as_bytes(),
                value.as_bytes(),
            )
            .is_ok() =>
        {
            Ok(())
        }
        _ => Err(SessionError::AntiCsrf),
    }
}
