// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Pure access token encode/decode.
//!
//! `decode_access_token` is strictly structural: it splits, base64-decodes,
//! and JSON-parses the compact JWT without touching key material or the
//! clock. Expiry and signatures are semantic checks owned by the verifier.

use base64ct::{Base64UrlUnpadded, Encoding};
use jsonwebtoken::Header;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::claims::AccessTokenClaims;
use crate::error::SessionError;
use crate::keys::SigningKey;

/// Parsed JWT header. Both fields are required by the wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenHeader {
    pub alg: String,
    pub kid: String,
}

/// A structurally-decoded access token. Nothing about it is trusted yet.
#[derive(Debug, Clone)]
pub struct DecodedAccessToken {
    pub header: TokenHeader,
    pub claims: AccessTokenClaims,
    /// Raw signature bytes (base64url-decoded third segment).
    pub signature: Vec<u8>,
    /// The `header.payload` prefix the signature was computed over.
    pub raw_signing_input: String,
}

/// Sign `claims` into a compact JWT with `key`.
///
/// The body serializes with stable field order (struct order, then sorted
/// custom claims), so encoding the same payload twice yields the same bytes.
pub fn encode_access_token(
    claims: &AccessTokenClaims,
    key: &SigningKey,
) -> Result<String, SessionError> {
    let encoding_key = key.encoding_key()?;
    let mut header = Header::new(key.algorithm.to_jwt());
    header.kid = Some(key.kid.clone());
    jsonwebtoken::encode(&header, claims, &encoding_key)
        .map_err(|e| SessionError::Signing(format!("jwt encode failed: {e}")))
}

/// Structurally parse a compact JWT.
///
/// Fails with `MalformedToken` on wrong segment count, invalid base64, or a
/// non-object JSON body. Never fails on expired tokens.
pub fn decode_access_token(token: &str) -> Result<DecodedAccessToken, SessionError> {
    let segments: Vec<&str> = token.split('.').collect();
    let [header_b64, payload_b64, signature_b64]: [&str; 3] = segments
        .try_into()
        .map_err(|_| SessionError::MalformedToken)?;
    if header_b64.is_empty() || payload_b64.is_empty() || signature_b64.is_empty() {
        return Err(SessionError::MalformedToken);
    }

    let header_bytes =
        Base64UrlUnpadded::decode_vec(header_b64).map_err(|_| SessionError::MalformedToken)?;
    let header: TokenHeader =
        serde_json::from_slice(&header_bytes).map_err(|_| SessionError::MalformedToken)?;

    let payload_bytes =
        Base64UrlUnpadded::decode_vec(payload_b64).map_err(|_| SessionError::MalformedToken)?;
    let payload: Value =
        serde_json::from_slice(&payload_bytes).map_err(|_| SessionError::MalformedToken)?;
    if !payload.is_object() {
        return Err(SessionError::MalformedToken);
    }
    let claims: AccessTokenClaims =
        serde_json::from_value(payload).map_err(|_| SessionError::MalformedToken)?;

    let signature =
        Base64UrlUnpadded::decode_vec(signature_b64).map_err(|_| SessionError::MalformedToken)?;

    Ok(DecodedAccessToken {
        header,
        claims,
        signature,
        raw_signing_input: format!("{header_b64}.{payload_b64}"),
    })
}
