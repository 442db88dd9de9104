// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session verification and lifecycle.

pub mod lifecycle;
pub mod verifier;

pub use lifecycle::SessionLifecycleManager;
pub use verifier::SessionVerifier;

use crate::token::AccessTokenClaims;

/// A verified session. Request-scoped: created fresh per request by the
/// verifier or lifecycle manager, owned by that request, never shared.
#[derive(Debug, Clone)]
pub struct Session {
    pub handle: String,
    pub user_id: String,
    pub recipe_user_id: String,
    pub tenant_id: String,
    /// Full verified token payload, including custom claims.
    pub access_token_payload: AccessTokenClaims,
    pub anti_csrf_token: Option<String>,
    /// Set when the engine issued a newer access token for this session
    /// during the request; the adapter should write it back to the client.
    pub access_token_updated: bool,
}

impl Session {
    pub(crate) fn from_claims(claims: AccessTokenClaims) -> Self {
        Self {
            handle: claims.session_handle.clone(),
            user_id: claims.user_id.clone(),
            recipe_user_id: claims.recipe_user_id.clone(),
            tenant_id: claims.tenant_id.clone(),
            anti_csrf_token: claims.anti_csrf_token.clone(),
            access_token_payload: claims,
            access_token_updated: false,
        }
    }
}

/// Token triple handed back to the host adapter after create/refresh.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access_token: String,
    /// Opaque refresh credential; round-trip it to the core untouched.
    pub refresh_token: String,
    pub anti_csrf_token: Option<String>,
}
