// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational Sessions - Session Token Lifecycle & Verification Engine
//!
//! This crate issues, verifies, refreshes, and revokes user sessions against
//! the Relational authorization core. Access tokens are signed JWTs verified
//! locally against a rotating signing-key cache; refresh tokens are opaque
//! credentials whose rotation state (and theft detection) the core owns.
//!
//! ## Modules
//!
//! - `engine` - [`SessionEngine`], the surface host adapters call
//! - `session` - verification and lifecycle orchestration
//! - `token` - access token claims and the pure JWT codec
//! - `keys` - signing key model and the rotating key cache
//! - `validators` - pluggable claim validators
//! - `core` - authorization core boundary (trait + HTTP client)
//!
//! ## Security
//!
//! - Verification is local: no network I/O except a signing-key cache miss
//! - Superseded dynamic keys keep verifying through a grace window
//! - Refresh-token replay triggers revocation of the whole session family
//! - Anti-CSRF comparison is constant-time

pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod keys;
pub mod session;
pub mod token;
pub mod validators;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::{AntiCsrfMode, SessionConfig};
pub use core::{CoreDriver, RemoteCoreClient, SessionRecord};
pub use engine::SessionEngine;
pub use error::{ClaimFailure, SessionError};
pub use keys::{KeyKind, SigningAlgorithm, SigningKey, SigningKeyCache};
pub use session::{IssuedTokens, Session, SessionLifecycleManager, SessionVerifier};
pub use token::AccessTokenClaims;
pub use validators::{ClaimCheck, ClaimValidator, EmailVerifiedValidator, PrimaryUserValidator};
