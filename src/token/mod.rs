// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Access token wire format: claims model and the pure codec.

pub mod claims;
pub mod codec;

pub use claims::AccessTokenClaims;
pub use codec::{decode_access_token, encode_access_token, DecodedAccessToken, TokenHeader};
