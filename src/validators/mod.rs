// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Pluggable claim validators.
//!
//! Validators are supplied per verification call site as an ordered list and
//! composed by value; there is no global registry. All validators run on
//! every call, with no short-circuiting, so the caller always gets the
//! complete set of failures. A validator may instead request a *refetch* when its
//! claim is missing or stale locally, signalling that the session should be
//! refreshed against the core before re-validation.

use serde_json::Value;

use crate::error::ClaimFailure;
use crate::token::AccessTokenClaims;

/// Result of one validator's check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimCheck {
    pub is_valid: bool,
    pub reason: Option<String>,
}

impl ClaimCheck {
    pub fn ok() -> Self {
        Self {
            is_valid: true,
            reason: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            reason: Some(reason.into()),
        }
    }
}

/// A predicate over a verified session payload.
pub trait ClaimValidator: Send + Sync {
    /// Stable id reported back to callers on failure.
    fn id(&self) -> &str;

    fn validate(&self, claims: &AccessTokenClaims) -> ClaimCheck;

    /// Whether the payload lacks the data this validator needs, so the
    /// session should be refreshed before judging it.
    fn should_refetch(&self, _claims: &AccessTokenClaims) -> bool {
        false
    }
}

/// Aggregate outcome of running a validator list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidatorsOutcome {
    Ok,
    /// At least one validator wants fresh claims; refetch wins over failure.
    RequiresRefetch { claim_ids: Vec<String> },
    Failed { failing: Vec<ClaimFailure> },
}

/// Run every validator in order and aggregate the results.
pub fn run_validators(
    claims: &AccessTokenClaims,
    validators: &[Box<dyn ClaimValidator>],
) -> ValidatorsOutcome {
    let mut refetch_ids = Vec::new();
    let mut failing = Vec::new();

    for validator in validators {
        if validator.should_refetch(claims) {
            refetch_ids.push(validator.id().to_string());
            continue;
        }
        let check = validator.validate(claims);
        if !check.is_valid {
            failing.push(ClaimFailure {
                id: validator.id().to_string(),
                reason: check.reason,
            });
        }
    }

    if !refetch_ids.is_empty() {
        ValidatorsOutcome::RequiresRefetch {
            claim_ids: refetch_ids,
        }
    } else if !failing.is_empty() {
        ValidatorsOutcome::Failed { failing }
    } else {
        ValidatorsOutcome::Ok
    }
}

/// Requires the `emailVerified` custom claim to be `true`.
///
/// A payload without the claim requests a refetch rather than failing: the
/// token may simply predate verification.
pub struct EmailVerifiedValidator;

impl ClaimValidator for EmailVerifiedValidator {
    fn id(&self) -> &str {
        "email-verified"
    }

    fn validate(&self, claims: &AccessTokenClaims) -> ClaimCheck {
        match claims.claim("emailVerified") {
            Some(Value::Bool(true)) => ClaimCheck::ok(),
            _ => ClaimCheck::failed("email is not verified"),
        }
    }

    fn should_refetch(&self, claims: &AccessTokenClaims) -> bool {
        claims.claim("emailVerified").is_none()
    }
}

/// Requires the session to belong to the primary user, i.e. the token was
/// not issued through a linked (recipe-level) account.
pub struct PrimaryUserValidator;

impl ClaimValidator for PrimaryUserValidator {
    fn id(&self) -> &str {
        "primary-user"
    }

    fn validate(&self, claims: &AccessTokenClaims) -> ClaimCheck {
        if claims.user_id == claims.recipe_user_id {
            ClaimCheck::ok()
        } else {
            ClaimCheck::failed("session belongs to a linked account")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims_with(custom: &[(&str, Value)]) -> AccessTokenClaims {
        let mut custom_claims = serde_json::Map::new();
        for (name, value) in custom {
            custom_claims.insert(name.to_string(), value.clone());
        }
        AccessTokenClaims {
            session_handle: "h-1".to_string(),
            user_id: "u-1".to_string(),
            recipe_user_id: "u-1".to_string(),
            tenant_id: "public".to_string(),
            expires_at: 2_000,
            time_created: 1_000,
            anti_csrf_token: None,
            custom_claims,
        }
    }

    #[test]
    fn all_validators_run_and_failures_aggregate() {
        let mut claims = claims_with(&[("emailVerified", json!(false))]);
        claims.recipe_user_id = "u-2".to_string();

        let validators: Vec<Box<dyn ClaimValidator>> =
            vec![Box::new(EmailVerifiedValidator), Box::new(PrimaryUserValidator)];
        match run_validators(&claims, &validators) {
            ValidatorsOutcome::Failed { failing } => {
                let ids: Vec<&str> = failing.iter().map(|f| f.id.as_str()).collect();
                assert_eq!(ids, vec!["email-verified", "primary-user"]);
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn refetch_wins_over_failure() {
        // emailVerified missing (refetch) while primary-user fails outright.
        let mut claims = claims_with(&[]);
        claims.recipe_user_id = "u-2".to_string();

        let validators: Vec<Box<dyn ClaimValidator>> =
            vec![Box::new(EmailVerifiedValidator), Box::new(PrimaryUserValidator)];
        match run_validators(&claims, &validators) {
            ValidatorsOutcome::RequiresRefetch { claim_ids } => {
                assert_eq!(claim_ids, vec!["email-verified".to_string()]);
            }
            other => panic!("expected refetch, got {other:?}"),
        }
    }

    #[test]
    fn empty_validator_list_is_ok() {
        let claims = claims_with(&[]);
        assert_eq!(run_validators(&claims, &[]), ValidatorsOutcome::Ok);
    }

    #[test]
    fn email_verified_passes_on_true_claim() {
        let claims = claims_with(&[("emailVerified", json!(true))]);
        let validators: Vec<Box<dyn ClaimValidator>> = vec![Box::new(EmailVerifiedValidator)];
        assert_eq!(run_validators(&claims, &validators), ValidatorsOutcome::Ok);
    }

    #[test]
    fn email_verified_fails_on_non_boolean_claim() {
        let claims = claims_with(&[("emailVerified", json!("yes"))]);
        let check = EmailVerifiedValidator.validate(&claims);
        assert!(!check.is_valid);
        assert!(!EmailVerifiedValidator.should_refetch(&claims));
    }
}
