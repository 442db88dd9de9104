// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP+JSON client for the authorization core.
//!
//! All state-changing session operations and key fetches go through here.
//! The core's typed verdicts (refresh OK / theft / unauthorised) travel in
//! 200-status bodies; transport and non-2xx failures become [`CoreError`].

use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use super::{CoreDriver, CoreError, NewSessionRequest, RefreshOutcome, SessionRecord, SigningKeySet};
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::keys::KeyKind;

const STATUS_OK: &str = "OK";
const STATUS_THEFT: &str = "TOKEN_THEFT_DETECTED";
const STATUS_UNAUTHORISED: &str = "UNAUTHORISED";

/// HTTP client for the authorization core's versioned API.
#[derive(Debug, Clone)]
pub struct RemoteCoreClient {
    base_url: String,
    api_key: Option<String>,
    http: Client,
}

impl RemoteCoreClient {
    /// Build a client from engine configuration.
    pub fn from_config(config: &SessionConfig) -> Result<Self, SessionError> {
        let http = Client::builder()
            .timeout(config.core_timeout)
            .build()
            .map_err(|e| SessionError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.core_base_url.trim_end_matches('/').to_string(),
            api_key: config.core_api_key.clone(),
            http,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .header("Content-Type", "application/json");
        if let Some(api_key) = &self.api_key {
            builder = builder.header("Api-Key", api_key);
        }
        builder
    }

    async fn get_json(&self, path: &str) -> Result<Value, CoreError> {
        let response = self
            .request(reqwest::Method::GET, path)
            .send()
            .await
            .map_err(|e| CoreError::Request(format!("GET {path} failed: {e}")))?;
        read_json(path, response).await
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, CoreError> {
        let response = self
            .request(reqwest::Method::POST, path)
            .json(body)
            .send()
            .await
            .map_err(|e| CoreError::Request(format!("POST {path} failed: {e}")))?;
        read_json(path, response).await
    }

    async fn put_json(&self, path: &str, body: &Value) -> Result<Value, CoreError> {
        let response = self
            .request(reqwest::Method::PUT, path)
            .json(body)
            .send()
            .await
            .map_err(|e| CoreError::Request(format!("PUT {path} failed: {e}")))?;
        read_json(path, response).await
    }
}

async fn read_json(path: &str, response: reqwest::Response) -> Result<Value, CoreError> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(CoreError::Request(format!(
            "{path} returned {status}: {body}"
        )));
    }
    response
        .json()
        .await
        .map_err(|e| CoreError::InvalidResponse(format!("{path} invalid JSON: {e}")))
}

#[async_trait::async_trait]
impl CoreDriver for RemoteCoreClient {
    async fn create_session(&self, request: NewSessionRequest) -> Result<SessionRecord, CoreError> {
        let body = json!({
            "userId": request.user_id,
            "recipeUserId": request.recipe_user_id,
            "tenantId": request.tenant_id,
            "initialClaims": request.initial_claims,
        });
        let response = self.post_json("/v1/recipe/session", &body).await?;
        expect_status(&response, STATUS_OK)?;
        session_from_response(&response)
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<RefreshOutcome, CoreError> {
        let body = json!({ "refreshToken": refresh_token });
        let response = self.post_json("/v1/recipe/session/refresh", &body).await?;
        parse_refresh_outcome(&response)
    }

    async fn get_signing_keys(&self, kind: KeyKind) -> Result<SigningKeySet, CoreError> {
        let response = self
            .get_json(&format!("/v1/recipe/signing-keys?kind={}", kind.as_str()))
            .await?;
        let set: SigningKeySet = serde_json::from_value(response)
            .map_err(|e| CoreError::InvalidResponse(format!("signing key set: {e}")))?;
        debug!(kind = kind.as_str(), count = set.keys.len(), "fetched signing keys");
        Ok(set)
    }

    async fn revoke_session(&self, session_handle: &str) -> Result<(), CoreError> {
        let body = json!({ "sessionHandles": [session_handle] });
        let response = self.post_json("/v1/recipe/session/remove", &body).await?;
        expect_status(&response, STATUS_OK)?;
        Ok(())
    }

    async fn revoke_all_for_user(&self, user_id: &str) -> Result<Vec<String>, CoreError> {
        let body = json!({ "userId": user_id });
        let response = self.post_json("/v1/recipe/session/remove", &body).await?;
        expect_status(&response, STATUS_OK)?;
        string_list(&response, "sessionHandlesRevoked")
    }

    async fn update_session_claims(
        &self,
        session_handle: &str,
        claims: &serde_json::Map<String, Value>,
    ) -> Result<SessionRecord, CoreError> {
        let body = json!({ "sessionHandle": session_handle, "claims": claims });
        let response = self.put_json("/v1/recipe/session/claims", &body).await?;
        expect_status(&response, STATUS_OK)?;
        session_from_response(&response)
    }

    async fn get_session(
        &self,
        session_handle: &str,
    ) -> Result<Option<SessionRecord>, CoreError> {
        let response = self
            .get_json(&format!("/v1/recipe/session?sessionHandle={session_handle}"))
            .await?;
        match parse_status(&response)? {
            STATUS_OK => session_from_response(&response).map(Some),
            STATUS_UNAUTHORISED => Ok(None),
            other => Err(CoreError::InvalidResponse(format!(
                "unexpected status '{other}'"
            ))),
        }
    }

    async fn get_session_handles_for_user(&self, user_id: &str) -> Result<Vec<String>, CoreError> {
        let response = self
            .get_json(&format!("/v1/recipe/session/user?userId={user_id}"))
            .await?;
        expect_status(&response, STATUS_OK)?;
        string_list(&response, "sessionHandles")
    }
}

fn parse_status(response: &Value) -> Result<&str, CoreError> {
    response
        .get("status")
        .and_then(Value::as_str)
        .ok_or_else(|| CoreError::InvalidResponse("missing status field".to_string()))
}

fn expect_status(response: &Value, expected: &str) -> Result<(), CoreError> {
    let status = parse_status(response)?;
    if status != expected {
        return Err(CoreError::InvalidResponse(format!(
            "expected status '{expected}', got '{status}'"
        )));
    }
    Ok(())
}

fn session_from_response(response: &Value) -> Result<SessionRecord, CoreError> {
    let session = response
        .get("session")
        .cloned()
        .ok_or_else(|| CoreError::InvalidResponse("missing session object".to_string()))?;
    serde_json::from_value(session)
        .map_err(|e| CoreError::InvalidResponse(format!("session record: {e}")))
}

fn string_list(response: &Value, field: &str) -> Result<Vec<String>, CoreError> {
    let values = response
        .get(field)
        .and_then(Value::as_array)
        .ok_or_else(|| CoreError::InvalidResponse(format!("missing {field} array")))?;
    Ok(values
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect())
}

/// Interpret a refresh response body as the core's typed verdict.
fn parse_refresh_outcome(response: &Value) -> Result<RefreshOutcome, CoreError> {
    match parse_status(response)? {
        STATUS_OK => session_from_response(response).map(RefreshOutcome::Rotated),
        STATUS_THEFT => {
            let session_handle = response
                .pointer("/session/sessionHandle")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    CoreError::InvalidResponse("theft response missing session handle".to_string())
                })?;
            let user_id = response
                .pointer("/session/userId")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    CoreError::InvalidResponse("theft response missing user id".to_string())
                })?;
            Ok(RefreshOutcome::Theft {
                session_handle: session_handle.to_string(),
                user_id: user_id.to_string(),
            })
        }
        STATUS_UNAUTHORISED => Ok(RefreshOutcome::Invalid),
        other => Err(CoreError::InvalidResponse(format!(
            "unexpected refresh status '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn refresh_outcome_parses_rotation() {
        let response = json!({
            "status": "OK",
            "session": {
                "sessionHandle": "h-1",
                "userId": "u-1",
                "recipeUserId": "u-1",
                "tenantId": "public",
                "refreshToken": "rt-2",
                "expiresAt": 2000,
                "timeCreated": 1000
            }
        });
        match parse_refresh_outcome(&response).unwrap() {
            RefreshOutcome::Rotated(record) => {
                assert_eq!(record.refresh_token, "rt-2");
            }
            other => panic!("expected rotation, got {other:?}"),
        }
    }

    #[test]
    fn refresh_outcome_parses_theft() {
        let response = json!({
            "status": "TOKEN_THEFT_DETECTED",
            "session": { "sessionHandle": "h-1", "userId": "u-1" }
        });
        match parse_refresh_outcome(&response).unwrap() {
            RefreshOutcome::Theft {
                session_handle,
                user_id,
            } => {
                assert_eq!(session_handle, "h-1");
                assert_eq!(user_id, "u-1");
            }
            other => panic!("expected theft, got {other:?}"),
        }
    }

    #[test]
    fn refresh_outcome_parses_unauthorised() {
        let response = json!({ "status": "UNAUTHORISED" });
        assert!(matches!(
            parse_refresh_outcome(&response).unwrap(),
            RefreshOutcome::Invalid
        ));
    }

    #[test]
    fn refresh_outcome_rejects_unknown_status() {
        let response = json!({ "status": "SOMETHING_ELSE" });
        assert!(matches!(
            parse_refresh_outcome(&response),
            Err(CoreError::InvalidResponse(_))
        ));
    }

    #[test]
    fn missing_status_is_invalid_response() {
        assert!(matches!(
            parse_status(&json!({})),
            Err(CoreError::InvalidResponse(_))
        ));
    }

    #[test]
    fn string_list_ignores_non_string_entries() {
        let response = json!({ "sessionHandles": ["h-1", 42, "h-2"] });
        let handles = string_list(&response, "sessionHandles").unwrap();
        assert_eq!(handles, vec!["h-1".to_string(), "h-2".to_string()]);
    }

    #[test]
    fn client_construction_respects_config() {
        let config = SessionConfig::new("https://core.internal:3567/").with_api_key("k");
        let client = RemoteCoreClient::from_config(&config).unwrap();
        assert_eq!(client.base_url, "https://core.internal:3567");
        assert_eq!(client.api_key.as_deref(), Some("k"));
    }
}
