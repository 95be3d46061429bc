//! Token endpoint responses
//!
//! The token endpoint answers with either a token set or an OAuth 2.0 error
//! object. The two shapes are told apart by the `error` member before either
//! is deserialized.

use crate::error::{PkceLoginError, Result};
use serde::{Deserialize, Serialize};

/// OAuth 2.0 error object (RFC 6749 section 5.2)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_uri: Option<String>,
}

impl OAuthErrorResponse {
    /// Human-readable description, falling back to the error code
    pub fn description(&self) -> &str {
        self.error_description.as_deref().unwrap_or(&self.error)
    }
}

/// Successful token response of an OpenID authorization code exchange
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenEndpointResponse {
    Success(TokenSet),
    Error(OAuthErrorResponse),
}

/// Whether a JSON document is shaped as an OAuth 2.0 error
pub fn is_oauth_error(body: &serde_json::Value) -> bool {
    body.get("error").is_some_and(|e| e.is_string())
}

impl TokenEndpointResponse {
    /// Classify a token endpoint response body
    ///
    /// An error-shaped body is accepted on any status. A success-shaped body
    /// is only accepted on a 2xx status.
    pub fn from_http(status: http::StatusCode, body: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(body).map_err(|e| {
            PkceLoginError::TokenExchange(format!("Token response is not valid JSON: {}", e))
        })?;

        if !value.is_object() {
            return Err(PkceLoginError::TokenExchange(
                "Token response must be a JSON object".to_string(),
            ));
        }

        if is_oauth_error(&value) {
            let error = serde_json::from_value(value).map_err(|e| {
                PkceLoginError::TokenExchange(format!("Invalid error response: {}", e))
            })?;
            return Ok(TokenEndpointResponse::Error(error));
        }

        if !status.is_success() {
            return Err(PkceLoginError::TokenExchange(format!(
                "Token exchange failed with status: {}",
                status
            )));
        }

        let tokens = serde_json::from_value(value)
            .map_err(|e| PkceLoginError::TokenExchange(format!("Invalid token response: {}", e)))?;
        Ok(TokenEndpointResponse::Success(tokens))
    }
}
