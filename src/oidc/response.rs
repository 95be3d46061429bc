//! Authorization response handling
//!
//! Parses the query string the provider redirects back with and validates it
//! against the discovered metadata and the state stored at login.

use super::discovery::{same_issuer, AuthorizationServerMetadata};
use super::token::OAuthErrorResponse;
use crate::error::{PkceLoginError, Result};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Parameters that must not repeat (RFC 6749 section 3.1)
const SINGLE_VALUED: &[&str] = &["code", "state", "iss", "error", "error_description", "error_uri"];

/// Parsed callback query parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    params: BTreeMap<String, String>,
}

impl CallbackParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Value of `name` unless it is missing or empty
    pub fn non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|v| !v.is_empty())
    }

    fn oauth_error(&self) -> Option<OAuthErrorResponse> {
        self.get("error").map(|error| OAuthErrorResponse {
            error: error.to_string(),
            error_description: self.get("error_description").map(str::to_string),
            error_uri: self.get("error_uri").map(str::to_string),
        })
    }
}

/// Parse a callback query string, with or without its leading `?`
pub fn parse_callback_query(query: &str) -> Result<CallbackParams> {
    let query = query.strip_prefix('?').unwrap_or(query);
    let mut params = BTreeMap::new();

    for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
        let name = name.into_owned();
        if params.contains_key(&name) {
            if SINGLE_VALUED.contains(&name.as_str()) {
                tracing::debug!("Callback parameter {} appears more than once", name);
                return Err(PkceLoginError::QueryParse(
                    "Invalid query parameters".to_string(),
                ));
            }
            continue;
        }
        params.insert(name, value.into_owned());
    }

    Ok(CallbackParams { params })
}

/// Outcome of a well-formed authorization response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthResponse {
    Code(String),
    Error(OAuthErrorResponse),
}

/// Validate an authorization response
///
/// Checks run in order: `iss`, `state`, provider error, `code`.
pub fn validate_auth_response(
    metadata: &AuthorizationServerMetadata,
    params: &CallbackParams,
    expected_state: Option<&str>,
) -> Result<AuthResponse> {
    match params.get("iss") {
        Some(iss) if !same_issuer(iss, &metadata.issuer) => {
            return Err(invalid("unexpected iss parameter"));
        }
        None if metadata.requires_iss_parameter() => {
            return Err(invalid("missing iss parameter"));
        }
        _ => {}
    }

    match (expected_state, params.get("state")) {
        (Some(expected), Some(actual)) if states_match(expected, actual) => {}
        (Some(_), Some(_)) => return Err(invalid("state mismatch")),
        (Some(_), None) => return Err(invalid("missing state parameter")),
        (None, Some(_)) => return Err(invalid("unexpected state parameter")),
        (None, None) => {}
    }

    if let Some(error) = params.oauth_error() {
        return Ok(AuthResponse::Error(error));
    }

    params
        .non_empty("code")
        .map(|code| AuthResponse::Code(code.to_string()))
        .ok_or_else(|| invalid("missing code parameter"))
}

fn invalid(detail: &str) -> PkceLoginError {
    PkceLoginError::Validation(format!("Error validating auth response: {}", detail))
}

/// Compare fixed-length digests so timing does not depend on where the inputs differ
fn states_match(expected: &str, actual: &str) -> bool {
    let expected = Sha256::digest(expected.as_bytes());
    let actual = Sha256::digest(actual.as_bytes());
    expected
        .iter()
        .zip(actual.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
