//! OIDC provider discovery
//!
//! Fetches provider metadata from `/.well-known/openid-configuration` and
//! checks it describes the issuer that was asked for.

use super::pkce::CODE_CHALLENGE_METHOD;
use crate::error::{PkceLoginError, Result};
use serde::{Deserialize, Serialize};
use url::Url;

const WELL_KNOWN_PATH: &str = ".well-known/openid-configuration";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationServerMetadata {
    pub issuer: String,
    #[serde(default)]
    pub authorization_endpoint: Option<String>,
    #[serde(default)]
    pub token_endpoint: Option<String>,
    #[serde(default)]
    pub userinfo_endpoint: Option<String>,
    #[serde(default)]
    pub jwks_uri: Option<String>,
    #[serde(default)]
    pub end_session_endpoint: Option<String>,
    #[serde(default)]
    pub scopes_supported: Option<Vec<String>>,
    #[serde(default)]
    pub response_types_supported: Option<Vec<String>>,
    #[serde(default)]
    pub code_challenge_methods_supported: Option<Vec<String>>,
    #[serde(default)]
    pub id_token_signing_alg_values_supported: Option<Vec<String>>,
    #[serde(default)]
    pub token_endpoint_auth_methods_supported: Option<Vec<String>>,
    #[serde(default)]
    pub authorization_response_iss_parameter_supported: Option<bool>,
}

impl AuthorizationServerMetadata {
    /// Whether the provider advertises S256, `None` when it says nothing
    pub fn supports_s256(&self) -> Option<bool> {
        self.code_challenge_methods_supported
            .as_ref()
            .map(|methods| methods.iter().any(|m| m == CODE_CHALLENGE_METHOD))
    }

    /// Whether the provider requires an `iss` parameter on authorization responses
    pub fn requires_iss_parameter(&self) -> bool {
        self.authorization_response_iss_parameter_supported
            .unwrap_or(false)
    }
}

/// Build the discovery URL for an issuer
///
/// The well-known suffix is appended to the issuer path, so
/// `https://idp.example/realms/main` maps to
/// `https://idp.example/realms/main/.well-known/openid-configuration`.
pub fn discovery_url(issuer: &Url) -> Result<Url> {
    let mut url = issuer.clone();
    url.set_query(None);
    url.set_fragment(None);

    let path = format!("{}/{}", issuer.path().trim_end_matches('/'), WELL_KNOWN_PATH);
    url.set_path(&path);

    if url.cannot_be_a_base() {
        return Err(PkceLoginError::Discovery(format!(
            "Issuer {} cannot host a discovery document",
            issuer
        )));
    }

    Ok(url)
}

/// Issuers are compared ignoring a trailing slash
pub fn same_issuer(a: &str, b: &str) -> bool {
    a.trim_end_matches('/') == b.trim_end_matches('/')
}

/// Discover the authorization server metadata for an issuer
///
/// No retries; any failure aborts the caller's attempt.
pub async fn discover(http: &reqwest::Client, issuer: &Url) -> Result<AuthorizationServerMetadata> {
    let url = discovery_url(issuer)?;
    tracing::debug!("Discovering OIDC configuration at {}", url);

    let response = http
        .get(url)
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await
        .map_err(|e| PkceLoginError::Discovery(format!("Failed to fetch OIDC configuration: {}", e)))?;

    if response.status() != reqwest::StatusCode::OK {
        return Err(PkceLoginError::Discovery(format!(
            "OIDC discovery request failed with status: {}",
            response.status()
        )));
    }

    let body: serde_json::Value = response
        .json()
        .await
        .map_err(|e| PkceLoginError::Discovery(format!("Failed to parse OIDC configuration: {}", e)))?;

    if !body.is_object() {
        return Err(PkceLoginError::Discovery(
            "OIDC configuration must be a JSON object".to_string(),
        ));
    }

    let metadata: AuthorizationServerMetadata = serde_json::from_value(body)
        .map_err(|e| PkceLoginError::Discovery(format!("Invalid OIDC configuration: {}", e)))?;

    if !same_issuer(&metadata.issuer, issuer.as_str()) {
        return Err(PkceLoginError::Discovery(format!(
            "Issuer mismatch: expected {}, got {}",
            issuer, metadata.issuer
        )));
    }

    if metadata.supports_s256() == Some(false) {
        tracing::warn!(
            "Provider {} does not advertise the {} code challenge method",
            metadata.issuer,
            CODE_CHALLENGE_METHOD
        );
    }

    Ok(metadata)
}
