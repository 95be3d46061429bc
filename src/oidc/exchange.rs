//! Authorization code exchange for public clients

use super::challenge::{parse_www_authenticate_challenges, Challenge};
use super::discovery::AuthorizationServerMetadata;
use super::token::TokenEndpointResponse;
use crate::error::{PkceLoginError, Result};

/// Client authentication method of a public client
pub const AUTH_METHOD_NONE: &str = "none";

/// A client without a secret
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicClient {
    pub client_id: String,
    pub token_endpoint_auth_method: &'static str,
}

impl PublicClient {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            token_endpoint_auth_method: AUTH_METHOD_NONE,
        }
    }
}

/// Raw token endpoint reply, kept whole so headers can be checked before the body
#[derive(Debug, Clone)]
pub struct TokenEndpointReply {
    pub status: http::StatusCode,
    pub headers: http::HeaderMap,
    pub body: String,
}

impl TokenEndpointReply {
    pub fn challenges(&self) -> Option<Vec<Challenge>> {
        parse_www_authenticate_challenges(&self.headers)
    }

    pub fn into_response(self) -> Result<TokenEndpointResponse> {
        TokenEndpointResponse::from_http(self.status, &self.body)
    }
}

/// POST the authorization code grant to the token endpoint
///
/// The client id travels in the form body; no client authentication is sent.
pub async fn authorization_code_grant(
    http: &reqwest::Client,
    metadata: &AuthorizationServerMetadata,
    client: &PublicClient,
    code: &str,
    redirect_uri: &str,
    code_verifier: &str,
) -> Result<TokenEndpointReply> {
    let token_endpoint = metadata.token_endpoint.as_deref().ok_or_else(|| {
        PkceLoginError::Configuration("No token endpoint found".to_string())
    })?;

    let params = [
        ("client_id", client.client_id.as_str()),
        ("code", code),
        ("code_verifier", code_verifier),
        ("grant_type", "authorization_code"),
        ("redirect_uri", redirect_uri),
    ];

    tracing::debug!("Exchanging authorization code at {}", token_endpoint);

    let response = http
        .post(token_endpoint)
        .header(reqwest::header::ACCEPT, "application/json")
        .form(&params)
        .send()
        .await
        .map_err(|e| PkceLoginError::TokenExchange(format!("Token request failed: {}", e)))?;

    let status = response.status();
    let headers = response.headers().clone();
    let body = response
        .text()
        .await
        .map_err(|e| PkceLoginError::TokenExchange(format!("Failed to read token response: {}", e)))?;

    tracing::debug!("Token endpoint responded with status {}", status);

    Ok(TokenEndpointReply {
        status,
        headers,
        body,
    })
}
