//! PKCE login client
//!
//! Orchestrates the public-client authorization code flow with PKCE in two
//! halves separated by a browser round trip:
//! - [`PkceClient::login`] stores fresh secrets and returns the redirect to
//!   the provider's consent screen.
//! - [`PkceClient::callback`] consumes those secrets, validates the
//!   provider's redirect back, exchanges the code and returns the session
//!   effects.

use super::app::{AppLocation, Redirect, SessionCookie, SessionEstablished};
use super::discovery::{discover, AuthorizationServerMetadata};
use super::exchange::{authorization_code_grant, PublicClient};
use super::pkce::{generate_state, PkceParams, CODE_CHALLENGE_METHOD};
use super::response::{parse_callback_query, validate_auth_response, AuthResponse};
use super::settings::{check_settings, CheckedSettings, OidcSettings};
use super::store::{PkceSecrets, SessionStore};
use super::token::TokenEndpointResponse;
use crate::error::{PkceLoginError, Result};
use url::Url;

pub struct PkceClient<S> {
    http: reqwest::Client,
    secrets: PkceSecrets<S>,
    app: AppLocation,
}

impl<S: SessionStore> PkceClient<S> {
    pub fn new(store: S, app: AppLocation) -> Self {
        Self::with_http_client(reqwest::Client::new(), store, app)
    }

    pub fn with_http_client(http: reqwest::Client, store: S, app: AppLocation) -> Self {
        Self {
            http,
            secrets: PkceSecrets::new(store),
            app,
        }
    }

    pub fn secrets(&self) -> &PkceSecrets<S> {
        &self.secrets
    }

    pub fn app(&self) -> &AppLocation {
        &self.app
    }

    /// Redirect URI the provider sends the browser back to
    pub fn redirect_uri(&self) -> Result<Url> {
        self.app.pkce_redirect_uri()
    }

    /// Check settings, then discover the provider
    async fn discover_provider<'a>(
        &self,
        settings: Option<&'a OidcSettings>,
    ) -> Result<(CheckedSettings<'a>, AuthorizationServerMetadata)> {
        let checked = check_settings(settings)?;
        let metadata = discover(&self.http, &checked.issuer).await?;
        Ok((checked, metadata))
    }

    /// Start a login attempt
    ///
    /// Overwrites the secrets of any attempt still outstanding in the same store.
    pub async fn login(&self, settings: Option<&OidcSettings>, redirect_uri: &str) -> Result<Redirect> {
        let (checked, metadata) = self.discover_provider(settings).await?;

        let authorization_endpoint = metadata.authorization_endpoint.as_deref().ok_or_else(|| {
            PkceLoginError::Configuration("No Authorization Server endpoint found".to_string())
        })?;

        let state = generate_state();
        let pkce = PkceParams::generate();

        let url = build_authorization_url(
            authorization_endpoint,
            checked.settings,
            redirect_uri,
            &pkce.code_challenge,
            &state,
        )?;

        self.secrets.set_code_verifier(&pkce.code_verifier);
        self.secrets.set_state(&state);

        tracing::info!("Redirecting to authorization endpoint {}", authorization_endpoint);
        Ok(Redirect::replace(url))
    }

    /// Complete a login attempt from the provider's redirect back
    ///
    /// The stored secrets are cleared on entry, so each attempt can be
    /// completed at most once.
    pub async fn callback(
        &self,
        query: &str,
        settings: Option<&OidcSettings>,
        redirect_uri: &str,
    ) -> Result<SessionEstablished> {
        let stored = self.secrets.take();

        let code_verifier = stored.code_verifier.ok_or_else(|| {
            PkceLoginError::SessionState("No code verifier found in session".to_string())
        })?;

        let params = parse_callback_query(query)?;

        if params.non_empty("code").is_none() {
            return Err(PkceLoginError::QueryParse(
                "No code in query parameters".to_string(),
            ));
        }

        let (checked, metadata) = self.discover_provider(settings).await?;
        let client = PublicClient::new(checked.settings.client_id.clone());

        let code = match validate_auth_response(&metadata, &params, stored.state.as_deref())? {
            AuthResponse::Code(code) => code,
            AuthResponse::Error(error) => {
                tracing::warn!("Provider returned {} on the authorization response", error.error);
                return Err(PkceLoginError::Validation(format!(
                    "Error validating auth response: {}",
                    error.description()
                )));
            }
        };

        let reply = authorization_code_grant(
            &self.http,
            &metadata,
            &client,
            &code,
            redirect_uri,
            &code_verifier,
        )
        .await?;

        if reply.challenges().is_some_and(|c| !c.is_empty()) {
            return Err(PkceLoginError::Challenge(
                "Error parsing authentication challenge".to_string(),
            ));
        }

        let tokens = match reply.into_response()? {
            TokenEndpointResponse::Success(tokens) => tokens,
            TokenEndpointResponse::Error(error) => {
                return Err(PkceLoginError::TokenExchange(format!(
                    "Error getting token {}",
                    error.description()
                )));
            }
        };

        let id_token = tokens
            .id_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| PkceLoginError::TokenExchange("No token in response".to_string()))?;

        tracing::info!("Login completed for client {}", client.client_id);

        Ok(SessionEstablished {
            cookie: SessionCookie::for_token(&self.app, id_token),
            redirect: Redirect::replace(self.app.landing()?),
        })
    }
}

/// Build the authorization request URL
pub fn build_authorization_url(
    authorization_endpoint: &str,
    settings: &OidcSettings,
    redirect_uri: &str,
    code_challenge: &str,
    state: &str,
) -> Result<Url> {
    let mut url = Url::parse(authorization_endpoint).map_err(|e| {
        PkceLoginError::Configuration(format!(
            "Invalid authorization endpoint {}: {}",
            authorization_endpoint, e
        ))
    })?;

    url.query_pairs_mut()
        .append_pair("client_id", &settings.client_id)
        .append_pair("code_challenge", code_challenge)
        .append_pair("code_challenge_method", CODE_CHALLENGE_METHOD)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("scope", &settings.scope_param())
        .append_pair("state", state);

    Ok(url)
}
