//! OIDC client settings
//!
//! Settings are supplied by the application, either directly or from its
//! `api/v1/settings` document.

use super::app::AppLocation;
use crate::error::{PkceLoginError, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// OIDC settings for one public client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OidcSettings {
    pub issuer: String,
    #[serde(rename = "clientID", default)]
    pub client_id: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl OidcSettings {
    pub fn new(issuer: impl Into<String>, client_id: impl Into<String>, scopes: Vec<String>) -> Self {
        Self {
            issuer: issuer.into(),
            client_id: client_id.into(),
            scopes,
        }
    }

    /// Scopes as sent in the authorization request
    pub fn scope_param(&self) -> String {
        self.scopes.join(" ")
    }
}

/// Authentication section of the application settings document
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSettings {
    #[serde(default)]
    pub oidc_config: Option<OidcSettings>,
}

/// Settings that passed the checks every flow step relies on
#[derive(Debug, Clone)]
pub struct CheckedSettings<'a> {
    pub issuer: Url,
    pub settings: &'a OidcSettings,
}

/// Check settings before any network call
///
/// Order: missing settings, then issuer URL, then client id.
pub fn check_settings(settings: Option<&OidcSettings>) -> Result<CheckedSettings<'_>> {
    let settings = settings
        .ok_or_else(|| PkceLoginError::Configuration("No OIDC Config found".to_string()))?;

    let issuer = Url::parse(&settings.issuer).map_err(|_| {
        PkceLoginError::Configuration(format!("Invalid oidc issuer {}", settings.issuer))
    })?;

    if settings.client_id.is_empty() {
        return Err(PkceLoginError::Configuration(
            "No OIDC Client Id found".to_string(),
        ));
    }

    Ok(CheckedSettings { issuer, settings })
}

/// Fetch the application's auth settings
pub async fn fetch_auth_settings(http: &reqwest::Client, app: &AppLocation) -> Result<AuthSettings> {
    let settings_url = app.abs_url("api/v1/settings")?;
    tracing::debug!("Fetching auth settings from {}", settings_url);

    let response = http
        .get(settings_url.clone())
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await
        .map_err(|e| {
            PkceLoginError::Configuration(format!("Failed to fetch auth settings: {}", e))
        })?;

    if !response.status().is_success() {
        return Err(PkceLoginError::Configuration(format!(
            "Auth settings request to {} failed with status: {}",
            settings_url,
            response.status()
        )));
    }

    response
        .json()
        .await
        .map_err(|e| PkceLoginError::Configuration(format!("Failed to parse auth settings: {}", e)))
}
