//! Application location and the browser effects the flow produces
//!
//! The flow never navigates or writes cookies itself. It returns a
//! [`Redirect`] or a [`SessionEstablished`] and the host applies them.

use crate::error::{PkceLoginError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Name of the cookie carrying the identity token
pub const TOKEN_COOKIE_NAME: &str = "argocd.token";

const PKCE_VERIFY_PATH: &str = "pkce/verify";
const LANDING_PATH: &str = "applications";

/// Where the application is deployed, including its base path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppLocation {
    base: Url,
}

impl AppLocation {
    pub fn parse(app_url: &str) -> Result<Self> {
        let url = Url::parse(app_url).map_err(|e| {
            PkceLoginError::Configuration(format!("Invalid application URL {}: {}", app_url, e))
        })?;
        Self::new(url)
    }

    pub fn new(mut base: Url) -> Result<Self> {
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(PkceLoginError::Configuration(format!(
                "Application URL must be http(s): {}",
                base
            )));
        }

        base.set_query(None);
        base.set_fragment(None);
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self { base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Resolve an application path against the base path
    pub fn abs_url(&self, path: &str) -> Result<Url> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| PkceLoginError::Configuration(format!("Invalid path {}: {}", path, e)))
    }

    /// Redirect URI registered with the identity provider
    pub fn pkce_redirect_uri(&self) -> Result<Url> {
        self.abs_url(PKCE_VERIFY_PATH)
    }

    /// Default authenticated view
    pub fn landing(&self) -> Result<Url> {
        self.abs_url(LANDING_PATH)
    }

    /// Cookie path: the base path with surrounding slashes normalized
    pub fn cookie_path(&self) -> String {
        format!("/{}", self.base.path().trim_matches('/'))
    }

    /// Host-local path the provider redirects back to
    pub fn pkce_verify_path(&self) -> String {
        format!("{}{}", self.base.path(), PKCE_VERIFY_PATH)
    }
}

/// Replace the current location; no history entry is kept
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "the redirect has no effect until the host navigates to it"]
pub struct Redirect {
    pub location: Url,
}

impl Redirect {
    pub fn replace(location: Url) -> Self {
        Self { location }
    }
}

impl fmt::Display for Redirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.location.as_str())
    }
}

/// Cookie that establishes the authenticated session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub path: String,
}

impl SessionCookie {
    pub fn for_token(app: &AppLocation, id_token: String) -> Self {
        Self {
            name: TOKEN_COOKIE_NAME.to_string(),
            value: id_token,
            path: app.cookie_path(),
        }
    }
}

impl fmt::Display for SessionCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}; path={}", self.name, self.value, self.path)
    }
}

/// Effects of a completed callback: write the cookie, then navigate
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "the session is not established until the host applies these effects"]
pub struct SessionEstablished {
    pub cookie: SessionCookie,
    pub redirect: Redirect,
}

impl SessionEstablished {
    pub fn id_token(&self) -> &str {
        &self.cookie.value
    }
}
