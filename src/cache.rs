//! Session cache
//!
//! Keeps the session cookie established by a login on disk, one file per
//! application, so `status` and later logins can read it and `logout` can
//! forget it.

use crate::error::{PkceLoginError, Result};
use crate::oidc::{AppLocation, SessionCookie};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A session persisted after a successful login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedSession {
    pub app_url: String,
    pub cookie: SessionCookie,
    pub logged_in_at: DateTime<Utc>,
}

impl CachedSession {
    pub fn new(app: &AppLocation, cookie: SessionCookie) -> Self {
        Self {
            app_url: app.base().to_string(),
            cookie,
            logged_in_at: Utc::now(),
        }
    }
}

pub struct SessionCache {
    dir: PathBuf,
}

impl SessionCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Default cache directory (cross-platform)
    ///
    /// Returns: ~/.config/pkce-login/sessions/ on Linux/macOS
    ///          %USERPROFILE%\.config\pkce-login\sessions\ on Windows
    pub fn default_dir() -> Result<PathBuf> {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| {
                PkceLoginError::Configuration("Cannot determine home directory".to_string())
            })?;

        Ok(PathBuf::from(home)
            .join(".config")
            .join("pkce-login")
            .join("sessions"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Sanitize an application URL for use as a file name
    ///
    /// Example: https://app.example:8443/argo-cd/
    ///          -> app.example_8443_argo-cd
    fn sanitize_app_url(app_url: &str) -> String {
        app_url
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/')
            .replace(['/', ':'], "_")
    }

    fn session_file(&self, app: &AppLocation) -> PathBuf {
        let name = Self::sanitize_app_url(app.base().as_str());
        self.dir.join(format!("{}_session.json", name))
    }

    pub fn save(&self, session: &CachedSession, app: &AppLocation) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;

        let path = self.session_file(app);
        let json = serde_json::to_string_pretty(session)?;
        std::fs::write(&path, json)?;

        tracing::debug!("Session saved to {:?}", path);
        Ok(path)
    }

    pub fn load(&self, app: &AppLocation) -> Result<Option<CachedSession>> {
        let path = self.session_file(app);

        if !path.exists() {
            tracing::debug!("No cached session found at {:?}", path);
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    /// Forget the session for an application
    pub fn delete(&self, app: &AppLocation) -> Result<()> {
        let path = self.session_file(app);

        if !path.exists() {
            return Err(PkceLoginError::SessionState(
                "Nothing to logout from".to_string(),
            ));
        }

        std::fs::remove_file(&path)?;
        tracing::debug!("Session deleted from {:?}", path);
        Ok(())
    }
}
