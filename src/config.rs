//! Configuration parsing and validation

use crate::error::{PkceLoginError, Result};
use crate::oidc::OidcSettings;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const DEFAULT_SCOPES: &str = "openid profile email";
const DEFAULT_APP_URL: &str = "http://localhost:8085/";
const DEFAULT_TIMEOUT_SECS: u64 = 300;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "pkce-login",
    version,
    about = "OpenID Connect login with PKCE",
    long_about = "Logs in to an application through its OpenID Connect provider using the authorization code flow with PKCE, without a client secret"
)]
pub struct Config {
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding cached sessions (default: ~/.config/pkce-login/sessions)
    #[arg(long, global = true, env = "PKCE_LOGIN_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Show only error messages
    #[arg(long, global = true, conflicts_with = "debug")]
    pub silent: bool,

    /// Enable debug logging
    #[arg(long, global = true, env = "PKCE_LOGIN_DEBUG")]
    pub debug: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Log in through the OIDC provider and cache the session
    Login(LoginArgs),

    /// Forget the cached session of an application
    Logout(LogoutArgs),

    /// Show the cached session of an application
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct LoginArgs {
    /// Application URL the provider redirects back to
    #[arg(long, env = "PKCE_APP_URL", default_value = DEFAULT_APP_URL)]
    pub app_url: String,

    /// OIDC issuer URL (e.g., https://auth.example.com); fetched from the settings URL when omitted
    #[arg(long, env = "OIDC_ISSUER_URL")]
    pub issuer: Option<String>,

    /// OAuth client ID
    #[arg(long, env = "OIDC_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Space-separated OAuth scopes (default: "openid profile email")
    #[arg(long, env = "OIDC_SCOPES")]
    pub scopes: Option<String>,

    /// Application whose api/v1/settings document supplies the OIDC settings
    #[arg(long, env = "PKCE_SETTINGS_URL")]
    pub settings_url: Option<String>,

    /// Print the authorization URL instead of opening a browser
    #[arg(long)]
    pub no_browser: bool,

    /// Seconds to wait for the provider to redirect back
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,
}

#[derive(Args, Debug, Clone)]
pub struct LogoutArgs {
    /// Application URL used at login
    #[arg(value_name = "APP_URL", default_value = DEFAULT_APP_URL)]
    pub app_url: String,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    /// Application URL used at login
    #[arg(value_name = "APP_URL", default_value = DEFAULT_APP_URL)]
    pub app_url: String,
}

impl Config {
    /// Parse configuration from CLI arguments and environment variables
    pub fn parse_args() -> Self {
        Config::parse()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        match &self.command {
            Command::Login(args) => args.validate(),
            Command::Logout(LogoutArgs { app_url }) | Command::Status(StatusArgs { app_url }) => {
                url::Url::parse(app_url).map_err(|e| {
                    PkceLoginError::Configuration(format!("Invalid application URL: {}", e))
                })?;
                Ok(())
            }
        }
    }

    /// Get log level based on flags
    pub fn log_level(&self) -> tracing::Level {
        if self.silent {
            tracing::Level::ERROR
        } else if self.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

impl LoginArgs {
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.app_url)
            .map_err(|e| PkceLoginError::Configuration(format!("Invalid application URL: {}", e)))?;

        if let Some(ref settings_url) = self.settings_url {
            url::Url::parse(settings_url)
                .map_err(|e| PkceLoginError::Configuration(format!("Invalid settings URL: {}", e)))?;
        }

        if self.issuer.is_none() && self.settings_url.is_none() {
            return Err(PkceLoginError::Configuration(
                "Either --issuer or --settings-url is required".to_string(),
            ));
        }

        if self.issuer.is_some() && self.client_id.as_deref().map_or(true, str::is_empty) {
            return Err(PkceLoginError::Configuration(
                "OIDC client ID is required".to_string(),
            ));
        }

        Ok(())
    }

    /// Get OAuth scopes as a list (with defaults)
    pub fn scopes(&self) -> Vec<String> {
        let scopes_str = self.scopes.as_deref().unwrap_or(DEFAULT_SCOPES);

        let mut scopes: Vec<String> = scopes_str.split_whitespace().map(String::from).collect();

        // Ensure "openid" scope is always included
        if !scopes.iter().any(|s| s == "openid") {
            scopes.insert(0, "openid".to_string());
        }

        scopes
    }

    /// OIDC settings given on the command line, if an issuer was given
    pub fn oidc_settings(&self) -> Option<OidcSettings> {
        self.issuer.as_ref().map(|issuer| {
            OidcSettings::new(
                issuer.clone(),
                self.client_id.clone().unwrap_or_default(),
                self.scopes(),
            )
        })
    }
}
