//! Error types for the PKCE login flow

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PkceLoginError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("OIDC discovery failed: {0}")]
    Discovery(String),

    #[error("Session state error: {0}")]
    SessionState(String),

    #[error("Query parse error: {0}")]
    QueryParse(String),

    #[error("Auth response validation failed: {0}")]
    Validation(String),

    #[error("Authentication challenge: {0}")]
    Challenge(String),

    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PkceLoginError {
    /// Short classification used in logs and by UI layers
    pub fn kind(&self) -> &'static str {
        match self {
            PkceLoginError::Configuration(_) => "configuration",
            PkceLoginError::Discovery(_) => "discovery",
            PkceLoginError::SessionState(_) => "session_state",
            PkceLoginError::QueryParse(_) => "query_parse",
            PkceLoginError::Validation(_) => "validation",
            PkceLoginError::Challenge(_) => "challenge",
            PkceLoginError::TokenExchange(_) => "token_exchange",
            PkceLoginError::Timeout(_) => "timeout",
            PkceLoginError::Io(_) => "io",
            PkceLoginError::Json(_) => "json",
        }
    }
}

pub type Result<T> = std::result::Result<T, PkceLoginError>;
