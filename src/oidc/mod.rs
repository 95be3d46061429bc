//! OpenID Connect authorization code flow with PKCE

pub mod app;
pub mod challenge;
pub mod client;
pub mod discovery;
pub mod exchange;
pub mod pkce;
pub mod response;
pub mod settings;
pub mod store;
pub mod token;

pub use app::{AppLocation, Redirect, SessionCookie, SessionEstablished};
pub use client::PkceClient;
pub use discovery::AuthorizationServerMetadata;
pub use settings::{AuthSettings, OidcSettings};
pub use store::{MemorySessionStore, PkceSecrets, SessionStore};
pub use token::{OAuthErrorResponse, TokenEndpointResponse, TokenSet};
