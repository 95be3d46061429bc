//! PKCE Login Library
//!
//! OpenID Connect login for public clients: discovery, PKCE secrets,
//! authorization redirect and callback validation with token exchange.

pub mod cache;
pub mod config;
pub mod error;
pub mod oidc;
pub mod server;
