//! Local redirect target
//!
//! Temporary HTTP server standing in for the application's `pkce/verify`
//! route. It hands the raw query string of the provider's redirect back to
//! the flow.

use crate::error::{PkceLoginError, Result};
use crate::oidc::AppLocation;
use axum::{
    extract::RawQuery,
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use url::Host;

type QuerySender = Arc<Mutex<Option<oneshot::Sender<String>>>>;

const RECEIVED_PAGE: &str = r#"
<html>
    <head><title>Login Received</title></head>
    <body>
        <h1>Login received</h1>
        <p>You can close this window and return to your terminal.</p>
    </body>
</html>
"#;

pub struct RedirectListener {
    listener: TcpListener,
    path: String,
}

impl RedirectListener {
    /// Bind the loopback address of the application URL
    pub async fn bind(app: &AppLocation) -> Result<Self> {
        let path = routable_path(app)?;
        let addr = loopback_addr(app)?;
        let listener = TcpListener::bind(addr).await?;

        Ok(Self { listener, path })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until the first redirect arrives and return its query string
    pub async fn wait(self, timeout: Duration) -> Result<String> {
        let (tx, rx) = oneshot::channel::<String>();
        let tx: QuerySender = Arc::new(Mutex::new(Some(tx)));

        let app = Router::new().route(
            &self.path,
            get({
                let tx = tx.clone();
                move |RawQuery(query): RawQuery| async move { handle_redirect(query, tx).await }
            }),
        );

        tracing::info!(
            "Waiting for the login redirect on http://{}{}",
            self.listener.local_addr()?,
            self.path
        );

        let server = axum::serve(self.listener, app);

        tokio::select! {
            result = rx => {
                result.map_err(|_| PkceLoginError::Io(std::io::Error::other("Redirect channel closed")))
            }
            _ = tokio::time::sleep(timeout) => {
                Err(PkceLoginError::Timeout(format!(
                    "Login redirect not received after {} seconds",
                    timeout.as_secs()
                )))
            }
            server_result = server => {
                server_result?;
                Err(PkceLoginError::Io(std::io::Error::other("Redirect server stopped unexpectedly")))
            }
        }
    }
}

async fn handle_redirect(query: Option<String>, tx: QuerySender) -> impl IntoResponse {
    if let Some(sender) = tx.lock().await.take() {
        let _ = sender.send(query.unwrap_or_default());
    }
    Html(RECEIVED_PAGE)
}

/// The redirect path must be a literal axum route
///
/// Segments starting with `:` or `*` are rejected by the router.
fn routable_path(app: &AppLocation) -> Result<String> {
    let path = app.pkce_verify_path();
    if path
        .split('/')
        .any(|segment| segment.starts_with(':') || segment.starts_with('*'))
    {
        return Err(PkceLoginError::Configuration(format!(
            "Cannot serve the login redirect on path {}",
            path
        )));
    }
    Ok(path)
}

/// Only loopback application URLs can be served locally
fn loopback_addr(app: &AppLocation) -> Result<SocketAddr> {
    let base = app.base();
    let ip = match base.host() {
        Some(Host::Domain("localhost")) => IpAddr::V4(Ipv4Addr::LOCALHOST),
        Some(Host::Ipv4(ip)) if ip.is_loopback() => IpAddr::V4(ip),
        Some(Host::Ipv6(ip)) if ip.is_loopback() => IpAddr::V6(ip),
        _ => {
            return Err(PkceLoginError::Configuration(format!(
                "Cannot serve the login redirect for non-local URL {}",
                base
            )))
        }
    };
    let port = base.port_or_known_default().unwrap_or(80);

    Ok(SocketAddr::new(ip, port))
}
