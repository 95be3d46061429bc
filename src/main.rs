//! PKCE Login - Main entry point
//!
//! Runs the OpenID Connect authorization code flow with PKCE from the
//! terminal: the browser is sent to the provider, the redirect back is
//! received on a local listener, and the resulting session is cached.

use anyhow::Context;
use pkce_login::cache::{CachedSession, SessionCache};
use pkce_login::config::{Command, Config, LoginArgs, LogoutArgs, StatusArgs};
use pkce_login::oidc::settings::fetch_auth_settings;
use pkce_login::oidc::{AppLocation, MemorySessionStore, PkceClient, Redirect};
use pkce_login::server::RedirectListener;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn setup_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{}", config.log_level())));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() {
    let config = Config::parse_args();

    setup_logging(&config);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(config).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let cache_dir = match config.cache_dir {
        Some(dir) => dir,
        None => SessionCache::default_dir()?,
    };
    let cache = SessionCache::new(cache_dir);

    match config.command {
        Command::Login(args) => login(args, &cache).await,
        Command::Logout(args) => logout(args, &cache),
        Command::Status(args) => status(args, &cache),
    }
}

async fn login(args: LoginArgs, cache: &SessionCache) -> anyhow::Result<()> {
    let app = AppLocation::parse(&args.app_url)?;
    let http = reqwest::Client::new();

    if let Some(existing) = cache.load(&app)? {
        info!(
            "Replacing session for {} from {}",
            existing.app_url, existing.logged_in_at
        );
    }

    let settings = match args.oidc_settings() {
        Some(settings) => Some(settings),
        None => {
            let settings_url = args
                .settings_url
                .as_deref()
                .context("No OIDC settings source given")?;
            let settings_app = AppLocation::parse(settings_url)?;
            fetch_auth_settings(&http, &settings_app).await?.oidc_config
        }
    };

    let client = PkceClient::with_http_client(http, MemorySessionStore::new(), app.clone());
    let redirect_uri = client.redirect_uri()?.to_string();

    // Listen before the browser can possibly come back
    let listener = RedirectListener::bind(&app)
        .await
        .context("Failed to bind the login redirect listener")?;

    let redirect = client.login(settings.as_ref(), &redirect_uri).await?;
    open_browser(&redirect, args.no_browser);

    let query = listener.wait(Duration::from_secs(args.timeout_secs)).await?;
    let established = client
        .callback(&query, settings.as_ref(), &redirect_uri)
        .await?;

    let session = CachedSession::new(&app, established.cookie.clone());
    let path = cache.save(&session, &app)?;

    info!("Session saved to {:?}", path);
    eprintln!("Logged in. Continue at {}", established.redirect);
    Ok(())
}

fn logout(args: LogoutArgs, cache: &SessionCache) -> anyhow::Result<()> {
    let app = AppLocation::parse(&args.app_url)?;
    cache.delete(&app)?;
    eprintln!("Session for '{}' deleted", app.base());
    Ok(())
}

fn status(args: StatusArgs, cache: &SessionCache) -> anyhow::Result<()> {
    let app = AppLocation::parse(&args.app_url)?;

    match cache.load(&app)? {
        Some(session) => eprintln!(
            "Logged in to '{}' since {} (cookie {}, path {})",
            session.app_url, session.logged_in_at, session.cookie.name, session.cookie.path
        ),
        None => eprintln!("Not logged in to '{}'", app.base()),
    }
    Ok(())
}

fn open_browser(redirect: &Redirect, no_browser: bool) {
    if no_browser {
        eprintln!("\nOpen this URL in your browser to log in:\n\n{}\n", redirect);
        return;
    }

    info!("Opening browser for authorization");
    if let Err(e) = webbrowser::open(redirect.location.as_str()) {
        warn!("Failed to open browser: {}", e);
        eprintln!("\nCould not open browser automatically.");
        eprintln!("Please open this URL in your browser:\n\n{}\n", redirect);
    }
}
