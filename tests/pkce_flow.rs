//! Integration tests for the PKCE login flow
//!
//! Drives login and callback against a mocked OIDC provider

use mockito::{Matcher, Mock, ServerGuard};
use pkce_login::error::PkceLoginError;
use pkce_login::oidc::pkce::derive_challenge;
use pkce_login::oidc::settings::fetch_auth_settings;
use pkce_login::oidc::store::obscure;
use pkce_login::oidc::{AppLocation, MemorySessionStore, OidcSettings, PkceClient, SessionStore};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio_test::assert_err;

const REDIRECT_URI: &str = "https://app.example/pkce/verify";

fn settings(server: &ServerGuard) -> OidcSettings {
    OidcSettings::new(
        format!("{}/", server.url()),
        "abc",
        vec!["openid".to_string(), "profile".to_string()],
    )
}

fn client() -> PkceClient<MemorySessionStore> {
    PkceClient::new(
        MemorySessionStore::new(),
        AppLocation::parse("https://app.example/").unwrap(),
    )
}

fn metadata(server: &ServerGuard) -> serde_json::Value {
    json!({
        "issuer": server.url(),
        "authorization_endpoint": format!("{}/auth", server.url()),
        "token_endpoint": format!("{}/token", server.url()),
        "jwks_uri": format!("{}/keys", server.url()),
        "response_types_supported": ["code"],
        "code_challenge_methods_supported": ["S256"],
        "id_token_signing_alg_values_supported": ["RS256"]
    })
}

async fn mock_discovery(server: &mut ServerGuard, document: serde_json::Value) -> Mock {
    server
        .mock("GET", "/.well-known/openid-configuration")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(document.to_string())
        .create_async()
        .await
}

async fn mock_token(server: &mut ServerGuard, status: usize, body: serde_json::Value) -> Mock {
    server
        .mock("POST", "/token")
        .with_status(status)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create_async()
        .await
}

fn seed(client: &PkceClient<MemorySessionStore>, verifier: &str, state: &str) {
    client.secrets().set_code_verifier(verifier);
    client.secrets().set_state(state);
}

// ---------------------------------------------------------------------------
// Login
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_login_redirects_to_authorization_endpoint() {
    let mut server = mockito::Server::new_async().await;
    let document = metadata(&server);
    let discovery = mock_discovery(&mut server, document).await;
    let client = client();

    let redirect = client
        .login(Some(&settings(&server)), REDIRECT_URI)
        .await
        .unwrap();

    discovery.assert_async().await;

    let location = &redirect.location;
    let expected = url::Url::parse(&format!("{}/auth", server.url())).unwrap();
    assert_eq!(location.host_str(), expected.host_str());
    assert_eq!(location.port(), expected.port());
    assert_eq!(location.path(), "/auth");

    let query: HashMap<String, String> = location.query_pairs().into_owned().collect();
    assert_eq!(query["client_id"], "abc");
    assert_eq!(query["response_type"], "code");
    assert_eq!(query["scope"], "openid profile");
    assert_eq!(query["code_challenge_method"], "S256");
    assert_eq!(query["redirect_uri"], REDIRECT_URI);
    assert!(!query["code_challenge"].is_empty());
    assert!(!query["state"].is_empty());

    let verifier = client.secrets().code_verifier().unwrap();
    assert_eq!(query["code_challenge"], derive_challenge(&verifier));
    assert_eq!(client.secrets().state().as_deref(), Some(query["state"].as_str()));
}

#[tokio::test]
async fn test_login_without_client_id_skips_discovery() {
    let mut server = mockito::Server::new_async().await;
    let discovery = server
        .mock("GET", "/.well-known/openid-configuration")
        .expect(0)
        .create_async()
        .await;

    let mut config = settings(&server);
    config.client_id = String::new();

    let err = assert_err!(client().login(Some(&config), REDIRECT_URI).await);
    assert!(matches!(err, PkceLoginError::Configuration(ref m) if m == "No OIDC Client Id found"));

    discovery.assert_async().await;
}

#[tokio::test]
async fn test_login_with_invalid_issuer() {
    let config = OidcSettings::new("not a url", "abc", vec!["openid".to_string()]);

    let err = assert_err!(client().login(Some(&config), REDIRECT_URI).await);
    assert!(matches!(err, PkceLoginError::Configuration(_)));
    assert!(err.to_string().contains("not a url"));
}

#[tokio::test]
async fn test_login_without_settings() {
    let err = assert_err!(client().login(None, REDIRECT_URI).await);
    assert!(matches!(err, PkceLoginError::Configuration(ref m) if m == "No OIDC Config found"));
}

#[tokio::test]
async fn test_login_without_authorization_endpoint() {
    let mut server = mockito::Server::new_async().await;
    let document =
        json!({ "issuer": server.url(), "token_endpoint": format!("{}/token", server.url()) });
    let _discovery = mock_discovery(&mut server, document).await;
    let client = client();

    let err = assert_err!(client.login(Some(&settings(&server)), REDIRECT_URI).await);
    assert!(
        matches!(err, PkceLoginError::Configuration(ref m) if m == "No Authorization Server endpoint found")
    );
    assert!(client.secrets().store().is_empty());
}

#[tokio::test]
async fn test_login_rejects_issuer_mismatch() {
    let mut server = mockito::Server::new_async().await;
    let mut document = metadata(&server);
    document["issuer"] = json!("https://other.example/");
    let _discovery = mock_discovery(&mut server, document).await;

    let err = assert_err!(client().login(Some(&settings(&server)), REDIRECT_URI).await);
    assert!(matches!(err, PkceLoginError::Discovery(_)));
}

#[tokio::test]
async fn test_login_discovery_failure() {
    let mut server = mockito::Server::new_async().await;
    let _discovery = server
        .mock("GET", "/.well-known/openid-configuration")
        .with_status(500)
        .create_async()
        .await;

    let err = assert_err!(client().login(Some(&settings(&server)), REDIRECT_URI).await);
    assert!(matches!(err, PkceLoginError::Discovery(_)));
}

#[tokio::test]
async fn test_second_login_overwrites_first() {
    let mut server = mockito::Server::new_async().await;
    let _discovery = server
        .mock("GET", "/.well-known/openid-configuration")
        .with_status(200)
        .with_body(metadata(&server).to_string())
        .expect(2)
        .create_async()
        .await;
    let client = client();
    let config = settings(&server);

    let _first = client.login(Some(&config), REDIRECT_URI).await.unwrap();
    let first_verifier = client.secrets().code_verifier().unwrap();
    let _second = client.login(Some(&config), REDIRECT_URI).await.unwrap();

    assert_ne!(client.secrets().code_verifier().unwrap(), first_verifier);
    assert_eq!(client.secrets().store().len(), 2);
}

// ---------------------------------------------------------------------------
// Callback
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_callback_establishes_session() {
    let mut server = mockito::Server::new_async().await;
    let document = metadata(&server);
    let _discovery = mock_discovery(&mut server, document).await;
    let token = server
        .mock("POST", "/token")
        .match_header("authorization", Matcher::Missing)
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
            Matcher::UrlEncoded("code".into(), "XYZ".into()),
            Matcher::UrlEncoded("code_verifier".into(), "V1".into()),
            Matcher::UrlEncoded("client_id".into(), "abc".into()),
            Matcher::UrlEncoded("redirect_uri".into(), REDIRECT_URI.into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "id_token": "T1" }).to_string())
        .create_async()
        .await;

    let client = client();
    seed(&client, "V1", "S1");

    let established = client
        .callback("?code=XYZ&state=S1", Some(&settings(&server)), REDIRECT_URI)
        .await
        .unwrap();

    token.assert_async().await;
    assert_eq!(established.id_token(), "T1");
    assert!(established.cookie.to_string().contains("T1"));
    assert_eq!(established.cookie.to_string(), "argocd.token=T1; path=/");
    assert_eq!(
        established.redirect.location.as_str(),
        "https://app.example/applications"
    );
    assert!(client.secrets().store().is_empty());
}

#[tokio::test]
async fn test_callback_reports_provider_token_error() {
    let mut server = mockito::Server::new_async().await;
    let document = metadata(&server);
    let _discovery = mock_discovery(&mut server, document).await;
    let _token = mock_token(
        &mut server,
        400,
        json!({ "error": "invalid_grant", "error_description": "expired code" }),
    )
    .await;

    let client = client();
    seed(&client, "V1", "S1");

    let err = assert_err!(
        client
            .callback("?code=XYZ&state=S1", Some(&settings(&server)), REDIRECT_URI)
            .await
    );
    assert!(matches!(err, PkceLoginError::TokenExchange(_)));
    assert!(err.to_string().contains("expired code"));
}

#[tokio::test]
async fn test_callback_without_verifier_skips_discovery() {
    let mut server = mockito::Server::new_async().await;
    let discovery = server
        .mock("GET", "/.well-known/openid-configuration")
        .expect(0)
        .create_async()
        .await;

    let client = client();
    client.secrets().set_state("S1");

    let err = assert_err!(
        client
            .callback("?code=XYZ&state=S1", Some(&settings(&server)), REDIRECT_URI)
            .await
    );
    assert!(matches!(err, PkceLoginError::SessionState(_)));

    discovery.assert_async().await;
    assert!(client.secrets().store().is_empty());
}

#[tokio::test]
async fn test_callback_without_code() {
    let client = client();
    seed(&client, "V1", "S1");

    let config = OidcSettings::new("https://idp.example/", "abc", vec![]);
    let err = assert_err!(client.callback("?state=S1", Some(&config), REDIRECT_URI).await);
    assert!(matches!(err, PkceLoginError::QueryParse(ref m) if m == "No code in query parameters"));
}

#[tokio::test]
async fn test_callback_with_repeated_parameters() {
    let client = client();
    seed(&client, "V1", "S1");

    let config = OidcSettings::new("https://idp.example/", "abc", vec![]);
    let err = assert_err!(
        client
            .callback("?code=XYZ&state=S1&state=S2", Some(&config), REDIRECT_URI)
            .await
    );
    assert!(matches!(err, PkceLoginError::QueryParse(ref m) if m == "Invalid query parameters"));
}

#[tokio::test]
async fn test_callback_with_state_mismatch() {
    let mut server = mockito::Server::new_async().await;
    let document = metadata(&server);
    let _discovery = mock_discovery(&mut server, document).await;
    let token = server.mock("POST", "/token").expect(0).create_async().await;

    let client = client();
    seed(&client, "V1", "S1");

    let err = assert_err!(
        client
            .callback("?code=XYZ&state=forged", Some(&settings(&server)), REDIRECT_URI)
            .await
    );
    assert!(matches!(err, PkceLoginError::Validation(_)));
    token.assert_async().await;
}

#[tokio::test]
async fn test_callback_without_state_parameter() {
    let mut server = mockito::Server::new_async().await;
    let document = metadata(&server);
    let _discovery = mock_discovery(&mut server, document).await;
    let token = server.mock("POST", "/token").expect(0).create_async().await;

    let client = client();
    seed(&client, "V1", "S1");

    let err = assert_err!(
        client
            .callback("?code=XYZ", Some(&settings(&server)), REDIRECT_URI)
            .await
    );
    assert!(matches!(err, PkceLoginError::Validation(ref m) if m.contains("missing state parameter")));
    token.assert_async().await;
}

#[tokio::test]
async fn test_callback_with_unreachable_token_endpoint() {
    // Reserve a port, then close it so the token request is refused
    let closed_addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();

    let mut server = mockito::Server::new_async().await;
    let mut document = metadata(&server);
    document["token_endpoint"] = json!(format!("http://{}/token", closed_addr));
    let _discovery = mock_discovery(&mut server, document).await;

    let client = client();
    seed(&client, "V1", "S1");

    let err = assert_err!(
        client
            .callback("?code=XYZ&state=S1", Some(&settings(&server)), REDIRECT_URI)
            .await
    );
    assert!(matches!(err, PkceLoginError::TokenExchange(ref m) if m.starts_with("Token request failed")));
}

#[tokio::test]
async fn test_callback_with_provider_error_in_query() {
    let mut server = mockito::Server::new_async().await;
    let document = metadata(&server);
    let _discovery = mock_discovery(&mut server, document).await;

    let client = client();
    seed(&client, "V1", "S1");

    let err = assert_err!(
        client
            .callback(
                "?code=XYZ&state=S1&error=access_denied&error_description=denied%20by%20user",
                Some(&settings(&server)),
                REDIRECT_URI,
            )
            .await
    );
    assert!(matches!(err, PkceLoginError::Validation(_)));
    assert!(err.to_string().contains("denied by user"));
}

#[tokio::test]
async fn test_callback_with_authentication_challenge() {
    let mut server = mockito::Server::new_async().await;
    let document = metadata(&server);
    let _discovery = mock_discovery(&mut server, document).await;
    let _token = server
        .mock("POST", "/token")
        .with_status(401)
        .with_header("www-authenticate", r#"Basic realm="token""#)
        .with_body(json!({ "error": "invalid_client" }).to_string())
        .create_async()
        .await;

    let client = client();
    seed(&client, "V1", "S1");

    let err = assert_err!(
        client
            .callback("?code=XYZ&state=S1", Some(&settings(&server)), REDIRECT_URI)
            .await
    );
    assert!(
        matches!(err, PkceLoginError::Challenge(ref m) if m == "Error parsing authentication challenge")
    );
}

#[tokio::test]
async fn test_callback_without_id_token() {
    let mut server = mockito::Server::new_async().await;
    let document = metadata(&server);
    let _discovery = mock_discovery(&mut server, document).await;
    let _token = mock_token(
        &mut server,
        200,
        json!({ "access_token": "A1", "token_type": "Bearer" }),
    )
    .await;

    let client = client();
    seed(&client, "V1", "S1");

    let err = assert_err!(
        client
            .callback("?code=XYZ&state=S1", Some(&settings(&server)), REDIRECT_URI)
            .await
    );
    assert!(matches!(err, PkceLoginError::TokenExchange(ref m) if m == "No token in response"));
}

#[tokio::test]
async fn test_callback_cannot_be_replayed() {
    let mut server = mockito::Server::new_async().await;
    let document = metadata(&server);
    let _discovery = mock_discovery(&mut server, document).await;
    let _token = mock_token(&mut server, 200, json!({ "id_token": "T1" })).await;

    let client = client();
    seed(&client, "V1", "S1");
    let config = settings(&server);

    let _established = client
        .callback("?code=XYZ&state=S1", Some(&config), REDIRECT_URI)
        .await
        .unwrap();

    let err = assert_err!(
        client
            .callback("?code=XYZ&state=S1", Some(&config), REDIRECT_URI)
            .await
    );
    assert!(matches!(err, PkceLoginError::SessionState(_)));
}

#[tokio::test]
async fn test_login_then_callback() {
    let mut server = mockito::Server::new_async().await;
    let _discovery = server
        .mock("GET", "/.well-known/openid-configuration")
        .with_status(200)
        .with_body(metadata(&server).to_string())
        .expect(2)
        .create_async()
        .await;

    let client = PkceClient::new(
        MemorySessionStore::new(),
        AppLocation::parse("https://app.example/argo-cd/").unwrap(),
    );
    let redirect_uri = client.redirect_uri().unwrap().to_string();
    let config = settings(&server);

    let redirect = client.login(Some(&config), &redirect_uri).await.unwrap();
    let query: HashMap<String, String> = redirect.location.query_pairs().into_owned().collect();
    let verifier = client.secrets().code_verifier().unwrap();

    let _token = server
        .mock("POST", "/token")
        .match_body(Matcher::UrlEncoded("code_verifier".into(), verifier))
        .with_status(200)
        .with_body(json!({ "id_token": "T2" }).to_string())
        .create_async()
        .await;

    let callback_query = format!("?code=XYZ&state={}", query["state"]);
    let established = client
        .callback(&callback_query, Some(&config), &redirect_uri)
        .await
        .unwrap();

    assert_eq!(established.cookie.to_string(), "argocd.token=T2; path=/argo-cd");
    assert_eq!(
        established.redirect.location.as_str(),
        "https://app.example/argo-cd/applications"
    );
}

// ---------------------------------------------------------------------------
// Session store sequencing
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RecordingStore {
    inner: MemorySessionStore,
    ops: Mutex<Vec<String>>,
}

impl RecordingStore {
    fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }
}

impl SessionStore for RecordingStore {
    fn get(&self, key: &str) -> Option<String> {
        self.ops.lock().unwrap().push(format!("get {}", key));
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) {
        self.ops.lock().unwrap().push(format!("set {}", key));
        self.inner.set(key, value)
    }

    fn unset(&self, key: &str) {
        self.ops.lock().unwrap().push(format!("unset {}", key));
        self.inner.unset(key)
    }
}

#[tokio::test]
async fn test_secrets_are_created_read_and_deleted_once() {
    let mut server = mockito::Server::new_async().await;
    let _discovery = server
        .mock("GET", "/.well-known/openid-configuration")
        .with_status(200)
        .with_body(metadata(&server).to_string())
        .expect(2)
        .create_async()
        .await;
    let _token = mock_token(&mut server, 200, json!({ "id_token": "T1" })).await;

    let store = Arc::new(RecordingStore::default());
    let client = PkceClient::new(store.clone(), AppLocation::parse("https://app.example/").unwrap());
    let config = settings(&server);

    let redirect = client.login(Some(&config), REDIRECT_URI).await.unwrap();
    let verifier_key = obscure("code_verifier");
    let state_key = obscure("pkce_session_id");
    assert_eq!(
        store.ops(),
        vec![format!("set {}", verifier_key), format!("set {}", state_key)]
    );

    let state: String = redirect
        .location
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap();

    let _established = client
        .callback(&format!("code=XYZ&state={}", state), Some(&config), REDIRECT_URI)
        .await
        .unwrap();

    assert_eq!(
        store.ops()[2..],
        [
            format!("get {}", verifier_key),
            format!("get {}", state_key),
            format!("unset {}", verifier_key),
            format!("unset {}", state_key),
        ]
    );
}

// ---------------------------------------------------------------------------
// Auth settings
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_fetch_auth_settings() {
    let mut server = mockito::Server::new_async().await;
    let _settings = server
        .mock("GET", "/argo-cd/api/v1/settings")
        .with_status(200)
        .with_body(
            json!({
                "oidcConfig": {
                    "issuer": "https://idp.example/",
                    "clientID": "abc",
                    "scopes": ["openid", "profile"]
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let app = AppLocation::parse(&format!("{}/argo-cd/", server.url())).unwrap();
    let settings = fetch_auth_settings(&reqwest::Client::new(), &app).await.unwrap();

    let oidc = settings.oidc_config.unwrap();
    assert_eq!(oidc.client_id, "abc");
    assert_eq!(oidc.scopes, vec!["openid", "profile"]);
}

#[tokio::test]
async fn test_missing_oidc_settings_fail_login() {
    let mut server = mockito::Server::new_async().await;
    let _settings = server
        .mock("GET", "/api/v1/settings")
        .with_status(200)
        .with_body(json!({ "url": "https://app.example" }).to_string())
        .create_async()
        .await;

    let app = AppLocation::parse(&server.url()).unwrap();
    let settings = fetch_auth_settings(&reqwest::Client::new(), &app).await.unwrap();

    let err = assert_err!(
        client()
            .login(settings.oidc_config.as_ref(), REDIRECT_URI)
            .await
    );
    assert!(matches!(err, PkceLoginError::Configuration(ref m) if m == "No OIDC Config found"));
}
