//! Shared fixtures for unit and router tests.
//!
//! `TestProvider` is a wiremock identity provider: discovery document, an
//! empty JWKS and a token endpoint. ID tokens are HS256 over the client
//! secret, so tests need no key files.
use std::collections::HashMap;

use axum::Router;
use jsonwebtoken::{EncodingKey, Header};
use serde::Serialize;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::config::Config;
use crate::middleware::http::request_timeout;
use crate::services::auth::build_auth_gate;
use crate::services::backend::BackendClient;
use crate::state::AppState;

pub const TEST_SECRET: &str = "test-client-secret-0123456789abcdef";
pub const TEST_CLIENT_ID: &str = "client-123";

const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

#[derive(Debug, Clone)]
pub struct TokenFixture {
    /// Defaults to the issuer of the provider that mints the token.
    pub iss: Option<String>,
    pub aud: String,
    pub sub: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub name: Option<String>,
    pub nonce: Option<String>,
    /// Seconds from now; negative values mint an already expired token.
    pub expires_in: i64,
}

impl TokenFixture {
    /// A token that satisfies the test trust policy.
    pub fn trusted() -> Self {
        Self {
            iss: None,
            aud: TEST_CLIENT_ID.to_string(),
            sub: "google-oauth2|1001".to_string(),
            email: Some("alice@example.org".to_string()),
            email_verified: true,
            name: Some("Alice Liddell".to_string()),
            nonce: None,
            expires_in: 3600,
        }
    }
}

#[derive(Serialize)]
struct MintedClaims<'a> {
    iss: &'a str,
    aud: &'a str,
    sub: &'a str,
    iat: i64,
    exp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    email_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    nonce: Option<&'a str>,
}

pub struct TestProvider {
    server: MockServer,
}

impl TestProvider {
    /// A provider signing ID tokens with HS256.
    pub async fn start() -> Self {
        let provider = Self::start_with_algs(&["HS256"]).await;
        provider.advertise_algs(&["HS256"]).await;
        provider
    }

    /// The first discovery advertises `algs`; later ones whatever
    /// `advertise_algs` mounts next.
    pub async fn start_with_algs(algs: &[&str]) -> Self {
        let provider = Self {
            server: MockServer::start().await,
        };

        Mock::given(method("GET"))
            .and(path(DISCOVERY_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(provider.discovery(algs)))
            .up_to_n_times(1)
            .mount(&provider.server)
            .await;
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keys": [] })))
            .mount(&provider.server)
            .await;

        provider
    }

    pub async fn advertise_algs(&self, algs: &[&str]) {
        Mock::given(method("GET"))
            .and(path(DISCOVERY_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(self.discovery(algs)))
            .mount(&self.server)
            .await;
    }

    /// Answer the token endpoint for `code` with `id_token`.
    pub async fn expect_code_exchange(&self, code: &str, id_token: &str) {
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_string_contains(format!("code={}", code)))
            .and(body_string_contains("code_verifier="))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "access-token",
                "token_type": "Bearer",
                "expires_in": 3600,
                "id_token": id_token,
            })))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    pub async fn reject_code_exchange(&self) {
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid authorization code",
            })))
            .mount(&self.server)
            .await;
    }

    /// Issuer URL, with the trailing slash the gate normalises to.
    pub fn issuer(&self) -> String {
        format!("{}/", self.server.uri())
    }

    pub fn mint(&self, fixture: &TokenFixture) -> String {
        self.mint_with_secret(fixture, TEST_SECRET)
    }

    pub fn mint_with_secret(&self, fixture: &TokenFixture, secret: &str) -> String {
        let issuer = self.issuer();
        let now = chrono::Utc::now().timestamp();
        let claims = MintedClaims {
            iss: fixture.iss.as_deref().unwrap_or(&issuer),
            aud: &fixture.aud,
            sub: &fixture.sub,
            iat: now,
            exp: now + fixture.expires_in,
            email: fixture.email.as_deref(),
            email_verified: fixture.email_verified,
            name: fixture.name.as_deref(),
            nonce: fixture.nonce.as_deref(),
        };

        jsonwebtoken::encode(
            &Header::new(jsonwebtoken::Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn discovery(&self, algs: &[&str]) -> serde_json::Value {
        let issuer = self.issuer();
        json!({
            "issuer": issuer,
            "authorization_endpoint": format!("{}authorize", issuer),
            "token_endpoint": format!("{}oauth/token", issuer),
            "jwks_uri": format!("{}.well-known/jwks.json", issuer),
            "response_types_supported": ["code"],
            "subject_types_supported": ["public"],
            "id_token_signing_alg_values_supported": algs,
        })
    }
}

pub fn test_config(backend_origin: &str, issuer: &str) -> Config {
    let env: HashMap<&str, String> = HashMap::from([
        ("BACKEND_ORIGIN", backend_origin.to_string()),
        ("BACKEND_TIMEOUT_SECS", "2".to_string()),
        ("BACKEND_CONNECT_TIMEOUT_SECS", "1".to_string()),
        ("TRUSTED_EMAIL_SUFFIX", "@example.org".to_string()),
        ("TRUSTED_SUBJECT_PREFIX", "google-oauth2|".to_string()),
        ("BASE_URL", "https://gate.example.org".to_string()),
        ("OIDC_ISSUER_BASE_URL", issuer.to_string()),
        ("OIDC_CLIENT_ID", TEST_CLIENT_ID.to_string()),
        ("OIDC_CLIENT_SECRET", TEST_SECRET.to_string()),
        ("OIDC_HTTP_TIMEOUT_SECS", "2".to_string()),
    ]);

    Config::from_lookup(|key| env.get(key).cloned()).unwrap()
}

/// The full application router, middleware included, in front of a
/// wiremock identity provider.
pub struct TestApp {
    pub router: Router,
    pub provider: TestProvider,
}

impl TestApp {
    pub async fn start(backend_origin: &str) -> Self {
        let provider = TestProvider::start().await;
        let config = test_config(backend_origin, &provider.issuer());

        let state = AppState::new(
            BackendClient::new(&config.backend).unwrap(),
            config.trust.clone(),
            build_auth_gate(&config.oidc).await.unwrap(),
        );

        Self {
            router: crate::app::build_router(state, request_timeout(&config)),
            provider,
        }
    }
}

/// An origin nobody listens on.
pub fn unreachable_origin() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}
