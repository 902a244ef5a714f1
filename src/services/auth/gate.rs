/*
 * Responsibility
 * - 認証 gate の契約 (trait)。proxy 本体は AuthGate だけを見る
 * - login / logout / callback の結果は redirect + Set-Cookie として返す
 * - 実装は OidcGate (oidc.rs)。差し替え可能にしておく
 */
use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use thiserror::Error;

use crate::services::auth::{Claims, IdTokenError};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no session")]
    MissingSession,
    #[error(transparent)]
    InvalidToken(#[from] IdTokenError),
    #[error("login verification cookie missing")]
    MissingVerification,
    #[error("invalid callback: {0}")]
    InvalidCallback(&'static str),
    #[error("identity provider error: {error}")]
    Provider {
        error: String,
        description: Option<String>,
    },
    #[error("authorization code rejected: {0}")]
    CodeRejected(String),
    #[error("identity provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("failed to encode login state: {0}")]
    State(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOptions {
    // local path to return to after login
    pub return_to: String,
    // ask the provider for its signup screen
    pub signup: bool,
}

/// Query the provider redirects back with (authorization code flow).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Redirect plus the cookies to set along with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRedirect {
    pub location: String,
    pub cookies: Vec<String>,
}

impl IntoResponse for AuthRedirect {
    fn into_response(self) -> Response {
        let location = match HeaderValue::from_str(&self.location) {
            Ok(v) => v,
            Err(_) => {
                tracing::error!(location = %self.location, "redirect location is not a valid header value");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        let mut response = StatusCode::FOUND.into_response();
        let headers = response.headers_mut();
        headers.insert(header::LOCATION, location);
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        for cookie in self.cookies {
            match HeaderValue::from_str(&cookie) {
                Ok(v) => {
                    headers.append(header::SET_COOKIE, v);
                }
                Err(_) => tracing::warn!("dropping cookie that is not a valid header value"),
            }
        }
        response
    }
}

/// Authentication collaborator used by the proxy.
#[async_trait]
pub trait AuthGate: Send + Sync + 'static {
    /// Verify the caller and return their claims.
    async fn authenticate(&self, headers: &HeaderMap) -> Result<Claims, AuthError>;

    /// Start a login at the identity provider.
    async fn login(&self, options: LoginOptions) -> Result<AuthRedirect, AuthError>;

    /// Finish a login started by `login` and establish the session.
    async fn complete_login(
        &self,
        params: CallbackParams,
        headers: &HeaderMap,
    ) -> Result<AuthRedirect, AuthError>;

    /// Drop the session and log out at the identity provider.
    fn logout(&self, return_to: &str) -> Result<AuthRedirect, AuthError>;
}

/// Keep return targets on this site.
///
/// Anything that is not a plain absolute path (ex: `//evil.example`,
/// `https://...`, `/\evil`) collapses to `/`.
pub fn local_return_to(raw: &str) -> String {
    let ok = raw.starts_with('/')
        && !raw.starts_with("//")
        && !raw.starts_with("/\\")
        && !raw.chars().any(|c| c.is_control());
    if ok { raw.to_string() } else { "/".to_string() }
}

/// `page` or `page/section` as a local path.
pub fn return_path(page: &str, section: Option<&str>) -> String {
    let raw = match section {
        Some(section) if !section.is_empty() => format!("/{}/{}", page, section),
        _ => format!("/{}", page),
    };
    local_return_to(&raw)
}
