//! OpenID Connect gate: authorization code flow with PKCE and a client secret.
//!
//! State lives entirely in cookies:
//! - `auth_verification`: state, nonce and PKCE verifier of the login in
//!   flight, plus where to return afterwards (short-lived)
//! - session cookie (`appSession` by default): the verified ID token
//!
//! The ID token is re-verified on every request against the discovered
//! provider keys, so expiry and signature are always enforced without a
//! server-side store. A signature failure triggers one (rate limited)
//! re-discovery to pick up rotated keys.
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::http::{HeaderMap, header};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use openidconnect::core::{CoreAuthenticationFlow, CoreIdToken};
use openidconnect::{
    AuthorizationCode, CsrfToken, Nonce, PkceCodeChallenge, PkceCodeVerifier, RequestTokenError,
    Scope, TokenResponse,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use url::Url;

use crate::config::OidcConfig;
use crate::services::auth::Claims;
use crate::services::auth::cookies;
use crate::services::auth::gate::{
    AuthError, AuthGate, AuthRedirect, CallbackParams, LoginOptions, local_return_to,
};
use crate::services::auth::id_token::{VerifiedIdToken, parse_id_token};
use crate::services::auth::provider::{Provider, discover};

const VERIFICATION_COOKIE: &str = "auth_verification";
const VERIFICATION_TTL_SECONDS: i64 = 600;
const REDISCOVERY_INTERVAL: Duration = Duration::from_secs(300);

/// Login in flight, kept in the verification cookie until the callback.
#[derive(Debug, Serialize, Deserialize)]
struct LoginTransaction {
    state: String,
    nonce: String,
    code_verifier: String,
    #[serde(rename = "returnTo")]
    return_to: String,
}

impl LoginTransaction {
    fn encode(&self) -> Result<String, AuthError> {
        Ok(URL_SAFE_NO_PAD.encode(serde_json::to_vec(self)?))
    }

    fn decode(raw: &str) -> Result<Self, AuthError> {
        let json = URL_SAFE_NO_PAD
            .decode(raw)
            .map_err(|_| AuthError::InvalidCallback("verification"))?;
        serde_json::from_slice(&json).map_err(|_| AuthError::InvalidCallback("verification"))
    }
}

pub struct OidcGate {
    config: OidcConfig,
    http: reqwest::Client,
    provider: RwLock<Arc<Provider>>,
    // None until the first re-discovery
    last_rediscovery: Mutex<Option<Instant>>,
}

impl OidcGate {
    pub fn new(config: OidcConfig, http: reqwest::Client, provider: Provider) -> Self {
        Self {
            config,
            http,
            provider: RwLock::new(Arc::new(provider)),
            last_rediscovery: Mutex::new(None),
        }
    }

    async fn provider(&self) -> Arc<Provider> {
        self.provider.read().await.clone()
    }

    fn session_token(&self, headers: &HeaderMap) -> Option<String> {
        cookies::read_cookie(headers, &self.config.session_cookie_name).or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
        })
    }

    /// Verify against the current keys, re-discovering once when the
    /// signature does not check out.
    async fn verify(
        &self,
        token: &CoreIdToken,
        nonce: Option<&Nonce>,
    ) -> Result<VerifiedIdToken, AuthError> {
        match self.provider().await.verify(token, nonce) {
            Err(err) if err.is_signature_failure() => match self.rediscover().await {
                Some(provider) => Ok(provider.verify(token, nonce)?),
                None => Err(err.into()),
            },
            other => Ok(other?),
        }
    }

    async fn rediscover(&self) -> Option<Arc<Provider>> {
        let mut last = self.last_rediscovery.lock().await;
        if last.is_some_and(|at| at.elapsed() < REDISCOVERY_INTERVAL) {
            return None;
        }
        *last = Some(Instant::now());

        match discover(&self.config, &self.http).await {
            Ok(provider) => {
                let provider = Arc::new(provider);
                *self.provider.write().await = provider.clone();
                tracing::info!(issuer = %self.config.issuer, "identity provider keys refreshed");
                Some(provider)
            }
            Err(err) => {
                tracing::warn!(error = %err, "identity provider re-discovery failed");
                None
            }
        }
    }
}

#[async_trait]
impl AuthGate for OidcGate {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<Claims, AuthError> {
        let raw = self.session_token(headers).ok_or(AuthError::MissingSession)?;
        let token = parse_id_token(&raw)?;
        Ok(self.verify(&token, None).await?.claims)
    }

    async fn login(&self, options: LoginOptions) -> Result<AuthRedirect, AuthError> {
        let provider = self.provider().await;
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        // openid is always requested
        let mut request = provider
            .client
            .authorize_url(
                CoreAuthenticationFlow::AuthorizationCode,
                CsrfToken::new_random,
                Nonce::new_random,
            )
            .add_scope(Scope::new("profile".to_string()))
            .add_scope(Scope::new("email".to_string()))
            .set_pkce_challenge(pkce_challenge);
        if let Some(audience) = &self.config.audience {
            request = request.add_extra_param("audience", audience.clone());
        }
        if options.signup {
            request = request.add_extra_param("screen_hint", "signup");
        }
        let (url, state, nonce) = request.url();

        let transaction = LoginTransaction {
            state: state.secret().clone(),
            nonce: nonce.secret().clone(),
            code_verifier: pkce_verifier.secret().clone(),
            return_to: local_return_to(&options.return_to),
        };

        Ok(AuthRedirect {
            location: url.to_string(),
            cookies: vec![cookies::set_cookie(
                VERIFICATION_COOKIE,
                &transaction.encode()?,
                VERIFICATION_TTL_SECONDS,
                self.config.secure_cookies,
            )],
        })
    }

    async fn complete_login(
        &self,
        params: CallbackParams,
        headers: &HeaderMap,
    ) -> Result<AuthRedirect, AuthError> {
        if let Some(error) = params.error {
            return Err(AuthError::Provider {
                error,
                description: params.error_description,
            });
        }

        let code = params.code.ok_or(AuthError::InvalidCallback("code"))?;
        let raw = cookies::read_cookie(headers, VERIFICATION_COOKIE)
            .ok_or(AuthError::MissingVerification)?;
        let transaction = LoginTransaction::decode(&raw)?;

        if params.state.as_deref() != Some(transaction.state.as_str()) {
            return Err(AuthError::InvalidCallback("state"));
        }

        let provider = self.provider().await;
        let response = provider
            .client
            .exchange_code(AuthorizationCode::new(code))
            .map_err(|e| AuthError::ProviderUnavailable(e.to_string()))?
            .set_pkce_verifier(PkceCodeVerifier::new(transaction.code_verifier))
            .request_async(&self.http)
            .await
            .map_err(|e| match e {
                // invalid_grant and friends: replayed, expired or foreign code
                RequestTokenError::ServerResponse(response) => {
                    AuthError::CodeRejected(response.to_string())
                }
                other => AuthError::ProviderUnavailable(other.to_string()),
            })?;

        let id_token = response
            .id_token()
            .ok_or(AuthError::InvalidCallback("id_token"))?;
        let verified = self
            .verify(id_token, Some(&Nonce::new(transaction.nonce)))
            .await?;

        let max_age = (verified.expires_at - chrono::Utc::now()).num_seconds();

        tracing::info!(sub = %verified.claims.sub, "login completed");

        Ok(AuthRedirect {
            location: local_return_to(&transaction.return_to),
            cookies: vec![
                cookies::set_cookie(
                    &self.config.session_cookie_name,
                    &id_token.to_string(),
                    max_age,
                    self.config.secure_cookies,
                ),
                cookies::clear_cookie(VERIFICATION_COOKIE, self.config.secure_cookies),
            ],
        })
    }

    fn logout(&self, return_to: &str) -> Result<AuthRedirect, AuthError> {
        let mut url = Url::parse(&self.config.end_session_endpoint)?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair(
                "returnTo",
                &format!("{}{}", self.config.base_url, local_return_to(return_to)),
            );

        Ok(AuthRedirect {
            location: url.to_string(),
            cookies: vec![cookies::clear_cookie(
                &self.config.session_cookie_name,
                self.config.secure_cookies,
            )],
        })
    }
}
