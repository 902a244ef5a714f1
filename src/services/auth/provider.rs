/*
 * Responsibility
 * - OIDC discovery (/.well-known/openid-configuration) と JWKS の取得
 * - discover 済みの client で ID token を検証する (署名, iss, aud, exp, nonce)
 * - 鍵の rotation は OidcGate 側で再 discover して拾う
 */
use chrono::{TimeDelta, Utc};
use openidconnect::core::{
    CoreClient, CoreIdToken, CoreJwsSigningAlgorithm, CoreProviderMetadata,
};
use openidconnect::{
    ClientId, ClientSecret, EndpointMaybeSet, EndpointNotSet, EndpointSet, IssuerUrl, Nonce,
    RedirectUrl,
};

use crate::config::OidcConfig;
use crate::services::auth::gate::AuthError;
use crate::services::auth::id_token::{IdTokenError, VerifiedIdToken, verified};

pub const CALLBACK_PATH: &str = "/callback";

/// Client built from discovered metadata: authorization endpoint known,
/// token / userinfo endpoints as advertised.
pub type DiscoveredClient = CoreClient<
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointMaybeSet,
    EndpointMaybeSet,
>;

/// Snapshot of the provider's metadata and signing keys.
#[derive(Debug, Clone)]
pub struct Provider {
    pub client: DiscoveredClient,
    signing_algs: Vec<CoreJwsSigningAlgorithm>,
    leeway: TimeDelta,
}

/// Outbound client for discovery, JWKS and the code exchange.
///
/// Redirects are not followed (the openidconnect crate requires this to avoid SSRF).
pub fn http_client(config: &OidcConfig) -> Result<reqwest::Client, AuthError> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(config.provider_timeout)
        .build()
        .map_err(|e| AuthError::ProviderUnavailable(e.to_string()))
}

pub async fn discover(config: &OidcConfig, http: &reqwest::Client) -> Result<Provider, AuthError> {
    let issuer = IssuerUrl::new(config.issuer.clone())?;

    let metadata = CoreProviderMetadata::discover_async(issuer, http)
        .await
        .map_err(|e| AuthError::ProviderUnavailable(e.to_string()))?;

    let signing_algs: Vec<CoreJwsSigningAlgorithm> = metadata
        .id_token_signing_alg_values_supported()
        .iter()
        .filter(|alg| **alg != CoreJwsSigningAlgorithm::None)
        .cloned()
        .collect();

    tracing::debug!(
        issuer = %config.issuer,
        keys = metadata.jwks().keys().len(),
        "identity provider discovered"
    );

    let client = CoreClient::from_provider_metadata(
        metadata,
        ClientId::new(config.client_id.clone()),
        Some(ClientSecret::new(config.client_secret.clone())),
    )
    .set_redirect_uri(RedirectUrl::new(format!(
        "{}{}",
        config.base_url, CALLBACK_PATH
    ))?);

    Ok(Provider {
        client,
        signing_algs,
        leeway: TimeDelta::seconds(config.id_token_leeway_seconds as i64),
    })
}

impl Provider {
    /// Verify signature, `iss`, `aud` (= client id) and `exp` with leeway.
    ///
    /// `nonce` is checked only for tokens fresh from the code exchange; a
    /// session cookie no longer has the login nonce to compare against.
    pub fn verify(
        &self,
        token: &CoreIdToken,
        nonce: Option<&Nonce>,
    ) -> Result<VerifiedIdToken, IdTokenError> {
        let leeway = self.leeway;
        let verifier = self
            .client
            .id_token_verifier()
            .set_allowed_algs(self.signing_algs.clone())
            .set_time_fn(move || Utc::now() - leeway);

        let claims = match nonce {
            Some(nonce) => token.claims(&verifier, nonce)?,
            None => token.claims(&verifier, |_: Option<&Nonce>| -> Result<(), String> {
                Ok(())
            })?,
        };

        verified(claims)
    }
}
