/// Factory: build the authentication gate from application `Config`.
///
/// Discovery runs once here; the gate refreshes it on key rotation.
use std::sync::Arc;

use crate::config::OidcConfig;
use crate::services::auth::provider::{discover, http_client};
use crate::services::auth::{AuthError, AuthGate, OidcGate};

pub async fn build_oidc_gate(config: &OidcConfig) -> Result<OidcGate, AuthError> {
    let http = http_client(config)?;
    let provider = discover(config, &http).await?;

    Ok(OidcGate::new(config.clone(), http, provider))
}

pub async fn build_auth_gate(config: &OidcConfig) -> Result<Arc<dyn AuthGate>, AuthError> {
    Ok(Arc::new(build_oidc_gate(config).await?))
}
