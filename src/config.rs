/*
 * Responsibility
 * - 環境変数の読み込み (backend origin, trust 条件, OIDC 設定など)
 * - 設定値のバリデーション (不足なら起動失敗)
 * - business logic からは env を直接読まない。ここで組み立てた値を注入する
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::services::trust::TrustPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Backend (CouchDB) connection settings.
#[derive(Clone)]
pub struct BackendConfig {
    // scheme + inline credentials + host. Opaque: never parsed here.
    pub origin: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // origin may carry credentials
        f.debug_struct("BackendConfig")
            .field("origin", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// OpenID Connect client settings used by the authentication gate.
#[derive(Clone)]
pub struct OidcConfig {
    pub base_url: String,
    pub issuer: String,
    pub client_id: String,
    pub client_secret: String,
    pub audience: Option<String>,
    pub id_token_leeway_seconds: u64,
    // discovery, JWKS and token exchange
    pub provider_timeout: Duration,
    pub end_session_endpoint: String,
    pub session_cookie_name: String,
    pub secure_cookies: bool,
}

impl fmt::Debug for OidcConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print the client secret
        f.debug_struct("OidcConfig")
            .field("base_url", &self.base_url)
            .field("issuer", &self.issuer)
            .field("client_id", &self.client_id)
            .field("audience", &self.audience)
            .field("provider_timeout", &self.provider_timeout)
            .field("end_session_endpoint", &self.end_session_endpoint)
            .field("session_cookie_name", &self.session_cookie_name)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,
    pub backend: BackendConfig,
    pub trust: TrustPolicy,
    pub oidc: OidcConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// `from_env` delegates here so the parsing rules can be exercised without
    /// touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let app_env = AppEnv::parse(&var("APP_ENV").unwrap_or_else(|| "development".into()));

        // 旧構成に合わせて env ごとの port を優先し、なければ PORT
        let port_key = if app_env.is_production() {
            "PROD_PORT"
        } else {
            "DEV_PORT"
        };
        let port: u16 = match var(port_key).or_else(|| var("PORT")) {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid("PORT"))?,
            None => 3000,
        };

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let origin = match var("BACKEND_ORIGIN") {
            Some(origin) => origin,
            None => {
                let protocol = var("BACKEND_PROTOCOL")
                    .ok_or(ConfigError::Missing("BACKEND_ORIGIN"))?;
                let host = var("BACKEND_HOST").ok_or(ConfigError::Missing("BACKEND_HOST"))?;
                let auth = var("BACKEND_AUTH").unwrap_or_default();
                format!("{}{}{}", protocol, auth, host)
            }
        };

        let timeout = Duration::from_secs(parse_or(
            var("BACKEND_TIMEOUT_SECS"),
            10,
            "BACKEND_TIMEOUT_SECS",
        )?);
        let connect_timeout = Duration::from_secs(parse_or(
            var("BACKEND_CONNECT_TIMEOUT_SECS"),
            5,
            "BACKEND_CONNECT_TIMEOUT_SECS",
        )?);

        let email_suffix = var("TRUSTED_EMAIL_SUFFIX")
            .ok_or(ConfigError::Missing("TRUSTED_EMAIL_SUFFIX"))?
            .trim()
            .to_string();
        let subject_prefix = var("TRUSTED_SUBJECT_PREFIX")
            .ok_or(ConfigError::Missing("TRUSTED_SUBJECT_PREFIX"))?
            .trim()
            .to_string();

        let base_url = var("BASE_URL")
            .ok_or(ConfigError::Missing("BASE_URL"))?
            .trim_end_matches('/')
            .to_string();
        url::Url::parse(&base_url).map_err(|_| ConfigError::Invalid("BASE_URL"))?;

        let issuer = var("OIDC_ISSUER_BASE_URL").ok_or(ConfigError::Missing("OIDC_ISSUER_BASE_URL"))?;
        let issuer = format!("{}/", issuer.trim().trim_end_matches('/'));
        let issuer_url =
            url::Url::parse(&issuer).map_err(|_| ConfigError::Invalid("OIDC_ISSUER_BASE_URL"))?;

        let client_id = var("OIDC_CLIENT_ID").ok_or(ConfigError::Missing("OIDC_CLIENT_ID"))?;
        let client_secret =
            var("OIDC_CLIENT_SECRET").ok_or(ConfigError::Missing("OIDC_CLIENT_SECRET"))?;
        let audience = var("OIDC_AUDIENCE");

        let id_token_leeway_seconds =
            parse_or(var("ID_TOKEN_LEEWAY_SECONDS"), 60, "ID_TOKEN_LEEWAY_SECONDS")?;
        let provider_timeout = Duration::from_secs(parse_or(
            var("OIDC_HTTP_TIMEOUT_SECS"),
            10,
            "OIDC_HTTP_TIMEOUT_SECS",
        )?);

        // Auth0 does not advertise its logout endpoint in discovery
        let end_session_endpoint = match var("OIDC_END_SESSION_ENDPOINT") {
            Some(endpoint) => endpoint,
            None => issuer_url
                .join("v2/logout")
                .map_err(|_| ConfigError::Invalid("OIDC_ISSUER_BASE_URL"))?
                .to_string(),
        };
        url::Url::parse(&end_session_endpoint)
            .map_err(|_| ConfigError::Invalid("OIDC_END_SESSION_ENDPOINT"))?;

        let session_cookie_name =
            var("SESSION_COOKIE_NAME").unwrap_or_else(|| "appSession".to_string());

        Ok(Self {
            addr,
            app_env,
            backend: BackendConfig {
                origin,
                timeout,
                connect_timeout,
            },
            trust: TrustPolicy::new(email_suffix, subject_prefix)
                .ok_or(ConfigError::Invalid("TRUSTED_EMAIL_SUFFIX/TRUSTED_SUBJECT_PREFIX"))?,
            oidc: OidcConfig {
                base_url,
                issuer,
                client_id,
                client_secret,
                audience,
                id_token_leeway_seconds,
                provider_timeout,
                end_session_endpoint,
                session_cookie_name,
                secure_cookies: app_env.is_production(),
            },
        })
    }
}

fn parse_or(raw: Option<String>, default: u64, key: &'static str) -> Result<u64, ConfigError> {
    match raw {
        Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}
