//! ID token parsing and the mapping from verified provider claims to `Claims`.
//!
//! Signature and claim checks run in `provider::Provider::verify` against the
//! discovered JWKS.
use chrono::{DateTime, Utc};
use openidconnect::ClaimsVerificationError;
use openidconnect::core::{CoreIdToken, CoreIdTokenClaims};
use serde_json::Value;
use thiserror::Error;

use crate::services::auth::Claims;

#[derive(Debug, Error)]
pub enum IdTokenError {
    #[error("malformed id token: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("id token verification failed: {0}")]
    Claims(#[from] ClaimsVerificationError),
    #[error("empty '{0}' claim")]
    EmptyClaim(&'static str),
}

impl IdTokenError {
    /// The token was signed with a key or algorithm we do not currently know.
    ///
    /// The only failure that re-fetching the provider metadata can fix.
    pub fn is_signature_failure(&self) -> bool {
        matches!(
            self,
            IdTokenError::Claims(ClaimsVerificationError::SignatureVerification(_))
        )
    }
}

/// A verified ID token reduced to what the gate needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdToken {
    pub claims: Claims,
    pub expires_at: DateTime<Utc>,
}

/// Parse the compact JWT serialisation (cookie or bearer value).
pub fn parse_id_token(raw: &str) -> Result<CoreIdToken, IdTokenError> {
    Ok(serde_json::from_value(Value::String(raw.trim().to_string()))?)
}

pub(crate) fn verified(claims: &CoreIdTokenClaims) -> Result<VerifiedIdToken, IdTokenError> {
    let sub = String::clone(claims.subject());
    if sub.trim().is_empty() {
        return Err(IdTokenError::EmptyClaim("sub"));
    }

    Ok(VerifiedIdToken {
        claims: Claims {
            sub,
            email: claims.email().map(|email| String::clone(email)),
            email_verified: claims.email_verified().unwrap_or(false),
            name: claims
                .name()
                .and_then(|name| name.get(None))
                .map(|name| String::clone(name)),
        },
        expires_at: claims.expiration(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_jwt_values() {
        assert!(matches!(
            parse_id_token("not-a-token"),
            Err(IdTokenError::Malformed(_))
        ));
    }
}
