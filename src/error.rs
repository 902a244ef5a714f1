/*
 * Responsibility
 * - アプリ共通の AppError 定義
 * - IntoResponse 実装 (HTTP status のみ。body は空)
 * - backend / session / auth の error を統一的に変換し、詳細は log にだけ残す
 */
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::services::auth::AuthError;
use crate::services::backend::TransportError;
use crate::services::session::SessionError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(&'static str),
    #[error("unauthorized")]
    Unauthorized,
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("unsupported media type")]
    UnsupportedMediaType,
    #[error("internal server error")]
    Internal,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // No error body: callers only get the status.
        status.into_response()
    }
}

impl From<TransportError> for AppError {
    fn from(e: TransportError) -> Self {
        tracing::warn!(error = ?e, "backend request failed");
        AppError::Internal
    }
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        tracing::warn!(error = %e, "backend session document rejected");
        AppError::Internal
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::MissingSession
            | AuthError::InvalidToken(_)
            | AuthError::MissingVerification => {
                tracing::warn!(error = %e, "login rejected");
                AppError::Unauthorized
            }
            AuthError::InvalidCallback(field) => AppError::BadRequest(field),
            AuthError::Provider { error, description } => {
                tracing::warn!(%error, ?description, "identity provider returned an error");
                AppError::BadRequest("provider error")
            }
            AuthError::CodeRejected(_) => {
                tracing::warn!(error = %e, "code exchange rejected");
                AppError::Unauthorized
            }
            AuthError::ProviderUnavailable(_) => {
                tracing::error!(error = %e, "identity provider unreachable");
                AppError::Internal
            }
            // These indicate server-side config / programming errors
            AuthError::Url(_) | AuthError::State(_) => {
                tracing::error!(error = %e, "failed to build auth redirect");
                AppError::Internal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn error_responses_have_no_body() {
        for err in [
            AppError::BadRequest("x"),
            AppError::Unauthorized,
            AppError::MethodNotAllowed,
            AppError::UnsupportedMediaType,
            AppError::Internal,
        ] {
            let res = err.into_response();
            let body = axum::body::to_bytes(res.into_body(), usize::MAX)
                .await
                .unwrap();
            assert!(body.is_empty());
        }
    }

    #[test]
    fn auth_errors_map_to_statuses() {
        assert!(matches!(
            AppError::from(AuthError::MissingVerification),
            AppError::Unauthorized
        ));
        assert!(matches!(
            AppError::from(AuthError::InvalidCallback("id_token")),
            AppError::BadRequest("id_token")
        ));
        assert!(matches!(
            AppError::from(AuthError::CodeRejected("invalid_grant".to_string())),
            AppError::Unauthorized
        ));
        assert!(matches!(
            AppError::from(AuthError::ProviderUnavailable("timeout".to_string())),
            AppError::Internal
        ));
    }
}
