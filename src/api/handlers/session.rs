/*
 * Responsibility
 * - GET /_session: backend の session を取得し、claims に応じて userCtx を書き換えて返す
 *   (`/_session/` や percent-encode された表記も relay からここに来る)
 * - content-length は書き換え後の body から計算し直す (upstream の値は使わない)
 */
use axum::{
    body::Body,
    extract::{OriginalUri, State},
    http::{HeaderValue, Method, header},
    response::Response,
};

use crate::api::extractors::ClaimsExtractor;
use crate::error::AppError;
use crate::services::auth::Claims;
use crate::services::backend::RelayRequest;
use crate::services::session;
use crate::state::AppState;

pub async fn get_session(
    State(state): State<AppState>,
    ClaimsExtractor(claims): ClaimsExtractor,
    OriginalUri(uri): OriginalUri,
) -> Result<Response, AppError> {
    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or(session::SESSION_PATH)
        .to_string();

    augmented_session(&state, &claims, path).await
}

pub(crate) async fn augmented_session(
    state: &AppState,
    claims: &Claims,
    path: String,
) -> Result<Response, AppError> {
    tracing::info!(path = %path, "session");

    let upstream = state
        .backend
        .relay(RelayRequest::new(Method::GET, path))
        .await?;

    let body = session::augment(&upstream.body, claims, &state.trust)?;

    tracing::debug!(session = %String::from_utf8_lossy(&body), "augmented session");

    let content_length = HeaderValue::from(body.len());
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = upstream.status;

    let headers = response.headers_mut();
    if let Some(content_type) = upstream.headers.get(header::CONTENT_TYPE) {
        headers.insert(header::CONTENT_TYPE, content_type.clone());
    }
    headers.insert(header::CONTENT_LENGTH, content_length);

    Ok(response)
}
