/*
 * Responsibility
 * - `/_session` 以外の全 path / method を backend にそのまま中継する
 *   (backend 側で session と解釈される GET は session handler に回す)
 * - response は content-type / content-length だけを引き継ぎ、body は byte 単位でそのまま返す
 * - 画面遷移の GET にだけ immutable な cache header を付ける (XHR には付けない)
 */
use axum::{
    body::{Body, Bytes},
    extract::{OriginalUri, State},
    http::{HeaderMap, HeaderValue, Method, header},
    response::Response,
};
use serde_json::Value;

use crate::api::extractors::{ClaimsExtractor, Xhr};
use crate::api::handlers::session::augmented_session;
use crate::error::AppError;
use crate::services::backend::{RelayRequest, RelayResponse};
use crate::services::session::is_session_path;
use crate::state::AppState;

pub const IMMUTABLE_CACHE_CONTROL: &str = "public, max-age=10800, immutable";

pub async fn relay(
    State(state): State<AppState>,
    ClaimsExtractor(claims): ClaimsExtractor,
    Xhr(xhr): Xhr,
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/")
        .to_string();

    if method == Method::GET && is_session_path(uri.path()) {
        return augmented_session(&state, &claims, path).await;
    }

    let xhr_marker = if xhr { "*" } else { "" };
    tracing::info!(
        method = %method,
        xhr = xhr_marker,
        path = %path,
        "relay"
    );

    let request = match method {
        Method::GET | Method::DELETE => RelayRequest::new(method.clone(), path),
        Method::PUT | Method::POST => {
            RelayRequest::new(method.clone(), path).with_json(outbound_json(&headers, &body)?)
        }
        _ => return Err(AppError::MethodNotAllowed),
    };

    let upstream = state.backend.relay(request).await?;

    let cacheable = method == Method::GET && !xhr;
    Ok(passthrough(upstream, cacheable))
}

/// The caller's body re-encoded for the backend.
///
/// Only JSON is supported; an empty body is sent as `{}`.
fn outbound_json(headers: &HeaderMap, body: &Bytes) -> Result<Value, AppError> {
    if body.is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    if !is_json_content_type(headers) {
        return Err(AppError::UnsupportedMediaType);
    }
    serde_json::from_slice(body).map_err(|_| AppError::BadRequest("invalid json body"))
}

fn is_json_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|mime| mime.trim().to_ascii_lowercase())
        .is_some_and(|mime| mime == "application/json" || mime.ends_with("+json"))
}

fn passthrough(upstream: RelayResponse, cacheable: bool) -> Response {
    let mut response = Response::new(Body::from(upstream.body));
    *response.status_mut() = upstream.status;

    let headers = response.headers_mut();
    for name in [header::CONTENT_LENGTH, header::CONTENT_TYPE] {
        if let Some(value) = upstream.headers.get(&name) {
            headers.insert(name, value.clone());
        }
    }
    if cacheable {
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static(IMMUTABLE_CACHE_CONTROL),
        );
    }

    response
}
