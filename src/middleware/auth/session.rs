//! session 検証 → Claims を extensions に入れる
//!
//! - 検証そのものは `AuthGate::authenticate` に任せる
//! - 未認証の場合:
//!   - 画面遷移: login flow へ redirect (戻り先は元の URL)
//!   - XHR: 401 (redirect を fetch に返しても意味がないため)
//! - 未認証 request は backend には一切届かない

use axum::{
    Router,
    body::Body,
    extract::{OriginalUri, State},
    http::Request,
    middleware::{self, Next},
    response::{IntoResponse, Response},
};

use crate::api::extractors::is_xhr;
use crate::error::AppError;
use crate::services::auth::LoginOptions;
use crate::state::AppState;

/// 認証必須の route 群に session 検証を掛ける。
///
/// `layer` なので router の fallback にも適用される。
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router.layer(middleware::from_fn_with_state(state, session_middleware))
}

async fn session_middleware(
    State(state): State<AppState>,
    OriginalUri(original_uri): OriginalUri,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let claims = match state.auth.authenticate(req.headers()).await {
        Ok(claims) => claims,
        Err(err) => {
            tracing::debug!(error = %err, path = %original_uri.path(), "unauthenticated request");

            if is_xhr(req.headers()) {
                return Err(AppError::Unauthorized);
            }

            let return_to = original_uri
                .path_and_query()
                .map(|pq| pq.as_str())
                .unwrap_or("/")
                .to_string();
            let redirect = state.auth.login(LoginOptions {
                return_to,
                signup: false,
            })
            .await?;
            return Ok(redirect.into_response());
        }
    };

    // middleware → extractor への受け渡し
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}
