/*
 * Responsibility
 * - URL 構造を定義
 * - 公開: /health, /login, /sign-up, /logout, /callback
 * - 認証必須: GET /_session (session 書き換え) とそれ以外すべて (中継)
 *   - /_session/ や %5Fsession などの別表記は relay 側で検出して同じ書き換えを通す
 * - routing は「特別な path 1 つ + それ以外」の 2 択だけ。routing table にはしない
 */
use axum::{
    Router,
    routing::get,
};

use crate::api::handlers::{
    auth::{callback, login, logout, sign_up},
    health::health,
    relay::relay,
    session::get_session,
};
use crate::middleware;
use crate::services::auth::provider::CALLBACK_PATH;
use crate::services::session::{SESSION_PATH, SESSION_PATH_SLASH};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    // PUT/POST/DELETE on the session path are plain relays.
    let proxied = Router::new()
        .route(SESSION_PATH, get(get_session).fallback(relay))
        .route(SESSION_PATH_SLASH, get(get_session).fallback(relay))
        .fallback(relay);
    let proxied: Router = middleware::auth::session::apply(proxied, state.clone()).with_state(state);

    Router::new()
        .route("/health", get(health))
        .route("/login/{page}", get(login))
        .route("/login/{page}/{section}", get(login))
        .route("/sign-up/{page}", get(sign_up))
        .route("/sign-up/{page}/{section}", get(sign_up))
        .route("/logout/{page}", get(logout))
        .route("/logout/{page}/{section}", get(logout))
        .route(CALLBACK_PATH, get(callback))
        .fallback_service(proxied)
}
