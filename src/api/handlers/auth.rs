/*
 * Responsibility
 * - /login, /sign-up, /logout, /callback (認証不要の route)
 * - 戻り先は `/{page}` または `/{page}/{section}` に限定する
 * - 実際の処理は AuthGate に委譲し、ここでは redirect を返すだけ
 */
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
};
use serde::Deserialize;

use crate::error::AppError;
use crate::services::auth::gate::return_path;
use crate::services::auth::{AuthRedirect, CallbackParams, LoginOptions};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ReturnTarget {
    page: String,
    #[serde(default)]
    section: Option<String>,
}

pub async fn login(
    State(state): State<AppState>,
    Path(target): Path<ReturnTarget>,
) -> Result<AuthRedirect, AppError> {
    let redirect = state.auth.login(LoginOptions {
        return_to: return_path(&target.page, target.section.as_deref()),
        signup: false,
    })
    .await?;
    Ok(redirect)
}

pub async fn sign_up(
    State(state): State<AppState>,
    Path(target): Path<ReturnTarget>,
) -> Result<AuthRedirect, AppError> {
    let redirect = state.auth.login(LoginOptions {
        return_to: return_path(&target.page, target.section.as_deref()),
        signup: true,
    })
    .await?;
    Ok(redirect)
}

// section is accepted but ignored: logout always returns to the page itself
pub async fn logout(
    State(state): State<AppState>,
    Path(target): Path<ReturnTarget>,
) -> Result<AuthRedirect, AppError> {
    let redirect = state.auth.logout(&return_path(&target.page, None))?;
    Ok(redirect)
}

pub async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Result<AuthRedirect, AppError> {
    let redirect = state.auth.complete_login(params, &headers).await?;
    Ok(redirect)
}
