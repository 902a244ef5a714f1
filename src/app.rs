/*
 * Responsibility
 * - tracing / panic hook の初期化
 * - Config読み込み → 依存生成 (BackendClient, AuthGate) → Router 組み立て
 * - HTTP middleware の適用
 * - axum::serve() で起動
 */
use std::time::Duration;
use std::{panic, process};

use anyhow::{Context, Result};
use axum::Router;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::services::auth::build_auth_gate;
use crate::services::backend::BackendClient;
use crate::state::AppState;
use crate::{api, middleware};

fn init_tracing() {
    // RUST_LOG が優先。例:
    // RUST_LOG=info,couch_gate=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        tracing::error!(?info, "panic");

        // development では即落とす。production は default hook に任せて serve を続ける
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env().context("loading configuration")?;

    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting gate in {:?} mode on {}",
        config.app_env,
        config.addr
    );
    tracing::debug!(?config, "configuration");

    let state = build_state(&config).await?;
    let app = build_router(state, middleware::http::request_timeout(&config));

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("binding {}", config.addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn build_state(config: &Config) -> Result<AppState> {
    // process 単位の依存はここで作って AppState に注入する
    let backend = BackendClient::new(&config.backend).context("building backend client")?;
    // provider discovery: 起動時に issuer に届かなければ失敗させる
    let auth = build_auth_gate(&config.oidc)
        .await
        .context("discovering identity provider")?;

    Ok(AppState::new(backend, config.trust.clone(), auth))
}

pub(crate) fn build_router(state: AppState, request_timeout: Duration) -> Router {
    let router = api::routes(state.clone()).with_state(state);

    middleware::http::apply(router, request_timeout)
}
