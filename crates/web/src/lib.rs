// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authgate web: server-rendered pages guarded by backend-issued credentials.

pub mod config;
pub mod cookies;
pub mod pages;
pub mod state;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::WebConfig;
use crate::state::AppState;

/// Build the axum `Router` with all page routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(pages::login).post(pages::submit_login))
        .route("/signout", post(pages::sign_out))
        .route("/dashboard", get(pages::dashboard))
        .route("/metrics", get(pages::metrics))
        .route("/error", get(pages::error_page))
        .route("/health", get(pages::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the page server until `shutdown` is cancelled.
pub async fn run(config: WebConfig, shutdown: CancellationToken) -> anyhow::Result<()> {
    config.validate()?;
    let addr = config.addr();
    let api_url = config.api_url.clone();
    let state = Arc::new(AppState::new(config)?);

    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, api = %api_url, "authgate-web listening");
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    Ok(())
}
