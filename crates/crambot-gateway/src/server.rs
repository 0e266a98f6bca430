// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Router assembly and the HTTP listener.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use crambot_agent::Bots;
use crambot_broadcast::BroadcastQueue;
use crambot_config::model::ServerConfig;
use crambot_core::{BackgroundTasks, CrambotError, StorageAdapter};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::auth::{AuthConfig, operator_auth};
use crate::{handlers, webhook};

/// State behind the unauthenticated health and metrics endpoints.
#[derive(Clone)]
pub struct HealthState {
    pub start_time: Instant,
    /// Renders Prometheus text. `None` when no recorder is installed.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

/// Shared state for every handler.
#[derive(Clone)]
pub struct GatewayState {
    pub bots: Bots,
    pub tasks: BackgroundTasks,
    pub store: Arc<dyn StorageAdapter>,
    pub broadcast: BroadcastQueue,
    /// Expected `X-Telegram-Bot-Api-Secret-Token`.
    pub webhook_secret: Option<String>,
    pub auth: AuthConfig,
    pub health: HealthState,
}

/// Builds the full route table:
/// - `POST /webhook/telegram`, `POST /webhook/telegram-parent`
/// - `GET /health`, `GET /metrics`
/// - `/api/*` behind the operator bearer token
pub fn router(state: GatewayState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .route("/metrics", get(handlers::get_metrics))
        .route("/webhook/telegram", post(webhook::admin_webhook))
        .route("/webhook/telegram-parent", post(webhook::parent_webhook))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route(
            "/api/broadcast",
            post(handlers::post_broadcast).get(handlers::list_broadcasts),
        )
        .route("/api/broadcast/{id}", get(handlers::get_broadcast))
        .route("/api/bind-codes", post(handlers::post_bind_code))
        .route_layer(axum_middleware::from_fn_with_state(
            state.auth.clone(),
            operator_auth,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
}

/// Binds `host:port` and serves until `shutdown` is cancelled.
///
/// In-flight requests finish before this returns; webhook work they spawned
/// is left on the task tracker for the caller to drain.
pub async fn serve(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), CrambotError> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| CrambotError::Transport {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!(%addr, "gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| CrambotError::Transport {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway stopped");
    Ok(())
}
