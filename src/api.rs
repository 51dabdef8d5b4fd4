//! HTTP health and statistics endpoint, plus the Telegram webhook receiver

use crate::session::{ChatId, SessionStore, StoreStats};
use crate::state_machine::Inbound;
use crate::telegram::Update;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SessionStore>,
    webhook: Option<Webhook>,
    started: Instant,
}

/// Where pushed updates go: the dispatcher queue the poller would feed
#[derive(Clone)]
pub struct Webhook {
    pub path: String,
    pub inbound: mpsc::Sender<Inbound>,
    pub admin: Option<ChatId>,
}

impl AppState {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            webhook: None,
            started: Instant::now(),
        }
    }

    pub fn with_webhook(mut self, webhook: Webhook) -> Self {
        self.webhook = Some(webhook);
        self
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_secs: u64,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats));
    if let Some(webhook) = &state.webhook {
        router = router.route(&webhook.path, post(receive_update));
    }
    router.layer(TraceLayer::new_for_http()).with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.started.elapsed().as_secs(),
    })
}

async fn stats(State(state): State<AppState>) -> Json<StoreStats> {
    Json(state.store.stats())
}

/// Telegram retries anything but a 2xx, so only a closed queue is refused
async fn receive_update(State(state): State<AppState>, Json(update): Json<Update>) -> StatusCode {
    let Some(webhook) = &state.webhook else {
        return StatusCode::NOT_FOUND;
    };
    let update_id = update.update_id;
    let Some(inbound) = update.accept(webhook.admin) else {
        return StatusCode::OK;
    };
    if webhook.inbound.send(inbound).await.is_err() {
        tracing::warn!(update_id, "Dispatcher queue closed, refusing update");
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    StatusCode::OK
}

/// Serve until `cancel` fires
pub async fn serve(port: u16, state: AppState, cancel: CancellationToken) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "HTTP server listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}
