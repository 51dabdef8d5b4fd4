//! Green Assistant - Telegram bot for notes, weather and profile management
//!
//! Each chat is driven by a menu-based conversation state machine whose
//! ephemeral context lives in a bounded, expiring session store.

mod api;
mod config;
mod db;
mod runtime;
mod scheduler;
mod session;
mod state_machine;
mod telegram;
mod weather;

use config::{BotMode, Config};
use db::Database;
use runtime::{DatabasePersistence, DispatchSettings, ProductionDispatcher};
use scheduler::WeatherScheduler;
use session::{MemorySessionStore, Reaper};
use std::sync::Arc;
use telegram::TelegramClient;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use weather::OpenWeatherClient;

/// Inbound messages waiting for the dispatcher
const INBOUND_QUEUE: usize = 256;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env before logging so it can set RUST_LOG
    let env_file = config::load_env_file();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "green_assistant=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    match env_file {
        Some(path) => tracing::info!(path = %path.display(), "Loaded .env file"),
        None => tracing::debug!("No .env file, using process environment"),
    }
    let config = Config::from_env()?;

    // Ensure database directory exists
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %config.db_path.display(), "Opening database");
    let db = Database::open(&config.db_path)?;

    let weather = OpenWeatherClient::new(config.weather_api_key.clone(), config.request_timeout)?;
    if !weather.is_configured() {
        tracing::warn!("OPENWEATHER_API_KEY not set, weather requests will fail");
    }
    let telegram = TelegramClient::new(config.bot_token.clone(), config.request_timeout)?;

    let store = Arc::new(MemorySessionStore::new(
        config.session_capacity,
        config.session_ttl,
    ));
    let reaper = Reaper::spawn(&store, config.sweep_interval);

    let cancel = CancellationToken::new();
    let mut tasks = tokio::task::JoinSet::new();

    let dispatcher = ProductionDispatcher::new(
        store.clone(),
        DatabasePersistence::new(db.clone()),
        weather.clone(),
        telegram.clone(),
    )
    .with_settings(DispatchSettings {
        request_timeout: config.request_timeout,
        note_pacing: config.note_pacing,
    });
    let (tx, rx) = tokio::sync::mpsc::channel(INBOUND_QUEUE);
    tasks.spawn(dispatcher.run(rx, cancel.clone()));

    let admin = config.admin_chat_id;
    let mut state = api::AppState::new(store.clone());
    match &config.mode {
        BotMode::Polling => {
            if let Err(e) = telegram.delete_webhook(true).await {
                tracing::warn!(error = %e, "Failed to delete webhook");
            }
            let poller = telegram.clone();
            let poll_cancel = cancel.clone();
            tasks.spawn(async move { poller.poll(tx, admin, poll_cancel).await });
        }
        BotMode::Webhook { url, path } => {
            telegram.set_webhook(&url).await?;
            state = state.with_webhook(api::Webhook {
                path: path.clone(),
                inbound: tx,
                admin,
            });
        }
    }

    let scheduler = WeatherScheduler::new(
        db,
        store.clone(),
        weather,
        telegram.clone(),
        config.notification_hour,
        config.notification_minute,
    );
    tasks.spawn(scheduler.run(cancel.clone()));

    // Webhook mode guarantees a port
    if let Some(port) = config.http_port {
        let server_cancel = cancel.clone();
        tasks.spawn(async move {
            if let Err(e) = api::serve(port, state, server_cancel).await {
                tracing::error!(error = %e, "HTTP server failed");
            }
        });
    }

    tracing::info!(
        mode = ?config.mode,
        admin_only = config.admin_chat_id.is_some(),
        capacity = config.session_capacity,
        "Green Assistant started"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    cancel.cancel();
    if matches!(config.mode, BotMode::Webhook { .. }) {
        if let Err(e) = telegram.delete_webhook(true).await {
            tracing::warn!(error = %e, "Failed to delete webhook");
        }
    }
    while tasks.join_next().await.is_some() {}
    reaper.shutdown().await;

    Ok(())
}
