//! Environment-driven configuration

use crate::runtime::{DEFAULT_NOTE_PACING, DEFAULT_REQUEST_TIMEOUT};
use crate::session::{DEFAULT_CAPACITY, DEFAULT_SWEEP_INTERVAL, DEFAULT_TTL};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Load variables from `.env` files. Nothing already set is overridden, so the
/// process environment wins, then the nearest `.env` walking up from the
/// working directory, then `~/.env`. Returns the project file that was read.
pub fn load_env_file() -> Option<PathBuf> {
    let project = dotenv::dotenv().ok();
    if let Some(home) = std::env::var_os("HOME") {
        dotenv::from_path(PathBuf::from(home).join(".env")).ok();
    }
    project
}

#[derive(Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("invalid {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// How updates reach the bot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotMode {
    /// Long-poll `getUpdates`
    Polling,
    /// Telegram pushes updates to `url`; the HTTP server accepts them on `path`
    Webhook { url: String, path: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub mode: BotMode,
    pub weather_api_key: Option<String>,
    pub db_path: PathBuf,
    /// HTTP server port; no server when unset in polling mode
    pub http_port: Option<u16>,
    /// When set, only this chat is served
    pub admin_chat_id: Option<i64>,
    pub session_capacity: usize,
    pub session_ttl: Duration,
    pub sweep_interval: Duration,
    pub request_timeout: Duration,
    pub note_pacing: Duration,
    pub notification_hour: u32,
    pub notification_minute: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|name: &str| std::env::var(name).ok())
    }

    /// Build from any variable source. Blank values count as unset.
    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let bot_token = var("BOT_TOKEN").ok_or(ConfigError::Missing("BOT_TOKEN"))?;
        let db_path = var("GREEN_DB_PATH").map_or_else(
            || {
                let home = var("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".green-assistant").join("bot.db")
            },
            PathBuf::from,
        );

        let notification_hour = parse(&var, "WEATHER_NOTIFICATION_HOUR")?.unwrap_or(9);
        if notification_hour > 23 {
            return Err(invalid("WEATHER_NOTIFICATION_HOUR", notification_hour));
        }
        let notification_minute = parse(&var, "WEATHER_NOTIFICATION_MINUTE")?.unwrap_or(0);
        if notification_minute > 59 {
            return Err(invalid("WEATHER_NOTIFICATION_MINUTE", notification_minute));
        }

        let session_capacity = parse(&var, "SESSION_CAPACITY")?.unwrap_or(DEFAULT_CAPACITY);
        if session_capacity == 0 {
            return Err(invalid("SESSION_CAPACITY", session_capacity));
        }

        let sweep_interval = parse(&var, "SESSION_SWEEP_SECS")?
            .map_or(DEFAULT_SWEEP_INTERVAL, Duration::from_secs);
        if sweep_interval.is_zero() {
            return Err(invalid("SESSION_SWEEP_SECS", 0));
        }

        let http_port = parse(&var, "HTTP_PORT")?;
        let mode = bot_mode(&var, http_port)?;

        Ok(Self {
            bot_token,
            mode,
            weather_api_key: var("OPENWEATHER_API_KEY"),
            db_path,
            http_port,
            admin_chat_id: parse(&var, "ADMIN_CHAT_ID")?,
            session_capacity,
            session_ttl: parse(&var, "SESSION_TTL_SECS")?
                .map_or(DEFAULT_TTL, Duration::from_secs),
            sweep_interval,
            request_timeout: parse(&var, "REQUEST_TIMEOUT_SECS")?
                .map_or(DEFAULT_REQUEST_TIMEOUT, Duration::from_secs),
            note_pacing: parse(&var, "NOTE_PACING_MS")?
                .map_or(DEFAULT_NOTE_PACING, Duration::from_millis),
            notification_hour,
            notification_minute,
        })
    }
}

/// `BOT_MODE` picks the mode; without it production (`APP_ENV=production`)
/// runs on a webhook and everything else polls
fn bot_mode(
    var: &impl Fn(&str) -> Option<String>,
    http_port: Option<u16>,
) -> Result<BotMode, ConfigError> {
    let webhook = match var("BOT_MODE").map(|mode| mode.trim().to_lowercase()) {
        Some(mode) if mode == "webhook" => true,
        Some(mode) if mode == "polling" => false,
        Some(mode) => return Err(invalid("BOT_MODE", mode)),
        None => var("APP_ENV").is_some_and(|env| env.trim() == "production"),
    };
    if !webhook {
        return Ok(BotMode::Polling);
    }

    let url = var("BOT_WEBHOOK_URL").ok_or(ConfigError::Missing("BOT_WEBHOOK_URL"))?;
    if http_port.is_none() {
        return Err(ConfigError::Missing("HTTP_PORT"));
    }
    let path = reqwest::Url::parse(url.trim())
        .map_err(|_| invalid("BOT_WEBHOOK_URL", &url))?
        .path()
        .to_string();
    if matches!(path.as_str(), "/health" | "/stats") {
        return Err(invalid("BOT_WEBHOOK_URL", url));
    }
    Ok(BotMode::Webhook {
        url: url.trim().to_string(),
        path,
    })
}

fn parse<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    var(name)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { name, value })
        })
        .transpose()
}

fn invalid(name: &'static str, value: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.to_string(),
    }
}
