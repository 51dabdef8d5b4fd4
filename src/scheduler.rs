//! Daily weather notifications
//!
//! Once a day at the configured local time, every user with a city and the
//! preference enabled gets the current forecast.

use crate::db::Database;
use crate::runtime::{Transport, WeatherClient};
use crate::session::SessionStore;
use crate::state_machine::Keyboard;
use chrono::{DateTime, Days, TimeZone};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Next occurrence of `hour:minute` strictly after `now`, in `now`'s zone.
/// `None` if `hour:minute` is not a valid wall-clock time.
pub fn next_run<Tz: TimeZone>(now: &DateTime<Tz>, hour: u32, minute: u32) -> Option<DateTime<Tz>> {
    let tz = now.timezone();
    let today = now.date_naive();
    [today, today.checked_add_days(Days::new(1))?, today.checked_add_days(Days::new(2))?]
        .into_iter()
        .filter_map(|day| day.and_hms_opt(hour, minute, 0))
        .filter_map(|at| tz.from_local_datetime(&at).earliest())
        .find(|at| at > now)
}

pub struct WeatherScheduler<S, W, T> {
    db: Database,
    store: Arc<S>,
    weather: W,
    transport: T,
    hour: u32,
    minute: u32,
}

impl<S: SessionStore, W: WeatherClient, T: Transport> WeatherScheduler<S, W, T> {
    pub fn new(
        db: Database,
        store: Arc<S>,
        weather: W,
        transport: T,
        hour: u32,
        minute: u32,
    ) -> Self {
        Self {
            db,
            store,
            weather,
            transport,
            hour,
            minute,
        }
    }

    /// Sleep until each scheduled time and notify, until `cancel` fires
    pub async fn run(self, cancel: CancellationToken) {
        loop {
            let now = chrono::Local::now();
            let Some(next) = next_run(&now, self.hour, self.minute) else {
                tracing::error!(hour = self.hour, minute = self.minute, "No valid notification time, scheduler stopped");
                return;
            };
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            tracing::info!(next = %next, wait_secs = wait.as_secs(), "Next weather notification scheduled");

            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(wait) => {}
            }

            let sent = self.notify_all().await;
            tracing::info!(sent, "Weather notifications sent");
        }

        tracing::info!("Weather scheduler stopped");
    }

    /// Send today's forecast to every subscribed user. Returns how many were delivered.
    pub async fn notify_all(&self) -> usize {
        let users = match self.db.users_with_weather_notifications() {
            Ok(users) => users,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load notification subscribers");
                return 0;
            }
        };

        let mut sent = 0;
        for user in users {
            let forecast = match self.weather.forecast(&user.city).await {
                Ok(forecast) => forecast,
                Err(e) => {
                    tracing::error!(chat_id = user.chat_id, city = %user.city, error = %e, "Weather lookup failed");
                    continue;
                }
            };

            let text = format!("🌅 Good morning! Here is today's forecast:\n\n{forecast}");
            match self.transport.send_text(user.chat_id, &text, &Keyboard::Main).await {
                Ok(message) => {
                    self.store.record_outbound(user.chat_id, message);
                    sent += 1;
                }
                Err(e) => {
                    tracing::error!(chat_id = user.chat_id, error = %e, "Failed to send weather notification");
                }
            }
        }
        sent
    }
}
