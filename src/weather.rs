//! Current-weather client and forecast formatting

use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("Weather API key is not configured")]
    NotConfigured,
    #[error("City not found: {0}")]
    CityNotFound(String),
    #[error("Weather request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Weather API returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Failed to parse weather response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Current conditions as returned by the API
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WeatherReport {
    pub name: String,
    pub main: Conditions,
    #[serde(default)]
    pub weather: Vec<Summary>,
    #[serde(default)]
    pub wind: Wind,
    #[serde(default)]
    pub visibility: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Conditions {
    pub temp: f64,
    pub feels_like: f64,
    pub pressure: i64,
    pub humidity: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Summary {
    pub main: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Wind {
    pub speed: f64,
}

impl WeatherReport {
    pub fn emoji(&self) -> &'static str {
        match self.weather.first().map(|w| w.main.as_str()) {
            Some("Clear") => "☀️",
            Some("Clouds") => "☁️",
            Some("Rain") => "🌧️",
            Some("Drizzle") => "🌦️",
            Some("Thunderstorm") => "⛈️",
            Some("Snow") => "❄️",
            Some("Mist" | "Fog") => "🌫️",
            _ => "🌤️",
        }
    }

    fn description(&self) -> String {
        let Some(summary) = self.weather.first() else {
            return "No data".to_string();
        };
        summary
            .description
            .split_whitespace()
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for WeatherReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Weather in {}:\n\n\
             🌡️ Temperature: {:.1}°C\n\
             💨 Feels like: {:.1}°C\n\
             📊 Pressure: {} hPa\n\
             💧 Humidity: {}%\n\
             🌬️ Wind: {:.1} m/s\n\
             👁️ Visibility: {} km\n\n\
             {}",
            self.emoji(),
            self.name,
            self.main.temp,
            self.main.feels_like,
            self.main.pressure,
            self.main.humidity,
            self.wind.speed,
            self.visibility / 1000,
            self.description()
        )
    }
}

/// Client for the current-weather endpoint
#[derive(Clone)]
pub struct OpenWeatherClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl OpenWeatherClient {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self, WeatherError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Current conditions for `city`, in metric units
    pub async fn current(&self, city: &str) -> Result<WeatherReport, WeatherError> {
        let api_key = self.api_key.as_deref().ok_or(WeatherError::NotConfigured)?;
        let city = city.trim();
        if city.chars().count() < 2 {
            return Err(WeatherError::CityNotFound(city.to_string()));
        }

        let response = self
            .client
            .get(&self.base_url)
            .query(&[("q", city), ("appid", api_key), ("units", "metric"), ("lang", "en")])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(WeatherError::CityNotFound(city.to_string()));
        }
        if !status.is_success() {
            return Err(WeatherError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let report = parse_report(&body)?;
        tracing::debug!(city = %city, temp = report.main.temp, "Weather fetched");
        Ok(report)
    }
}

pub fn parse_report(body: &str) -> Result<WeatherReport, WeatherError> {
    Ok(serde_json::from_str(body)?)
}
