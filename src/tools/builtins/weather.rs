//! `WeatherLookup`: current conditions from an OpenWeatherMap-style API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Number;

use crate::config::WeatherConfig;
use crate::tools::{Tool, ToolMeta};

const UNAVAILABLE: &str =
    "Weather lookup is currently unavailable. Please configure a weather API key.";

#[derive(Debug, Deserialize)]
struct WeatherResponse {
    weather: Vec<Condition>,
    main: MainReadings,
    wind: Wind,
}

#[derive(Debug, Deserialize)]
struct Condition {
    description: String,
}

// Readings keep the number as the API wrote it, so `15.0` stays `15.0`.
#[derive(Debug, Deserialize)]
struct MainReadings {
    temp: Number,
    humidity: Number,
}

#[derive(Debug, Deserialize)]
struct Wind {
    speed: Number,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// One-shot weather client.
pub struct WeatherTool {
    endpoint: String,
    api_key: Option<String>,
    client: Client,
}

impl WeatherTool {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "weather HTTP client fell back to defaults");
                Client::new()
            });
        Self {
            endpoint: endpoint.into(),
            api_key,
            client,
        }
    }

    pub fn from_config(cfg: &WeatherConfig) -> Self {
        Self::new(cfg.endpoint.clone(), cfg.api_key.clone())
    }

    /// Current weather for `location`, formatted for the conversation.
    pub async fn get_weather(&self, location: &str) -> String {
        let Some(key) = self.api_key.as_deref() else {
            return UNAVAILABLE.to_string();
        };
        let location = location.trim();
        match self.fetch(location, key).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(location, error = %e, "weather lookup failed");
                format!("Failed to get weather information: {e:#}")
            }
        }
    }

    async fn fetch(&self, location: &str, key: &str) -> anyhow::Result<String> {
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[("q", location), ("appid", key), ("units", "metric")])
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or_else(|| "Unknown error".to_string());
            tracing::debug!(%status, %message, "weather API rejected request");
            return Ok(format!("Error getting weather: {message}"));
        }

        let data: WeatherResponse = serde_json::from_str(&body)?;
        let condition = data
            .weather
            .first()
            .map(|c| c.description.as_str())
            .ok_or_else(|| anyhow::anyhow!("response has no weather conditions"))?;
        Ok(format!(
            "Weather in {location}:\n\
             - Condition: {condition}\n\
             - Temperature: {}°C\n\
             - Humidity: {}%\n\
             - Wind Speed: {} m/s",
            data.main.temp, data.main.humidity, data.wind.speed
        ))
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn meta(&self) -> ToolMeta {
        ToolMeta {
            name: "WeatherLookup".into(),
            description: "Useful for when you need to find weather information for a location. \
                          Input should be a city name."
                .into(),
        }
    }

    async fn invoke(&self, input: &str) -> String {
        self.get_weather(input).await
    }
}
