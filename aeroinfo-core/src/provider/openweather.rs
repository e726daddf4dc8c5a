use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::{
    error::EnrichError,
    model::{Coordinate, WeatherSnapshot},
};

use super::{Provider, ProviderId, get_json};

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String, http: Client) -> Self {
        Self::with_base_url(api_key, ProviderId::OpenWeather.default_base_url().to_string(), http)
    }

    pub fn with_base_url(api_key: String, base_url: String, http: Client) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    async fn fetch_current(&self, at: Coordinate) -> anyhow::Result<OwCurrentResponse> {
        let url = format!("{}/weather", self.base_url);
        let request = self.http.get(url).query(&[
            ("lat", at.latitude.to_string().as_str()),
            ("lon", at.longitude.to_string().as_str()),
            ("units", "metric"),
            ("appid", self.api_key.as_str()),
        ]);

        get_json(request, "OpenWeather current").await
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    dt: Option<i64>,
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
}

impl From<OwCurrentResponse> for WeatherSnapshot {
    fn from(parsed: OwCurrentResponse) -> Self {
        let description = parsed
            .weather
            .into_iter()
            .next()
            .map(|w| w.description)
            .unwrap_or_else(|| "Unknown".to_string());

        WeatherSnapshot {
            temperature_c: parsed.main.temp,
            humidity_pct: parsed.main.humidity,
            description,
            observed_at: parsed.dt.and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
        }
    }
}

#[async_trait]
impl Provider for OpenWeatherProvider {
    type Input = Coordinate;
    type Output = WeatherSnapshot;

    fn name(&self) -> &'static str {
        ProviderId::OpenWeather.as_str()
    }

    #[instrument(skip_all, fields(at = %at))]
    async fn fetch(&self, at: &Coordinate) -> Result<WeatherSnapshot, EnrichError> {
        at.validate()?;

        let parsed = self
            .fetch_current(*at)
            .await
            .map_err(|e| EnrichError::from_transport(self.name(), e))?;

        debug!(temp = parsed.main.temp, humidity = parsed.main.humidity, "OpenWeather responded");

        Ok(parsed.into())
    }
}
