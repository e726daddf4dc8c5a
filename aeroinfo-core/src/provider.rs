use anyhow::{Context, anyhow};
use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use std::fmt::Debug;

use crate::{
    error::EnrichError,
    model::{Coordinate, ElevationSample, PlaceQuery, ResolvedLocation, WeatherSnapshot},
};

pub mod open_elevation;
pub mod opencage;
pub mod openweather;

pub use open_elevation::OpenElevationProvider;
pub use opencage::OpenCageProvider;
pub use openweather::OpenWeatherProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    OpenCage,
    OpenWeather,
    OpenElevation,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenCage => "opencage",
            ProviderId::OpenWeather => "openweather",
            ProviderId::OpenElevation => "openelevation",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::OpenCage, ProviderId::OpenWeather, ProviderId::OpenElevation]
    }

    pub fn requires_api_key(&self) -> bool {
        !matches!(self, ProviderId::OpenElevation)
    }

    /// Environment variable holding the API key, if the provider takes one.
    pub fn env_var(&self) -> Option<&'static str> {
        match self {
            ProviderId::OpenCage => Some("AEROINFO_OPENCAGE_API_KEY"),
            ProviderId::OpenWeather => Some("AEROINFO_OPENWEATHER_API_KEY"),
            ProviderId::OpenElevation => None,
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderId::OpenCage => "https://api.opencagedata.com/geocode/v1",
            ProviderId::OpenWeather => "https://api.openweathermap.org/data/2.5",
            ProviderId::OpenElevation => "https://api.open-elevation.com/api/v1",
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "opencage" => Ok(ProviderId::OpenCage),
            "openweather" => Ok(ProviderId::OpenWeather),
            "openelevation" => Ok(ProviderId::OpenElevation),
            _ => Err(anyhow!(
                "Unknown provider '{value}'. \
                 Supported providers: opencage, openweather, openelevation."
            )),
        }
    }
}

/// One request/response lookup against an external data source.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    type Input: Sync;
    type Output: Send;

    /// Short provider name used in errors and logs.
    fn name(&self) -> &'static str;

    async fn fetch(&self, input: &Self::Input) -> Result<Self::Output, EnrichError>;
}

pub type GeoProvider = dyn Provider<Input = PlaceQuery, Output = ResolvedLocation>;
pub type WeatherProvider = dyn Provider<Input = Coordinate, Output = WeatherSnapshot>;
pub type ElevationProvider = dyn Provider<Input = Coordinate, Output = ElevationSample>;

/// Send `request`, require a 2xx status and decode the body as JSON.
///
/// Request URLs carry API keys, so they are stripped from transport errors.
pub(crate) async fn get_json<T: DeserializeOwned>(
    request: RequestBuilder,
    label: &str,
) -> anyhow::Result<T> {
    let res = request
        .send()
        .await
        .map_err(reqwest::Error::without_url)
        .with_context(|| format!("Failed to send request to {label}"))?;

    let status = res.status();
    let body = res
        .text()
        .await
        .map_err(reqwest::Error::without_url)
        .with_context(|| format!("Failed to read {label} response body"))?;

    if !status.is_success() {
        return Err(anyhow!(
            "{label} request failed with status {status}: {}",
            truncate_body(&body)
        ));
    }

    serde_json::from_str(&body).with_context(|| format!("Failed to parse {label} JSON"))
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
