use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::{
    error::EnrichError,
    model::{Coordinate, ElevationSample},
};

use super::{Provider, ProviderId, get_json};

/// Ground elevation from an Open-Elevation compatible service. No API key.
#[derive(Debug, Clone)]
pub struct OpenElevationProvider {
    base_url: String,
    http: Client,
}

impl OpenElevationProvider {
    pub fn new(http: Client) -> Self {
        Self::with_base_url(ProviderId::OpenElevation.default_base_url().to_string(), http)
    }

    pub fn with_base_url(base_url: String, http: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OeResult {
    elevation: f64,
}

#[derive(Debug, Deserialize)]
struct OeResponse {
    results: Vec<OeResult>,
}

#[async_trait]
impl Provider for OpenElevationProvider {
    type Input = Coordinate;
    type Output = ElevationSample;

    fn name(&self) -> &'static str {
        ProviderId::OpenElevation.as_str()
    }

    #[instrument(skip_all, fields(at = %at))]
    async fn fetch(&self, at: &Coordinate) -> Result<ElevationSample, EnrichError> {
        at.validate()?;

        // The endpoint is batched; a single point is always submitted.
        let url = format!("{}/lookup", self.base_url);
        let request = self.http.get(url).query(&[("locations", at.to_string())]);

        let parsed: OeResponse = get_json(request, "Open-Elevation")
            .await
            .map_err(|e| EnrichError::from_transport(self.name(), e))?;

        let sample = parsed.results.first().ok_or_else(|| {
            EnrichError::provider(self.name(), "response contained no elevation results")
        })?;

        debug!(elevation = sample.elevation, "Open-Elevation responded");

        Ok(ElevationSample { elevation_m: sample.elevation })
    }
}
