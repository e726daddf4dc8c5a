use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, instrument};

use crate::{
    error::EnrichError,
    model::{Coordinate, PlaceQuery, ResolvedLocation},
};

use super::{Provider, ProviderId, get_json};

/// Forward geocoding through the OpenCage API.
#[derive(Debug, Clone)]
pub struct OpenCageProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenCageProvider {
    pub fn new(api_key: String, http: Client) -> Self {
        Self::with_base_url(api_key, ProviderId::OpenCage.default_base_url().to_string(), http)
    }

    pub fn with_base_url(api_key: String, base_url: String, http: Client) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    async fn fetch_candidates(&self, query: &PlaceQuery) -> anyhow::Result<OcResponse> {
        let url = format!("{}/json", self.base_url);
        let request = self.http.get(url).query(&[
            ("q", query.as_str()),
            ("key", self.api_key.as_str()),
            ("limit", "1"),
        ]);

        get_json(request, "OpenCage").await
    }
}

#[derive(Debug, Deserialize)]
struct OcGeometry {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct OcTimezone {
    name: Option<String>,
    offset_string: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OcAnnotations {
    timezone: Option<OcTimezone>,
}

#[derive(Debug, Deserialize)]
struct OcResult {
    geometry: OcGeometry,
    formatted: String,
    #[serde(default)]
    components: HashMap<String, serde_json::Value>,
    #[serde(default)]
    annotations: OcAnnotations,
}

#[derive(Debug, Deserialize)]
struct OcResponse {
    results: Vec<OcResult>,
}

impl From<OcResult> for ResolvedLocation {
    fn from(result: OcResult) -> Self {
        // Components mix strings with flags and codes; keep the textual ones.
        let components: BTreeMap<String, String> = result
            .components
            .into_iter()
            .filter_map(|(k, v)| match v {
                serde_json::Value::String(s) => Some((k, s)),
                _ => None,
            })
            .collect();

        let country = components.get("country").cloned();
        let (timezone_name, timezone_offset) = match result.annotations.timezone {
            Some(tz) => (tz.name, tz.offset_string),
            None => (None, None),
        };

        ResolvedLocation {
            coordinate: Coordinate::new(result.geometry.lat, result.geometry.lng),
            formatted_address: result.formatted,
            country,
            components,
            timezone_name,
            timezone_offset,
        }
    }
}

#[async_trait]
impl Provider for OpenCageProvider {
    type Input = PlaceQuery;
    type Output = ResolvedLocation;

    fn name(&self) -> &'static str {
        ProviderId::OpenCage.as_str()
    }

    #[instrument(skip_all, fields(query = %query))]
    async fn fetch(&self, query: &PlaceQuery) -> Result<ResolvedLocation, EnrichError> {
        let response = self
            .fetch_candidates(query)
            .await
            .map_err(|e| EnrichError::from_transport(self.name(), e))?;

        debug!(candidates = response.results.len(), "OpenCage responded");

        // Ranked list; only the best match is used.
        let best = response
            .results
            .into_iter()
            .next()
            .ok_or_else(|| EnrichError::NotFound { query: query.to_string() })?;

        Ok(best.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_candidate_maps_to_location() {
        let body = serde_json::json!({
            "results": [
                {
                    "geometry": { "lat": 48.8566, "lng": 2.3522 },
                    "formatted": "Paris, France",
                    "components": {
                        "city": "Paris",
                        "country": "France",
                        "country_code": "fr",
                        "_normalized_city": "Paris",
                        "ISO_3166-1_alpha-2": "FR",
                        "_category": "place",
                        "continent": "Europe",
                        "is_capital": true
                    },
                    "annotations": {
                        "timezone": {
                            "name": "Europe/Paris",
                            "offset_string": "+0100",
                            "offset_sec": 3600
                        }
                    }
                }
            ]
        });

        let parsed: OcResponse = serde_json::from_value(body).expect("valid payload");
        let loc: ResolvedLocation = parsed.results.into_iter().next().unwrap().into();

        assert_eq!(loc.coordinate, Coordinate::new(48.8566, 2.3522));
        assert_eq!(loc.formatted_address, "Paris, France");
        assert_eq!(loc.country.as_deref(), Some("France"));
        assert_eq!(loc.timezone_name.as_deref(), Some("Europe/Paris"));
        assert_eq!(loc.timezone_offset.as_deref(), Some("+0100"));
        assert_eq!(loc.components.get("city").map(String::as_str), Some("Paris"));
        assert!(!loc.components.contains_key("is_capital"));
    }

    #[test]
    fn annotations_are_optional() {
        let body = serde_json::json!({
            "results": [
                { "geometry": { "lat": 1.0, "lng": 2.0 }, "formatted": "Somewhere" }
            ]
        });

        let parsed: OcResponse = serde_json::from_value(body).unwrap();
        let loc: ResolvedLocation = parsed.results.into_iter().next().unwrap().into();

        assert!(loc.country.is_none());
        assert!(loc.timezone_name.is_none());
        assert!(loc.timezone_offset.is_none());
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let base = "http://localhost/v1/".to_string();
        let p = OpenCageProvider::with_base_url("K".into(), base, Client::new());
        assert_eq!(p.base_url, "http://localhost/v1");
    }
}
