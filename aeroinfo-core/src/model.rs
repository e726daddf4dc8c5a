use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{EnrichError, ErrorRecord, LookupSource};

/// Free-text place name supplied by the caller.
///
/// Guaranteed non-blank; the text itself is kept as typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceQuery(String);

impl PlaceQuery {
    pub fn new(text: impl Into<String>) -> Result<Self, EnrichError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(EnrichError::validation("place name must not be empty"));
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PlaceQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Rejects NaN and anything outside [-90, 90] x [-180, 180].
    pub fn validate(&self) -> Result<(), EnrichError> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(EnrichError::validation(format!(
                "latitude {} is outside [-90, 90]",
                self.latitude
            )));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(EnrichError::validation(format!(
                "longitude {} is outside [-180, 180]",
                self.longitude
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLocation {
    pub coordinate: Coordinate,
    pub formatted_address: String,
    pub country: Option<String>,
    /// Administrative components as reported by the geocoder (city, state, postcode, ...).
    #[serde(default)]
    pub components: BTreeMap<String, String>,
    pub timezone_name: Option<String>,
    /// UTC offset as text, e.g. "+01:00".
    pub timezone_offset: Option<String>,
}

impl ResolvedLocation {
    /// OpenStreetMap link with a marker on the resolved point.
    pub fn map_url(&self) -> String {
        const ZOOM: u8 = 13;
        let Coordinate { latitude, longitude } = self.coordinate;
        format!(
            "https://www.openstreetmap.org/?mlat={latitude}&mlon={longitude}\
             #map={ZOOM}/{latitude}/{longitude}"
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub temperature_c: f64,
    pub humidity_pct: u8,
    pub description: String,
    pub observed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElevationSample {
    pub elevation_m: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    /// Location, weather and elevation all present.
    Complete,
    /// Location present, at least one sub-lookup failed.
    Partial,
    /// Geocoding failed; nothing else was attempted.
    Failed,
}

/// Merged outcome of one lookup.
///
/// Built only through [`EnrichmentResult::geocoding_failed`] and
/// [`EnrichmentResult::enriched`], so a missing weather or elevation value
/// always has a matching entry in `errors`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentResult {
    pub query: String,
    pub location: Option<ResolvedLocation>,
    pub weather: Option<WeatherSnapshot>,
    pub elevation: Option<ElevationSample>,
    pub errors: Vec<ErrorRecord>,
    pub resolved_at: DateTime<Utc>,
}

impl EnrichmentResult {
    pub fn geocoding_failed(query: &PlaceQuery, err: &EnrichError) -> Self {
        Self {
            query: query.as_str().to_string(),
            location: None,
            weather: None,
            elevation: None,
            errors: vec![ErrorRecord::new(LookupSource::Geocoding, err)],
            resolved_at: Utc::now(),
        }
    }

    pub fn enriched(
        query: &PlaceQuery,
        location: ResolvedLocation,
        weather: Result<WeatherSnapshot, EnrichError>,
        elevation: Result<ElevationSample, EnrichError>,
    ) -> Self {
        let mut errors = Vec::new();

        let weather = weather
            .map_err(|e| errors.push(ErrorRecord::new(LookupSource::Weather, &e)))
            .ok();
        let elevation = elevation
            .map_err(|e| errors.push(ErrorRecord::new(LookupSource::Elevation, &e)))
            .ok();

        Self {
            query: query.as_str().to_string(),
            location: Some(location),
            weather,
            elevation,
            errors,
            resolved_at: Utc::now(),
        }
    }

    pub fn status(&self) -> ResultStatus {
        match (&self.location, self.errors.is_empty()) {
            (None, _) => ResultStatus::Failed,
            (Some(_), true) => ResultStatus::Complete,
            (Some(_), false) => ResultStatus::Partial,
        }
    }

    pub fn error_for(&self, source: LookupSource) -> Option<&ErrorRecord> {
        self.errors.iter().find(|e| e.source == source)
    }
}
