//! Deterministic in-memory providers for aggregator and session tests.

use async_trait::async_trait;
use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::sync::Notify;

use crate::{
    error::EnrichError,
    model::{Coordinate, ElevationSample, PlaceQuery, ResolvedLocation, WeatherSnapshot},
    provider::Provider,
};

pub(crate) fn paris() -> ResolvedLocation {
    ResolvedLocation {
        coordinate: Coordinate::new(48.8566, 2.3522),
        formatted_address: "Paris, France".into(),
        country: Some("France".into()),
        components: BTreeMap::from([("city".to_string(), "Paris".to_string())]),
        timezone_name: Some("Europe/Paris".into()),
        timezone_offset: Some("+01:00".into()),
    }
}

#[derive(Debug, Clone)]
enum GeoOutcome {
    Found(ResolvedLocation),
    /// Location whose address echoes the query text.
    Echo,
    NotFound,
    Fail(String),
}

#[derive(Debug)]
pub(crate) struct FakeGeo {
    outcome: GeoOutcome,
    delay: Option<Duration>,
    gates: Mutex<HashMap<String, (Arc<Notify>, Arc<Notify>)>>,
    queries: Mutex<Vec<String>>,
}

impl FakeGeo {
    fn with(outcome: GeoOutcome) -> Self {
        Self {
            outcome,
            delay: None,
            gates: Mutex::default(),
            queries: Mutex::default(),
        }
    }

    pub(crate) fn returning(location: ResolvedLocation) -> Self {
        Self::with(GeoOutcome::Found(location))
    }

    pub(crate) fn echo() -> Self {
        Self::with(GeoOutcome::Echo)
    }

    pub(crate) fn not_found() -> Self {
        Self::with(GeoOutcome::NotFound)
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self::with(GeoOutcome::Fail(message.to_string()))
    }

    pub(crate) fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Hold lookups of `query` until `release` is notified; `entered` fires when one starts.
    pub(crate) fn gate(&self, query: &str) -> (Arc<Notify>, Arc<Notify>) {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        self.gates
            .lock()
            .unwrap()
            .insert(query.to_string(), (entered.clone(), release.clone()));
        (entered, release)
    }

    pub(crate) fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for FakeGeo {
    type Input = PlaceQuery;
    type Output = ResolvedLocation;

    fn name(&self) -> &'static str {
        "fake-geo"
    }

    async fn fetch(&self, query: &PlaceQuery) -> Result<ResolvedLocation, EnrichError> {
        self.queries.lock().unwrap().push(query.to_string());

        let gate = self.gates.lock().unwrap().get(query.as_str()).cloned();
        if let Some((entered, release)) = gate {
            entered.notify_one();
            release.notified().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.outcome {
            GeoOutcome::Found(location) => Ok(location.clone()),
            GeoOutcome::Echo => Ok(ResolvedLocation {
                formatted_address: query.to_string(),
                ..paris()
            }),
            GeoOutcome::NotFound => Err(EnrichError::NotFound { query: query.to_string() }),
            GeoOutcome::Fail(msg) => Err(EnrichError::provider(self.name(), msg.clone())),
        }
    }
}

/// Coordinate-keyed fake shared by the weather and elevation stand-ins.
#[derive(Debug)]
pub(crate) struct FakeSubLookup<T> {
    name: &'static str,
    outcome: Result<T, String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<Coordinate>>,
}

pub(crate) type FakeWeather = FakeSubLookup<WeatherSnapshot>;
pub(crate) type FakeElevation = FakeSubLookup<ElevationSample>;

impl<T> FakeSubLookup<T> {
    fn with(name: &'static str, outcome: Result<T, String>) -> Self {
        Self {
            name,
            outcome,
            delay: None,
            calls: Mutex::default(),
        }
    }

    pub(crate) fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn calls(&self) -> Vec<Coordinate> {
        self.calls.lock().unwrap().clone()
    }
}

impl FakeSubLookup<WeatherSnapshot> {
    pub(crate) fn ok() -> Self {
        let snapshot = WeatherSnapshot {
            temperature_c: 12.4,
            humidity_pct: 71,
            description: "broken clouds".into(),
            observed_at: None,
        };
        Self::with("fake-weather", Ok(snapshot))
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self::with("fake-weather", Err(message.into()))
    }
}

impl FakeSubLookup<ElevationSample> {
    pub(crate) fn ok(elevation_m: f64) -> Self {
        Self::with("fake-elevation", Ok(ElevationSample { elevation_m }))
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self::with("fake-elevation", Err(message.into()))
    }
}

#[async_trait]
impl<T> Provider for FakeSubLookup<T>
where
    T: Clone + Send + Sync + std::fmt::Debug,
{
    type Input = Coordinate;
    type Output = T;

    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch(&self, at: &Coordinate) -> Result<T, EnrichError> {
        at.validate()?;
        self.calls.lock().unwrap().push(*at);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.outcome
            .clone()
            .map_err(|msg| EnrichError::provider(self.name, msg))
    }
}
