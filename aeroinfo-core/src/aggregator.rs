//! Place lookup followed by a concurrent weather/elevation fan-out.
//!
//! Geocoding is a hard prerequisite: if it fails the lookup ends there with a
//! single recorded error. Otherwise both sub-lookups run side by side against
//! the resolved coordinate and each settles independently into either a value
//! or an error tagged with its source.

use reqwest::Client;
use std::{sync::Arc, time::Duration};
use tokio::{sync::mpsc::UnboundedSender, time};
use tracing::{debug, info, instrument, warn};

use crate::{
    config::Config,
    error::{EnrichError, ErrorRecord, LookupSource},
    model::{ElevationSample, EnrichmentResult, PlaceQuery, ResolvedLocation, WeatherSnapshot},
    provider::{
        ElevationProvider, GeoProvider, OpenCageProvider, OpenElevationProvider,
        OpenWeatherProvider, Provider, ProviderId, WeatherProvider,
    },
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound for each stage of a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTimeouts {
    pub geocoding: Duration,
    pub weather: Duration,
    pub elevation: Duration,
}

impl StageTimeouts {
    pub fn uniform(limit: Duration) -> Self {
        Self {
            geocoding: limit,
            weather: limit,
            elevation: limit,
        }
    }

    pub fn for_source(&self, source: LookupSource) -> Duration {
        match source {
            LookupSource::Geocoding => self.geocoding,
            LookupSource::Weather => self.weather,
            LookupSource::Elevation => self.elevation,
        }
    }
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self::uniform(Duration::from_secs(10))
    }
}

/// Progress of a single lookup, in the order it happens.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupEvent {
    Locating,
    Located(ResolvedLocation),
    /// Geocoding failed; nothing else will be attempted.
    Failed(ErrorRecord),
    WeatherSettled(Result<WeatherSnapshot, ErrorRecord>),
    ElevationSettled(Result<ElevationSample, ErrorRecord>),
    Finished(EnrichmentResult),
}

#[derive(Debug, Clone)]
pub struct Aggregator {
    geo: Arc<GeoProvider>,
    weather: Arc<WeatherProvider>,
    elevation: Arc<ElevationProvider>,
    timeouts: StageTimeouts,
}

impl Aggregator {
    pub fn new(
        geo: Arc<GeoProvider>,
        weather: Arc<WeatherProvider>,
        elevation: Arc<ElevationProvider>,
    ) -> Self {
        Self {
            geo,
            weather,
            elevation,
            timeouts: StageTimeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: StageTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn timeouts(&self) -> StageTimeouts {
        self.timeouts
    }

    /// Build the HTTP-backed providers from configuration.
    pub fn from_config(config: &Config) -> Result<Self, EnrichError> {
        let geo_key = config.require_api_key(ProviderId::OpenCage)?.to_string();
        let weather_key = config.require_api_key(ProviderId::OpenWeather)?.to_string();

        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("aeroinfo/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| EnrichError::configuration(format!("Failed to build HTTP client: {e}")))?;

        let geo = OpenCageProvider::with_base_url(
            geo_key,
            config.base_url(ProviderId::OpenCage),
            http.clone(),
        );
        let weather = OpenWeatherProvider::with_base_url(
            weather_key,
            config.base_url(ProviderId::OpenWeather),
            http.clone(),
        );
        let elevation =
            OpenElevationProvider::with_base_url(config.base_url(ProviderId::OpenElevation), http);

        let timeouts = StageTimeouts {
            geocoding: config.timeout(ProviderId::OpenCage),
            weather: config.timeout(ProviderId::OpenWeather),
            elevation: config.timeout(ProviderId::OpenElevation),
        };

        Ok(Self::new(Arc::new(geo), Arc::new(weather), Arc::new(elevation)).with_timeouts(timeouts))
    }

    /// Resolve `query` and enrich it with weather and elevation.
    ///
    /// Only a blank query is an `Err`; every provider failure is recorded in
    /// the returned result instead.
    pub async fn resolve(&self, query: &str) -> Result<EnrichmentResult, EnrichError> {
        self.run(query, None).await
    }

    /// Same as [`Aggregator::resolve`], reporting progress on `events` as it happens.
    ///
    /// A closed receiver doesn't stop the lookup.
    pub async fn resolve_observed(
        &self,
        query: &str,
        events: &UnboundedSender<LookupEvent>,
    ) -> Result<EnrichmentResult, EnrichError> {
        self.run(query, Some(events)).await
    }

    #[instrument(skip_all, fields(query = %query))]
    async fn run(
        &self,
        query: &str,
        events: Option<&UnboundedSender<LookupEvent>>,
    ) -> Result<EnrichmentResult, EnrichError> {
        let emit = |event: LookupEvent| {
            if let Some(tx) = events {
                let _ = tx.send(event);
            }
        };

        let query = PlaceQuery::new(query)?;
        info!("Resolving place");
        emit(LookupEvent::Locating);

        let location = match self.bounded(&*self.geo, &query, LookupSource::Geocoding).await {
            Ok(location) => location,
            Err(err) => {
                warn!(error = %err, "Geocoding failed");
                let result = EnrichmentResult::geocoding_failed(&query, &err);
                emit(LookupEvent::Failed(result.errors[0].clone()));
                emit(LookupEvent::Finished(result.clone()));
                return Ok(result);
            }
        };

        let at = location.coordinate;
        debug!(%at, address = %location.formatted_address, "Located");
        emit(LookupEvent::Located(location.clone()));

        let weather = async {
            let outcome = self.bounded(&*self.weather, &at, LookupSource::Weather).await;
            emit(LookupEvent::WeatherSettled(settled(LookupSource::Weather, &outcome)));
            outcome
        };
        let elevation = async {
            let outcome = self.bounded(&*self.elevation, &at, LookupSource::Elevation).await;
            emit(LookupEvent::ElevationSettled(settled(LookupSource::Elevation, &outcome)));
            outcome
        };

        let (weather, elevation) = tokio::join!(weather, elevation);

        let result = EnrichmentResult::enriched(&query, location, weather, elevation);
        info!(status = ?result.status(), errors = result.errors.len(), "Resolved place");
        emit(LookupEvent::Finished(result.clone()));

        Ok(result)
    }

    /// Run one provider call under the stage's time limit.
    async fn bounded<P>(
        &self,
        provider: &P,
        input: &P::Input,
        source: LookupSource,
    ) -> Result<P::Output, EnrichError>
    where
        P: Provider + ?Sized,
    {
        let limit = self.timeouts.for_source(source);

        let outcome = match time::timeout(limit, provider.fetch(input)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(EnrichError::Timeout {
                provider: provider.name().to_string(),
                after: limit,
            }),
        };

        if let Err(err) = &outcome {
            if source != LookupSource::Geocoding {
                warn!(%source, provider = provider.name(), error = %err, "Sub-lookup failed");
            }
        }

        outcome
    }
}

fn settled<T: Clone>(
    source: LookupSource,
    outcome: &Result<T, EnrichError>,
) -> Result<T, ErrorRecord> {
    outcome.clone().map_err(|err| ErrorRecord::new(source, &err))
}
