//! Core library for the `aeroinfo` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - A single provider abstraction with geocoding, weather and elevation backends
//! - The aggregator that resolves a place and enriches it concurrently
//! - A session that discards results of superseded lookups
//!
//! It is used by `aeroinfo-cli`, but can also be reused by other binaries or services.

pub mod aggregator;
pub mod config;
pub mod error;
pub mod model;
pub mod provider;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregator::{Aggregator, LookupEvent, StageTimeouts};
pub use config::{Config, ProviderConfig};
pub use error::{EnrichError, ErrorKind, ErrorRecord, LookupSource};
pub use model::{
    Coordinate, ElevationSample, EnrichmentResult, PlaceQuery, ResolvedLocation, ResultStatus,
    WeatherSnapshot,
};
pub use provider::{ElevationProvider, GeoProvider, Provider, ProviderId, WeatherProvider};
pub use session::{Delivery, RequestToken, Session, Stamped};
