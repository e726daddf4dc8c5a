use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Every failure a lookup can end with.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnrichError {
    /// Input rejected before any network call.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Transport failure, non-success status or malformed body from a named provider.
    #[error("{provider} request failed: {message}")]
    Provider { provider: String, message: String },

    /// The geocoder returned no candidates.
    #[error("No location found for '{query}'")]
    NotFound { query: String },

    #[error("{provider} did not respond within {}s", .after.as_secs_f64())]
    Timeout { provider: String, after: Duration },

    /// Missing or unusable API key / settings.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl EnrichError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Wrap an `anyhow` chain collected inside a provider adapter.
    pub(crate) fn from_transport(provider: &str, err: anyhow::Error) -> Self {
        Self::provider(provider, format!("{err:#}"))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EnrichError::Validation(_) => ErrorKind::Validation,
            EnrichError::Provider { .. } => ErrorKind::Provider,
            EnrichError::NotFound { .. } => ErrorKind::NotFound,
            EnrichError::Timeout { .. } => ErrorKind::Timeout,
            EnrichError::Configuration(_) => ErrorKind::Configuration,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Provider,
    NotFound,
    Timeout,
    Configuration,
}

/// Which stage of a lookup produced a value or an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupSource {
    Geocoding,
    Weather,
    Elevation,
}

impl LookupSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LookupSource::Geocoding => "geocoding",
            LookupSource::Weather => "weather",
            LookupSource::Elevation => "elevation",
        }
    }
}

impl std::fmt::Display for LookupSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure recorded in an `EnrichmentResult`, attributed to its stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub source: LookupSource,
    pub message: String,
}

impl ErrorRecord {
    pub fn new(source: LookupSource, err: &EnrichError) -> Self {
        Self {
            kind: err.kind(),
            source,
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.source, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_variants() {
        assert_eq!(EnrichError::validation("x").kind(), ErrorKind::Validation);
        assert_eq!(EnrichError::provider("opencage", "boom").kind(), ErrorKind::Provider);
        assert_eq!(EnrichError::NotFound { query: "q".into() }.kind(), ErrorKind::NotFound);
        let timeout = EnrichError::Timeout {
            provider: "p".into(),
            after: Duration::from_secs(1),
        };
        assert_eq!(timeout.kind(), ErrorKind::Timeout);
        assert_eq!(EnrichError::configuration("k").kind(), ErrorKind::Configuration);
    }

    #[test]
    fn provider_error_names_provider() {
        let err = EnrichError::provider("openweather", "status 500");
        assert_eq!(err.to_string(), "openweather request failed: status 500");
    }

    #[test]
    fn transport_error_keeps_context_chain() {
        let inner = anyhow::anyhow!("connection refused").context("Failed to send request");
        let err = EnrichError::from_transport("opencage", inner);
        let msg = err.to_string();
        assert!(msg.contains("Failed to send request"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn timeout_message_includes_bound() {
        let err = EnrichError::Timeout {
            provider: "openelevation".into(),
            after: Duration::from_millis(1500),
        };
        assert_eq!(err.to_string(), "openelevation did not respond within 1.5s");
    }

    #[test]
    fn record_is_tagged_with_source() {
        let err = EnrichError::provider("openweather", "x");
        let rec = ErrorRecord::new(LookupSource::Weather, &err);
        assert_eq!(rec.source, LookupSource::Weather);
        assert_eq!(rec.kind, ErrorKind::Provider);
        assert_eq!(rec.to_string(), "[weather] openweather request failed: x");

        let json = serde_json::to_value(&rec).expect("record serializes");
        assert_eq!(json["source"], "weather");
        assert_eq!(json["kind"], "provider");
    }
}
