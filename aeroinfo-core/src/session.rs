//! Last-request-wins delivery for callers that issue overlapping lookups.
//!
//! In-flight lookups are never aborted. Each invocation takes a token from a
//! monotonically increasing counter, and its result is handed back as stale
//! if a newer invocation has started in the meantime.
//!
//! Starting an invocation and forwarding an event are serialized, so once
//! [`Session::begin`] returns no event of an older invocation is sent.

use serde::Serialize;
use std::sync::{
    Arc, PoisonError, RwLock,
    atomic::{AtomicU64, Ordering},
};
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, warn};

use crate::{
    aggregator::{Aggregator, LookupEvent},
    error::EnrichError,
    model::EnrichmentResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RequestToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Outcome of an invocation, as seen by the session's caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery<T> {
    Current(T),
    /// A newer invocation superseded this one; its result was discarded.
    Stale(RequestToken),
}

impl<T> Delivery<T> {
    pub fn into_current(self) -> Option<T> {
        match self {
            Delivery::Current(value) => Some(value),
            Delivery::Stale(_) => None,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Delivery::Stale(_))
    }
}

/// A lifecycle event tagged with the invocation it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Stamped<T> {
    pub token: RequestToken,
    pub event: T,
}

#[derive(Debug)]
pub struct Session {
    aggregator: Arc<Aggregator>,
    latest: AtomicU64,
    /// Held shared while forwarding an event and exclusively while bumping `latest`.
    handoff: RwLock<()>,
}

impl Session {
    pub fn new(aggregator: Arc<Aggregator>) -> Self {
        Self {
            aggregator,
            latest: AtomicU64::new(0),
            handoff: RwLock::new(()),
        }
    }

    /// Start a new invocation, superseding all earlier ones.
    ///
    /// Waits for any event forward already in progress to finish.
    pub fn begin(&self) -> RequestToken {
        let _exclusive = self.handoff.write().unwrap_or_else(PoisonError::into_inner);
        RequestToken(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, token: RequestToken) -> bool {
        self.latest.load(Ordering::SeqCst) == token.0
    }

    pub fn latest(&self) -> Option<RequestToken> {
        match self.latest.load(Ordering::SeqCst) {
            0 => None,
            n => Some(RequestToken(n)),
        }
    }

    pub async fn resolve(&self, query: &str) -> Result<Delivery<EnrichmentResult>, EnrichError> {
        let token = self.begin();
        let result = self.aggregator.resolve(query).await?;
        Ok(self.deliver(token, result))
    }

    /// Like [`Session::resolve`], forwarding lifecycle events while this
    /// invocation is still the latest. No event is forwarded once a newer
    /// invocation has begun.
    pub async fn resolve_streaming(
        &self,
        query: &str,
        events: &UnboundedSender<Stamped<LookupEvent>>,
    ) -> Result<Delivery<EnrichmentResult>, EnrichError> {
        let token = self.begin();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let aggregator = &self.aggregator;
        let produce = async move {
            let outcome = aggregator.resolve_observed(query, &tx).await;
            drop(tx);
            outcome
        };
        let forward = async {
            while let Some(event) = rx.recv().await {
                self.forward(token, event, events);
            }
        };

        let (outcome, ()) = tokio::join!(produce, forward);
        Ok(self.deliver(token, outcome?))
    }

    /// Send `event` only if `token` is still current; returns whether it was sent.
    pub fn forward<T>(
        &self,
        token: RequestToken,
        event: T,
        events: &UnboundedSender<Stamped<T>>,
    ) -> bool {
        let _shared = self.handoff.read().unwrap_or_else(PoisonError::into_inner);
        self.is_current(token) && events.send(Stamped { token, event }).is_ok()
    }

    fn deliver(&self, token: RequestToken, result: EnrichmentResult) -> Delivery<EnrichmentResult> {
        if self.is_current(token) {
            debug!(%token, "Delivering result");
            Delivery::Current(result)
        } else {
            warn!(
                %token,
                latest = ?self.latest(),
                query = %result.query,
                "Discarding stale result"
            );
            Delivery::Stale(token)
        }
    }
}
