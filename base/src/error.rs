use thiserror::Error;

use meshsync_shared::{EndpointError, InvokeError, TransportError};

/// Errors surfaced by Proxy operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProxyError {
    /// An on-demand refresh got no confirmation in time. The lease is left
    /// at its prior value: stale-but-available.
    #[error("No freshness confirmation from {partner} within {waited_millis}ms")]
    FreshnessFailure {
        partner: String,
        waited_millis: u64,
    },

    /// An inbound message was rejected by the access policy before any
    /// state mutation
    #[error("Access policy denied inbound message from {partner}")]
    PermissionDenied { partner: String },

    /// The proxy's relationship was severed; no further exchange happens
    #[error("Proxy to {partner} is no longer live")]
    NotLive { partner: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    #[error(transparent)]
    Invoke(#[from] InvokeError),

    /// Internal lock poisoned by a panicking thread
    #[error("Proxy internal state is poisoned")]
    Poisoned,
}

/// Errors restoring a proxy from its externalized form
#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("Malformed externalized proxy: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error(transparent)]
    Coherence(#[from] meshsync_shared::CoherenceParseError),
}
