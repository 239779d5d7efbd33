use thiserror::Error;

use crate::fetcher::SourceId;

/// Errors that can occur creating or refreshing a shadow mesh base
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    /// No registered fetcher supports the source. Raised at creation
    /// time; no partial shadow is left behind.
    #[error("No fetcher registered for source {source_id}")]
    UnknownSourceType { source_id: SourceId },

    #[error("Fetching {source_id} failed: {reason}")]
    FetchFailed { source_id: SourceId, reason: String },

    #[error("Parsing content of {source_id} failed: {reason}")]
    ParseFailed { source_id: SourceId, reason: String },

    /// The redirect chain exceeded the hop cap
    #[error("Source {source_id} redirected more than {hops} times")]
    TooManyRedirects { source_id: SourceId, hops: u32 },

    /// The background scheduler thread could not be started; the manager
    /// would never refresh or sweep, so creation fails instead
    #[error("Probe scheduler thread failed to start: {reason}")]
    SchedulerUnavailable { reason: String },

    /// The manager is shutting down and accepts no further work
    #[error("Probe manager is shutting down")]
    ShuttingDown,

    /// Internal lock poisoned by a panicking thread
    #[error("Shadow internal state is poisoned")]
    Poisoned,
}
