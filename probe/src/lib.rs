//! # Meshsync Probe
//! Pull-based mirroring of external data sources: fetch/parse interfaces,
//! shadow mesh bases holding the mirrored replicas, and passive or
//! scheduled probe managers driving their refresh.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod error;
mod fetcher;
mod manager;
mod shadow;

pub use error::ProbeError;
pub use fetcher::{ContentParser, FetchError, ParseError, RawContent, SourceFetcher, SourceId};
pub use manager::{
    PassiveProbeManager, ProbeDirectory, ProbeRegistry, ScheduledConfig, ScheduledProbeManager,
};
pub use shadow::{RefreshReport, ShadowMeshBase};
