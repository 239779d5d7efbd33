//! # Meshsync Base
//! The per-base side of graph replication: the replication Proxy, the
//! per-partner ProxyDirectory, the graph-storage seam, and proxy
//! externalization for surviving restarts.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod access;
mod directory;
mod error;
mod externalized;
mod graph;
mod memory_graph;
mod proxy;

pub use access::{AccessPolicy, AllowAll};
pub use directory::ProxyDirectory;
pub use error::{ProxyError, RestoreError};
pub use externalized::ExternalizedProxy;
pub use graph::{Applied, GraphError, GraphStore, NodeSnapshot};
pub use memory_graph::MemoryGraph;
pub use proxy::{ProcessReport, Proxy, RefreshOutcome};
