use std::sync::Arc;

use meshsync_shared::{CoherencePolicy, RetryConfig, TimeMillis};

use crate::error::ProbeError;
use crate::fetcher::SourceId;
use crate::manager::{ProbeDirectory, ProbeRegistry};
use crate::shadow::{RefreshReport, ShadowMeshBase};

/// Probe manager without background execution. Shadows are refreshed only
/// on the caller's thread, inside `obtain_for` (first population) and
/// `refresh_now`. Suited to batch tools and tests.
pub struct PassiveProbeManager {
    directory: ProbeDirectory,
}

impl PassiveProbeManager {
    pub fn new(registry: ProbeRegistry, retry: RetryConfig) -> Self {
        Self {
            directory: ProbeDirectory::new(registry, retry),
        }
    }

    /// Returns the shadow for `source`, creating and populating it on
    /// first use. When the initial refresh fails the shadow stays
    /// registered with its backoff schedule, so a later call can retry,
    /// but the failure is surfaced to this caller.
    pub fn obtain_for(
        &self,
        source: &SourceId,
        policy: CoherencePolicy,
        now: TimeMillis,
    ) -> Result<Arc<ShadowMeshBase>, ProbeError> {
        let shadow = self.directory.obtain_for(source, policy, now)?;
        shadow.ensure_refreshed(now)?;
        Ok(shadow)
    }

    /// Refreshes an existing shadow on the calling thread
    pub fn refresh_now(
        &self,
        source: &SourceId,
        now: TimeMillis,
    ) -> Result<RefreshReport, ProbeError> {
        let shadow = self
            .directory
            .get(source)
            .ok_or_else(|| ProbeError::UnknownSourceType {
                source_id: source.clone(),
            })?;
        shadow.mark_used(now)?;
        shadow.refresh(now)
    }

    pub fn remove(&self, source: &SourceId) -> Option<Arc<ShadowMeshBase>> {
        self.directory.remove(source)
    }

    pub fn directory(&self) -> &ProbeDirectory {
        &self.directory
    }
}
