use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::info;

use meshsync_shared::{CoherencePolicy, RetryConfig, TimeMillis};

use crate::error::ProbeError;
use crate::fetcher::{ContentParser, SourceFetcher, SourceId};
use crate::shadow::ShadowMeshBase;

mod passive;
mod scheduled;

pub use passive::PassiveProbeManager;
pub use scheduled::{ScheduledConfig, ScheduledProbeManager};

/// Maps source types to their fetch/parse implementations. Populated once
/// at startup; a source no entry supports is a fatal configuration error.
#[derive(Default)]
pub struct ProbeRegistry {
    entries: Vec<(Arc<dyn SourceFetcher>, Arc<dyn ContentParser>)>,
}

impl ProbeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        mut self,
        fetcher: Arc<dyn SourceFetcher>,
        parser: Arc<dyn ContentParser>,
    ) -> Self {
        self.entries.push((fetcher, parser));
        self
    }

    /// The first registered pair whose fetcher supports the source
    fn resolve(
        &self,
        source: &SourceId,
    ) -> Result<(Arc<dyn SourceFetcher>, Arc<dyn ContentParser>), ProbeError> {
        self.entries
            .iter()
            .find(|(fetcher, _)| fetcher.supports(source))
            .cloned()
            .ok_or_else(|| ProbeError::UnknownSourceType {
                source_id: source.clone(),
            })
    }
}

/// All of one process's shadows, keyed by source. The map lock is held
/// through shadow construction, so N concurrent callers asking for the
/// same new source get one shadow. The registry is consulted before the
/// shadow is built; an unsupported source leaves nothing behind.
pub struct ProbeDirectory {
    registry: ProbeRegistry,
    retry: RetryConfig,
    shadows: Mutex<HashMap<SourceId, Arc<ShadowMeshBase>>>,
}

impl ProbeDirectory {
    pub fn new(registry: ProbeRegistry, retry: RetryConfig) -> Self {
        Self {
            registry,
            retry,
            shadows: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the shadow for `source`, creating it if none exists yet.
    /// Creation registers the shadow with its first refresh due at `now`;
    /// no fetch happens here.
    pub fn obtain_for(
        &self,
        source: &SourceId,
        policy: CoherencePolicy,
        now: TimeMillis,
    ) -> Result<Arc<ShadowMeshBase>, ProbeError> {
        let mut shadows = self.shadows.lock().map_err(|_| ProbeError::Poisoned)?;
        if let Some(existing) = shadows.get(source) {
            existing.mark_used(now)?;
            return Ok(existing.clone());
        }
        let (fetcher, parser) = self.registry.resolve(source)?;
        info!("Probe directory: creating shadow for {}", source);
        let created = Arc::new(ShadowMeshBase::new(
            source.clone(),
            policy,
            fetcher,
            parser,
            self.retry,
            now,
        ));
        shadows.insert(source.clone(), created.clone());
        Ok(created)
    }

    pub fn get(&self, source: &SourceId) -> Option<Arc<ShadowMeshBase>> {
        self.shadows.lock().ok()?.get(source).cloned()
    }

    pub fn remove(&self, source: &SourceId) -> Option<Arc<ShadowMeshBase>> {
        self.shadows.lock().ok()?.remove(source)
    }

    pub fn sources(&self) -> Vec<SourceId> {
        match self.shadows.lock() {
            Ok(shadows) => shadows.keys().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Snapshot of every live shadow, for scheduling passes
    pub fn shadows(&self) -> Vec<Arc<ShadowMeshBase>> {
        match self.shadows.lock() {
            Ok(shadows) => shadows.values().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.shadows.lock().map(|shadows| shadows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut shadows) = self.shadows.lock() {
            shadows.clear();
        }
    }
}
