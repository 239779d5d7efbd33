use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info};

use meshsync_shared::{now_millis, CoherencePolicy, RetryConfig, TimeMillis};

use crate::error::ProbeError;
use crate::fetcher::SourceId;
use crate::manager::{ProbeDirectory, ProbeRegistry};
use crate::shadow::ShadowMeshBase;

/// Knobs of the background scheduler
#[derive(Debug, Clone, Copy)]
pub struct ScheduledConfig {
    /// Upper bound on how long the scheduler sleeps between passes, and
    /// the cadence of the expiration sweep
    pub sweep_interval: Duration,
    /// A shadow unused for this long is destroyed by the sweep
    pub not_needed_lifetime: Duration,
}

impl Default for ScheduledConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(10),
            not_needed_lifetime: Duration::from_secs(600),
        }
    }
}

struct WorkerShared {
    state: Mutex<WorkerState>,
    wake: Condvar,
}

struct WorkerState {
    shutdown: bool,
}

/// Probe manager with a background scheduler thread. Due refreshes run on
/// the worker; success reschedules one policy interval out, failure backs
/// off; an expiration sweep destroys shadows nobody has used for the
/// configured lifetime, never while their refresh is in flight.
pub struct ScheduledProbeManager {
    directory: Arc<ProbeDirectory>,
    shared: Arc<WorkerShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ScheduledProbeManager {
    pub fn new(
        registry: ProbeRegistry,
        retry: RetryConfig,
        config: ScheduledConfig,
    ) -> Result<Self, ProbeError> {
        let directory = Arc::new(ProbeDirectory::new(registry, retry));
        let shared = Arc::new(WorkerShared {
            state: Mutex::new(WorkerState { shutdown: false }),
            wake: Condvar::new(),
        });

        let worker_directory = directory.clone();
        let worker_shared = shared.clone();
        let worker = thread::Builder::new()
            .name("meshsync-probe-scheduler".to_string())
            .spawn(move || run_scheduler(worker_directory, worker_shared, config))
            .map_err(|error| ProbeError::SchedulerUnavailable {
                reason: error.to_string(),
            })?;

        Ok(Self {
            directory,
            shared,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Returns the shadow for `source`, creating it with its first
    /// refresh due immediately. The worker is woken to run it; callers
    /// that need populated data wait on the shadow's freshness.
    pub fn obtain_for(
        &self,
        source: &SourceId,
        policy: CoherencePolicy,
    ) -> Result<Arc<ShadowMeshBase>, ProbeError> {
        if self.is_shut_down() {
            return Err(ProbeError::ShuttingDown);
        }
        let shadow = self.directory.obtain_for(source, policy, now_millis())?;
        self.shared.wake.notify_all();
        Ok(shadow)
    }

    pub fn get(&self, source: &SourceId) -> Option<Arc<ShadowMeshBase>> {
        self.directory.get(source)
    }

    pub fn directory(&self) -> &ProbeDirectory {
        &self.directory
    }

    fn is_shut_down(&self) -> bool {
        self.shared
            .state
            .lock()
            .map(|state| state.shutdown)
            .unwrap_or(true)
    }

    /// Stops the scheduler thread and destroys every shadow. Returns once
    /// the thread has exited, so no refresh is running afterwards.
    pub fn shutdown(&self) {
        if let Ok(mut state) = self.shared.state.lock() {
            if state.shutdown {
                return;
            }
            state.shutdown = true;
        }
        self.shared.wake.notify_all();

        let handle = self.worker.lock().ok().and_then(|mut worker| worker.take());
        if let Some(handle) = handle {
            let _ = handle.join();
        }
        self.directory.clear();
        info!("Scheduled probe manager shut down");
    }
}

impl Drop for ScheduledProbeManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_scheduler(
    directory: Arc<ProbeDirectory>,
    shared: Arc<WorkerShared>,
    config: ScheduledConfig,
) {
    let lifetime = config.not_needed_lifetime.as_millis() as u64;

    loop {
        let now = now_millis();

        for shadow in directory.shadows() {
            if shadow.due(now) {
                if let Err(error) = shadow.refresh(now) {
                    debug!("Scheduler: refresh of {} failed: {}", shadow.source(), error);
                }
            }
        }

        for shadow in directory.shadows() {
            let idle_since = shadow.time_last_used().unwrap_or(now);
            if now.saturating_sub(idle_since) >= lifetime && !shadow.refreshing() {
                info!("Scheduler: destroying idle shadow {}", shadow.source());
                directory.remove(shadow.source());
            }
        }

        let sleep = next_sleep(&directory, now, config.sweep_interval);
        let Ok(state) = shared.state.lock() else {
            return;
        };
        if state.shutdown {
            return;
        }
        let Ok((state, _)) = shared.wake.wait_timeout(state, sleep) else {
            return;
        };
        if state.shutdown {
            return;
        }
    }
}

/// How long the worker may sleep: until the earliest due refresh, capped
/// by the sweep interval
fn next_sleep(directory: &ProbeDirectory, now: TimeMillis, sweep: Duration) -> Duration {
    let mut sleep = sweep;
    for shadow in directory.shadows() {
        let due = match shadow.time_next_refresh() {
            Ok(due) if due != 0 => due,
            _ => continue,
        };
        let until = Duration::from_millis(due.saturating_sub(now));
        if until < sleep {
            sleep = until;
        }
    }
    sleep
}
