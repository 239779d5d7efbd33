use std::sync::{Arc, Condvar, Mutex};

use log::warn;

use meshsync_base::{GraphStore, MemoryGraph, NodeSnapshot};
use meshsync_shared::{Backoff, CoherencePolicy, NodeId, RetryConfig, TimeMillis};

use crate::error::ProbeError;
use crate::fetcher::{ContentParser, RawContent, SourceFetcher, SourceId};

/// Hop cap on redirect chains, so two sources pointing at each other
/// cannot loop a refresh forever
const MAX_REDIRECT_HOPS: u32 = 4;

/// What one refresh pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Change records applied to the replica
    pub applied: usize,
    /// Change records skipped because they could not be applied
    pub skipped: usize,
    /// The refresh was already running on another thread; this caller
    /// waited for it instead of fetching again
    pub coalesced: bool,
}

struct ShadowState {
    graph: MemoryGraph,
    /// 0 means never refreshed
    time_last_refreshed: TimeMillis,
    /// When the next refresh is due; 0 means none scheduled
    time_next_refresh: TimeMillis,
    time_last_used: TimeMillis,
    backoff: Backoff,
    refreshing: bool,
}

/// A local replica of one external data source. Holds the mirrored graph,
/// tracks freshness, and runs the fetch → parse → apply pipeline. Refresh
/// failures never drop the schedule entry; they push the next attempt out
/// by the backoff delay instead.
///
/// Refreshes are single-flight: a second caller arriving mid-refresh
/// waits for the running one rather than fetching again, and destruction
/// is deferred while a refresh is in flight.
pub struct ShadowMeshBase {
    source: SourceId,
    policy: CoherencePolicy,
    fetcher: Arc<dyn SourceFetcher>,
    parser: Arc<dyn ContentParser>,
    retry: RetryConfig,
    state: Mutex<ShadowState>,
    refresh_done: Condvar,
}

impl ShadowMeshBase {
    pub fn new(
        source: SourceId,
        policy: CoherencePolicy,
        fetcher: Arc<dyn SourceFetcher>,
        parser: Arc<dyn ContentParser>,
        retry: RetryConfig,
        now: TimeMillis,
    ) -> Self {
        Self {
            source,
            policy,
            fetcher,
            parser,
            retry,
            state: Mutex::new(ShadowState {
                graph: MemoryGraph::new(),
                time_last_refreshed: 0,
                // due immediately: the first refresh populates the replica
                time_next_refresh: now,
                time_last_used: now,
                backoff: Backoff::new(retry),
                refreshing: false,
            }),
            refresh_done: Condvar::new(),
        }
    }

    pub fn source(&self) -> &SourceId {
        &self.source
    }

    pub fn policy(&self) -> &CoherencePolicy {
        &self.policy
    }

    pub fn time_last_refreshed(&self) -> Result<TimeMillis, ProbeError> {
        Ok(self.state.lock().map_err(|_| ProbeError::Poisoned)?.time_last_refreshed)
    }

    pub fn time_next_refresh(&self) -> Result<TimeMillis, ProbeError> {
        Ok(self.state.lock().map_err(|_| ProbeError::Poisoned)?.time_next_refresh)
    }

    pub fn time_last_used(&self) -> Result<TimeMillis, ProbeError> {
        Ok(self.state.lock().map_err(|_| ProbeError::Poisoned)?.time_last_used)
    }

    /// Records that a caller read from this shadow, deferring expiration
    pub fn mark_used(&self, now: TimeMillis) -> Result<(), ProbeError> {
        self.state.lock().map_err(|_| ProbeError::Poisoned)?.time_last_used = now;
        Ok(())
    }

    /// Whether a refresh is due at `now`
    pub fn due(&self, now: TimeMillis) -> bool {
        self.state
            .lock()
            .map(|state| state.time_next_refresh != 0 && now >= state.time_next_refresh)
            .unwrap_or(false)
    }

    /// Whether a refresh is running right now. An expiring shadow must
    /// not be destroyed while this holds.
    pub fn refreshing(&self) -> bool {
        self.state
            .lock()
            .map(|state| state.refreshing)
            .unwrap_or(false)
    }

    /// Reads one node from the replica
    pub fn snapshot(&self, node: &NodeId) -> Result<Option<NodeSnapshot>, ProbeError> {
        Ok(self.state.lock().map_err(|_| ProbeError::Poisoned)?.graph.snapshot(node))
    }

    /// All node ids currently in the replica
    pub fn node_ids(&self) -> Result<Vec<NodeId>, ProbeError> {
        Ok(self.state.lock().map_err(|_| ProbeError::Poisoned)?.graph.node_ids())
    }

    /// Runs one fetch → parse → apply pass. On success freshness advances
    /// and the next refresh is scheduled one policy interval out; on
    /// failure the next attempt is pushed out by the backoff delay. A
    /// concurrent caller waits for the in-flight pass instead of starting
    /// a second fetch.
    pub fn refresh(&self, now: TimeMillis) -> Result<RefreshReport, ProbeError> {
        self.refresh_inner(now, false)
    }

    /// Populates the replica if that never happened, coalescing with any
    /// refresh already in flight. N concurrent callers of a fresh shadow
    /// produce exactly one fetch; the check and the refresh gate are one
    /// atomic step.
    pub fn ensure_refreshed(&self, now: TimeMillis) -> Result<RefreshReport, ProbeError> {
        self.refresh_inner(now, true)
    }

    fn refresh_inner(&self, now: TimeMillis, only_initial: bool) -> Result<RefreshReport, ProbeError> {
        {
            let mut state = self.state.lock().map_err(|_| ProbeError::Poisoned)?;
            if only_initial {
                loop {
                    if state.time_last_refreshed != 0 {
                        return Ok(RefreshReport {
                            coalesced: true,
                            ..RefreshReport::default()
                        });
                    }
                    if !state.refreshing {
                        break;
                    }
                    state = self
                        .refresh_done
                        .wait(state)
                        .map_err(|_| ProbeError::Poisoned)?;
                }
            } else if state.refreshing {
                while state.refreshing {
                    state = self
                        .refresh_done
                        .wait(state)
                        .map_err(|_| ProbeError::Poisoned)?;
                }
                return Ok(RefreshReport {
                    coalesced: true,
                    ..RefreshReport::default()
                });
            }
            state.refreshing = true;
        }

        // lock released: the fetch may block on I/O
        let result = self.fetch_parse_apply();

        let mut state = self.state.lock().map_err(|_| ProbeError::Poisoned)?;
        state.refreshing = false;
        match &result {
            Ok(_) => {
                state.time_last_refreshed = now;
                state.backoff.reset();
                state.time_next_refresh = match self.policy.interval() {
                    Some(interval) => now + interval.as_millis() as u64,
                    None => 0,
                };
            }
            Err(error) => {
                // keep the schedule entry alive even past the retry budget
                let delay = state.backoff.next_delay().unwrap_or(self.retry.max_delay);
                state.time_next_refresh = now + delay.as_millis() as u64;
                warn!(
                    "Shadow {}: refresh failed, next attempt in {}ms: {}",
                    self.source,
                    delay.as_millis(),
                    error
                );
            }
        }
        drop(state);
        self.refresh_done.notify_all();
        result
    }

    fn fetch_parse_apply(&self) -> Result<RefreshReport, ProbeError> {
        let content = self.fetch_following_redirects()?;
        let changes = self
            .parser
            .parse(&content)
            .map_err(|error| ProbeError::ParseFailed {
                source_id: self.source.clone(),
                reason: error.reason,
            })?;

        let mut state = self.state.lock().map_err(|_| ProbeError::Poisoned)?;
        let mut report = RefreshReport::default();
        for change in &changes {
            match state.graph.apply_change(change) {
                Ok(_) => report.applied += 1,
                Err(error) => {
                    warn!(
                        "Shadow {}: skipping inapplicable change for {}: {}",
                        self.source,
                        change.node(),
                        error
                    );
                    report.skipped += 1;
                }
            }
        }
        Ok(report)
    }

    fn fetch_following_redirects(&self) -> Result<RawContent, ProbeError> {
        let mut current = self.source.clone();
        let mut hops = 0;
        loop {
            let content =
                self.fetcher
                    .fetch(&current)
                    .map_err(|error| ProbeError::FetchFailed {
                        source_id: current.clone(),
                        reason: error.reason,
                    })?;
            match content.redirect {
                Some(target) if self.policy.follow_redirects => {
                    hops += 1;
                    if hops > MAX_REDIRECT_HOPS {
                        return Err(ProbeError::TooManyRedirects {
                            source_id: self.source.clone(),
                            hops: MAX_REDIRECT_HOPS,
                        });
                    }
                    current = target;
                }
                _ => return Ok(content),
            }
        }
    }
}
