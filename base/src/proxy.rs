use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{info, warn};

use meshsync_shared::{
    consolidate, now_millis, BaseId, ChangeRecord, CoherencePolicy, DeltaMessage, Endpoint,
    EndpointConfig, FreshnessMode, InvokeError, MessageReceiver, MessageSender, ResponseExchange,
    SendOutcome, TimeMillis, TransportError,
};

use crate::access::AccessPolicy;
use crate::error::{ProxyError, RestoreError};
use crate::externalized::ExternalizedProxy;
use crate::graph::{Applied, GraphError, GraphStore};

/// What a refresh decision did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The replica is already as fresh as the policy requires
    Fresh,
    /// A refresh request was queued; confirmation will arrive through a
    /// later `process_incoming`
    Requested,
    /// The caller blocked and a confirmation arrived
    Confirmed,
}

/// What one `process_incoming` pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessReport {
    /// Change records applied to the store
    pub applied: usize,
    /// Change records skipped because they could not be applied
    pub skipped: usize,
    /// Inbound messages rejected whole by the access policy
    pub denied: usize,
    /// The partner severed the relationship; the owner should remove this
    /// proxy from its directory
    pub ceased: bool,
}

struct ProxyInner {
    endpoint: Endpoint,
    receiver: Box<dyn MessageReceiver>,
    time_created: TimeMillis,
    time_updated: TimeMillis,
    time_read: TimeMillis,
    /// When the freshness lease runs out; 0 means no lease is held
    time_expires: TimeMillis,
    /// A poll-mode refresh ping is in flight; its pong clears this
    refresh_requested: bool,
    snapshot_taken: bool,
    ceased: bool,
}

/// Represents, to one mesh base, its replication relationship with one
/// partner base. Outgoing local changes are consolidated and queued here;
/// incoming messages are ordered by the endpoint, checked against the
/// access policy, and applied to the graph store; the coherence policy
/// decides when the replica must be refreshed.
///
/// All methods take `&self`. Blocking refreshes rely on another thread
/// driving `send_outgoing` and `process_incoming`; the internal lock is
/// never held while waiting.
pub struct Proxy {
    local_id: BaseId,
    partner_id: BaseId,
    policy: CoherencePolicy,
    access: Arc<dyn AccessPolicy>,
    exchange: ResponseExchange,
    inner: Mutex<ProxyInner>,
}

impl Proxy {
    pub fn new(
        local_id: BaseId,
        partner_id: BaseId,
        policy: CoherencePolicy,
        access: Arc<dyn AccessPolicy>,
        sender: Box<dyn MessageSender>,
        receiver: Box<dyn MessageReceiver>,
        config: EndpointConfig,
    ) -> Self {
        let now = now_millis();
        let endpoint = Endpoint::new(local_id.clone(), partner_id.clone(), sender, config);
        Self {
            local_id,
            partner_id,
            policy,
            access,
            exchange: ResponseExchange::new(),
            inner: Mutex::new(ProxyInner {
                endpoint,
                receiver,
                time_created: now,
                time_updated: now,
                time_read: 0,
                time_expires: 0,
                refresh_requested: false,
                snapshot_taken: false,
                ceased: false,
            }),
        }
    }

    /// Recreates a proxy from its externalized form. Restored
    /// unacknowledged messages go back out verbatim on the next send
    /// cycle, so the partner's duplicate filter stays coherent.
    pub fn restore(
        external: ExternalizedProxy,
        access: Arc<dyn AccessPolicy>,
        sender: Box<dyn MessageSender>,
        receiver: Box<dyn MessageReceiver>,
        config: EndpointConfig,
    ) -> Result<Self, RestoreError> {
        let policy = external.coherence_policy()?;
        let endpoint = Endpoint::restore(
            external.local_id.clone(),
            external.partner_id.clone(),
            sender,
            config,
            external.last_sent_token,
            external.last_received_token,
            external
                .unacknowledged
                .into_iter()
                .map(|(_, message)| message)
                .collect(),
            external.queued,
        );
        Ok(Self {
            local_id: external.local_id,
            partner_id: external.partner_id,
            policy,
            access,
            exchange: ResponseExchange::new(),
            inner: Mutex::new(ProxyInner {
                endpoint,
                receiver,
                time_created: external.time_created,
                time_updated: external.time_updated,
                time_read: external.time_read,
                time_expires: external.time_expires,
                refresh_requested: false,
                snapshot_taken: external.snapshot_taken,
                ceased: false,
            }),
        })
    }

    pub fn local_id(&self) -> &BaseId {
        &self.local_id
    }

    pub fn partner_id(&self) -> &BaseId {
        &self.partner_id
    }

    pub fn policy(&self) -> &CoherencePolicy {
        &self.policy
    }

    pub fn is_live(&self) -> bool {
        self.inner
            .lock()
            .map(|inner| !inner.ceased && !inner.endpoint.is_dead())
            .unwrap_or(false)
    }

    /// When this replica's content was last confirmed by the partner, in
    /// wall-clock milliseconds; 0 if never
    pub fn time_read(&self) -> Result<TimeMillis, ProxyError> {
        Ok(self.inner()?.time_read)
    }

    /// When the freshness lease expires; 0 if no lease is held
    pub fn time_expires(&self) -> Result<TimeMillis, ProxyError> {
        Ok(self.inner()?.time_expires)
    }

    fn inner(&self) -> Result<MutexGuard<'_, ProxyInner>, ProxyError> {
        self.inner.lock().map_err(|_| ProxyError::Poisoned)
    }

    // Outgoing

    /// Consolidates and queues local changes for the partner. Never
    /// blocks; transmission happens in a later `send_outgoing`.
    pub fn send_changes(&self, changes: Vec<ChangeRecord>) -> Result<(), ProxyError> {
        let mut inner = self.inner()?;
        if inner.ceased {
            return Err(ProxyError::NotLive {
                partner: self.partner_id.to_string(),
            });
        }
        let consolidated = consolidate(changes);
        if consolidated.is_empty() {
            return Ok(());
        }
        inner.endpoint.enqueue(DeltaMessage::with_changes(
            self.local_id.clone(),
            self.partner_id.clone(),
            consolidated,
        ));
        inner.time_updated = now_millis();
        Ok(())
    }

    /// Runs one endpoint send cycle
    pub fn send_outgoing(&self, now: &Instant) -> Result<SendOutcome, ProxyError> {
        Ok(self.inner()?.endpoint.send_cycle(now)?)
    }

    // Incoming

    /// Drains the channel, orders messages through the endpoint, and
    /// applies their change records to the store. Messages the access
    /// policy rejects are dropped whole: no records applied, no token
    /// processed. A record that cannot be applied is skipped with a
    /// warning; the rest of its batch still goes through.
    pub fn process_incoming(
        &self,
        store: &mut dyn GraphStore,
        now: TimeMillis,
    ) -> Result<ProcessReport, ProxyError> {
        let mut report = ProcessReport::default();
        let mut inner = self.inner()?;

        loop {
            let raw = match inner.receiver.receive() {
                Ok(Some(message)) => message,
                Ok(None) => break,
                Err(_) => {
                    return Err(TransportError::ChannelClosed {
                        partner: self.partner_id.to_string(),
                    }
                    .into())
                }
            };

            if !self.access.allow_inbound(&self.partner_id, &raw) {
                warn!(
                    "Proxy {} <- {}: access policy rejected inbound message",
                    self.local_id, self.partner_id
                );
                report.denied += 1;
                continue;
            }

            for message in inner.endpoint.receive(raw)? {
                self.handle_delivered(&mut inner, store, message, now, &mut report)?;
            }
        }

        if report.ceased {
            inner.ceased = true;
        }
        Ok(report)
    }

    fn handle_delivered(
        &self,
        inner: &mut ProxyInner,
        store: &mut dyn GraphStore,
        message: DeltaMessage,
        now: TimeMillis,
        report: &mut ProcessReport,
    ) -> Result<(), ProxyError> {
        if message.cease_communications {
            info!(
                "Proxy {} <- {}: partner is severing the relationship",
                self.local_id, self.partner_id
            );
            report.ceased = true;
            return Ok(());
        }

        if message.ping {
            inner.endpoint.enqueue(DeltaMessage::pong(
                self.local_id.clone(),
                self.partner_id.clone(),
                message.request_id,
            ));
        }

        if message.pong {
            inner.time_read = now;
            inner.refresh_requested = false;
            if let Some(interval) = self.policy.interval() {
                inner.time_expires = now + interval.as_millis() as u64;
            }
        }

        for change in &message.changes {
            match self.apply_one(store, change) {
                Ok(()) => report.applied += 1,
                Err(error) => {
                    warn!(
                        "Proxy {} <- {}: skipping inapplicable change for {}: {}",
                        self.local_id,
                        self.partner_id,
                        change.node(),
                        error
                    );
                    report.skipped += 1;
                }
            }
        }
        if !message.changes.is_empty() {
            inner.time_read = now;
        }

        // the waiter is signalled after the changes are in the store
        self.exchange.accept(&message);
        Ok(())
    }

    /// Applies one remote change. On a creation conflict the remote side
    /// wins unless the local copy is authoritative. A property, type or
    /// role change for a node deleted locally is skipped: the record
    /// cannot reconstruct the node, so the local deletion stands until the
    /// partner resends the node's creation.
    fn apply_one(&self, store: &mut dyn GraphStore, change: &ChangeRecord) -> Result<(), GraphError> {
        match store.apply_change(change) {
            Ok(Applied::Changed) | Ok(Applied::NoOp) => Ok(()),
            Err(GraphError::NodeAlreadyExists { node }) => {
                if store.is_authoritative(&node) {
                    // the master copy lives here; keep it
                    return Err(GraphError::NodeAlreadyExists { node });
                }
                store.apply_change(&ChangeRecord::NodeDeleted { node })?;
                store.apply_change(change).map(|_| ())
            }
            Err(error) => Err(error),
        }
    }

    // Freshness

    /// Applies the coherence policy: decides whether the replica needs a
    /// refresh and performs it. Blocking modes wait up to `timeout` for
    /// the partner's confirmation while another thread drives the message
    /// loop; on timeout the lease is left untouched and the stale replica
    /// stays available.
    pub fn refresh_if_needed(
        &self,
        now: TimeMillis,
        timeout: Duration,
    ) -> Result<RefreshOutcome, ProxyError> {
        match self.policy.mode {
            FreshnessMode::PushImmediate => Ok(RefreshOutcome::Fresh),
            FreshnessMode::PollAtInterval { .. } => {
                let mut inner = self.inner()?;
                if inner.ceased {
                    return Err(ProxyError::NotLive {
                        partner: self.partner_id.to_string(),
                    });
                }
                if inner.time_expires > now {
                    return Ok(RefreshOutcome::Fresh);
                }
                // one outstanding ping at a time; repeated calls while the
                // lease is expired must not flood the partner
                if !inner.refresh_requested {
                    inner.endpoint.enqueue(DeltaMessage::ping(
                        self.local_id.clone(),
                        self.partner_id.clone(),
                        None,
                    ));
                    inner.refresh_requested = true;
                }
                Ok(RefreshOutcome::Requested)
            }
            FreshnessMode::OneTimeSnapshot => {
                if self.inner()?.snapshot_taken {
                    return Ok(RefreshOutcome::Fresh);
                }
                self.invoke_refresh(timeout)?;
                self.inner()?.snapshot_taken = true;
                Ok(RefreshOutcome::Confirmed)
            }
            FreshnessMode::OnDemandOnly => {
                self.invoke_refresh(timeout)?;
                Ok(RefreshOutcome::Confirmed)
            }
        }
    }

    /// Queues a correlated refresh request and blocks for its
    /// confirmation. The internal lock is released before waiting.
    fn invoke_refresh(&self, timeout: Duration) -> Result<(), ProxyError> {
        let ping = DeltaMessage::ping(self.local_id.clone(), self.partner_id.clone(), None);
        let (request_id, ping) = self.exchange.prepare(ping)?;
        {
            let mut inner = self.inner()?;
            if inner.ceased {
                self.exchange.abandon(request_id);
                return Err(ProxyError::NotLive {
                    partner: self.partner_id.to_string(),
                });
            }
            inner.endpoint.enqueue(ping);
        }

        match self.exchange.wait(request_id, timeout) {
            Ok(_response) => Ok(()),
            Err(InvokeError::Timeout { waited_millis, .. }) => {
                Err(ProxyError::FreshnessFailure {
                    partner: self.partner_id.to_string(),
                    waited_millis,
                })
            }
            Err(error) => Err(error.into()),
        }
    }

    // Shutdown and externalization

    /// Ends the relationship. When permanent, a best-effort cease message
    /// is queued so the partner can forget its own proxy; a transient stop
    /// leaves the partner's state intact for a later `restore`.
    pub fn die(&self, permanent: bool) -> Result<(), ProxyError> {
        let mut inner = self.inner()?;
        if inner.ceased {
            return Ok(());
        }
        if permanent {
            inner.endpoint.enqueue(DeltaMessage::cease(
                self.local_id.clone(),
                self.partner_id.clone(),
            ));
        }
        inner.ceased = true;
        Ok(())
    }

    /// Captures everything needed to resume this relationship after a
    /// process restart
    pub fn externalize(&self) -> Result<ExternalizedProxy, ProxyError> {
        let inner = self.inner()?;
        Ok(ExternalizedProxy {
            local_id: self.local_id.clone(),
            partner_id: self.partner_id.clone(),
            coherence: self.policy.to_external_form(),
            last_sent_token: inner.endpoint.last_sent_token(),
            last_received_token: inner.endpoint.last_received_token(),
            unacknowledged: inner
                .endpoint
                .unacknowledged_messages()
                .into_iter()
                .map(|message| (message.token, message))
                .collect(),
            queued: inner.endpoint.queued_messages(),
            time_created: inner.time_created,
            time_updated: inner.time_updated,
            time_read: inner.time_read,
            time_expires: inner.time_expires,
            snapshot_taken: inner.snapshot_taken,
        })
    }
}
