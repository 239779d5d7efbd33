use std::collections::VecDeque;
use std::time::Instant;

use log::warn;

use crate::backoff::Backoff;
use crate::endpoint::config::EndpointConfig;
use crate::endpoint::error::EndpointError;
use crate::endpoint::listener::{EndpointListener, ListenerHandle, ListenerRegistry};
use crate::message::delta::DeltaMessage;
use crate::timer::{vary, Timer};
use crate::token::{is_duplicate, try_next_token, Token, TOKEN_NONE};
use crate::token_list::TokenList;
use crate::transport::MessageSender;
use crate::types::BaseId;

/// Observable delivery state of an Endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointState {
    /// Nothing queued, nothing unacknowledged
    Idle,
    /// Messages are queued but not yet dispatched
    PendingSend,
    /// Messages were transmitted and await an acknowledging token
    AwaitingAck,
    /// The last transmit failed; a retry with the same tokens is pending
    Retrying,
    /// The retry budget is exhausted
    Dead,
}

/// Outcome of one send cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Nothing was due
    Nothing,
    /// This many messages were transmitted
    Sent(usize),
    /// The transmit failed; the batch is retained and a retry is scheduled
    /// with the same tokens
    TransmitFailed,
    /// A retry is scheduled but its backoff delay has not elapsed yet
    WaitingRetry,
}

enum SendPlan {
    /// Stamp and dispatch freshly queued messages
    Fresh,
    /// Retransmit the retained batch verbatim
    Resend,
}

/// Reliable bidirectional message-exchange primitive over an abstract
/// channel. Delivers DeltaMessages with at-least-once semantics, suppresses
/// duplicates by token, and retains sent-but-unacknowledged messages so the
/// identical batch can be retransmitted after a reconnect.
///
/// The endpoint has no graph knowledge; it moves opaque DeltaMessages.
/// All time-dependent behavior is driven by the explicit `now` argument.
pub struct Endpoint {
    local_id: BaseId,
    partner_id: BaseId,
    sender: Box<dyn MessageSender>,
    config: EndpointConfig,

    last_sent_token: Token,
    last_received_token: Token,
    /// Queued by `enqueue`, not yet dispatched; tokens unassigned
    messages_to_be_sent: VecDeque<DeltaMessage>,
    /// Dispatched, not yet acknowledged; retained for verbatim resend
    messages_last_sent: TokenList<DeltaMessage>,
    /// Received ahead of a gap; held back so application happens in token
    /// order
    pending_receives: TokenList<DeltaMessage>,

    listeners: ListenerRegistry,
    heartbeat_timer: Timer,
    recover_timer: Timer,
    retry_timer: Timer,
    backoff: Backoff,
    needs_resend: bool,
    /// Inbound traffic since the last dispatch deserves an acknowledging
    /// token on the next cycle
    ack_owed: bool,
    dead: bool,
}

impl Endpoint {
    /// Creates a fresh Endpoint for a newly established partner
    /// relationship
    pub fn new(
        local_id: BaseId,
        partner_id: BaseId,
        sender: Box<dyn MessageSender>,
        config: EndpointConfig,
    ) -> Self {
        Self::restore(
            local_id,
            partner_id,
            sender,
            config,
            TOKEN_NONE,
            TOKEN_NONE,
            Vec::new(),
            Vec::new(),
        )
    }

    /// Recreates an Endpoint from persisted state, preserving delivery
    /// guarantees across a process restart. Restored unacknowledged
    /// messages are retransmitted verbatim on the next send cycle.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        local_id: BaseId,
        partner_id: BaseId,
        sender: Box<dyn MessageSender>,
        config: EndpointConfig,
        last_sent_token: Token,
        last_received_token: Token,
        messages_last_sent: Vec<DeltaMessage>,
        messages_to_be_sent: Vec<DeltaMessage>,
    ) -> Self {
        let mut last_sent_list = TokenList::new();
        for message in messages_last_sent {
            if message.token == TOKEN_NONE || last_sent_list.try_insert(message.token, message).is_err() {
                warn!("Discarding restored sent message with invalid or duplicate token");
            }
        }
        let needs_resend = !last_sent_list.is_empty();
        let heartbeat = vary(config.heartbeat_interval, config.random_variation);
        let recover = vary(config.recover_interval, config.random_variation);

        Self {
            local_id,
            partner_id,
            config: config.clone(),
            sender,
            last_sent_token,
            last_received_token,
            messages_to_be_sent: messages_to_be_sent.into(),
            messages_last_sent: last_sent_list,
            pending_receives: TokenList::new(),
            listeners: ListenerRegistry::new(),
            heartbeat_timer: Timer::new(heartbeat),
            recover_timer: Timer::new(recover),
            // duration zero: a restored/failed batch may be resent at once
            retry_timer: Timer::new(std::time::Duration::ZERO),
            backoff: Backoff::new(config.retry),
            needs_resend,
            ack_owed: false,
            dead: false,
        }
    }

    pub fn local_id(&self) -> &BaseId {
        &self.local_id
    }

    pub fn partner_id(&self) -> &BaseId {
        &self.partner_id
    }

    pub fn last_sent_token(&self) -> Token {
        self.last_sent_token
    }

    pub fn last_received_token(&self) -> Token {
        self.last_received_token
    }

    pub fn state(&self) -> EndpointState {
        if self.dead {
            EndpointState::Dead
        } else if self.needs_resend {
            EndpointState::Retrying
        } else if !self.messages_to_be_sent.is_empty() {
            EndpointState::PendingSend
        } else if !self.messages_last_sent.is_empty() {
            EndpointState::AwaitingAck
        } else {
            EndpointState::Idle
        }
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    // Listeners

    pub fn add_listener(&mut self, listener: Box<dyn EndpointListener>) -> ListenerHandle {
        self.listeners.add(listener)
    }

    /// Returns whether the handle was registered
    pub fn remove_listener(&mut self, handle: ListenerHandle) -> bool {
        self.listeners.remove(handle)
    }

    // Outgoing

    /// Appends a message to the outgoing queue. Never blocks; transmission
    /// happens in a later send cycle.
    pub fn enqueue(&mut self, message: DeltaMessage) {
        self.messages_to_be_sent.push_back(message);
    }

    pub fn has_outgoing_messages(&self) -> bool {
        !self.messages_to_be_sent.is_empty()
    }

    /// Runs one send cycle: moves the outgoing queue into the retained
    /// sent-list, assigns send tokens (each increasing by exactly one), and
    /// attempts transmission. On transmit failure the batch is retained and
    /// retried later with the same tokens. When nothing is queued but
    /// inbound changes still owe the partner an acknowledging token, or the
    /// endpoint has been fully idle past the heartbeat interval, an empty
    /// token-only message is sent instead.
    pub fn send_cycle(&mut self, now: &Instant) -> Result<SendOutcome, EndpointError> {
        if self.dead {
            return Err(EndpointError::Dead {
                partner: self.partner_id.to_string(),
                attempts: self.backoff.attempts(),
            });
        }

        let plan = if self.needs_resend {
            if !self.retry_timer.ringing(now) {
                return Ok(SendOutcome::WaitingRetry);
            }
            SendPlan::Resend
        } else if !self.messages_last_sent.is_empty() && self.recover_timer.ringing(now) {
            // sent successfully, but no acknowledging token came back in
            // time; the partner may never have received the batch
            SendPlan::Resend
        } else if !self.messages_to_be_sent.is_empty() {
            SendPlan::Fresh
        } else if self.ack_owed
            || (self.messages_last_sent.is_empty() && self.heartbeat_timer.ringing(now))
        {
            // an empty message carries the acknowledging token the partner
            // is waiting for, or acts as a heartbeat. Heartbeats only while
            // fully idle; with a batch awaiting acknowledgment the
            // recover-timer resend keeps the exchange alive, and minting
            // more retained messages would grow the sent-list without
            // bound against a silent partner.
            self.messages_to_be_sent.push_back(DeltaMessage::with_changes(
                self.local_id.clone(),
                self.partner_id.clone(),
                Vec::new(),
            ));
            SendPlan::Fresh
        } else {
            return Ok(SendOutcome::Nothing);
        };

        let transmit_from = match plan {
            SendPlan::Resend => TOKEN_NONE,
            SendPlan::Fresh => {
                let first_fresh = try_next_token(self.last_sent_token)?;
                while let Some(mut message) = self.messages_to_be_sent.pop_front() {
                    let token = try_next_token(self.last_sent_token)?;
                    message.token = token;
                    message.ack_token = self.last_received_token;
                    self.last_sent_token = token;
                    self.messages_last_sent.insert(token, message);
                }
                // fresh messages carry the current ack token; a failed
                // transmit resends them verbatim, so the debt stays paid
                self.ack_owed = false;
                first_fresh
            }
        };

        self.transmit_retained(transmit_from, now)
    }

    /// Transmits every retained message with a token at or after `from`,
    /// in token order
    fn transmit_retained(
        &mut self,
        from: Token,
        now: &Instant,
    ) -> Result<SendOutcome, EndpointError> {
        let mut sent = 0;
        let mut failed = false;
        for (token, message) in self.messages_last_sent.iter() {
            if *token < from {
                continue;
            }
            if self.sender.send(message).is_err() {
                failed = true;
                break;
            }
            self.listeners.notify_sent(message);
            sent += 1;
        }

        if failed {
            return self.on_transmit_failure(now);
        }

        self.needs_resend = false;
        self.backoff.reset();
        self.heartbeat_timer
            .rearm(vary(self.config.heartbeat_interval, self.config.random_variation), now);
        self.recover_timer
            .rearm(vary(self.config.recover_interval, self.config.random_variation), now);
        Ok(SendOutcome::Sent(sent))
    }

    fn on_transmit_failure(&mut self, now: &Instant) -> Result<SendOutcome, EndpointError> {
        match self.backoff.next_delay() {
            Some(delay) => {
                self.needs_resend = true;
                self.retry_timer.rearm(delay, now);
                Ok(SendOutcome::TransmitFailed)
            }
            None => {
                self.dead = true;
                self.listeners.notify_died(&self.partner_id);
                Err(EndpointError::Dead {
                    partner: self.partner_id.to_string(),
                    attempts: self.backoff.attempts(),
                })
            }
        }
    }

    // Incoming

    /// Accepts a message from the channel. Acknowledged entries are cleared
    /// from the retained sent-list; a token at or below the last processed
    /// one is dropped as a duplicate; everything else is buffered and
    /// released strictly in token order. Returns the messages ready for
    /// application, in order.
    pub fn receive(&mut self, message: DeltaMessage) -> Result<Vec<DeltaMessage>, EndpointError> {
        if self.dead {
            return Err(EndpointError::Dead {
                partner: self.partner_id.to_string(),
                attempts: self.backoff.attempts(),
            });
        }

        // acknowledgment first: even a duplicate's ack information is valid
        let acked = self.messages_last_sent.drain_through(message.ack_token);
        if !acked.is_empty() && self.messages_last_sent.is_empty() {
            self.needs_resend = false;
            self.backoff.reset();
        }

        if is_duplicate(message.token, self.last_received_token)
            || self.pending_receives.contains(message.token)
        {
            warn!(
                "Endpoint {} <- {}: ignoring duplicate incoming message (token {})",
                self.local_id, self.partner_id, message.token
            );
            // a resend means the partner has not seen our acknowledgment
            self.ack_owed = true;
            return Ok(Vec::new());
        }

        self.pending_receives.insert(message.token, message);

        let mut delivered = Vec::new();
        loop {
            let next_in_order = match self.pending_receives.front() {
                Some((token, _)) if *token == self.last_received_token + 1 => true,
                _ => false,
            };
            if !next_in_order {
                break;
            }
            // front() just matched, pop_front cannot fail
            let Some((token, message)) = self.pending_receives.pop_front() else {
                break;
            };
            self.last_received_token = token;
            self.listeners.notify_received(&message);
            delivered.push(message);
        }
        if delivered.iter().any(|message| !message.is_empty()) {
            self.ack_owed = true;
        }
        Ok(delivered)
    }

    // Externalization support

    /// Messages enqueued but not yet dispatched, in queue order
    pub fn queued_messages(&self) -> Vec<DeltaMessage> {
        self.messages_to_be_sent.iter().cloned().collect()
    }

    /// Messages dispatched but not yet acknowledged, in token order
    pub fn unacknowledged_messages(&self) -> Vec<DeltaMessage> {
        self.messages_last_sent
            .iter()
            .map(|(_, message)| message.clone())
            .collect()
    }
}
