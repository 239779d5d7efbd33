use serde::{Deserialize, Serialize};

use crate::message::change::ChangeRecord;
use crate::token::{Token, TOKEN_NONE};
use crate::types::{BaseId, RequestId};

/// A batch of graph changes plus protocol control fields, exchanged between
/// two mesh bases. Built by a Proxy, carried by an Endpoint.
///
/// The `token` and `ack_token` fields are owned by the sending endpoint's
/// send cycle; they are `TOKEN_NONE` until the message is dispatched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaMessage {
    pub sender: BaseId,
    pub receiver: BaseId,
    /// Send token assigned at dispatch; duplicates are suppressed by the
    /// receiving endpoint comparing against its last processed token
    pub token: Token,
    /// Highest partner token the sender had processed at dispatch time;
    /// acknowledges all of the partner's sends up to and including it
    pub ack_token: Token,
    pub changes: Vec<ChangeRecord>,
    /// Correlates a request with its response; matched by value, not order
    pub request_id: Option<RequestId>,
    pub response_id: Option<RequestId>,
    /// Refresh request marker
    pub ping: bool,
    /// Refresh confirmation marker
    pub pong: bool,
    /// The sender is severing the relationship; the receiver should forget
    /// the corresponding proxy
    pub cease_communications: bool,
}

impl DeltaMessage {
    fn blank(sender: BaseId, receiver: BaseId) -> Self {
        Self {
            sender,
            receiver,
            token: TOKEN_NONE,
            ack_token: TOKEN_NONE,
            changes: Vec::new(),
            request_id: None,
            response_id: None,
            ping: false,
            pong: false,
            cease_communications: false,
        }
    }

    /// A message conveying graph changes
    pub fn with_changes(sender: BaseId, receiver: BaseId, changes: Vec<ChangeRecord>) -> Self {
        let mut message = Self::blank(sender, receiver);
        message.changes = changes;
        message
    }

    /// A refresh request
    pub fn ping(sender: BaseId, receiver: BaseId, request_id: Option<RequestId>) -> Self {
        let mut message = Self::blank(sender, receiver);
        message.ping = true;
        message.request_id = request_id;
        message
    }

    /// A refresh confirmation answering `request_id`
    pub fn pong(sender: BaseId, receiver: BaseId, response_id: Option<RequestId>) -> Self {
        let mut message = Self::blank(sender, receiver);
        message.pong = true;
        message.response_id = response_id;
        message
    }

    /// A best-effort notification that the sender is severing the
    /// relationship
    pub fn cease(sender: BaseId, receiver: BaseId) -> Self {
        let mut message = Self::blank(sender, receiver);
        message.cease_communications = true;
        message
    }

    /// Whether the message carries no changes and no control markers.
    /// Empty messages are still sent as heartbeats: the token exchange
    /// itself keeps the endpoint pair alive.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
            && self.request_id.is_none()
            && self.response_id.is_none()
            && !self.ping
            && !self.pong
            && !self.cease_communications
    }
}
