use serde::{Deserialize, Serialize};

use meshsync_shared::{BaseId, CoherencePolicy, DeltaMessage, TimeMillis, Token};

use crate::error::RestoreError;

/// Everything a proxy needs to resume exchange with its partner after a
/// process restart. Tokens and retained messages come back exactly as they
/// were, so the partner's duplicate filter stays coherent across the gap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalizedProxy {
    pub local_id: BaseId,
    pub partner_id: BaseId,
    /// Coherence policy in its external form, e.g. "poll:60000;redirects"
    pub coherence: String,
    pub last_sent_token: Token,
    pub last_received_token: Token,
    /// Sent but not yet acknowledged, in token order
    pub unacknowledged: Vec<(Token, DeltaMessage)>,
    /// Enqueued but never transmitted
    pub queued: Vec<DeltaMessage>,
    pub time_created: TimeMillis,
    pub time_updated: TimeMillis,
    pub time_read: TimeMillis,
    /// 0 means no lease is held
    pub time_expires: TimeMillis,
    pub snapshot_taken: bool,
}

impl ExternalizedProxy {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, RestoreError> {
        let parsed: Self = serde_json::from_str(raw)?;
        // Fail early on a policy string we could never act on
        CoherencePolicy::from_external_form(&parsed.coherence)?;
        Ok(parsed)
    }

    pub fn coherence_policy(&self) -> Result<CoherencePolicy, RestoreError> {
        Ok(CoherencePolicy::from_external_form(&self.coherence)?)
    }
}
