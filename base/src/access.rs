use meshsync_shared::{BaseId, DeltaMessage};

/// Authorization seam at the Proxy boundary. Consulted before any state
/// mutation; a denied message is rejected whole, with no records applied
/// and no token processed.
pub trait AccessPolicy: Send + Sync {
    fn allow_inbound(&self, partner: &BaseId, message: &DeltaMessage) -> bool;
}

/// Admits everything. The default for deployments that delegate
/// authorization to the channel.
pub struct AllowAll;

impl AccessPolicy for AllowAll {
    fn allow_inbound(&self, _partner: &BaseId, _message: &DeltaMessage) -> bool {
        true
    }
}
