mod channel;
mod error;

pub use channel::message_channel;
pub use error::TransportError;

use crate::message::delta::DeltaMessage;

/// Transmit failure. Transient by contract: the endpoint retries with the
/// same token, so a sender may fail freely without breaking delivery
/// guarantees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendError;

/// Receive failure: the underlying channel is closed or corrupt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecvError;

/// The sending half of an abstract message channel. Implementations may be
/// backed by TCP, HTTP long-poll, or an in-process queue; the core never
/// assumes ordering or reliability.
pub trait MessageSender: Send {
    fn send(&self, message: &DeltaMessage) -> Result<(), SendError>;
}

/// The receiving half of an abstract message channel
pub trait MessageReceiver: Send {
    /// Non-blocking poll. `Ok(None)` means no message is currently
    /// available.
    fn receive(&mut self) -> Result<Option<DeltaMessage>, RecvError>;
}
