use thiserror::Error;

/// Unrecoverable transport conditions. Transient transmit failures never
/// appear here; the endpoint absorbs those by retrying with the same
/// token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The channel is closed and will not deliver further messages
    #[error("Channel to {partner} is closed")]
    ChannelClosed { partner: String },
}
