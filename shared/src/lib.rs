//! # Meshsync Shared
//! Common functionality shared between meshsync-base & meshsync-probe
//! crates: the reliable ping-pong endpoint, the delta-message model, and
//! coherence policies.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod backoff;
mod coherence;
mod endpoint;
mod message;
mod timer;
mod token;
mod token_list;
mod transport;
mod types;

pub use backoff::{Backoff, RetryConfig};
pub use coherence::{CoherenceParseError, CoherencePolicy, FreshnessMode};
pub use endpoint::{
    config::EndpointConfig,
    error::EndpointError,
    exchange::{InvokeError, ResponseExchange},
    listener::{EndpointListener, ListenerHandle},
    ping_pong::{Endpoint, EndpointState, SendOutcome},
};
pub use message::{
    change::{ChangeRecord, PropertyName, PropertyValue, RoleName, TypeName},
    consolidate::consolidate,
    delta::DeltaMessage,
};
pub use timer::{now_millis, vary, TimeMillis, Timer};
pub use token::{
    is_duplicate, next_token, token_after, try_next_token, Token, TokenError, TOKEN_NONE,
};
pub use token_list::{TokenList, TokenListError};
pub use transport::{
    message_channel, MessageReceiver, MessageSender, RecvError, SendError, TransportError,
};
pub use types::{BaseId, NodeId, RequestId};
