use thiserror::Error;

use crate::token::TokenError;

/// Errors that can occur during Endpoint operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    /// The retry budget for the current batch is exhausted; the endpoint
    /// no longer attempts delivery and must be torn down or restored
    #[error("Endpoint to {partner} is dead after {attempts} failed transmit attempts")]
    Dead { partner: String, attempts: u32 },

    /// The send token counter cannot be advanced
    #[error(transparent)]
    Token(#[from] TokenError),
}
