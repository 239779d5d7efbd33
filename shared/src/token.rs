use thiserror::Error;

/// A send token. Tokens are assigned by the sending endpoint, increase by
/// exactly one per dispatched message, and never wrap. The receiving
/// endpoint uses them to suppress duplicates and to release buffered
/// messages in order.
pub type Token = u64;

/// The token value of a message that has not been dispatched yet, and the
/// initial `last received` value of a fresh endpoint. Valid send tokens
/// start at 1.
pub const TOKEN_NONE: Token = 0;

/// Errors that can occur during token arithmetic
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// The token space is exhausted. At one token per message this takes
    /// centuries; hitting it means the counter was corrupted.
    #[error("Token space exhausted at {token}")]
    Exhausted { token: Token },
}

/// Returns the token following the given one, without consuming it
pub fn token_after(token: Token) -> Token {
    token.wrapping_add(1)
}

/// Whether an incoming token should be dropped as a duplicate, given the
/// last token already processed
pub fn is_duplicate(incoming: Token, last_received: Token) -> bool {
    incoming <= last_received
}

/// Returns the next send token, or an error if the token space is
/// exhausted
pub fn try_next_token(token: Token) -> Result<Token, TokenError> {
    token.checked_add(1).ok_or(TokenError::Exhausted { token })
}

/// Returns the next send token.
///
/// # Panics
/// Panics if the token space is exhausted. Use `try_next_token` to handle
/// exhaustion without panicking.
pub fn next_token(token: Token) -> Token {
    try_next_token(token).expect("token space exhausted")
}
