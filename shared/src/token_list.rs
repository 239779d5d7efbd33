use thiserror::Error;

use crate::token::Token;

/// Errors that can occur during TokenList operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenListError {
    /// Attempted to insert a duplicate token into the list
    #[error("Duplicate token {token} not allowed in TokenList")]
    DuplicateToken { token: Token },
}

/// A list of items keyed by token, kept in ascending token order.
/// Insertions scan from the back because tokens almost always arrive in
/// roughly increasing order.
pub struct TokenList<T> {
    list: Vec<(Token, T)>,
}

impl<T> TokenList<T> {
    pub fn new() -> Self {
        Self { list: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn front(&self) -> Option<&(Token, T)> {
        self.list.first()
    }

    pub fn pop_front(&mut self) -> Option<(Token, T)> {
        if self.list.is_empty() {
            return None;
        }
        Some(self.list.remove(0))
    }

    pub fn contains(&self, token: Token) -> bool {
        let mut index = self.list.len();

        loop {
            if index == 0 {
                // made it all the way through
                return false;
            }

            index -= 1;

            let (old_token, _) = &self.list[index];
            if *old_token == token {
                return true;
            }
            if *old_token < token {
                return false;
            }
        }
    }

    /// Attempts to insert an item with the given token, scanning from the
    /// back. Returns an error if the token already exists.
    pub fn try_insert(&mut self, token: Token, item: T) -> Result<(), TokenListError> {
        let mut index = self.list.len();

        loop {
            if index == 0 {
                // made it all the way through, insert at front and be done
                self.list.insert(index, (token, item));
                return Ok(());
            }

            index -= 1;

            let (old_token, _) = &self.list[index];
            if *old_token == token {
                return Err(TokenListError::DuplicateToken { token });
            }
            if *old_token < token {
                self.list.insert(index + 1, (token, item));
                return Ok(());
            }
        }
    }

    /// Inserts an item with the given token, scanning from the back.
    ///
    /// # Panics
    ///
    /// Panics if the token already exists in the list.
    pub fn insert(&mut self, token: Token, item: T) {
        self.try_insert(token, item)
            .expect("duplicates are not allowed in TokenList")
    }

    pub fn remove(&mut self, token: Token) -> Option<T> {
        let position = self.list.iter().position(|(t, _)| *t == token)?;
        Some(self.list.remove(position).1)
    }

    /// Removes and returns all entries with a token less than or equal to
    /// `up_to`, in ascending order. Used to clear acknowledged sends.
    pub fn drain_through(&mut self, up_to: Token) -> Vec<(Token, T)> {
        let cut = self.list.partition_point(|(t, _)| *t <= up_to);
        self.list.drain(..cut).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Token, T)> {
        self.list.iter()
    }
}
