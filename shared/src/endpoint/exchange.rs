use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::message::delta::DeltaMessage;
use crate::types::RequestId;

/// Errors that can occur during a blocking invoke
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvokeError {
    /// No correlated response arrived within the requested timeout. The
    /// caller gave up waiting; no token was consumed and no message was
    /// dropped.
    #[error("Invoke {request_id} timed out after {waited_millis}ms")]
    Timeout {
        request_id: RequestId,
        waited_millis: u64,
    },

    /// The exchange is shutting down and will not accept responses
    #[error("Response exchange is closed")]
    Closed,
}

enum ResponseSlot {
    Waiting,
    Fulfilled(DeltaMessage),
}

/// Request/response overlay over an Endpoint. Callers block until a
/// correlated response token arrives or their timeout elapses, without ever
/// blocking the endpoint's delivery loop: the delivery loop only feeds
/// responses in via `accept`.
///
/// Concurrent invokes are matched to their responses by the correlation
/// identifier carried in the message, never by arrival order.
pub struct ResponseExchange {
    next_request_id: AtomicU64,
    slots: Mutex<HashMap<RequestId, ResponseSlot>>,
    signal: Condvar,
}

impl ResponseExchange {
    pub fn new() -> Self {
        Self {
            next_request_id: AtomicU64::new(1),
            slots: Mutex::new(HashMap::new()),
            signal: Condvar::new(),
        }
    }

    /// Stamps an outgoing message with a fresh correlation id and registers
    /// a waiting slot for its response. The caller enqueues the returned
    /// message and then blocks in `wait`.
    pub fn prepare(&self, mut message: DeltaMessage) -> Result<(RequestId, DeltaMessage), InvokeError> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::SeqCst);
        message.request_id = Some(request_id);
        let mut slots = self.slots.lock().map_err(|_| InvokeError::Closed)?;
        slots.insert(request_id, ResponseSlot::Waiting);
        Ok((request_id, message))
    }

    /// Offers an incoming message as a potential response. Returns whether
    /// the message was consumed by a waiting invoke. Responses for
    /// abandoned (timed-out) invokes are not consumed.
    pub fn accept(&self, message: &DeltaMessage) -> bool {
        let Some(response_id) = message.response_id else {
            return false;
        };
        let Ok(mut slots) = self.slots.lock() else {
            return false;
        };
        match slots.get(&response_id) {
            Some(ResponseSlot::Waiting) => {
                slots.insert(response_id, ResponseSlot::Fulfilled(message.clone()));
                self.signal.notify_all();
                true
            }
            _ => false,
        }
    }

    /// Blocks the calling thread until the response correlated with
    /// `request_id` arrives or `timeout` elapses. On timeout the slot is
    /// abandoned and the error carries how long was waited.
    pub fn wait(&self, request_id: RequestId, timeout: Duration) -> Result<DeltaMessage, InvokeError> {
        let started = Instant::now();
        let mut slots = self.slots.lock().map_err(|_| InvokeError::Closed)?;

        loop {
            match slots.get(&request_id) {
                Some(ResponseSlot::Fulfilled(_)) => {
                    let Some(ResponseSlot::Fulfilled(response)) = slots.remove(&request_id) else {
                        return Err(InvokeError::Closed);
                    };
                    return Ok(response);
                }
                Some(ResponseSlot::Waiting) => {}
                None => return Err(InvokeError::Closed),
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                slots.remove(&request_id);
                return Err(InvokeError::Timeout {
                    request_id,
                    waited_millis: elapsed.as_millis() as u64,
                });
            }

            let (guard, _) = self
                .signal
                .wait_timeout(slots, timeout - elapsed)
                .map_err(|_| InvokeError::Closed)?;
            slots = guard;
        }
    }

    /// Abandons a registered invoke without waiting
    pub fn abandon(&self, request_id: RequestId) {
        if let Ok(mut slots) = self.slots.lock() {
            slots.remove(&request_id);
        }
    }
}

impl Default for ResponseExchange {
    fn default() -> Self {
        Self::new()
    }
}
