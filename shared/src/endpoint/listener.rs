use std::collections::HashMap;

use crate::message::delta::DeltaMessage;
use crate::types::BaseId;

/// Observer of endpoint traffic. Registration hands out an explicit
/// ListenerHandle and listeners stay registered until removed with it;
/// there is no weakly-held registration and no GC-based cleanup.
pub trait EndpointListener: Send {
    fn message_sent(&self, _message: &DeltaMessage) {}
    fn message_received(&self, _message: &DeltaMessage) {}
    fn endpoint_died(&self, _partner: &BaseId) {}
}

/// Opaque registration handle; required for unregistration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

pub(crate) struct ListenerRegistry {
    listeners: HashMap<u64, Box<dyn EndpointListener>>,
    next_handle: u64,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            listeners: HashMap::new(),
            next_handle: 1,
        }
    }

    pub fn add(&mut self, listener: Box<dyn EndpointListener>) -> ListenerHandle {
        let handle = ListenerHandle(self.next_handle);
        self.next_handle += 1;
        self.listeners.insert(handle.0, listener);
        handle
    }

    /// Returns whether the handle was registered
    pub fn remove(&mut self, handle: ListenerHandle) -> bool {
        self.listeners.remove(&handle.0).is_some()
    }

    pub fn notify_sent(&self, message: &DeltaMessage) {
        for listener in self.listeners.values() {
            listener.message_sent(message);
        }
    }

    pub fn notify_received(&self, message: &DeltaMessage) {
        for listener in self.listeners.values() {
            listener.message_received(message);
        }
    }

    pub fn notify_died(&self, partner: &BaseId) {
        for listener in self.listeners.values() {
            listener.endpoint_died(partner);
        }
    }
}
