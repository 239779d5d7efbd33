use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use meshsync_shared::{DeltaMessage, MessageReceiver, MessageSender, RecvError, SendError};

/// Switch controlling whether a flaky channel drops sends
#[derive(Clone)]
pub struct FlakySwitch {
    broken: Arc<AtomicBool>,
}

impl FlakySwitch {
    pub fn break_link(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    pub fn restore_link(&self) {
        self.broken.store(false, Ordering::SeqCst);
    }
}

struct FlakySender {
    queue: Arc<Mutex<VecDeque<DeltaMessage>>>,
    broken: Arc<AtomicBool>,
}

impl MessageSender for FlakySender {
    fn send(&self, message: &DeltaMessage) -> Result<(), SendError> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(SendError);
        }
        match self.queue.lock() {
            Ok(mut queue) => {
                queue.push_back(message.clone());
                Ok(())
            }
            Err(_) => Err(SendError),
        }
    }
}

struct FlakyReceiver {
    queue: Arc<Mutex<VecDeque<DeltaMessage>>>,
}

impl MessageReceiver for FlakyReceiver {
    fn receive(&mut self) -> Result<Option<DeltaMessage>, RecvError> {
        match self.queue.lock() {
            Ok(mut queue) => Ok(queue.pop_front()),
            Err(_) => Err(RecvError),
        }
    }
}

/// An in-memory channel whose sender can be broken and restored, for
/// exercising retry and recovery paths
pub fn flaky_channel() -> (
    Box<dyn MessageSender>,
    Box<dyn MessageReceiver>,
    FlakySwitch,
) {
    let queue = Arc::new(Mutex::new(VecDeque::new()));
    let broken = Arc::new(AtomicBool::new(false));
    (
        Box::new(FlakySender {
            queue: queue.clone(),
            broken: broken.clone(),
        }),
        Box::new(FlakyReceiver { queue }),
        FlakySwitch { broken },
    )
}
