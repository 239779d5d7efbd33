use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::Mutex;

use super::{MessageReceiver, MessageSender, RecvError, SendError};
use crate::message::delta::DeltaMessage;

/// Creates one direction of an in-process message channel, for wiring two
/// endpoints together in the same process and for tests. Unbounded; the
/// endpoint's own queue discipline provides the backpressure.
pub fn message_channel() -> (Box<dyn MessageSender>, Box<dyn MessageReceiver>) {
    let (sender, receiver) = channel();
    (
        Box::new(ChannelSender {
            sender: Mutex::new(sender),
        }),
        Box::new(ChannelReceiver { receiver }),
    )
}

struct ChannelSender {
    sender: Mutex<Sender<DeltaMessage>>,
}

impl MessageSender for ChannelSender {
    fn send(&self, message: &DeltaMessage) -> Result<(), SendError> {
        let sender = self.sender.lock().map_err(|_| SendError)?;
        sender.send(message.clone()).map_err(|_| SendError)
    }
}

struct ChannelReceiver {
    receiver: Receiver<DeltaMessage>,
}

impl MessageReceiver for ChannelReceiver {
    fn receive(&mut self) -> Result<Option<DeltaMessage>, RecvError> {
        match self.receiver.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(RecvError),
        }
    }
}
