//! Bounded hand-off of actions from the processing loop to the session.
//!
//! The writer never blocks: when the queue is full the incoming action is
//! dropped so frame processing keeps pace with the video regardless of
//! whether an editor is connected.

use crate::core::turnpoints::Action;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

/// Default queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 2048;

/// Create a queue and split it into its single writer and single reader.
pub fn action_queue(capacity: usize) -> (QueueWriter, QueueReader) {
    let capacity = capacity.max(1);
    let (sender, receiver) = bounded(capacity);
    (
        QueueWriter { sender, capacity },
        QueueReader { receiver },
    )
}

/// Writing half, owned by the processing loop.
#[derive(Debug)]
pub struct QueueWriter {
    sender: Sender<Action>,
    capacity: usize,
}

impl QueueWriter {
    /// Enqueue without blocking. Returns `false` if the action was dropped.
    pub fn push(&self, action: Action) -> bool {
        match self.sender.try_send(action) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => false,
            // Reader gone: nobody will ever send this.
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Maximum number of queued actions.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the next push would be dropped.
    pub fn is_full(&self) -> bool {
        self.sender.is_full()
    }
}

/// Reading half, owned by the streaming session.
#[derive(Debug)]
pub struct QueueReader {
    receiver: Receiver<Action>,
}

impl QueueReader {
    /// Dequeue the oldest action, if any.
    pub fn pop(&self) -> Option<Action> {
        self.receiver.try_recv().ok()
    }

    /// Number of actions waiting to be sent.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Whether no action is waiting.
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}
