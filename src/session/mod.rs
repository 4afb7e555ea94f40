//! Editor-facing side of the copilot.
//!
//! This module contains:
//! - The bounded action queue between processing and the session
//! - The shared control state written by inbound commands
//! - The wire protocol of the editor's WebSocket API
//! - The streaming session running the consumer and producer loops

pub mod control;
pub mod protocol;
pub mod queue;
pub mod stream;

// Re-export commonly used types
pub use control::{create_shared_control, ControlFlags, ControlState, SharedControl, StartRequest};
pub use protocol::{decode_action, encode_action, parse_command, ControlCommand};
pub use queue::{action_queue, QueueReader, QueueWriter, DEFAULT_QUEUE_CAPACITY};
pub use stream::{SessionError, SessionOptions, StreamingSession};
