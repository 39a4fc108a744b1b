//! Progress event streaming
//!
//! An orchestration run reports progress through a [`ProgressSink`]; the
//! caller consumes the matching [`ProgressReceiver`] in emission order.
//! Transports (SSE, terminal output) adapt the receiver.

mod sink;
mod types;

pub use sink::{DEFAULT_CHANNEL_CAPACITY, ProgressReceiver, ProgressSink, SinkClosed, progress_channel};
pub use types::{Icon, Phase, ProgressEvent};
