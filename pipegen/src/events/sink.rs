//! Ordered progress channel between an orchestration run and its caller
//!
//! Backed by a bounded tokio mpsc channel: events arrive in emission order
//! and a full buffer applies back-pressure to the run. Dropping the
//! receiver closes the sink, which is the run's cancellation signal.

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use super::types::{Icon, Phase, ProgressEvent};

/// Default channel capacity (events)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// The receiving side has gone away
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("progress receiver closed")]
pub struct SinkClosed;

/// Producer half, owned by the orchestration run
#[derive(Debug, Clone)]
pub struct ProgressSink {
    tx: mpsc::Sender<ProgressEvent>,
}

impl ProgressSink {
    /// Send one event, waiting for buffer space
    pub async fn emit(&self, event: ProgressEvent) -> Result<(), SinkClosed> {
        debug!(event_type = event.event_type(), "ProgressSink::emit");
        self.tx.send(event).await.map_err(|_| SinkClosed)
    }

    pub async fn status(&self, phase: Phase, iteration: u32, message: impl Into<String>) -> Result<(), SinkClosed> {
        self.emit(ProgressEvent::status(phase, iteration, message)).await
    }

    pub async fn detail(
        &self,
        icon: Icon,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<(), SinkClosed> {
        self.emit(ProgressEvent::detail(icon, title, message)).await
    }

    /// Resolves once the receiver has been dropped
    pub async fn closed(&self) {
        self.tx.closed().await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half, owned by the caller
#[derive(Debug)]
pub struct ProgressReceiver {
    rx: mpsc::Receiver<ProgressEvent>,
}

impl ProgressReceiver {
    /// Next event, or `None` once the run has finished and the buffer is drained
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.rx.recv().await
    }

    /// Drain every remaining event
    pub async fn collect(mut self) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.rx.recv().await {
            events.push(event);
        }
        events
    }

    pub fn into_stream(self) -> ReceiverStream<ProgressEvent> {
        ReceiverStream::new(self.rx)
    }
}

/// Create a progress channel with the given buffer capacity (at least 1)
pub fn progress_channel(capacity: usize) -> (ProgressSink, ProgressReceiver) {
    debug!(capacity, "progress_channel: called");
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ProgressSink { tx }, ProgressReceiver { rx })
}
