//! Broadcast event sink for any number of in-process subscribers.

use conductor_core::{EventSink, OrchestratorEvent};
use tokio::sync::broadcast;
use tracing::trace;

/// Channel capacity. Log lines dominate the traffic.
const CHANNEL_CAPACITY: usize = 1024;

/// `EventSink` backed by `tokio::sync::broadcast`.
///
/// Never blocks. With no subscriber the event is dropped; slow subscribers
/// observe `RecvError::Lagged` instead of holding up the orchestrator.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    sender: broadcast::Sender<OrchestratorEvent>,
}

impl BroadcastSink {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for BroadcastSink {
    fn emit(&self, event: OrchestratorEvent) {
        if self.sender.receiver_count() > 0 {
            trace!(event = event.event_name(), "broadcasting event");
            let _ = self.sender.send(event);
        }
    }

    fn clone_box(&self) -> Box<dyn EventSink> {
        Box::new(self.clone())
    }
}
