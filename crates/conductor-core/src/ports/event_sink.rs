//! Outward event sink for status, log and installation progress events.
//!
//! Implementations handle transport (broadcast channels, terminal rendering,
//! desktop IPC). The orchestrator never waits on delivery.

use crate::events::OrchestratorEvent;

/// Push interface for orchestrator events.
///
/// # Implementations
///
/// - `NoopSink` - tests and headless contexts, drops everything
/// - Adapter-specific sinks (broadcast channel, terminal progress, ...)
pub trait EventSink: Send + Sync {
    /// Deliver an event. Must not block; dropping is acceptable.
    fn emit(&self, event: OrchestratorEvent);

    /// Clone this sink into a boxed trait object.
    fn clone_box(&self) -> Box<dyn EventSink>;
}

/// Sink that discards every event.
#[derive(Debug, Clone, Default)]
pub struct NoopSink;

impl NoopSink {
    pub const fn new() -> Self {
        Self
    }
}

impl EventSink for NoopSink {
    fn emit(&self, _event: OrchestratorEvent) {}

    fn clone_box(&self) -> Box<dyn EventSink> {
        Box::new(self.clone())
    }
}
