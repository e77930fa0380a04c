//! Per-service ring buffers of recent classified output.
//!
//! Kept for diagnostics after the fact: a failed install can show the last
//! lines of every service without the UI having recorded them.

use chrono::{DateTime, Utc};
use conductor_core::{LogEvent, Severity, StreamOrigin};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{PoisonError, RwLock};

/// A single buffered line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub stream: StreamOrigin,
    pub severity: Severity,
    pub line: String,
}

impl LogEntry {
    fn from_event(event: &LogEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            stream: event.stream,
            severity: event.severity,
            line: event.message.clone(),
        }
    }
}

/// Ring buffer storing recent lines for one service.
#[derive(Debug, Default)]
struct LogBuffer {
    lines: VecDeque<LogEntry>,
}

impl LogBuffer {
    fn push(&mut self, entry: LogEntry, capacity: usize) {
        while self.lines.len() >= capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(entry);
    }
}

/// Log buffers for every service of one orchestrator instance.
#[derive(Debug)]
pub struct ServiceLogManager {
    capacity: usize,
    buffers: RwLock<HashMap<String, LogBuffer>>,
}

impl ServiceLogManager {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            buffers: RwLock::new(HashMap::new()),
        }
    }

    /// Record one classified line.
    pub fn push(&self, event: &LogEvent) {
        let mut buffers = self.buffers.write().unwrap_or_else(PoisonError::into_inner);
        buffers
            .entry(event.service.clone())
            .or_default()
            .push(LogEntry::from_event(event), self.capacity);
    }

    /// Buffered lines for a service, oldest first.
    pub fn get(&self, service: &str) -> Vec<LogEntry> {
        let buffers = self.buffers.read().unwrap_or_else(PoisonError::into_inner);
        buffers
            .get(service)
            .map(|b| b.lines.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Most recent error line of a service.
    pub fn last_error(&self, service: &str) -> Option<LogEntry> {
        let buffers = self.buffers.read().unwrap_or_else(PoisonError::into_inner);
        buffers.get(service).and_then(|b| {
            b.lines
                .iter()
                .rev()
                .find(|e| e.severity == Severity::Error)
                .cloned()
        })
    }

    /// Drop the buffer of a service, e.g. before a fresh start.
    pub fn clear(&self, service: &str) {
        let mut buffers = self.buffers.write().unwrap_or_else(PoisonError::into_inner);
        buffers.remove(service);
    }
}

impl Default for ServiceLogManager {
    fn default() -> Self {
        Self::new(conductor_core::settings::DEFAULT_LOG_BUFFER_LINES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(service: &str, severity: Severity, message: &str) -> LogEvent {
        LogEvent::new(service, StreamOrigin::Stdout, severity, message)
    }

    #[test]
    fn ring_buffer_keeps_latest_lines() {
        let logs = ServiceLogManager::new(3);
        for i in 0..5 {
            logs.push(&event("web-server", Severity::Info, &format!("line {i}")));
        }
        let lines: Vec<String> = logs.get("web-server").into_iter().map(|e| e.line).collect();
        assert_eq!(lines, ["line 2", "line 3", "line 4"]);
        assert!(logs.get("job-worker").is_empty());
    }

    #[test]
    fn last_error_and_clear() {
        let logs = ServiceLogManager::new(10);
        logs.push(&event("migrations", Severity::Error, "first failure"));
        logs.push(&event("migrations", Severity::Error, "second failure"));
        logs.push(&event("migrations", Severity::Info, "cleanup"));

        assert_eq!(logs.last_error("migrations").unwrap().line, "second failure");
        logs.clear("migrations");
        assert!(logs.get("migrations").is_empty());
        assert!(logs.last_error("migrations").is_none());
    }
}
