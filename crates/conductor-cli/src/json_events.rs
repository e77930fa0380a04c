//! `--json-events`: one JSON object per orchestrator event on stdout.
//!
//! For wrappers that drive conductor and render progress themselves. The
//! stream ends when every sender of the broadcast channel is gone.

use std::io::{self, Write};

use conductor_core::OrchestratorEvent;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::warn;

/// Write events to stdout on a background task.
pub fn spawn_stdout_writer(events: broadcast::Receiver<OrchestratorEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut out = io::stdout();
        if let Err(e) = write_lines(events, &mut out).await {
            warn!(error = %e, "event stream stopped");
        }
    })
}

/// Copy events to `out` until the channel closes. Returns how many were written.
pub async fn write_lines<W: Write>(
    mut events: broadcast::Receiver<OrchestratorEvent>,
    out: &mut W,
) -> io::Result<usize> {
    let mut written = 0;
    loop {
        match events.recv().await {
            Ok(event) => {
                let line = serde_json::to_string(&event).map_err(io::Error::other)?;
                writeln!(out, "{line}")?;
                out.flush()?;
                written += 1;
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "event stream fell behind, events dropped");
            }
            Err(RecvError::Closed) => return Ok(written),
        }
    }
}
