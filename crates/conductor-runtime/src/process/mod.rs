//! OS process plumbing and service supervision.
//!
//! - `handle`: spawning with piped output, exit and termination controls
//! - `stream`: lossy line readers for the pipes
//! - `signal`: SIGTERM / SIGKILL
//! - `logs`: per-service ring buffers
//! - `broadcaster`: broadcast-channel event sink
//! - `supervisor`: the `ServiceSupervisor`

mod broadcaster;
mod handle;
mod logs;
mod signal;
mod stream;
mod supervisor;

pub use broadcaster::BroadcastSink;
pub use handle::{ProcessExit, ProcessHandle, ProcessOutput};
pub use logs::{LogEntry, ServiceLogManager};
pub use stream::OutputLine;
pub use supervisor::ServiceSupervisor;
