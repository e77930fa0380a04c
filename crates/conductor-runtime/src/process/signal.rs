//! Termination signals for child processes.
//!
//! Unix gets a SIGTERM through `nix` so the backend can shut down cleanly;
//! escalation to SIGKILL is the caller's decision. Other platforms have no
//! graceful equivalent and are killed immediately.

use std::io;

use tokio::process::Child;

#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// Ask `child` to terminate.
///
/// A process that already exited is not an error.
pub fn request_termination(child: &mut Child) -> io::Result<()> {
    #[cfg(unix)]
    {
        let Some(pid) = child.id() else {
            return Ok(());
        };
        let pid = i32::try_from(pid).map_err(io::Error::other)?;
        match signal::kill(Pid::from_raw(pid), Signal::SIGTERM) {
            Ok(()) | Err(nix::errno::Errno::ESRCH) => Ok(()),
            Err(e) => Err(io::Error::other(e)),
        }
    }

    #[cfg(not(unix))]
    {
        force_kill(child)
    }
}

/// Kill `child` without waiting for it. Reaping is left to `Child::wait`.
pub fn force_kill(child: &mut Child) -> io::Result<()> {
    match child.start_kill() {
        Err(e) if e.kind() == io::ErrorKind::InvalidInput => Ok(()),
        other => other,
    }
}
