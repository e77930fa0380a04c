//! Spawning one OS process with piped, line-buffered output.

use std::io;
use std::process::Stdio;

use conductor_core::{CommandSpec, StreamOrigin};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use super::signal::{force_kill, request_termination};
use super::stream::{OutputLine, spawn_stream_reader};

/// Lines buffered between the pipe readers and the consumer.
const OUTPUT_CHANNEL_CAPACITY: usize = 256;

/// A spawned process that exclusively owns its pipes.
#[derive(Debug)]
pub struct ProcessHandle {
    pid: Option<u32>,
    exit: ProcessExit,
    output: ProcessOutput,
}

impl ProcessHandle {
    /// Spawn `command` with stdout and stderr piped.
    ///
    /// Spawn failures (missing executable, permission denied) are returned
    /// here, never reported later as an exit.
    pub fn spawn(service: &str, command: &CommandSpec) -> io::Result<Self> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .envs(&command.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &command.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd.spawn()?;
        let pid = child.id();

        let (tx, rx) = mpsc::channel(OUTPUT_CHANNEL_CAPACITY);
        if let Some(stdout) = child.stdout.take() {
            spawn_stream_reader(stdout, service.to_string(), StreamOrigin::Stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_stream_reader(stderr, service.to_string(), StreamOrigin::Stderr, tx);
        }

        Ok(Self {
            pid,
            exit: ProcessExit { child },
            output: ProcessOutput { rx },
        })
    }

    pub const fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Separate exit control from output so both can be awaited together.
    pub fn split(self) -> (ProcessExit, ProcessOutput) {
        (self.exit, self.output)
    }
}

/// Exit future and termination controls of a process.
#[derive(Debug)]
pub struct ProcessExit {
    child: Child,
}

impl ProcessExit {
    /// Wait for the process to exit. `None` means killed by a signal.
    ///
    /// Cancel-safe.
    pub async fn wait(&mut self) -> io::Result<Option<i32>> {
        Ok(self.child.wait().await?.code())
    }

    /// Non-blocking exit check.
    pub fn try_wait(&mut self) -> io::Result<Option<Option<i32>>> {
        Ok(self.child.try_wait()?.map(|status| status.code()))
    }

    /// Graceful termination request (SIGTERM on unix).
    pub fn terminate(&mut self) -> io::Result<()> {
        request_termination(&mut self.child)
    }

    /// Forced termination (SIGKILL on unix).
    pub fn kill(&mut self) -> io::Result<()> {
        force_kill(&mut self.child)
    }
}

/// Interleaved stdout/stderr lines, each stream in its own order.
#[derive(Debug)]
pub struct ProcessOutput {
    rx: mpsc::Receiver<OutputLine>,
}

impl ProcessOutput {
    /// Next line, or `None` once both pipes reached EOF.
    ///
    /// Cancel-safe.
    pub async fn next_line(&mut self) -> Option<OutputLine> {
        self.rx.recv().await
    }
}
