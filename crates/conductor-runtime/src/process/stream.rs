//! Async line readers for child process pipes (non-UTF8-safe).
//!
//! Backend tooling can emit non-UTF8 bytes on stdout/stderr, and
//! `BufReader::lines()` ends the reader on invalid UTF-8. Lines are read as
//! bytes and decoded lossily so output streaming survives.

use conductor_core::StreamOrigin;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tracing::debug;

/// One decoded line of child output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub origin: StreamOrigin,
    pub text: String,
}

/// Forward every line of `stream` to `tx` until EOF, a read error, or the
/// receiver going away. Lines of one stream keep their order.
pub fn spawn_stream_reader(
    stream: impl AsyncRead + Unpin + Send + 'static,
    service: String,
    origin: StreamOrigin,
    tx: mpsc::Sender<OutputLine>,
) {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf: Vec<u8> = Vec::with_capacity(1024);
        let stream_type = origin.as_str();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    if buf.last() == Some(&b'\n') {
                        buf.pop();
                        if buf.last() == Some(&b'\r') {
                            buf.pop();
                        }
                    }

                    let text = String::from_utf8_lossy(&buf).into_owned();
                    debug!(service = %service, %stream_type, "{}", text);
                    if tx.send(OutputLine { origin, text }).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!(
                        service = %service,
                        %stream_type,
                        error = %e,
                        "output reader exiting due to read error"
                    );
                    break;
                }
            }
        }

        debug!(service = %service, %stream_type, "output reader task exiting");
    });
}
