//! Async drain of agent stdout/stderr into a bounded ring buffer.
//!
//! The agent (and the CLI tool it wraps) can emit non-UTF8 bytes. Using
//! `BufReader::lines()` would terminate the reader task on invalid UTF-8,
//! so lines are read as bytes and decoded lossily. Both streams must be
//! drained continuously: an undrained pipe blocks the child once its
//! buffer fills.

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tracing::debug;

/// Maximum number of output lines retained per process
const MAX_OUTPUT_LINES: usize = 2000;

/// Which child stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

/// One captured line of agent output.
#[derive(Debug, Clone)]
pub struct OutputLine {
    pub at: DateTime<Utc>,
    pub stream: StreamKind,
    pub line: String,
}

/// Bounded ring buffer of recent agent output, shared between the two
/// drain tasks and the supervisor.
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer {
    lines: Arc<RwLock<VecDeque<OutputLine>>>,
}

impl OutputBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            lines: Arc::new(RwLock::new(VecDeque::with_capacity(MAX_OUTPUT_LINES))),
        }
    }

    /// Append a line, evicting the oldest once at capacity.
    pub fn push(&self, stream: StreamKind, line: String) {
        let Ok(mut lines) = self.lines.write() else {
            return;
        };
        if lines.len() >= MAX_OUTPUT_LINES {
            lines.pop_front();
        }
        lines.push_back(OutputLine {
            at: Utc::now(),
            stream,
            line,
        });
    }

    /// Copy of the retained lines, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<OutputLine> {
        self.lines
            .read()
            .map(|lines| lines.iter().cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.read().map(|lines| lines.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Spawn a background task draining one child stream into `buffer`.
///
/// The task exits on EOF. Read errors are logged and end the drain;
/// they are never fatal to the supervisor.
pub fn spawn_output_reader(
    stream: impl AsyncRead + Unpin + Send + 'static,
    kind: StreamKind,
    buffer: OutputBuffer,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf: Vec<u8> = Vec::with_capacity(1024);

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break, // EOF
                Ok(_) => {
                    if buf.last() == Some(&b'\n') {
                        buf.pop();
                        if buf.last() == Some(&b'\r') {
                            buf.pop();
                        }
                    }
                    let line = String::from_utf8_lossy(&buf).to_string();
                    debug!(stream = kind.as_str(), "agent: {}", line);
                    buffer.push(kind, line);
                }
                Err(e) => {
                    debug!(stream = kind.as_str(), error = %e, "Output reader exiting on read error");
                    break;
                }
            }
        }

        debug!(stream = kind.as_str(), "Output reader task exiting");
    })
}
