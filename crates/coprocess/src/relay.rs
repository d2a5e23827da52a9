//! Background relays for child output streams
//!
//! A relay drains one child stream into a destination until the stream ends.
//! The child's stderr always gets one, so a chatty child can never fill its
//! pipe and stall while the host is waiting for a response on stdout.
//!
//! Relays run as tokio tasks owned by a [`RelaySet`]. The set is joined when
//! the child is stopped and aborts anything still running when dropped.
//!
//! # Modes
//!
//! [`RelayMode::Lines`] writes each complete line with a single write, so
//! several relays can share the parent's stdout without interleaving inside
//! a line. Writes to the parent's stdout and stderr go through tokio's
//! blocking pool; a stalled parent pipe holds up only the relay itself. [`RelayMode::Chunks`] forwards raw reads of up to 1024
//! bytes; it preserves partial lines but gives no such guarantee.

use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use coprocess_wire::strip_line_ending;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::task::JoinSet;
use tracing::{Instrument, debug, info, warn};

const CHUNK_SIZE: usize = 1024;

/// How a relay splits the stream it copies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayMode {
    /// Forward whole lines, one atomic write each
    #[default]
    Lines,
    /// Forward raw reads of up to 1024 bytes
    Chunks,
}

/// In-memory sink shared between a relay and whoever inspects it.
#[derive(Debug, Clone, Default)]
pub struct CaptureBuffer(Arc<Mutex<Vec<u8>>>);

impl CaptureBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything captured so far.
    pub fn contents(&self) -> Vec<u8> {
        self.lock().clone()
    }

    /// Captured bytes decoded as UTF-8, lossily.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.lock()).into_owned()
    }

    /// Captured text split into lines.
    pub fn lines(&self) -> Vec<String> {
        self.to_string_lossy().lines().map(str::to_owned).collect()
    }

    /// Number of captured bytes.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True when nothing has been captured.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn append(&self, parts: &[&[u8]]) {
        let mut buf = self.lock();
        for part in parts {
            buf.extend_from_slice(part);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<u8>> {
        // A panic while appending leaves plain bytes behind; keep using them.
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Where relayed output goes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayTarget {
    /// The parent's stdout
    Stdout,
    /// The parent's stderr
    #[default]
    Stderr,
    /// `tracing` events on target `coprocess::relay`
    Log,
    /// Drained and dropped
    Discard,
    /// Kept in memory
    #[serde(skip)]
    Capture(CaptureBuffer),
}

impl RelayTarget {
    async fn write_line(&self, label: &str, line: &[u8]) -> io::Result<()> {
        match self {
            Self::Stdout => write_whole(tokio::io::stdout(), &[line, b"\n"]).await,
            Self::Stderr => write_whole(tokio::io::stderr(), &[line, b"\n"]).await,
            Self::Log => {
                info!(target: "coprocess::relay", stream = label, "{}", String::from_utf8_lossy(line));
                Ok(())
            }
            Self::Discard => Ok(()),
            Self::Capture(buf) => {
                buf.append(&[line, b"\n"]);
                Ok(())
            }
        }
    }

    async fn write_chunk(&self, label: &str, chunk: &[u8]) -> io::Result<()> {
        match self {
            Self::Stdout => write_whole(tokio::io::stdout(), &[chunk]).await,
            Self::Stderr => write_whole(tokio::io::stderr(), &[chunk]).await,
            Self::Log => {
                info!(target: "coprocess::relay", stream = label, "{}", String::from_utf8_lossy(chunk));
                Ok(())
            }
            Self::Discard => Ok(()),
            Self::Capture(buf) => {
                buf.append(&[chunk]);
                Ok(())
            }
        }
    }
}

/// Joins `parts` so the writer sees one buffer per line.
async fn write_whole<W: AsyncWrite + Unpin>(mut out: W, parts: &[&[u8]]) -> io::Result<()> {
    out.write_all(&parts.concat()).await?;
    out.flush().await
}

/// What a finished relay moved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayReport {
    /// Name of the relayed stream, e.g. `"stderr"`
    pub label: String,
    /// Lines forwarded (reads, in chunk mode)
    pub lines: u64,
    /// Bytes read from the source
    pub bytes: u64,
}

/// Tracked relay tasks for one child
#[derive(Debug, Default)]
pub struct RelaySet {
    tasks: JoinSet<RelayReport>,
}

impl RelaySet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start relaying `source` into `target` until `source` ends.
    pub fn spawn<R>(
        &mut self,
        source: R,
        target: RelayTarget,
        mode: RelayMode,
        label: impl Into<String>,
    ) where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let label = label.into();
        let span = tracing::debug_span!("relay", stream = %label);
        self.tasks
            .spawn(relay(source, target, mode, label).instrument(span));
    }

    /// Number of relays not yet joined.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// True when every relay has been joined.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait up to `timeout` for every relay to finish, then abort the rest.
    ///
    /// Aborted relays produce no report.
    pub async fn join(&mut self, timeout: Duration) -> Vec<RelayReport> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut reports = Vec::with_capacity(self.tasks.len());

        loop {
            match tokio::time::timeout_at(deadline, self.tasks.join_next()).await {
                Ok(Some(Ok(report))) => reports.push(report),
                Ok(Some(Err(err))) => {
                    if !err.is_cancelled() {
                        warn!(error = %err, "relay task failed");
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        remaining = self.tasks.len(),
                        ?timeout,
                        "relays still running, aborting"
                    );
                    self.abort_all().await;
                    break;
                }
            }
        }

        reports
    }

    /// Abort every relay and wait for the cancellations to land.
    pub async fn abort_all(&mut self) {
        self.tasks.abort_all();
        while self.tasks.join_next().await.is_some() {}
    }
}

async fn relay<R>(source: R, target: RelayTarget, mode: RelayMode, label: String) -> RelayReport
where
    R: AsyncRead + Unpin,
{
    let mut report = RelayReport {
        label,
        lines: 0,
        bytes: 0,
    };

    let result = match mode {
        RelayMode::Lines => relay_lines(source, &target, &mut report).await,
        RelayMode::Chunks => relay_chunks(source, &target, &mut report).await,
    };

    match result {
        Ok(()) => debug!(lines = report.lines, bytes = report.bytes, "relay reached end of stream"),
        Err(err) => warn!(
            error = %err,
            lines = report.lines,
            bytes = report.bytes,
            "relay stopped on I/O error"
        ),
    }
    report
}

async fn relay_lines<R>(source: R, target: &RelayTarget, report: &mut RelayReport) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(source);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let n = reader.read_until(b'\n', &mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        report.bytes += n as u64;
        report.lines += 1;
        target
            .write_line(&report.label, strip_line_ending(&buf))
            .await?;
    }
}

async fn relay_chunks<R>(mut source: R, target: &RelayTarget, report: &mut RelayReport) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = source.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        report.bytes += n as u64;
        report.lines += 1;
        target.write_chunk(&report.label, &buf[..n]).await?;
    }
}
