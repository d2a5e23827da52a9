//! Transport trait and implementations
//!
//! A transport decides how one request/response pair is put on the child's
//! pipes. The supervisor owns the process; the transport only ever sees the
//! stdin and stdout handles it is given in [`Transport::setup`].
//!
//! | Transport | Request | Response | Encoding |
//! |-----------|---------|----------|----------|
//! | [`StringLineTransport`] | `str` | `String` | one line each way |
//! | [`JsonLineTransport`] | any `Serialize` | JSON object | one line each way, noise skipped |
//! | [`ObjectTransport`] | `T` | `T` | length-prefixed frames after a hello exchange |
//! | [`NullTransport`] | `()` | `()` | none; stdout is relayed |

use async_trait::async_trait;
use tokio::io::BufReader;
use tokio::process::{ChildStdin, ChildStdout};

use crate::error::{ProcessError, Result};
use crate::relay::RelaySet;

pub mod json;
pub mod line;
pub mod null;
pub mod object;

pub use json::JsonLineTransport;
pub use line::StringLineTransport;
pub use null::NullTransport;
pub use object::ObjectTransport;

/// Standard streams of a freshly started child handed to a transport
#[derive(Debug, Default)]
pub struct ChildIo {
    /// Child's stdin, if captured
    pub stdin: Option<ChildStdin>,
    /// Child's stdout, if captured
    pub stdout: Option<ChildStdout>,
}

impl ChildIo {
    /// Take stdin or fail with [`ProcessError::MissingStream`].
    pub fn take_stdin(&mut self) -> Result<ChildStdin> {
        self.stdin.take().ok_or(ProcessError::MissingStream("stdin"))
    }

    /// Take stdout or fail with [`ProcessError::MissingStream`].
    pub fn take_stdout(&mut self) -> Result<ChildStdout> {
        self.stdout.take().ok_or(ProcessError::MissingStream("stdout"))
    }
}

/// Generic request/response transport over a child's pipes
///
/// Implementations must tolerate `setup` being called again after the child
/// was restarted; the new streams replace the old ones.
#[async_trait]
pub trait Transport: Send + 'static {
    /// What the caller sends
    type Request: ?Sized + Send + Sync;

    /// What comes back
    type Response: Send;

    /// Short name used in log fields
    fn name(&self) -> &'static str;

    /// Take ownership of the child's streams and perform any opening protocol.
    async fn setup(&mut self, io: ChildIo, relays: &mut RelaySet) -> Result<()>;

    /// Send one request and wait for its response.
    ///
    /// `Ok(None)` means the child closed its output. There is no timeout.
    async fn exchange(&mut self, message: &Self::Request) -> Result<Option<Self::Response>>;

    /// Release the streams so a cooperative child sees end of input.
    async fn teardown(&mut self) -> Result<()>;
}

/// Stdin and buffered stdout of one running child
#[derive(Debug)]
pub(crate) struct Pipes {
    pub(crate) stdin: ChildStdin,
    pub(crate) stdout: BufReader<ChildStdout>,
}

impl Pipes {
    pub(crate) fn take(io: &mut ChildIo) -> Result<Self> {
        Ok(Self {
            stdin: io.take_stdin()?,
            stdout: BufReader::new(io.take_stdout()?),
        })
    }
}
