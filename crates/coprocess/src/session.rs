//! Single-flight request/response sessions
//!
//! A [`ProcessSession`] pairs one [`ProcessSupervisor`] with one [`Transport`]
//! and serializes every exchange behind a lock, so any number of tasks can
//! share a session while the child only ever sees one request at a time.
//!
//! # Example
//!
//! ```no_run
//! use coprocess::{ProcessConfig, ProcessSession};
//!
//! # async fn run() -> coprocess::Result<()> {
//! let session = ProcessSession::lines(ProcessConfig::new("cat"))?;
//! let reply = session.process("1234").await?;
//! assert_eq!(reply.as_deref(), Some("1234"));
//! session.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{Instrument, Span, info_span};

use crate::config::ProcessConfig;
use crate::error::Result;
use crate::supervisor::{ProcessSupervisor, StopOutcome};
use crate::transport::{
    JsonLineTransport, NullTransport, ObjectTransport, StringLineTransport, Transport,
};

/// Session exchanging raw text lines
pub type LineSession = ProcessSession<StringLineTransport>;

/// Session exchanging JSON objects, one per line
pub type JsonSession = ProcessSession<JsonLineTransport>;

/// Session exchanging length-prefixed serde objects
pub type ObjectSession<T> = ProcessSession<ObjectTransport<T>>;

/// Session that only runs a child and relays its output
pub type SimpleSession = ProcessSession<NullTransport>;

/// A supervised child plus the transport used to talk to it
///
/// Lock order is always exchange then supervisor. Liveness checks only take
/// the supervisor lock, so they do not wait behind an in-flight exchange.
pub struct ProcessSession<T: Transport> {
    /// Exchange lock; held for a whole request/response round trip
    transport: Mutex<T>,

    /// Process owner
    supervisor: Mutex<ProcessSupervisor>,

    /// Per-stage stop timeout from the configuration
    stop_timeout: Duration,

    /// Logging context for everything this session does
    span: Span,
}

impl<T: Transport> ProcessSession<T> {
    /// Create a session. The child is started on first use.
    pub fn new(config: ProcessConfig, transport: T) -> Result<Self> {
        let span = info_span!(
            "coprocess",
            program = config.program().unwrap_or_default(),
            transport = transport.name(),
        );
        let stop_timeout = config.stop_timeout;
        let supervisor = ProcessSupervisor::new(config)?;

        Ok(Self {
            transport: Mutex::new(transport),
            supervisor: Mutex::new(supervisor),
            stop_timeout,
            span,
        })
    }

    /// Create a session and start its child right away.
    pub async fn start(config: ProcessConfig, transport: T) -> Result<Self> {
        let session = Self::new(config, transport)?;
        session.ensure_process().await?;
        Ok(session)
    }

    /// Send one message and wait for the reply.
    ///
    /// Starts (or restarts) the child first if needed. Concurrent callers are
    /// served one at a time. `Ok(None)` means the child closed its output,
    /// typically because it was asked to stop. There is no timeout.
    pub async fn process(&self, message: &T::Request) -> Result<Option<T::Response>> {
        async {
            let mut transport = self.transport.lock().await;
            self.supervisor
                .lock()
                .await
                .ensure_process(&mut *transport)
                .await?;
            transport.exchange(message).await
        }
        .instrument(self.span.clone())
        .await
    }

    /// Start the child unless it is running. Returns `true` if it was started.
    pub async fn ensure_process(&self) -> Result<bool> {
        async {
            let mut transport = self.transport.lock().await;
            self.supervisor
                .lock()
                .await
                .ensure_process(&mut *transport)
                .await
        }
        .instrument(self.span.clone())
        .await
    }

    /// Whether the child is running. Advisory; may be stale immediately.
    pub async fn is_alive(&self) -> bool {
        self.supervisor.lock().await.is_alive()
    }

    /// Process id of the current child.
    pub async fn pid(&self) -> Option<u32> {
        self.supervisor.lock().await.pid()
    }

    /// Stop the child using the configured per-stage timeout.
    ///
    /// Must not be called while another task is waiting for a reply; the stop
    /// would queue behind that exchange.
    pub async fn stop(&self) -> Result<StopOutcome> {
        self.stop_with_timeout(self.stop_timeout).await
    }

    /// Stop the child, waiting up to `per_stage` in each stop stage.
    pub async fn stop_with_timeout(&self, per_stage: Duration) -> Result<StopOutcome> {
        async {
            let mut transport = self.transport.lock().await;
            self.supervisor
                .lock()
                .await
                .stop(&mut *transport, per_stage)
                .await
        }
        .instrument(self.span.clone())
        .await
    }

    /// Replace the logging context, e.g. to nest the session under a caller's span.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Logging context attached to this session's events.
    pub fn span(&self) -> &Span {
        &self.span
    }
}

impl<T: Transport> std::fmt::Debug for ProcessSession<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessSession")
            .field("stop_timeout", &self.stop_timeout)
            .field("span", &self.span)
            .finish_non_exhaustive()
    }
}

impl ProcessSession<StringLineTransport> {
    /// Line session over `config`.
    pub fn lines(config: ProcessConfig) -> Result<Self> {
        Self::new(config, StringLineTransport::new())
    }
}

impl ProcessSession<JsonLineTransport> {
    /// JSON-line session over `config`.
    pub fn json(config: ProcessConfig) -> Result<Self> {
        Self::new(config, JsonLineTransport::new())
    }
}

impl<T> ProcessSession<ObjectTransport<T>>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Object session over `config`.
    pub fn objects(config: ProcessConfig) -> Result<Self> {
        Self::new(config, ObjectTransport::new())
    }

    /// The hello the current child sent, if it has been started.
    pub async fn peer_hello(&self) -> Option<serde_json::Value> {
        self.transport.lock().await.peer_hello().cloned()
    }
}

impl ProcessSession<NullTransport> {
    /// Session that relays the child's stdout to the parent's stdout.
    pub fn simple(config: ProcessConfig) -> Result<Self> {
        Self::new(config, NullTransport::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProcessError;

    #[test]
    fn test_empty_command_rejected_at_construction() {
        let err = ProcessSession::lines(ProcessConfig::default()).unwrap_err();
        assert!(matches!(err, ProcessError::EmptyCommand));
    }

    #[tokio::test]
    async fn test_lazy_start() {
        let session = ProcessSession::lines(ProcessConfig::new("cat")).unwrap();
        assert!(!session.is_alive().await);
        assert_eq!(session.pid().await, None);
    }

    #[tokio::test]
    async fn test_stop_before_start() {
        let session = ProcessSession::simple(ProcessConfig::new("cat")).unwrap();
        let err = session.stop().await.unwrap_err();
        assert!(matches!(err, ProcessError::NotStarted));
    }

    #[tokio::test]
    async fn test_missing_program_is_start_error() {
        let session =
            ProcessSession::lines(ProcessConfig::new("definitely-not-a-real-program-7f3a"))
                .unwrap();
        let err = session.process("hello").await.unwrap_err();
        assert!(matches!(err, ProcessError::Start { .. }));
        assert!(!session.is_alive().await);
    }
}
