//! Error types for process supervision

use std::fmt;
use std::io;
use std::time::Duration;

use coprocess_wire::WireError;
use thiserror::Error;

use crate::http::HttpState;

/// Result type for coprocess operations
pub type Result<T> = std::result::Result<T, ProcessError>;

/// Which half of an exchange failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Writing a request to the child's stdin
    Send,
    /// Reading a response from the child's stdout
    Receive,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Send => write!(f, "send"),
            Self::Receive => write!(f, "receive"),
        }
    }
}

/// Errors that can occur while supervising or talking to a child process
#[derive(Debug, Error)]
pub enum ProcessError {
    // Configuration errors
    /// No program was given
    #[error("Command is empty")]
    EmptyCommand,

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),

    // Lifecycle errors
    /// The operating system refused to start the child
    #[error("Failed to start {command:?}: {source}")]
    Start {
        /// The command that was attempted
        command: Vec<String>,
        /// Underlying spawn failure
        #[source]
        source: io::Error,
    },

    /// The operation needs a running process and none was started
    #[error("Process not started")]
    NotStarted,

    /// A standard stream of the child was not captured
    #[error("Child {0} was not captured")]
    MissingStream(&'static str),

    /// The child survived every stop stage
    #[error("Process {pid:?} still running after {waited:?} of staged shutdown")]
    Termination {
        /// Process id, if it was still known
        pid: Option<u32>,
        /// Total time spent waiting across all stages
        waited: Duration,
    },

    /// An earlier stop released the streams but the child is still running
    #[error("Process {pid:?} outlived an earlier stop; call stop again")]
    StopIncomplete {
        /// Process id of the surviving child
        pid: Option<u32>,
    },

    // Exchange errors
    /// A message could not be written or read
    #[error("Failed to {direction} message: {source}")]
    Transport {
        /// Which side of the exchange failed
        direction: Direction,
        /// Underlying codec failure
        #[source]
        source: WireError,
    },

    /// The object stream hello exchange failed
    #[error("Handshake failed: {reason}")]
    Handshake {
        /// What went wrong
        reason: String,
    },

    // HTTP sibling errors
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server URI could not be built
    #[error("Invalid URI: {0}")]
    InvalidUri(#[from] url::ParseError),

    /// Operation called in the wrong lifecycle state
    #[error("Invalid state: expected {expected}, found {actual}")]
    InvalidState {
        /// State the operation requires
        expected: HttpState,
        /// Current state
        actual: HttpState,
    },

    /// The configured port is already bound
    #[error("Port {port} on {host} is not available")]
    PortUnavailable {
        /// Host that was checked
        host: String,
        /// Port that was checked
        port: u16,
    },

    /// No port in the range was free
    #[error("No free port on {host} in {from}..={to}")]
    NoFreePort {
        /// Host that was checked
        host: String,
        /// First port tried
        from: u16,
        /// Last port tried
        to: u16,
    },

    /// The server never answered the readiness probe
    #[error("Server at {uri} not ready after {attempts} attempts")]
    NotReady {
        /// Probed URI
        uri: String,
        /// Number of probes sent
        attempts: u32,
    },
}

impl ProcessError {
    /// Wrap a failure to write a request.
    pub fn send(source: impl Into<WireError>) -> Self {
        Self::Transport {
            direction: Direction::Send,
            source: source.into(),
        }
    }

    /// Wrap a failure to read a response.
    pub fn receive(source: impl Into<WireError>) -> Self {
        Self::Transport {
            direction: Direction::Receive,
            source: source.into(),
        }
    }

    /// True when the child closed its end of a pipe mid-exchange.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Transport { source, .. } if source.is_disconnect())
    }
}
