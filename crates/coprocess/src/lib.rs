//! Supervise a child process and use it as a request/response coprocess
//!
//! This crate starts a child program, talks to it over its stdin and stdout
//! one message at a time, keeps its stderr flowing, and shuts it down in
//! stages when asked.
//!
//! # Architecture
//!
//! - **Configuration**: [`config`] - command, working directory, environment
//! - **Supervision**: [`supervisor`] - lazy start, liveness, staged stop
//! - **Transports**: [`transport`] - line, JSON-line, object-frame and null
//! - **Relays**: [`relay`] - background draining of child output
//! - **Sessions**: [`session`] - the single-flight `process()` entry point
//! - **HTTP**: [`http`] - the same idea for workers that speak HTTP
//!
//! # Example
//!
//! ```no_run
//! use coprocess::{ProcessConfig, ProcessSession};
//! use serde_json::json;
//!
//! # async fn run() -> coprocess::Result<()> {
//! let session = ProcessSession::json(ProcessConfig::new("python3").with_arg("worker.py"))?;
//! let reply = session.process(&json!({"cmd": "score", "x": 1.5})).await?;
//! println!("{:?}", reply);
//! session.stop().await?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod http;
pub mod relay;
pub mod session;
pub mod supervisor;
pub mod transport;

pub use config::{DEFAULT_STOP_TIMEOUT, ProcessConfig, quote_args};
pub use error::{Direction, ProcessError, Result};
pub use http::{HttpProcess, HttpProcessBuilder, HttpState, ReadinessPolicy};
pub use relay::{CaptureBuffer, RelayMode, RelayReport, RelaySet, RelayTarget};
pub use session::{JsonSession, LineSession, ObjectSession, ProcessSession, SimpleSession};
pub use supervisor::{ProcessSupervisor, StopOutcome, StopStage};
pub use transport::{
    ChildIo, JsonLineTransport, NullTransport, ObjectTransport, StringLineTransport, Transport,
};

pub use coprocess_wire as wire;
