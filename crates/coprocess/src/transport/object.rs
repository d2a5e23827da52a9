//! Length-prefixed serde objects
//!
//! Both sides write a hello frame before anything else. The host's hello is
//! [`HELLO_HOST`]; the peer's may be any value and is kept for inspection.

use std::marker::PhantomData;

use async_trait::async_trait;
use coprocess_wire::{HELLO_HOST, STOP, read_frame, write_frame};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::{ChildIo, Pipes, Transport};
use crate::error::{ProcessError, Result};
use crate::relay::RelaySet;

/// `T` out, `T` back, as length-prefixed frames
pub struct ObjectTransport<T> {
    pipes: Option<Pipes>,
    peer_hello: Option<Value>,
    stop_sentinel: bool,
    _payload: PhantomData<fn() -> T>,
}

impl<T> std::fmt::Debug for ObjectTransport<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectTransport")
            .field("pipes", &self.pipes)
            .field("peer_hello", &self.peer_hello)
            .field("stop_sentinel", &self.stop_sentinel)
            .finish()
    }
}

impl<T> Default for ObjectTransport<T> {
    fn default() -> Self {
        Self {
            pipes: None,
            peer_hello: None,
            stop_sentinel: false,
            _payload: PhantomData,
        }
    }
}

impl<T> ObjectTransport<T> {
    /// Create a transport with no streams yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a `"STOP"` frame before closing the streams on teardown.
    pub fn with_stop_sentinel(mut self) -> Self {
        self.stop_sentinel = true;
        self
    }

    /// The hello the child sent when the current stream opened.
    pub fn peer_hello(&self) -> Option<&Value> {
        self.peer_hello.as_ref()
    }
}

#[async_trait]
impl<T> Transport for ObjectTransport<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    type Request = T;
    type Response = T;

    fn name(&self) -> &'static str {
        "object"
    }

    async fn setup(&mut self, mut io: ChildIo, _relays: &mut RelaySet) -> Result<()> {
        self.pipes = None;
        self.peer_hello = None;
        let mut pipes = Pipes::take(&mut io)?;

        write_frame(&mut pipes.stdin, HELLO_HOST)
            .await
            .map_err(|err| ProcessError::Handshake {
                reason: format!("sending hello: {}", err),
            })?;

        let hello = match read_frame::<_, Value>(&mut pipes.stdout).await {
            Ok(Some(hello)) => hello,
            Ok(None) => {
                return Err(ProcessError::Handshake {
                    reason: "child closed its output before saying hello".to_string(),
                });
            }
            Err(err) => {
                return Err(ProcessError::Handshake {
                    reason: format!("reading hello: {}", err),
                });
            }
        };

        debug!(hello = %hello, "object stream open");
        self.peer_hello = Some(hello);
        self.pipes = Some(pipes);
        Ok(())
    }

    async fn exchange(&mut self, message: &T) -> Result<Option<T>> {
        let pipes = self.pipes.as_mut().ok_or(ProcessError::NotStarted)?;
        write_frame(&mut pipes.stdin, message)
            .await
            .map_err(ProcessError::send)?;
        read_frame(&mut pipes.stdout)
            .await
            .map_err(ProcessError::receive)
    }

    async fn teardown(&mut self) -> Result<()> {
        if let Some(mut pipes) = self.pipes.take() {
            if self.stop_sentinel {
                if let Err(err) = write_frame(&mut pipes.stdin, STOP).await {
                    debug!(error = %err, "child stopped reading before the stop sentinel");
                }
            }
        }
        Ok(())
    }
}
