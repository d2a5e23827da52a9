//! Single-line JSON objects

use std::marker::PhantomData;

use async_trait::async_trait;
use coprocess_wire::{JsonObject, read_object_line, stop_object, write_json_line};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::{ChildIo, Pipes, Transport};
use crate::error::{ProcessError, Result};
use crate::relay::RelaySet;

/// JSON value out, JSON object back
///
/// Requests are serialized onto a single line. On the way back, any stdout
/// line that does not begin with `{` is treated as noise and skipped; a line
/// that does begin with `{` but does not parse is a fatal
/// [`ProcessError::Transport`] error.
pub struct JsonLineTransport<Q: ?Sized = Value> {
    pipes: Option<Pipes>,
    stop_sentinel: bool,
    _request: PhantomData<fn(&Q)>,
}

impl<Q: ?Sized> std::fmt::Debug for JsonLineTransport<Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonLineTransport")
            .field("pipes", &self.pipes)
            .field("stop_sentinel", &self.stop_sentinel)
            .finish()
    }
}

impl<Q: ?Sized> Default for JsonLineTransport<Q> {
    fn default() -> Self {
        Self {
            pipes: None,
            stop_sentinel: false,
            _request: PhantomData,
        }
    }
}

impl<Q: ?Sized> JsonLineTransport<Q> {
    /// Create a transport with no streams yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `{"cmd":"STOP"}` before closing the streams on teardown.
    pub fn with_stop_sentinel(mut self) -> Self {
        self.stop_sentinel = true;
        self
    }
}

#[async_trait]
impl<Q> Transport for JsonLineTransport<Q>
where
    Q: Serialize + Send + Sync + ?Sized + 'static,
{
    type Request = Q;
    type Response = JsonObject;

    fn name(&self) -> &'static str {
        "json-line"
    }

    async fn setup(&mut self, mut io: ChildIo, _relays: &mut RelaySet) -> Result<()> {
        self.pipes = Some(Pipes::take(&mut io)?);
        Ok(())
    }

    async fn exchange(&mut self, message: &Q) -> Result<Option<JsonObject>> {
        let pipes = self.pipes.as_mut().ok_or(ProcessError::NotStarted)?;
        write_json_line(&mut pipes.stdin, message)
            .await
            .map_err(ProcessError::send)?;
        read_object_line(&mut pipes.stdout)
            .await
            .map_err(ProcessError::receive)
    }

    async fn teardown(&mut self) -> Result<()> {
        if let Some(mut pipes) = self.pipes.take() {
            if self.stop_sentinel {
                if let Err(err) = write_json_line(&mut pipes.stdin, &stop_object()).await {
                    debug!(error = %err, "child stopped reading before the stop sentinel");
                }
            }
        }
        Ok(())
    }
}
