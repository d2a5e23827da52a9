//! Raw text lines

use async_trait::async_trait;
use coprocess_wire::{STOP, read_line, write_line};
use tracing::debug;

use super::{ChildIo, Pipes, Transport};
use crate::error::{ProcessError, Result};
use crate::relay::RelaySet;

/// One line of text out, one line of text back
///
/// The message must not contain a newline; the child would see two
/// requests and the exchange would fall out of step.
#[derive(Debug, Default)]
pub struct StringLineTransport {
    pipes: Option<Pipes>,
    stop_sentinel: bool,
}

impl StringLineTransport {
    /// Create a transport with no streams yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `STOP` before closing the streams on teardown.
    pub fn with_stop_sentinel(mut self) -> Self {
        self.stop_sentinel = true;
        self
    }
}

#[async_trait]
impl Transport for StringLineTransport {
    type Request = str;
    type Response = String;

    fn name(&self) -> &'static str {
        "string-line"
    }

    async fn setup(&mut self, mut io: ChildIo, _relays: &mut RelaySet) -> Result<()> {
        self.pipes = Some(Pipes::take(&mut io)?);
        Ok(())
    }

    async fn exchange(&mut self, message: &str) -> Result<Option<String>> {
        let pipes = self.pipes.as_mut().ok_or(ProcessError::NotStarted)?;
        write_line(&mut pipes.stdin, message)
            .await
            .map_err(ProcessError::send)?;
        read_line(&mut pipes.stdout)
            .await
            .map_err(ProcessError::receive)
    }

    async fn teardown(&mut self) -> Result<()> {
        if let Some(mut pipes) = self.pipes.take() {
            if self.stop_sentinel {
                if let Err(err) = write_line(&mut pipes.stdin, STOP).await {
                    debug!(error = %err, "child stopped reading before the stop sentinel");
                }
            }
        }
        Ok(())
    }
}
