//! No protocol at all

use async_trait::async_trait;

use super::{ChildIo, Transport};
use crate::error::Result;
use crate::relay::{RelayMode, RelaySet, RelayTarget};

/// Runs the child purely for its side effects
///
/// Stdin is closed as soon as the child starts and stdout is relayed like
/// stderr. Every exchange returns `Ok(None)` without touching the child.
#[derive(Debug, Clone)]
pub struct NullTransport {
    target: RelayTarget,
    mode: RelayMode,
}

impl Default for NullTransport {
    fn default() -> Self {
        Self {
            target: RelayTarget::Stdout,
            mode: RelayMode::Lines,
        }
    }
}

impl NullTransport {
    /// Relay stdout to the parent's stdout, line by line.
    pub fn new() -> Self {
        Self::default()
    }

    /// Send stdout somewhere else
    pub fn with_target(mut self, target: RelayTarget) -> Self {
        self.target = target;
        self
    }

    /// Change how stdout is split
    pub fn with_mode(mut self, mode: RelayMode) -> Self {
        self.mode = mode;
        self
    }
}

#[async_trait]
impl Transport for NullTransport {
    type Request = ();
    type Response = ();

    fn name(&self) -> &'static str {
        "null"
    }

    async fn setup(&mut self, io: ChildIo, relays: &mut RelaySet) -> Result<()> {
        drop(io.stdin);
        if let Some(stdout) = io.stdout {
            relays.spawn(stdout, self.target.clone(), self.mode, "stdout");
        }
        Ok(())
    }

    async fn exchange(&mut self, _message: &()) -> Result<Option<()>> {
        Ok(None)
    }

    async fn teardown(&mut self) -> Result<()> {
        Ok(())
    }
}
