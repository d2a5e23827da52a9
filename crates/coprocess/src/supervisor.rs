//! Child process lifecycle
//!
//! [`ProcessSupervisor`] owns at most one child at a time. It starts the child
//! lazily, answers liveness questions without blocking, and stops it in three
//! escalating stages:
//!
//! 1. **Graceful**: the transport releases its streams and the child gets one
//!    stage timeout to exit on its own.
//! 2. **Terminate**: SIGTERM on unix (a hard kill elsewhere), then wait again.
//! 3. **Kill**: SIGKILL, then wait a last time.
//!
//! If the child is still running after the third wait, `stop` fails with
//! [`ProcessError::Termination`] and the handle is kept so the caller can
//! retry. Until that child is gone, starting or exchanging fails with
//! [`ProcessError::StopIncomplete`] since its streams are already released.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Child;
use tracing::{debug, info, warn};

use crate::config::ProcessConfig;
use crate::error::{ProcessError, Result};
use crate::relay::RelaySet;
use crate::transport::{ChildIo, Transport};

/// Stop stage in which the child was seen to exit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopStage {
    /// Exited after its streams were closed
    Graceful,
    /// Exited after the polite termination request
    Terminate,
    /// Exited after the forceful kill
    Kill,
}

/// How a stop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopOutcome {
    /// Stage in which the child exited
    pub stage: StopStage,
    /// Exit status reported by the operating system
    pub status: ExitStatus,
}

impl StopOutcome {
    /// Exit code, if the child exited normally.
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }

    /// True when the child exited on its own.
    pub fn was_graceful(&self) -> bool {
        self.stage == StopStage::Graceful
    }
}

/// Owner of one child process at a time
#[derive(Debug)]
pub struct ProcessSupervisor {
    config: ProcessConfig,
    child: Option<Child>,
    relays: RelaySet,
    /// Set once `stop` has released the transport for the current child
    torn_down: bool,
}

impl ProcessSupervisor {
    /// Create a supervisor. Nothing is started yet.
    pub fn new(config: ProcessConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            child: None,
            relays: RelaySet::new(),
            torn_down: false,
        })
    }

    /// The configuration children are started with.
    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    /// Process id of the current child.
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// True when there is no child or the current one has exited.
    ///
    /// A failure to poll the child is logged and read as "still running".
    pub fn needs_start(&mut self) -> bool {
        let Some(child) = self.child.as_mut() else {
            return true;
        };
        match child.try_wait() {
            Ok(Some(status)) => {
                debug!(%status, "child has exited");
                true
            }
            Ok(None) => false,
            Err(err) => {
                warn!(error = %err, "could not poll child status, assuming it is running");
                false
            }
        }
    }

    /// Best-effort liveness check; may be stale by the time it returns.
    pub fn is_alive(&mut self) -> bool {
        !self.needs_start()
    }

    /// Start a child unless one is already running.
    ///
    /// Returns `true` when a new child was started. The child's stderr is
    /// relayed to the configured diagnostics target and its stdin and stdout
    /// are handed to `transport`. If the transport cannot set up, the child is
    /// killed and the error returned.
    pub async fn ensure_process<T>(&mut self, transport: &mut T) -> Result<bool>
    where
        T: Transport + ?Sized,
    {
        if !self.needs_start() {
            if self.torn_down {
                return Err(ProcessError::StopIncomplete { pid: self.pid() });
            }
            return Ok(false);
        }

        if self.child.take().is_some() && !self.relays.is_empty() {
            let reports = self.relays.join(self.config.stop_timeout).await;
            debug!(?reports, "collected relays of previous child");
        }

        let mut child = self
            .config
            .to_command()?
            .spawn()
            .map_err(|source| ProcessError::Start {
                command: self.config.command.clone(),
                source,
            })?;

        info!(
            pid = child.id(),
            command = ?self.config.command,
            transport = transport.name(),
            "started child process"
        );

        if let Some(stderr) = child.stderr.take() {
            self.relays.spawn(
                stderr,
                self.config.diagnostics.clone(),
                self.config.relay_mode,
                "stderr",
            );
        }

        let io = ChildIo {
            stdin: child.stdin.take(),
            stdout: child.stdout.take(),
        };

        if let Err(err) = transport.setup(io, &mut self.relays).await {
            warn!(error = %err, pid = child.id(), "transport setup failed, killing child");
            if let Err(kill_err) = child.kill().await {
                warn!(error = %kill_err, "could not kill child after failed setup");
            }
            self.relays.join(self.config.stop_timeout).await;
            return Err(err);
        }

        self.child = Some(child);
        self.torn_down = false;
        Ok(true)
    }

    /// Stop the child in stages, waiting up to `per_stage` in each.
    ///
    /// If the child survives every stage the error is
    /// [`ProcessError::Termination`]. The transport has been torn down by
    /// then, so `ensure_process` reports [`ProcessError::StopIncomplete`]
    /// until another `stop` succeeds or the child exits on its own.
    pub async fn stop<T>(&mut self, transport: &mut T, per_stage: Duration) -> Result<StopOutcome>
    where
        T: Transport + ?Sized,
    {
        if self.child.is_none() {
            return Err(ProcessError::NotStarted);
        }

        if let Err(err) = transport.teardown().await {
            warn!(error = %err, "transport teardown failed, continuing shutdown");
        }
        self.torn_down = true;

        let child = self.child.as_mut().ok_or(ProcessError::NotStarted)?;
        let outcome = escalate(child, per_stage).await?;
        self.child = None;
        self.torn_down = false;

        let reports = self.relays.join(per_stage).await;
        for report in &reports {
            debug!(
                stream = %report.label,
                lines = report.lines,
                bytes = report.bytes,
                "relay finished"
            );
        }

        info!(stage = ?outcome.stage, status = %outcome.status, "child stopped");
        Ok(outcome)
    }
}

/// The parts of a child process staged shutdown needs
#[async_trait]
pub(crate) trait Terminable: Send {
    fn pid(&self) -> Option<u32>;

    /// Wait for exit; `Ok(None)` if `timeout` elapsed first.
    async fn wait_for(&mut self, timeout: Duration) -> io::Result<Option<ExitStatus>>;

    /// Ask the process to exit.
    fn terminate(&mut self) -> io::Result<()>;

    /// Force the process to exit.
    fn kill(&mut self) -> io::Result<()>;
}

#[async_trait]
impl Terminable for Child {
    fn pid(&self) -> Option<u32> {
        self.id()
    }

    async fn wait_for(&mut self, timeout: Duration) -> io::Result<Option<ExitStatus>> {
        match tokio::time::timeout(timeout, self.wait()).await {
            Ok(status) => status.map(Some),
            Err(_) => Ok(None),
        }
    }

    fn terminate(&mut self) -> io::Result<()> {
        send_terminate(self)
    }

    fn kill(&mut self) -> io::Result<()> {
        self.start_kill()
    }
}

#[cfg(unix)]
fn send_terminate(child: &mut Child) -> io::Result<()> {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    // No id means the child has already been reaped.
    let Some(pid) = child.id() else {
        return Ok(());
    };
    kill(Pid::from_raw(pid as i32), Signal::SIGTERM).map_err(io::Error::from)
}

#[cfg(not(unix))]
fn send_terminate(child: &mut Child) -> io::Result<()> {
    child.start_kill()
}

pub(crate) async fn escalate<P>(process: &mut P, per_stage: Duration) -> Result<StopOutcome>
where
    P: Terminable + ?Sized,
{
    let pid = process.pid();

    for stage in [StopStage::Graceful, StopStage::Terminate, StopStage::Kill] {
        let signalled = match stage {
            StopStage::Graceful => Ok(()),
            StopStage::Terminate => process.terminate(),
            StopStage::Kill => process.kill(),
        };
        if let Err(err) = signalled {
            warn!(?pid, ?stage, error = %err, "could not signal child");
        }

        match process.wait_for(per_stage).await {
            Ok(Some(status)) => return Ok(StopOutcome { stage, status }),
            Ok(None) => debug!(?pid, ?stage, ?per_stage, "child still running"),
            Err(err) => warn!(?pid, ?stage, error = %err, "waiting for child failed"),
        }
    }

    Err(ProcessError::Termination {
        pid,
        waited: per_stage * 3,
    })
}
