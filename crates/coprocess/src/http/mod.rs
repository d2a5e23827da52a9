//! HTTP server processes
//!
//! Some workers are easier to run as a small HTTP server than as a pipe
//! filter. [`HttpProcess`] launches such a server (or attaches to one that is
//! already running), waits until it answers, then posts `text/plain` requests
//! to it.
//!
//! The command may reference `${host}`, `${port}` and `${path}`; they are
//! substituted before launch.
//!
//! ```text
//! NotStarted --start()--> Started --stop()--> EndedOrAborted
//!      \                                         ^
//!       `------ start() failed -----------------'
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ProcessConfig;
use crate::error::{ProcessError, Result};
use crate::relay::RelayTarget;
use crate::session::ProcessSession;
use crate::supervisor::StopOutcome;
use crate::transport::NullTransport;

mod port;
mod readiness;

pub use port::{find_free_port, port_available};
pub use readiness::ReadinessPolicy;

/// Default bind host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port
pub const DEFAULT_PORT: u16 = 57117;

/// Lifecycle of an [`HttpProcess`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpState {
    /// Configured, never started
    NotStarted,
    /// Server answered the readiness probe
    Started,
    /// Stopped, or failed to start
    EndedOrAborted,
}

impl fmt::Display for HttpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not started"),
            Self::Started => write!(f, "started"),
            Self::EndedOrAborted => write!(f, "ended or aborted"),
        }
    }
}

/// Builder for [`HttpProcess`]
#[derive(Debug, Clone)]
pub struct HttpProcessBuilder {
    host: String,
    port: u16,
    port_range: Option<(u16, u16)>,
    path: String,
    command: Vec<String>,
    working_dir: PathBuf,
    env: BTreeMap<String, String>,
    diagnostics: RelayTarget,
    readiness: ReadinessPolicy,
}

impl Default for HttpProcessBuilder {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            port_range: None,
            path: "/".to_string(),
            command: Vec::new(),
            working_dir: PathBuf::from("."),
            env: BTreeMap::new(),
            diagnostics: RelayTarget::default(),
            readiness: ReadinessPolicy::default(),
        }
    }
}

impl HttpProcessBuilder {
    /// Set the host the server listens on
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the server port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self.port_range = None;
        self
    }

    /// Use the first free port in `from..=to`, resolved at build time
    pub fn port_range(mut self, from: u16, to: u16) -> Self {
        self.port_range = Some((from, to));
        self
    }

    /// Set the request path
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the server command as a program-and-arguments list
    pub fn command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = command.into_iter().map(Into::into).collect();
        self
    }

    /// Set the server command as a whitespace-separated string
    pub fn command_line(self, command: &str) -> Self {
        self.command(command.split_whitespace())
    }

    /// Set the server's working directory
    pub fn working_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set an environment variable for the server
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set where the server's output goes
    pub fn diagnostics(mut self, target: RelayTarget) -> Self {
        self.diagnostics = target;
        self
    }

    /// Set the readiness probing policy
    pub fn readiness(mut self, policy: ReadinessPolicy) -> Self {
        self.readiness = policy;
        self
    }

    /// Resolve the port and build the process handle. Nothing is launched.
    pub async fn build(self) -> Result<HttpProcess> {
        let port = match self.port_range {
            Some((from, to)) => find_free_port(&self.host, from, to).await?,
            None => self.port,
        };
        let path = if self.path.starts_with('/') {
            self.path
        } else {
            format!("/{}", self.path)
        };
        let client = Client::builder().no_proxy().build()?;

        let process = HttpProcess {
            host: self.host,
            port,
            path,
            command: self.command,
            working_dir: self.working_dir,
            env: self.env,
            diagnostics: self.diagnostics,
            readiness: self.readiness,
            client,
            server: None,
            state: HttpState::NotStarted,
        };
        process.uri()?;
        Ok(process)
    }
}

/// An HTTP server used as a coprocess
#[derive(Debug)]
pub struct HttpProcess {
    host: String,
    port: u16,
    path: String,
    command: Vec<String>,
    working_dir: PathBuf,
    env: BTreeMap<String, String>,
    diagnostics: RelayTarget,
    readiness: ReadinessPolicy,
    client: Client,
    server: Option<ProcessSession<NullTransport>>,
    state: HttpState,
}

impl HttpProcess {
    /// Create a builder
    pub fn builder() -> HttpProcessBuilder {
        HttpProcessBuilder::default()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> HttpState {
        self.state
    }

    /// Host the server listens on.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port the server listens on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Request path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Full request URI.
    pub fn uri(&self) -> Result<Url> {
        Ok(Url::parse(&format!(
            "http://{}:{}{}",
            self.host, self.port, self.path
        ))?)
    }

    /// The server command with placeholders substituted.
    pub fn resolved_command(&self) -> Vec<String> {
        let port = self.port.to_string();
        self.command
            .iter()
            .map(|arg| {
                arg.replace("${host}", &self.host)
                    .replace("${port}", &port)
                    .replace("${path}", &self.path)
            })
            .collect()
    }

    /// Launch the server (if a command is configured) and wait until it answers.
    ///
    /// Without a command the server is expected to be running already and is
    /// only probed. On any failure the launched server is stopped and the
    /// state becomes [`HttpState::EndedOrAborted`].
    pub async fn start(&mut self) -> Result<()> {
        self.expect_state(HttpState::NotStarted)?;

        if let Err(err) = self.launch_and_wait().await {
            self.state = HttpState::EndedOrAborted;
            if let Some(server) = self.server.take() {
                if let Err(stop_err) = server.stop().await {
                    warn!(error = %stop_err, "could not stop server after failed start");
                }
            }
            return Err(err);
        }

        self.state = HttpState::Started;
        info!(uri = %self.uri()?, "http process ready");
        Ok(())
    }

    async fn launch_and_wait(&mut self) -> Result<()> {
        if !self.command.is_empty() {
            if !port_available(&self.host, self.port).await {
                return Err(ProcessError::PortUnavailable {
                    host: self.host.clone(),
                    port: self.port,
                });
            }

            let mut config = ProcessConfig::from_args(self.resolved_command())
                .with_working_dir(&self.working_dir)
                .with_diagnostics(self.diagnostics.clone());
            config.env = self.env.clone();

            let transport = NullTransport::new().with_target(self.diagnostics.clone());
            self.server = Some(ProcessSession::start(config, transport).await?);
        }

        self.wait_until_ready().await
    }

    async fn wait_until_ready(&self) -> Result<()> {
        let uri = self.uri()?;
        let attempts = self.readiness.max_attempts();

        for attempt in 0..attempts {
            match self.client.get(uri.clone()).send().await {
                Ok(response) => {
                    debug!(attempt, status = %response.status(), "server answered readiness probe");
                    return Ok(());
                }
                Err(err) => debug!(attempt, error = %err, "server not ready yet"),
            }

            if let Some(server) = &self.server {
                if !server.is_alive().await {
                    warn!(attempt, "server exited before becoming ready");
                    return Err(ProcessError::NotReady {
                        uri: uri.to_string(),
                        attempts: attempt + 1,
                    });
                }
            }

            if attempt + 1 < attempts {
                tokio::time::sleep(self.readiness.delay(attempt)).await;
            }
        }

        Err(ProcessError::NotReady {
            uri: uri.to_string(),
            attempts,
        })
    }

    /// POST `body` as `text/plain` with `params` as the query string.
    ///
    /// Returns the response body. Non-success statuses are errors.
    pub async fn process_string(&self, body: &str, params: &[(&str, &str)]) -> Result<String> {
        self.expect_state(HttpState::Started)?;

        let response = self
            .client
            .post(self.uri()?)
            .query(params)
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body.to_owned())
            .send()
            .await?
            .error_for_status()?;

        Ok(response.text().await?)
    }

    /// Stop the server if this handle launched one.
    ///
    /// Returns how the server process ended, or `None` when attached to an
    /// external server.
    pub async fn stop(&mut self) -> Result<Option<StopOutcome>> {
        self.expect_state(HttpState::Started)?;
        self.state = HttpState::EndedOrAborted;

        match self.server.take() {
            Some(server) => server.stop().await.map(Some),
            None => Ok(None),
        }
    }

    fn expect_state(&self, expected: HttpState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(ProcessError::InvalidState {
                expected,
                actual: self.state,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_placeholders_substituted() {
        let process = HttpProcess::builder()
            .host("localhost")
            .port(8123)
            .path("score")
            .command_line("python3 serve.py --bind ${host}:${port} --route ${path}")
            .build()
            .await
            .unwrap();

        assert_eq!(process.path(), "/score");
        assert_eq!(
            process.resolved_command(),
            vec![
                "python3",
                "serve.py",
                "--bind",
                "localhost:8123",
                "--route",
                "/score"
            ]
        );
        assert_eq!(process.uri().unwrap().as_str(), "http://localhost:8123/score");
    }

    #[tokio::test]
    async fn test_defaults() {
        let process = HttpProcess::builder().build().await.unwrap();
        assert_eq!(process.host(), DEFAULT_HOST);
        assert_eq!(process.port(), DEFAULT_PORT);
        assert_eq!(process.path(), "/");
        assert_eq!(process.state(), HttpState::NotStarted);
    }

    #[tokio::test]
    async fn test_stop_requires_started() {
        let mut process = HttpProcess::builder().build().await.unwrap();
        let err = process.stop().await.unwrap_err();
        assert!(matches!(
            err,
            ProcessError::InvalidState {
                expected: HttpState::Started,
                actual: HttpState::NotStarted
            }
        ));
    }
}
