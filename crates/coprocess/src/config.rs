//! Child process configuration

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::error::{ProcessError, Result};
use crate::relay::{RelayMode, RelayTarget};

/// Time allowed for each stop stage unless configured otherwise.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_millis(1000);

/// How to launch a child and handle its diagnostic output
///
/// The command is fixed once the process starts. Environment entries are
/// merged over the parent's environment, never replacing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// Program followed by its arguments
    pub command: Vec<String>,

    /// Directory the child starts in
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,

    /// Variables added to (or overriding) the inherited environment
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Destination for the child's stderr
    #[serde(default)]
    pub diagnostics: RelayTarget,

    /// How the stderr relay splits output
    #[serde(default)]
    pub relay_mode: RelayMode,

    /// Time allowed for each stop stage
    #[serde(
        default = "default_stop_timeout",
        rename = "stop_timeout_ms",
        with = "duration_millis"
    )]
    pub stop_timeout: Duration,
}

fn default_working_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_stop_timeout() -> Duration {
    DEFAULT_STOP_TIMEOUT
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            working_dir: default_working_dir(),
            env: BTreeMap::new(),
            diagnostics: RelayTarget::default(),
            relay_mode: RelayMode::default(),
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }
}

impl ProcessConfig {
    /// Configuration that runs `program` with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            command: vec![program.into()],
            ..Default::default()
        }
    }

    /// Configuration from a program-and-arguments list.
    pub fn from_args<I, S>(command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Configuration from a single command string split on whitespace.
    ///
    /// Arguments that themselves contain spaces cannot be expressed this way;
    /// use [`ProcessConfig::from_args`] for those.
    pub fn from_command_line(command: &str) -> Self {
        Self::from_args(command.split_whitespace())
    }

    /// Add an argument
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.command.push(arg.into());
        self
    }

    /// Add several arguments
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the working directory
    pub fn with_working_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set where the child's stderr goes
    pub fn with_diagnostics(mut self, target: RelayTarget) -> Self {
        self.diagnostics = target;
        self
    }

    /// Set how the stderr relay splits output
    pub fn with_relay_mode(mut self, mode: RelayMode) -> Self {
        self.relay_mode = mode;
        self
    }

    /// Set the time allowed for each stop stage
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// The program, if one is configured.
    pub fn program(&self) -> Option<&str> {
        self.command.first().map(String::as_str)
    }

    /// Check the configuration can be launched.
    pub fn validate(&self) -> Result<()> {
        match self.program() {
            None => Err(ProcessError::EmptyCommand),
            Some(program) if program.trim().is_empty() => Err(ProcessError::EmptyCommand),
            Some(_) => {
                if self.stop_timeout.is_zero() {
                    return Err(ProcessError::Config(
                        "stop timeout must be greater than zero".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Build the spawn command with all three standard streams piped.
    pub(crate) fn to_command(&self) -> Result<Command> {
        let program = self.program().ok_or(ProcessError::EmptyCommand)?;
        let args = quote_args(&self.command[1..], std::path::MAIN_SEPARATOR);

        let mut cmd = Command::new(program);
        push_args(&mut cmd, args);
        cmd.current_dir(&self.working_dir)
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        Ok(cmd)
    }
}

#[cfg(windows)]
fn push_args(cmd: &mut Command, args: Vec<String>) {
    // Already quoted; stop the standard library from quoting again.
    for arg in args {
        cmd.raw_arg(arg);
    }
}

#[cfg(not(windows))]
fn push_args(cmd: &mut Command, args: Vec<String>) {
    cmd.args(args);
}

/// Quote arguments for a platform whose path separator is `separator`.
///
/// With a `\` separator, arguments containing a space are wrapped in double
/// quotes unless they already are. Every other platform passes arguments
/// through untouched.
pub fn quote_args<S: AsRef<str>>(args: &[S], separator: char) -> Vec<String> {
    args.iter()
        .map(|arg| {
            let arg = arg.as_ref();
            let quoted = arg.len() >= 2 && arg.starts_with('"') && arg.ends_with('"');
            if separator == '\\' && arg.contains(' ') && !quoted {
                format!("\"{}\"", arg)
            } else {
                arg.to_string()
            }
        })
        .collect()
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let config = ProcessConfig::new("cat");
        assert_eq!(config.command, vec!["cat"]);
        assert_eq!(config.working_dir, PathBuf::from("."));
        assert!(config.env.is_empty());
        assert!(matches!(config.diagnostics, RelayTarget::Stderr));
        assert_eq!(config.relay_mode, RelayMode::Lines);
        assert_eq!(config.stop_timeout, Duration::from_millis(1000));
    }

    #[test]
    fn test_builder() {
        let config = ProcessConfig::new("python3")
            .with_arg("-u")
            .with_args(["worker.py", "--fast"])
            .with_env("ENVVAR", "envvalue")
            .with_working_dir("/tmp")
            .with_stop_timeout(Duration::from_millis(250));

        assert_eq!(config.command, vec!["python3", "-u", "worker.py", "--fast"]);
        assert_eq!(config.env.get("ENVVAR").map(String::as_str), Some("envvalue"));
        assert_eq!(config.working_dir, PathBuf::from("/tmp"));
        assert_eq!(config.stop_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_from_command_line_splits_on_whitespace() {
        let config = ProcessConfig::from_command_line("  java -cp  lib/x.jar\tMain ");
        assert_eq!(config.command, vec!["java", "-cp", "lib/x.jar", "Main"]);
    }

    #[rstest]
    #[case(ProcessConfig::default())]
    #[case(ProcessConfig::from_command_line("   "))]
    #[case(ProcessConfig::new(""))]
    fn test_empty_command_rejected(#[case] config: ProcessConfig) {
        assert!(matches!(config.validate(), Err(ProcessError::EmptyCommand)));
    }

    #[test]
    fn test_zero_stop_timeout_rejected() {
        let config = ProcessConfig::new("cat").with_stop_timeout(Duration::ZERO);
        assert!(matches!(config.validate(), Err(ProcessError::Config(_))));
    }

    #[rstest]
    #[case('\\', "plain", "plain")]
    #[case('\\', "C:\\Program Files\\x", "\"C:\\Program Files\\x\"")]
    #[case('\\', "\"already quoted\"", "\"already quoted\"")]
    #[case('/', "/home/me/my file", "/home/me/my file")]
    #[case('/', "plain", "plain")]
    fn test_quote_args(#[case] separator: char, #[case] arg: &str, #[case] expected: &str) {
        assert_eq!(quote_args(&[arg], separator), vec![expected.to_string()]);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: ProcessConfig = serde_json::from_str(
            r#"{"command":["node","echo.js"],"env":{"A":"1"},"diagnostics":"log","stop_timeout_ms":300}"#,
        )
        .unwrap();

        assert_eq!(config.command, vec!["node", "echo.js"]);
        assert_eq!(config.working_dir, PathBuf::from("."));
        assert!(matches!(config.diagnostics, RelayTarget::Log));
        assert_eq!(config.stop_timeout, Duration::from_millis(300));
    }

    #[test]
    fn test_serialize_uses_millis() {
        let json = serde_json::to_value(ProcessConfig::new("cat")).unwrap();
        assert_eq!(json["stop_timeout_ms"], 1000);
        assert_eq!(json["relay_mode"], "lines");
    }
}
