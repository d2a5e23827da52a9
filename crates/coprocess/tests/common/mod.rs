//! Common test utilities
//!
//! The echo children are built alongside the tests, so every integration test
//! runs against a real process.

#![allow(dead_code)]

use std::time::Duration;

use coprocess::{ProcessConfig, RelayTarget};

/// Short per-stage stop timeout so failing tests fail fast.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Path of the line echo child.
pub fn echo_lines() -> &'static str {
    env!("CARGO_BIN_EXE_coprocess-echo-lines")
}

/// Path of the object echo child.
pub fn echo_objects() -> &'static str {
    env!("CARGO_BIN_EXE_coprocess-echo-objects")
}

/// Config for the line echo child with its stderr sent to the log.
pub fn echo_lines_config() -> ProcessConfig {
    ProcessConfig::new(echo_lines())
        .with_diagnostics(RelayTarget::Log)
        .with_stop_timeout(STOP_TIMEOUT)
}

/// Config for the object echo child with its stderr sent to the log.
pub fn echo_objects_config() -> ProcessConfig {
    ProcessConfig::new(echo_objects())
        .with_diagnostics(RelayTarget::Log)
        .with_stop_timeout(STOP_TIMEOUT)
}

/// Route `tracing` output through the test harness; `RUST_LOG` controls it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
