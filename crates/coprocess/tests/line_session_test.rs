//! String-line sessions against the line echo child

mod common;

use std::sync::Arc;

use common::{echo_lines_config, init_tracing};
use coprocess::{ProcessError, ProcessSession, StopStage};
use rstest::rstest;

#[rstest]
#[case("This is the first line")]
#[case("1234")]
#[case("  padded  ")]
#[tokio::test]
async fn test_round_trip(#[case] message: &str) {
    init_tracing();
    let session = ProcessSession::lines(echo_lines_config()).unwrap();

    let reply = session.process(message).await.unwrap();
    assert_eq!(reply.as_deref(), Some(message.trim()));

    session.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_sentinel_then_stop() {
    init_tracing();
    let session = ProcessSession::lines(echo_lines_config()).unwrap();

    assert_eq!(
        session.process("1234").await.unwrap().as_deref(),
        Some("1234")
    );
    assert!(session.is_alive().await);

    // The child exits without answering.
    assert_eq!(session.process("STOP").await.unwrap(), None);

    let outcome = session.stop().await.unwrap();
    assert_eq!(outcome.stage, StopStage::Graceful);
    assert_eq!(outcome.code(), Some(0));
    assert!(!session.is_alive().await);
}

#[tokio::test]
async fn test_stop_closes_stdin_gracefully() {
    init_tracing();
    let session = ProcessSession::lines(echo_lines_config()).unwrap();
    session.process("hello").await.unwrap();

    let outcome = session.stop().await.unwrap();
    assert!(outcome.was_graceful());
    assert!(!session.is_alive().await);
}

#[tokio::test]
async fn test_exit_code_reported() {
    init_tracing();
    let session = ProcessSession::lines(echo_lines_config().with_args(["--exit-code", "3"])).unwrap();

    assert_eq!(session.process("STOP").await.unwrap(), None);
    let outcome = session.stop().await.unwrap();
    assert_eq!(outcome.code(), Some(3));
}

#[tokio::test]
async fn test_ensure_process_is_idempotent() {
    init_tracing();
    let session = ProcessSession::lines(echo_lines_config()).unwrap();

    assert!(session.ensure_process().await.unwrap());
    let pid = session.pid().await;
    assert!(pid.is_some());

    assert!(!session.ensure_process().await.unwrap());
    assert_eq!(session.pid().await, pid);

    session.stop().await.unwrap();
}

#[tokio::test]
async fn test_restart_after_child_exits() {
    init_tracing();
    let session = ProcessSession::lines(echo_lines_config()).unwrap();

    session.process("first").await.unwrap();
    let first_pid = session.pid().await;
    assert_eq!(session.process("STOP").await.unwrap(), None);

    // Wait for the exit to become observable.
    for _ in 0..100 {
        if !session.is_alive().await {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert!(!session.is_alive().await);

    let reply = session.process("second").await.unwrap();
    assert_eq!(reply.as_deref(), Some("second"));
    assert_ne!(session.pid().await, first_pid);

    session.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_get_their_own_replies() {
    init_tracing();
    let session = Arc::new(ProcessSession::lines(echo_lines_config()).unwrap());

    let mut handles = Vec::new();
    for task in 0..8 {
        let session = Arc::clone(&session);
        handles.push(tokio::spawn(async move {
            for n in 0..25 {
                let message = format!("task {} message {}", task, n);
                let reply = session.process(message.as_str()).await.unwrap();
                assert_eq!(reply.as_deref(), Some(message.as_str()));
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    session.stop().await.unwrap();
}

#[tokio::test]
async fn test_start_eagerly() {
    init_tracing();
    let session = ProcessSession::start(echo_lines_config(), coprocess::StringLineTransport::new())
        .await
        .unwrap();

    assert!(session.is_alive().await);
    session.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_sentinel_on_teardown() {
    init_tracing();
    let transport = coprocess::StringLineTransport::new().with_stop_sentinel();
    let session = ProcessSession::new(echo_lines_config().with_args(["--exit-code", "7"]), transport)
        .unwrap();

    session.process("x").await.unwrap();
    let outcome = session.stop().await.unwrap();
    assert_eq!(outcome.stage, StopStage::Graceful);
    assert_eq!(outcome.code(), Some(7));
}

#[tokio::test]
async fn test_stop_twice_is_not_started() {
    init_tracing();
    let session = ProcessSession::lines(echo_lines_config()).unwrap();
    session.process("x").await.unwrap();
    session.stop().await.unwrap();

    let err = session.stop().await.unwrap_err();
    assert!(matches!(err, ProcessError::NotStarted));
}
