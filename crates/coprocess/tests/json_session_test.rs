//! JSON-line sessions against the line echo child

mod common;

use common::{echo_lines_config, init_tracing};
use coprocess::{JsonLineTransport, ProcessError, ProcessSession};
use serde::Serialize;
use serde_json::{Value, json};

#[tokio::test]
async fn test_objects_round_trip() {
    init_tracing();
    let session = ProcessSession::json(echo_lines_config()).unwrap();

    for message in [json!({"x": "y", "cmd": "do"}), json!({"vals": [1.1, 2.2, 3.3, 4.4]})] {
        let reply = session.process(&message).await.unwrap().unwrap();
        assert_eq!(Value::Object(reply), message);
    }

    session.stop().await.unwrap();
}

#[tokio::test]
async fn test_noise_lines_are_skipped() {
    init_tracing();
    let session = ProcessSession::json(echo_lines_config().with_arg("--chatter")).unwrap();

    for n in 0..5 {
        let message = json!({"n": n});
        let reply = session.process(&message).await.unwrap().unwrap();
        assert_eq!(reply.get("n"), Some(&json!(n)));
    }

    session.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_object_ends_stream() {
    init_tracing();
    let session = ProcessSession::json(echo_lines_config()).unwrap();

    session.process(&json!({"cmd": "do"})).await.unwrap();
    assert!(session.process(&json!({"cmd": "STOP"})).await.unwrap().is_none());

    session.stop().await.unwrap();
    assert!(!session.is_alive().await);
}

#[derive(Serialize)]
struct Score<'a> {
    cmd: &'a str,
    features: Vec<f64>,
}

#[tokio::test]
async fn test_typed_requests() {
    init_tracing();
    let session =
        ProcessSession::new(echo_lines_config(), JsonLineTransport::<Score<'static>>::new()).unwrap();

    let reply = session
        .process(&Score {
            cmd: "score",
            features: vec![0.5, 1.5],
        })
        .await
        .unwrap()
        .unwrap();

    assert_eq!(reply["cmd"], "score");
    assert_eq!(reply["features"], json!([0.5, 1.5]));
    session.stop().await.unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn test_malformed_object_line_is_fatal() {
    init_tracing();
    // Answers every request with a broken object.
    let config = coprocess::ProcessConfig::new("sh")
        .with_args(["-c", "while read -r line; do echo '{broken'; done"])
        .with_stop_timeout(common::STOP_TIMEOUT);
    let session = ProcessSession::json(config).unwrap();

    let err = session.process(&json!({"a": 1})).await.unwrap_err();
    assert!(matches!(
        err,
        ProcessError::Transport {
            direction: coprocess::Direction::Receive,
            ..
        }
    ));

    // The exchange lock was released.
    session.stop().await.unwrap();
}
