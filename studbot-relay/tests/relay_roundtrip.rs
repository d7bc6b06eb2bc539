//! End-to-end tests: the relay against an in-process backend server
//! over loopback WebSocket.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use studbot_common::config::Config;
use studbot_common::{Frame, Result};
use studbot_engine::{BackendServer, Generate, GenerateParams, Generated, ScriptedEngine};
use studbot_relay::{Relay, NO_ANSWER_MARKER, RECORD_DELIMITER};

fn test_config(url: String, tmp: &TempDir) -> Config {
    let mut config = Config::default();
    config.backend.url = url;
    config.backend.retry_secs = 1;
    config.relay.transcript_path = tmp.path().join("messages.log");
    config
}

async fn spawn_backend(engine: Arc<dyn Generate>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());

    let server = Arc::new(BackendServer::new(
        engine,
        GenerateParams::default(),
        65_536,
    ));
    tokio::spawn(server.serve(listener));

    url
}

async fn wait_connected(relay: &Relay) {
    for _ in 0..100 {
        if relay.is_connected() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("relay never connected to the backend");
}

#[tokio::test]
async fn round_trip_updates_history_and_transcript() {
    let tmp = TempDir::new().unwrap();
    let url = spawn_backend(Arc::new(ScriptedEngine::new(["hi there"]))).await;
    let relay = Relay::start(&test_config(url, &tmp));
    wait_connected(&relay).await;

    let pieces = relay.ask(7, "hello").await.unwrap();
    assert_eq!(pieces, vec!["hi there".to_string()]);

    assert_eq!(relay.pending_count(), 0);
    assert_eq!(relay.history_len(7), 1);

    let transcript = std::fs::read_to_string(tmp.path().join("messages.log")).unwrap();
    assert!(transcript.contains("hello"));
    assert!(transcript.contains("hi there"));
    assert!(transcript.ends_with(RECORD_DELIMITER));

    relay.stop();
}

#[tokio::test]
async fn long_reply_is_chunked_evenly() {
    let tmp = TempDir::new().unwrap();
    let url = spawn_backend(Arc::new(ScriptedEngine::new(["x".repeat(4500)]))).await;
    let relay = Relay::start(&test_config(url, &tmp));
    wait_connected(&relay).await;

    let pieces = relay.ask(1, "long one please").await.unwrap();
    assert_eq!(pieces.len(), 3);
    for piece in &pieces {
        assert_eq!(piece.chars().count(), 1500);
    }

    relay.stop();
}

#[tokio::test]
async fn empty_reply_becomes_the_marker_piece() {
    let tmp = TempDir::new().unwrap();
    let url = spawn_backend(Arc::new(ScriptedEngine::new([""]))).await;
    let relay = Relay::start(&test_config(url, &tmp));
    wait_connected(&relay).await;

    let pieces = relay.ask(2, "anything?").await.unwrap();
    assert_eq!(pieces, vec![NO_ANSWER_MARKER.to_string()]);

    relay.stop();
}

/// Engine that takes a while, to keep a request in flight.
struct SlowEngine;

#[async_trait]
impl Generate for SlowEngine {
    async fn generate(&self, _prompt: &str, _params: &GenerateParams) -> Result<Generated> {
        tokio::time::sleep(Duration::from_millis(600)).await;
        Ok(Generated {
            text: "done".into(),
            prompt_tokens: 1,
            completion_tokens: 1,
            generation_time: Duration::from_millis(600),
            stop_reason: None,
        })
    }
}

#[tokio::test]
async fn second_prompt_while_pending_is_busy() {
    let tmp = TempDir::new().unwrap();
    let url = spawn_backend(Arc::new(SlowEngine)).await;
    let relay = Arc::new(Relay::start(&test_config(url, &tmp)));
    wait_connected(&relay).await;

    let first = {
        let relay = relay.clone();
        tokio::spawn(async move { relay.ask(5, "slow one").await })
    };

    tokio::time::sleep(Duration::from_millis(150)).await;
    let err = relay.ask(5, "impatient retry").await.unwrap_err();
    assert!(err.is_busy());

    // The first request is unaffected by the rejected second one.
    let pieces = first.await.unwrap().unwrap();
    assert_eq!(pieces, vec!["done".to_string()]);
    assert_eq!(relay.history_len(5), 1);

    relay.stop();
}

#[tokio::test]
async fn oversized_reply_fails_fast_and_frees_the_slot() {
    let tmp = TempDir::new().unwrap();
    // First reply blows past the relay's inbound limit; the second one
    // fits. The backend itself allows both.
    let url = spawn_backend(Arc::new(ScriptedEngine::new([
        "y".repeat(2048),
        "short".to_string(),
    ])))
    .await;

    let mut config = test_config(url, &tmp);
    config.backend.bytes_limit = 1024;
    let relay = Relay::start(&config);
    wait_connected(&relay).await;

    let err = relay.ask(9, "tell me everything").await.unwrap_err();
    assert!(err.is_connection());
    assert_eq!(relay.pending_count(), 0);
    assert_eq!(relay.history_len(9), 0);

    // The connection stayed up and the user can ask again at once.
    assert!(relay.is_connected());
    let pieces = relay.ask(9, "something smaller?").await.unwrap();
    assert_eq!(pieces, vec!["short".to_string()]);

    relay.stop();
}

#[tokio::test]
async fn dropped_connection_fails_waiter_and_relay_recovers() {
    let tmp = TempDir::new().unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());

    // First connection: read one frame, then drop the socket.
    // Second connection: answer every frame.
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let _ = ws.next().await;
        drop(ws);

        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Text(raw) = msg {
                let frame = Frame::parse(&raw).unwrap();
                let reply = Frame::new(frame.id, "recovered");
                ws.send(Message::Text(reply.to_json().unwrap()))
                    .await
                    .unwrap();
            }
        }
    });

    let relay = Relay::start(&test_config(url, &tmp));
    wait_connected(&relay).await;

    // The backend drops the link while our reply is outstanding: the
    // pending slot is cleared and the caller fails fast.
    let err = relay.ask(9, "doomed").await.unwrap_err();
    assert!(err.is_connection());
    assert_eq!(relay.pending_count(), 0);
    assert_eq!(relay.history_len(9), 0);

    // The reconnect loop brings the connection back and the same user
    // can ask again immediately.
    wait_connected(&relay).await;
    let pieces = relay.ask(9, "second try").await.unwrap();
    assert_eq!(pieces, vec!["recovered".to_string()]);

    relay.stop();
}
