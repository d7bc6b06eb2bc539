//! Backend connection lifecycle.
//!
//! One long-lived task owns the single WebSocket to the inference
//! backend: it establishes the connection with an infinite fixed-delay
//! retry loop, serializes all outbound writes (concurrent senders feed
//! one queue), forwards inbound frames to the dispatch path, and on any
//! I/O error drops back to reconnecting. Exactly one reconnect attempt
//! is in flight at any time because this task is the only place a
//! connection is ever opened.

use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use studbot_common::{Error, Frame, Result};

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnState {
    const fn as_u8(self) -> u8 {
        match self {
            Self::Disconnected => 0,
            Self::Connecting => 1,
            Self::Connected => 2,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            2 => Self::Connected,
            1 => Self::Connecting,
            _ => Self::Disconnected,
        }
    }
}

/// Events surfaced to the relay's dispatch task.
#[derive(Debug)]
pub enum ConnEvent {
    /// A frame arrived from the backend.
    Frame(Frame),
    /// An inbound reply exceeded the transport limit and was dropped;
    /// the user it was addressed to must be failed fast.
    Oversized { user_id: i64, size: usize },
    /// The connection was established (or re-established).
    Established,
    /// The connection dropped; in-flight requests must be failed fast.
    Lost,
}

/// Handle to the connection task.
pub struct ConnectionManager {
    bytes_limit: usize,
    state: Arc<AtomicU8>,
    out_tx: mpsc::Sender<String>,
    task: tokio::task::JoinHandle<()>,
}

impl ConnectionManager {
    /// Spawn the connection task. Returns the handle and the event
    /// stream the dispatch task consumes.
    pub fn start(
        url: impl Into<String>,
        bytes_limit: usize,
        retry_delay: Duration,
    ) -> (Self, mpsc::Receiver<ConnEvent>) {
        let state = Arc::new(AtomicU8::new(ConnState::Disconnected.as_u8()));
        let (out_tx, out_rx) = mpsc::channel(64);
        let (event_tx, event_rx) = mpsc::channel(64);

        let task = tokio::spawn(run(
            url.into(),
            bytes_limit,
            retry_delay,
            state.clone(),
            out_rx,
            event_tx,
        ));

        (
            Self {
                bytes_limit,
                state,
                out_tx,
                task,
            },
            event_rx,
        )
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnState {
        ConnState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether the backend connection is up.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnState::Connected
    }

    /// Whether a connection attempt is underway.
    pub fn is_connecting(&self) -> bool {
        self.state() == ConnState::Connecting
    }

    /// Queue a frame for the backend.
    ///
    /// Fails fast when the connection is down; the reconnect loop is
    /// already working on it, callers must not wait here. Frames over
    /// the byte limit are rejected before transmission.
    pub fn send(&self, frame: &Frame) -> Result<()> {
        let json = frame.encode(self.bytes_limit)?;

        if self.state() != ConnState::Connected {
            return Err(Error::Connection("backend is not connected".into()));
        }

        self.out_tx
            .try_send(json)
            .map_err(|_| Error::Connection("outbound queue unavailable".into()))
    }

    /// Stop the connection task.
    pub fn stop(&self) {
        self.task.abort();
    }
}

async fn run(
    url: String,
    bytes_limit: usize,
    retry_delay: Duration,
    state: Arc<AtomicU8>,
    mut out_rx: mpsc::Receiver<String>,
    events: mpsc::Sender<ConnEvent>,
) {
    loop {
        state.store(ConnState::Connecting.as_u8(), Ordering::Release);

        // Never gives up: the service stays degraded but running until
        // the backend comes back.
        let ws = loop {
            match connect_async(&url).await {
                Ok((ws, _)) => break ws,
                Err(e) => {
                    tracing::warn!(
                        url = %url,
                        error = %e,
                        retry_secs = retry_delay.as_secs(),
                        "Backend unreachable, retrying"
                    );
                    tokio::time::sleep(retry_delay).await;
                }
            }
        };

        state.store(ConnState::Connected.as_u8(), Ordering::Release);
        tracing::info!(url = %url, "Backend connection established");
        if events.send(ConnEvent::Established).await.is_err() {
            return;
        }

        let (mut write, mut read) = ws.split();

        let reason = loop {
            tokio::select! {
                outbound = out_rx.recv() => match outbound {
                    Some(json) => {
                        if let Err(e) = write.send(Message::Text(json)).await {
                            tracing::warn!(error = %e, "Send failed");
                            break "send error";
                        }
                    }
                    // Manager handle dropped; nothing left to serve.
                    None => return,
                },
                inbound = read.next() => match inbound {
                    Some(Ok(Message::Text(raw))) => {
                        if raw.len() > bytes_limit {
                            tracing::warn!(
                                size = raw.len(),
                                limit = bytes_limit,
                                "Dropping oversized frame"
                            );
                            // The frame itself is discarded, but when it
                            // still parses the addressed user's waiter
                            // can be failed instead of stranded.
                            if let Ok(frame) = Frame::parse(&raw) {
                                let event = ConnEvent::Oversized {
                                    user_id: frame.id,
                                    size: raw.len(),
                                };
                                if events.send(event).await.is_err() {
                                    return;
                                }
                            }
                            continue;
                        }
                        match Frame::parse(&raw) {
                            Ok(frame) => {
                                if events.send(ConnEvent::Frame(frame)).await.is_err() {
                                    return;
                                }
                            }
                            Err(e) => tracing::warn!(error = %e, "Dropping malformed frame"),
                        }
                    }
                    Some(Ok(Message::Close(_))) => break "closed by backend",
                    Some(Ok(_)) => continue, // ping/pong handled by the library
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Receive failed");
                        break "receive error";
                    }
                    None => break "stream ended",
                },
            }
        };

        state.store(ConnState::Disconnected.as_u8(), Ordering::Release);
        tracing::warn!(reason, "Backend connection lost, reconnecting");
        if events.send(ConnEvent::Lost).await.is_err() {
            return;
        }

        // Frames queued while the link was dying belong to requests that
        // are about to be failed fast; they must not leak onto the next
        // connection.
        while out_rx.try_recv().is_ok() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_fails_fast_while_disconnected() {
        // Port 9 is discard; nothing is listening there in the test env.
        let (manager, _events) =
            ConnectionManager::start("ws://127.0.0.1:9", 65_536, Duration::from_secs(60));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!manager.is_connected());

        let err = manager.send(&Frame::new(1, "hello")).unwrap_err();
        assert!(err.is_connection());

        manager.stop();
    }

    #[tokio::test]
    async fn oversized_frame_rejected_before_state_check() {
        let (manager, _events) =
            ConnectionManager::start("ws://127.0.0.1:9", 64, Duration::from_secs(60));

        let err = manager.send(&Frame::new(1, "x".repeat(200))).unwrap_err();
        assert!(err.is_transport_limit());

        manager.stop();
    }

    #[tokio::test]
    async fn starts_in_connecting_state() {
        let (manager, _events) =
            ConnectionManager::start("ws://127.0.0.1:9", 65_536, Duration::from_secs(60));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(manager.is_connecting() || manager.state() == ConnState::Disconnected);
        assert!(!manager.is_connected());

        manager.stop();
    }
}
