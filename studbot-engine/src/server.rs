//! WebSocket backend server exposing a [`Generate`] engine.
//!
//! Speaks the relay wire protocol: one strict JSON frame per WebSocket
//! text message in both directions. Malformed or oversized frames are
//! logged and dropped without a reply; the relay's orphan handling and
//! its own failure notices cover the silence.

use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;

use studbot_common::{Frame, Result};

use crate::engine::{Generate, GenerateParams};

/// Serves a single engine to any number of relay connections.
pub struct BackendServer {
    engine: Arc<dyn Generate>,
    params: GenerateParams,
    bytes_limit: usize,
}

impl BackendServer {
    /// Create a new backend server around an engine.
    pub fn new(engine: Arc<dyn Generate>, params: GenerateParams, bytes_limit: usize) -> Self {
        Self {
            engine,
            params,
            bytes_limit,
        }
    }

    /// Accept connections on the listener until it fails.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        tracing::info!(addr = %listener.local_addr()?, "Backend server listening");

        loop {
            let (stream, peer) = listener.accept().await?;
            tracing::info!(peer = %peer, "Relay connected");

            let server = self.clone();
            tokio::spawn(async move {
                server.handle_socket(stream).await;
                tracing::info!(peer = %peer, "Relay disconnected");
            });
        }
    }

    async fn handle_socket(&self, stream: TcpStream) {
        let ws = match tokio_tungstenite::accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                tracing::warn!(error = %e, "WebSocket handshake failed");
                return;
            }
        };

        let (mut write, mut read) = ws.split();

        while let Some(msg) = read.next().await {
            let raw = match msg {
                Ok(Message::Text(raw)) => raw,
                Ok(Message::Close(_)) => break,
                Ok(_) => continue, // ping/pong handled by the library
                Err(e) => {
                    tracing::warn!(error = %e, "Receive failed");
                    break;
                }
            };

            if raw.len() > self.bytes_limit {
                tracing::warn!(
                    size = raw.len(),
                    limit = self.bytes_limit,
                    "Dropping oversized frame"
                );
                continue;
            }

            let frame = match Frame::parse(&raw) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping malformed frame");
                    continue;
                }
            };

            let Some(reply) = self.answer(frame).await else {
                continue;
            };

            let json = match reply.encode(self.bytes_limit) {
                Ok(json) => json,
                Err(e) => {
                    tracing::warn!(user_id = reply.id, error = %e, "Reply exceeds frame limit");
                    continue;
                }
            };

            if let Err(e) = write.send(Message::Text(json)).await {
                tracing::warn!(error = %e, "Send failed");
                break;
            }
        }
    }

    /// Run one generation; `None` means no reply is sent at all.
    async fn answer(&self, frame: Frame) -> Option<Frame> {
        let started = Instant::now();
        tracing::info!(user_id = frame.id, "Generating a reply");

        match self.engine.generate(&frame.text, &self.params).await {
            Ok(result) => {
                if result.text.is_empty() {
                    tracing::info!(user_id = frame.id, "Generated empty response");
                }
                tracing::info!(
                    user_id = frame.id,
                    prompt_tokens = result.prompt_tokens,
                    completion_tokens = result.completion_tokens,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Reply generated"
                );
                Some(Frame::new(frame.id, result.text))
            }
            Err(e) => {
                tracing::error!(user_id = frame.id, error = %e, "Generation failed");
                None
            }
        }
    }
}
