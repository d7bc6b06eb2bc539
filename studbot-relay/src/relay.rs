//! Relay orchestration: intake, compose, send, correlate, deliver.
//!
//! The relay is one explicit service object owning the backend
//! connection, the pending table, and the history store. Three
//! concurrent roles cooperate through channels: the connection task
//! (socket ownership and reconnection), the dispatch task (resolving
//! inbound frames against pending entries), and per-request handlers
//! blocking on a one-shot completion signal.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use studbot_common::config::Config;
use studbot_common::logging::generate_trace_id;
use studbot_common::{Error, Frame, Result};

use crate::chunk::split_reply;
use crate::connection::{ConnEvent, ConnectionManager};
use crate::history::HistoryStore;
use crate::pending::{Outcome, PendingTable};
use crate::prompt::PromptComposer;
use crate::transcript::Transcript;

/// Shown when a user already has a question in flight.
pub const PLEASE_WAIT_NOTICE: &str =
    "Please wait - I am still answering your previous question.";

/// Shown for any failure; diagnostic detail stays in the logs.
pub const FAILURE_NOTICE: &str =
    "Something went wrong while answering your question. Please try again shortly.";

/// Map an error to the generic text a user may see.
pub fn user_notice(error: &Error) -> &'static str {
    if error.is_busy() {
        PLEASE_WAIT_NOTICE
    } else {
        FAILURE_NOTICE
    }
}

/// The relay service.
pub struct Relay {
    conn: ConnectionManager,
    pending: Arc<PendingTable>,
    history: Arc<HistoryStore>,
    composer: PromptComposer,
    chunk_limit: usize,
    reply_timeout: Option<Duration>,
    dispatch: tokio::task::JoinHandle<()>,
}

impl Relay {
    /// Start the relay: spawns the connection and dispatch tasks.
    pub fn start(config: &Config) -> Self {
        let (conn, events) = ConnectionManager::start(
            config.backend.url.clone(),
            config.backend.bytes_limit,
            Duration::from_secs(config.backend.retry_secs),
        );

        let pending = Arc::new(PendingTable::new());
        let history = Arc::new(HistoryStore::new());
        let transcript = Transcript::new(&config.relay.transcript_path);

        let dispatch = tokio::spawn(dispatch_loop(
            events,
            pending.clone(),
            history.clone(),
            transcript,
        ));

        Self {
            conn,
            pending,
            history,
            composer: PromptComposer::new(
                config.relay.system_prompt.clone(),
                config.relay.context_budget,
            ),
            chunk_limit: config.relay.chunk_limit,
            reply_timeout: config.backend.reply_timeout_secs.map(Duration::from_secs),
            dispatch,
        }
    }

    /// Stop the background tasks.
    pub fn stop(&self) {
        self.dispatch.abort();
        self.conn.stop();
    }

    /// Handle one user prompt end to end.
    ///
    /// Returns the ordered reply pieces, sized for the chat transport.
    /// [`Error::Busy`] means the user already has a question in flight
    /// and no backend contact occurred.
    pub async fn ask(&self, user_id: i64, question: &str) -> Result<Vec<String>> {
        let trace_id = generate_trace_id();
        let span = tracing::info_span!("relay_ask", user_id, trace_id = %trace_id);
        let _enter = span.enter();

        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending
            .register(user_id, question.to_string(), reply_tx)?;

        let prompt = self
            .composer
            .compose(&self.history.snapshot(user_id), question);
        tracing::debug!(prompt_chars = prompt.chars().count(), "Prompt composed");

        if let Err(e) = self.conn.send(&Frame::new(user_id, prompt)) {
            self.pending.clear(user_id);
            tracing::warn!(error = %e, "Failed to forward prompt");
            return Err(e);
        }

        drop(_enter);
        let outcome = self.await_reply(user_id, reply_rx).await?;

        match outcome {
            Outcome::Reply(text) => {
                tracing::info!(user_id, reply_chars = text.chars().count(), "Reply delivered");
                Ok(split_reply(&text, self.chunk_limit))
            }
            Outcome::Failed => Err(Error::Connection(
                "no reply could be delivered".into(),
            )),
        }
    }

    /// Block on the one-shot completion signal, bounding the wait only
    /// when a reply timeout is configured. The unbounded default keeps
    /// the user's slot occupied until the backend answers or the
    /// connection drops.
    async fn await_reply(
        &self,
        user_id: i64,
        reply_rx: oneshot::Receiver<Outcome>,
    ) -> Result<Outcome> {
        let received = match self.reply_timeout {
            Some(bound) => match tokio::time::timeout(bound, reply_rx).await {
                Ok(received) => received,
                Err(_) => {
                    self.pending.clear(user_id);
                    tracing::warn!(user_id, "Timed out awaiting a reply, slot released");
                    return Err(Error::Timeout);
                }
            },
            None => reply_rx.await,
        };

        received.map_err(|_| Error::ChannelClosed)
    }

    /// Whether the backend connection is up.
    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    /// Number of requests currently awaiting a reply.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Number of completed exchanges recorded for a user.
    pub fn history_len(&self, user_id: i64) -> usize {
        self.history.len(user_id)
    }
}

/// Resolve connection events against the pending table.
///
/// Runs until the event channel closes. Replies with no pending entry
/// are orphans: logged and dropped, nothing is delivered to anyone.
async fn dispatch_loop(
    mut events: mpsc::Receiver<ConnEvent>,
    pending: Arc<PendingTable>,
    history: Arc<HistoryStore>,
    transcript: Transcript,
) {
    while let Some(event) = events.recv().await {
        match event {
            ConnEvent::Frame(frame) => match pending.complete(frame.id) {
                Some(entry) => {
                    history.append(frame.id, entry.question.clone(), frame.text.clone());
                    transcript.append(frame.id, &entry.question, &frame.text).await;

                    tracing::debug!(
                        user_id = frame.id,
                        waited_ms = entry.created_at.elapsed().as_millis() as u64,
                        "Reply correlated"
                    );
                    if entry.reply_tx.send(Outcome::Reply(frame.text)).is_err() {
                        tracing::warn!(user_id = frame.id, "Requester gone before delivery");
                    }
                }
                None => {
                    let err = Error::Orphan(frame.id);
                    tracing::warn!(user_id = frame.id, error = %err, "Orphan reply discarded");
                }
            },
            ConnEvent::Oversized { user_id, size } => match pending.complete(user_id) {
                Some(entry) => {
                    tracing::warn!(
                        user_id,
                        size,
                        "Reply exceeds the transport limit, failing the request"
                    );
                    let _ = entry.reply_tx.send(Outcome::Failed);
                }
                None => {
                    let err = Error::Orphan(user_id);
                    tracing::warn!(user_id, size, error = %err, "Oversized orphan reply discarded");
                }
            },
            ConnEvent::Established => {
                tracing::info!("Backend available");
            }
            ConnEvent::Lost => {
                let dropped = pending.drain();
                if !dropped.is_empty() {
                    tracing::warn!(
                        count = dropped.len(),
                        "Failing in-flight requests after connection loss"
                    );
                }
                for entry in dropped {
                    let _ = entry.reply_tx.send(Outcome::Failed);
                }
            }
        }
    }
}
