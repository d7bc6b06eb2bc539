//! studbot-relay - relays chat prompts to a shared inference backend.
//!
//! Many concurrent users share one persistent WebSocket to a stateful
//! inference backend. The relay correlates each user's in-flight
//! request with the backend's asynchronous replies, keeps a per-user
//! conversation history it folds into context-budgeted prompts, and
//! splits oversized replies for a length-limited chat transport.
//!
//! ## Architecture
//!
//! ```text
//! user prompt → Relay::ask ─ register pending ─ compose ─ send ─┐
//!                   ▲                                           │ one shared
//!                   │ one-shot completion                       ▼ WebSocket
//!              dispatch task ◀── frames ◀── ConnectionManager ◀─┘
//!                   │
//!                   └─ history + transcript append
//! ```
//!
//! The connection task never gives up: connection loss fails in-flight
//! requests fast and reconnection retries forever at a fixed delay.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod chunk;
pub mod cli;
pub mod connection;
pub mod history;
pub mod pending;
pub mod prompt;
pub mod relay;
pub mod transcript;

// Re-export commonly used types
pub use chunk::{split_reply, NO_ANSWER_MARKER};
pub use connection::{ConnEvent, ConnState, ConnectionManager};
pub use history::{HistoryEntry, HistoryStore};
pub use pending::{Outcome, PendingEntry, PendingTable};
pub use prompt::PromptComposer;
pub use relay::{user_notice, Relay, FAILURE_NOTICE, PLEASE_WAIT_NOTICE};
pub use transcript::{Transcript, FIELD_DELIMITER, RECORD_DELIMITER};
