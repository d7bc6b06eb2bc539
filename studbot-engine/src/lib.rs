//! studbot-engine - the inference side of the studbot relay.
//!
//! Exposes the [`Generate`] capability trait the relay's backend is
//! built around, ready-made engines for development and tests, and the
//! WebSocket server that frames an engine behind the wire protocol.
//!
//! ```text
//! relay ──ws frame {"id","text"}──▶ BackendServer ──▶ Generate::generate
//!       ◀─ws frame {"id","text"}──              ◀── Generated { text, .. }
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod engine;
pub mod server;

// Re-export commonly used types
pub use engine::{EchoEngine, Generate, GenerateParams, Generated, ScriptedEngine, StopReason};
pub use server::BackendServer;
