//! Shared foundation for the studbot services.
//!
//! Provides the pieces both the relay and the backend server depend on:
//! - Unified error taxonomy ([`error`])
//! - Configuration loading with env overrides ([`config`])
//! - Structured logging setup ([`logging`])
//! - The wire protocol frame ([`wire`])

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod wire;

// Re-export commonly used types
pub use config::{Config, DEFAULT_SYSTEM_PROMPT};
pub use error::{Error, Result, ResultExt};
pub use wire::Frame;
