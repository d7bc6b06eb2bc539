//! Error types for the studbot services.

use thiserror::Error;

/// Result type alias using the studbot error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for studbot services.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Backend unreachable or connection lost mid-exchange
    #[error("Backend connection error: {0}")]
    Connection(String),

    /// The user already has a request in flight
    #[error("A request for this user is already in flight")]
    Busy,

    /// Malformed or schema-violating payload
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// Reply references an id with no pending registration
    #[error("Reply for user {0} matches no pending request")]
    Orphan(i64),

    /// Frame exceeds the configured transport size limit
    #[error("Frame of {size} bytes exceeds the transport limit of {limit} bytes")]
    TransportLimit { size: usize, limit: usize },

    /// Inference engine failure
    #[error("Engine error: {0}")]
    Engine(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal channel closed before a result was delivered
    #[error("Channel closed")]
    ChannelClosed,

    /// Timed out awaiting a correlated reply
    #[error("Timed out awaiting a reply")]
    Timeout,

    /// Other error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create an error with additional context.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Check if this is the one-in-flight rejection.
    pub const fn is_busy(&self) -> bool {
        matches!(self, Self::Busy)
    }

    /// Check if this is a connection error, looking through context wrappers.
    pub fn is_connection(&self) -> bool {
        match self {
            Self::Connection(_) => true,
            Self::WithContext { source, .. } => source.is_connection(),
            _ => false,
        }
    }

    /// Check if this is a transport size rejection.
    pub const fn is_transport_limit(&self) -> bool {
        matches!(self, Self::TransportLimit { .. })
    }
}

/// Extension trait for adding context to any error type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }
}
