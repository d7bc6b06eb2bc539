//! Wire protocol for the relay <-> backend connection.
//!
//! Both directions carry one UTF-8 JSON object per WebSocket text frame:
//! `{"id": <integer>, "text": <string>}`. The `id` identifies the
//! originating user, not a request counter; correlation of replies is
//! by this id alone. Any additional field is a schema violation.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One logical message in either direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Frame {
    /// Originating user id.
    pub id: i64,
    /// Prompt text (relay -> backend) or reply text (backend -> relay).
    pub text: String,
}

impl Frame {
    /// Create a new frame.
    pub fn new(id: i64, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
        }
    }

    /// Parse a received payload, treating any deviation from the schema
    /// as a protocol violation.
    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::Protocol(format!("malformed frame: {e}")))
    }

    /// Serialize to the JSON wire form.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serialize and enforce the transport byte limit before transmission.
    pub fn encode(&self, bytes_limit: usize) -> Result<String> {
        let json = self.to_json()?;
        if json.len() > bytes_limit {
            return Err(Error::TransportLimit {
                size: json.len(),
                limit: bytes_limit,
            });
        }
        Ok(json)
    }
}
