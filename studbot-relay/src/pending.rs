//! In-flight request bookkeeping and reply correlation.
//!
//! At most one pending request per user at any time. An entry exists
//! from registration until exactly one completion or failure; replies
//! that match no entry are orphans and are dropped by the caller.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::Instant;
use tokio::sync::oneshot;

use studbot_common::{Error, Result};

/// Outcome delivered to the handler awaiting a reply.
#[derive(Debug)]
pub enum Outcome {
    /// The backend answered; the full reply text.
    Reply(String),
    /// No reply can be delivered: the connection dropped or the reply
    /// was rejected by the transport.
    Failed,
}

/// One registered in-flight request.
#[derive(Debug)]
pub struct PendingEntry {
    pub user_id: i64,
    pub question: String,
    pub reply_tx: oneshot::Sender<Outcome>,
    pub created_at: Instant,
}

/// Correlation table enforcing at-most-one-in-flight per user.
///
/// Safe for concurrent registration and completion from independent
/// users; unrelated users never block each other.
#[derive(Default)]
pub struct PendingTable {
    entries: DashMap<i64, PendingEntry>,
}

impl PendingTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request for a user.
    ///
    /// Fails with [`Error::Busy`] when an entry already exists; the
    /// existing entry is left untouched.
    pub fn register(
        &self,
        user_id: i64,
        question: String,
        reply_tx: oneshot::Sender<Outcome>,
    ) -> Result<()> {
        match self.entries.entry(user_id) {
            Entry::Occupied(_) => Err(Error::Busy),
            Entry::Vacant(slot) => {
                slot.insert(PendingEntry {
                    user_id,
                    question,
                    reply_tx,
                    created_at: Instant::now(),
                });
                Ok(())
            }
        }
    }

    /// Remove and return the entry for a user, if one exists.
    ///
    /// `None` means the reply is an orphan; the caller logs and drops it.
    pub fn complete(&self, user_id: i64) -> Option<PendingEntry> {
        self.entries.remove(&user_id).map(|(_, entry)| entry)
    }

    /// Drop the entry for a user without delivering anything.
    ///
    /// Used when the send failed or the wait timed out. Returns whether
    /// an entry existed.
    pub fn clear(&self, user_id: i64) -> bool {
        self.entries.remove(&user_id).is_some()
    }

    /// Remove every entry, returning them so each waiter can be failed.
    pub fn drain(&self) -> Vec<PendingEntry> {
        let user_ids: Vec<i64> = self.entries.iter().map(|e| *e.key()).collect();
        user_ids
            .into_iter()
            .filter_map(|id| self.entries.remove(&id).map(|(_, entry)| entry))
            .collect()
    }

    /// Number of in-flight requests.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no request is in flight.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
