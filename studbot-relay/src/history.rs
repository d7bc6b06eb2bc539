//! Append-only per-user conversation history.
//!
//! Entries are appended only after a successful exchange and are never
//! mutated or evicted; long-lived users accumulate state for the
//! process lifetime. That unbounded growth is a known capacity risk
//! for long-running deployments.

use dashmap::DashMap;

/// One completed question/answer pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub question: String,
    pub answer: String,
}

/// Per-user conversation log, oldest entry first.
#[derive(Default)]
pub struct HistoryStore {
    entries: DashMap<i64, Vec<HistoryEntry>>,
}

impl HistoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a completed exchange to the tail of the user's log.
    pub fn append(&self, user_id: i64, question: String, answer: String) {
        self.entries
            .entry(user_id)
            .or_default()
            .push(HistoryEntry { question, answer });
    }

    /// Read-only snapshot of the user's log, oldest first.
    pub fn snapshot(&self, user_id: i64) -> Vec<HistoryEntry> {
        self.entries
            .get(&user_id)
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    /// Number of entries recorded for a user.
    pub fn len(&self, user_id: i64) -> usize {
        self.entries.get(&user_id).map_or(0, |log| log.len())
    }
}
