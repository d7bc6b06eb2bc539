//! Best-effort append-only log of completed exchanges.
//!
//! One record per exchange, fields joined by a delimiter that cannot
//! appear between records, appended to a flat file. Used only for
//! offline analysis, never for recovery; failures are logged and
//! swallowed.

use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

/// Separates user id, question, and answer within a record.
pub const FIELD_DELIMITER: &str = "¤¤¤";

/// Terminates a record.
pub const RECORD_DELIMITER: &str = "§§§";

/// Append-only exchange log.
pub struct Transcript {
    path: PathBuf,
}

impl Transcript {
    /// Create a transcript writing to the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append one completed exchange. Never fails the caller.
    pub async fn append(&self, user_id: i64, question: &str, answer: &str) {
        let record = format!(
            "{user_id}{FIELD_DELIMITER}{question}{FIELD_DELIMITER}{answer}{RECORD_DELIMITER}"
        );

        if let Err(e) = self.write(&record).await {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Transcript append failed"
            );
        }
    }

    async fn write(&self, record: &str) -> std::io::Result<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(record.as_bytes()).await?;
        // tokio files buffer writes; flush before returning so the
        // record is on disk once `append` resolves.
        file.flush().await?;
        Ok(())
    }
}
