//! Append-only conversation audit log.
//!
//! The log is a JSON array of records. A file that cannot be parsed is treated as empty and
//! replaced on the next append; audit completeness is traded for availability.
//!
//! Turns reach the log through `AuditWriter`: one background task fed by a bounded queue, so
//! records land in submission order and a slow disk never blocks a request.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;

use crate::error::{CoreError, Result};
use crate::shared::ConversationTurn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: String,
    pub user_message: String,
    pub intent: String,
    pub bot_response: String,
}

impl From<&ConversationTurn> for AuditRecord {
    fn from(turn: &ConversationTurn) -> Self {
        Self {
            timestamp: turn.timestamp.clone(),
            user_message: turn.user_message.clone(),
            intent: turn.detected_intent.clone(),
            bot_response: turn.bot_response.clone(),
        }
    }
}

/// Sink for completed turns. Implementations swallow their own failures.
pub trait ConversationLogger: Send + Sync {
    fn log_turn(&self, turn: &ConversationTurn);
}

pub struct JsonFileAuditLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileAuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records. A missing file is an empty log.
    pub fn read_all(&self) -> Result<Vec<AuditRecord>> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(CoreError::AuditIo {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&text).map_err(|source| CoreError::AuditFormat {
            path: self.path.clone(),
            source,
        })
    }

    /// Appends one record, rewriting the file. Existing content that cannot be read is dropped.
    pub fn append(&self, record: AuditRecord) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut records = match self.read_all() {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(target: "helpdesk::audit", "{}; starting a fresh log", e);
                Vec::new()
            }
        };
        records.push(record);
        self.write_all(&records)
    }

    fn write_all(&self, records: &[AuditRecord]) -> Result<()> {
        let io_err = |source: std::io::Error| CoreError::AuditIo {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_vec_pretty(records).map_err(|source| CoreError::AuditFormat {
            path: self.path.clone(),
            source,
        })?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)
    }
}

impl ConversationLogger for JsonFileAuditLog {
    fn log_turn(&self, turn: &ConversationTurn) {
        if let Err(e) = self.append(AuditRecord::from(turn)) {
            tracing::warn!(target: "helpdesk::audit", "Failed to record conversation turn: {}", e);
        }
    }
}

pub const DEFAULT_AUDIT_QUEUE_CAPACITY: usize = 1024;

enum AuditJob {
    Turn(ConversationTurn),
    Flush(oneshot::Sender<()>),
}

/// Handle to the single audit writer task. Cloning shares the same queue.
#[derive(Clone)]
pub struct AuditWriter {
    tx: mpsc::Sender<AuditJob>,
}

impl AuditWriter {
    /// Spawns the writer on the current Tokio runtime. It stops once every handle is dropped.
    pub fn spawn(logger: Arc<dyn ConversationLogger>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel(capacity.max(1));
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                match job {
                    AuditJob::Turn(turn) => {
                        let logger = Arc::clone(&logger);
                        if let Err(e) = tokio::task::spawn_blocking(move || logger.log_turn(&turn)).await {
                            tracing::warn!(target: "helpdesk::audit", "Audit write task failed: {}", e);
                        }
                    }
                    AuditJob::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
        });
        Self { tx }
    }

    /// Queues a turn without waiting. `false` when the queue is full or the writer has stopped;
    /// the turn is then dropped.
    pub fn submit(&self, turn: ConversationTurn) -> bool {
        match self.tx.try_send(AuditJob::Turn(turn)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(target: "helpdesk::audit", "Audit queue full; dropping conversation turn");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!(target: "helpdesk::audit", "Audit writer stopped; dropping conversation turn");
                false
            }
        }
    }

    /// Resolves once every turn queued before this call has been written.
    pub async fn flush(&self) {
        let (done, written) = oneshot::channel();
        if self.tx.send(AuditJob::Flush(done)).await.is_ok() {
            let _ = written.await;
        }
    }
}
