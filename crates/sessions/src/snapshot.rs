use {
    async_trait::async_trait,
    enxame_common::{MessageRecord, SessionSummary, now_ms},
    serde::{Deserialize, Serialize},
    thiserror::Error,
};

/// Point-in-time copy of one session's log and metadata — the backup
/// artifact. Built from owned snapshots, never from live references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub summary: SessionSummary,
    pub messages: Vec<MessageRecord>,
    /// Unix milliseconds at capture time; also the artifact key.
    pub captured_at: u64,
}

impl SessionSnapshot {
    pub fn new(summary: SessionSummary, messages: Vec<MessageRecord>) -> Self {
        Self {
            summary,
            messages,
            captured_at: now_ms(),
        }
    }
}

/// Non-fatal by contract: callers log these and move on to the next
/// session.
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Sink(String),
}

/// Durable destination for session snapshots. File, object store,
/// database — the scheduler doesn't care.
#[async_trait]
pub trait BackupSink: Send + Sync {
    /// Persist one snapshot, keyed by `(session id, captured_at)`.
    async fn store(&self, snapshot: &SessionSnapshot) -> Result<(), BackupError>;

    /// Remove artifacts captured before `cutoff_ms`. Returns how many
    /// were removed.
    async fn prune(&self, cutoff_ms: u64) -> Result<usize, BackupError>;
}
