use thiserror::Error;

use crate::types::SessionStatus;

/// Transport-layer failure. Always considered retryable by policy; the
/// worker turns these into state transitions rather than propagating them.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("send failed: {0}")]
    Send(String),
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("outbound queue is full")]
    QueueFull,
    #[error("transport stream closed")]
    Closed,
}

/// Caller-facing error taxonomy for registry and worker operations.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("session `{0}` already exists")]
    DuplicateId(String),
    #[error("unknown session `{0}`")]
    NotFound(String),
    #[error("session `{id}` is not connected (status: {status})")]
    NotReady { id: String, status: SessionStatus },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("authentication rejected: {0}")]
    AuthFailure(String),
    #[error("session `{0}` is shutting down")]
    Terminated(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_ready_mentions_status() {
        let err = SessionError::NotReady {
            id: "s1".into(),
            status: SessionStatus::Disconnected,
        };
        assert_eq!(
            err.to_string(),
            "session `s1` is not connected (status: disconnected)"
        );
    }

    #[test]
    fn transport_error_converts() {
        let err: SessionError = TransportError::Send("timed out".into()).into();
        assert!(matches!(err, SessionError::Transport(_)));
    }
}
