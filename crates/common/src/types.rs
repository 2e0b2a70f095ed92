use std::{
    fmt,
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};

/// Current wall-clock time as unix milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// ── Messages ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    Delivered,
    Read,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Media,
    Other,
}

/// One logged message, inbound or outbound. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Transport-assigned id, or a locally generated uuid when the
    /// transport did not supply one.
    pub id: String,
    pub direction: Direction,
    /// The remote party: sender for inbound, recipient for outbound.
    pub counterpart_id: String,
    pub body: String,
    /// Unix milliseconds.
    pub sent_at: u64,
    pub delivery_status: DeliveryStatus,
    pub kind: MessageKind,
}

impl MessageRecord {
    /// Build an inbound record, generating a local id if the transport
    /// did not assign one.
    pub fn inbound(id: Option<String>, from: &str, body: &str, kind: MessageKind) -> Self {
        Self {
            id: id.unwrap_or_else(local_id),
            direction: Direction::Inbound,
            counterpart_id: from.to_string(),
            body: body.to_string(),
            sent_at: now_ms(),
            delivery_status: DeliveryStatus::Delivered,
            kind,
        }
    }

    /// Build an outbound record with the given delivery status.
    pub fn outbound(id: Option<String>, to: &str, body: &str, status: DeliveryStatus) -> Self {
        Self {
            id: id.unwrap_or_else(local_id),
            direction: Direction::Outbound,
            counterpart_id: to.to_string(),
            body: body.to_string(),
            sent_at: now_ms(),
            delivery_status: status,
            kind: MessageKind::Text,
        }
    }
}

fn local_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ── Contacts & chats ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub display_name: Option<String>,
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<u64>,
}

/// One recent conversation, as reported by the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSummary {
    pub id: String,
    pub name: Option<String>,
    pub last_message_at: Option<u64>,
    #[serde(default)]
    pub unread: u32,
}

// ── Session status ───────────────────────────────────────────────────────────

/// Lifecycle status of a session. `Terminated` is the only terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStatus {
    Created,
    Initializing,
    AwaitingScan,
    Authenticated,
    Ready,
    Disconnected,
    Reconnecting,
    Terminated,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        self == Self::Terminated
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Created => "created",
            Self::Initializing => "initializing",
            Self::AwaitingScan => "awaiting-scan",
            Self::Authenticated => "authenticated",
            Self::Ready => "ready",
            Self::Disconnected => "disconnected",
            Self::Reconnecting => "reconnecting",
            Self::Terminated => "terminated",
        };
        f.write_str(label)
    }
}

/// Read-only snapshot of one session, safe to hand to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub display_name: String,
    pub status: SessionStatus,
    pub contacts_count: usize,
    pub message_count: usize,
    /// Unix milliseconds of the last message or state transition.
    pub last_activity: u64,
}
