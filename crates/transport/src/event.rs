use {
    enxame_common::MessageKind,
    serde::{Deserialize, Serialize},
};

/// A message delivered by the transport, before it is logged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Transport-assigned id, when the protocol provides one.
    pub id: Option<String>,
    pub from: String,
    pub body: String,
    pub kind: MessageKind,
}

impl InboundMessage {
    pub fn text(from: &str, body: &str) -> Self {
        Self {
            id: None,
            from: from.to_string(),
            body: body.to_string(),
            kind: MessageKind::Text,
        }
    }
}

/// Tagged events emitted by a transport connection, in delivery order.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A pairing payload to show the operator. Transports rotate these,
    /// so repeats replace the previous payload.
    Qr(String),
    Authenticated,
    Ready,
    Disconnected { reason: String },
    AuthFailure { reason: String },
    Message(InboundMessage),
}
