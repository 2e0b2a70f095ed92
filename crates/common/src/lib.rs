//! Shared data model and error taxonomy.
//!
//! Everything in here is plain data: message records, contacts, session
//! status/summaries, and the typed errors that cross crate boundaries.
//! No I/O, no runtime dependencies.

pub mod error;
pub mod types;

pub use {
    error::{SessionError, TransportError},
    types::{
        ChatSummary, Contact, DeliveryStatus, Direction, MessageKind, MessageRecord,
        SessionStatus, SessionSummary, now_ms,
    },
};
