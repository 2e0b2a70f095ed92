//! Messaging-transport boundary.
//!
//! The actual wire protocol (pairing, encryption, media) lives behind the
//! [`TransportClient`] trait: one handle per session exposing connect /
//! disconnect / send plus a typed event stream. The orchestrator consumes
//! this interface; implementations are injected by the embedding
//! application. [`mock::MockTransport`] is a scriptable in-memory
//! implementation for tests and local development.

pub mod client;
pub mod event;
pub mod mock;

pub use {
    client::{TransportClient, TransportFactory},
    event::{InboundMessage, TransportEvent},
};
