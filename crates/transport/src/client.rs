use std::sync::Arc;

use {
    async_trait::async_trait,
    enxame_common::{ChatSummary, Contact, TransportError},
};

use crate::event::TransportEvent;

/// One logical connection to the messaging network. Each session owns
/// exactly one client; all methods take `&self` so the handle can be
/// shared between the session's event loop and its sender task.
#[async_trait]
pub trait TransportClient: Send + Sync {
    /// Open the connection. Idempotent while a connect is already in
    /// flight. Readiness is signalled through the event stream, not the
    /// return value.
    async fn connect(&self) -> Result<(), TransportError>;

    /// Tear the connection down.
    async fn disconnect(&self) -> Result<(), TransportError>;

    /// Send a text message. Returns the transport-assigned message id.
    async fn send_text(&self, to: &str, body: &str) -> Result<String, TransportError>;

    /// Full contact list. Best-effort; called once per `ready`.
    async fn fetch_contacts(&self) -> Result<Vec<Contact>, TransportError>;

    /// Most recent conversations. Best-effort; called once per `ready`.
    async fn fetch_recent_chats(&self, limit: usize) -> Result<Vec<ChatSummary>, TransportError>;

    /// Next event from the connection, in delivery order. `None` means
    /// the stream is closed for good; consumers treat that as a
    /// disconnect. Single consumer only.
    async fn next_event(&self) -> Option<TransportEvent>;
}

/// Builds one [`TransportClient`] per session. Injected into the
/// registry so the orchestrator never knows which protocol it drives.
pub trait TransportFactory: Send + Sync {
    fn create(&self, session_id: &str) -> Arc<dyn TransportClient>;
}

/// Closures work as factories, which keeps test wiring short.
impl<F> TransportFactory for F
where
    F: Fn(&str) -> Arc<dyn TransportClient> + Send + Sync,
{
    fn create(&self, session_id: &str) -> Arc<dyn TransportClient> {
        self(session_id)
    }
}
