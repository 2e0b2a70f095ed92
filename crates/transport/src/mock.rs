//! Scriptable in-memory transport for tests and local development.
//!
//! Events are pushed through a [`MockHandle`]; every call against the
//! client is recorded so tests can assert on side effects (or their
//! absence).

use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
};

use {
    async_trait::async_trait,
    enxame_common::{ChatSummary, Contact, TransportError},
    tokio::sync::mpsc,
};

use crate::{client::TransportClient, event::TransportEvent};

/// One send recorded by the mock.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub to: String,
    pub body: String,
}

/// Scripted transport double. Construct with [`MockTransport::new`],
/// drive it with the returned [`MockHandle`].
pub struct MockTransport {
    events: tokio::sync::Mutex<mpsc::UnboundedReceiver<TransportEvent>>,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    sent: Mutex<Vec<SentMessage>>,
    next_id: AtomicU64,
    connect_error: Mutex<Option<String>>,
    send_errors: Mutex<HashMap<String, String>>,
    contacts: Mutex<Vec<Contact>>,
    chats: Mutex<Vec<ChatSummary>>,
}

/// Pushes scripted events into a [`MockTransport`].
#[derive(Clone)]
pub struct MockHandle {
    tx: mpsc::UnboundedSender<TransportEvent>,
}

impl MockTransport {
    pub fn new() -> (Self, MockHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Self {
            events: tokio::sync::Mutex::new(rx),
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            connect_error: Mutex::new(None),
            send_errors: Mutex::new(HashMap::new()),
            contacts: Mutex::new(Vec::new()),
            chats: Mutex::new(Vec::new()),
        };
        (transport, MockHandle { tx })
    }

    /// Make every subsequent `connect` fail with the given reason.
    pub fn fail_connects(&self, reason: &str) {
        *lock(&self.connect_error) = Some(reason.to_string());
    }

    /// Make sends to `target` fail with the given reason until cleared.
    pub fn fail_sends_to(&self, target: &str, reason: &str) {
        lock(&self.send_errors).insert(target.to_string(), reason.to_string());
    }

    /// Seed the contact list returned by `fetch_contacts`.
    pub fn set_contacts(&self, contacts: Vec<Contact>) {
        *lock(&self.contacts) = contacts;
    }

    /// Seed the chat list returned by `fetch_recent_chats`.
    pub fn set_chats(&self, chats: Vec<ChatSummary>) {
        *lock(&self.chats) = chats;
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// Everything sent through this transport, in order.
    pub fn sent(&self) -> Vec<SentMessage> {
        lock(&self.sent).clone()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl TransportClient for MockTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        match lock(&self.connect_error).clone() {
            Some(reason) => Err(TransportError::Connect(reason)),
            None => Ok(()),
        }
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn send_text(&self, to: &str, body: &str) -> Result<String, TransportError> {
        if let Some(reason) = lock(&self.send_errors).get(to).cloned() {
            return Err(TransportError::Send(reason));
        }
        lock(&self.sent).push(SentMessage {
            to: to.to_string(),
            body: body.to_string(),
        });
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(format!("MSG-{id}"))
    }

    async fn fetch_contacts(&self) -> Result<Vec<Contact>, TransportError> {
        Ok(lock(&self.contacts).clone())
    }

    async fn fetch_recent_chats(&self, limit: usize) -> Result<Vec<ChatSummary>, TransportError> {
        let chats = lock(&self.chats);
        Ok(chats.iter().take(limit).cloned().collect())
    }

    async fn next_event(&self) -> Option<TransportEvent> {
        self.events.lock().await.recv().await
    }
}

impl MockHandle {
    pub fn qr(&self, payload: &str) {
        self.push(TransportEvent::Qr(payload.to_string()));
    }

    pub fn authenticated(&self) {
        self.push(TransportEvent::Authenticated);
    }

    pub fn ready(&self) {
        self.push(TransportEvent::Ready);
    }

    pub fn disconnected(&self, reason: &str) {
        self.push(TransportEvent::Disconnected {
            reason: reason.to_string(),
        });
    }

    pub fn auth_failure(&self, reason: &str) {
        self.push(TransportEvent::AuthFailure {
            reason: reason.to_string(),
        });
    }

    pub fn message(&self, from: &str, body: &str) {
        self.push(TransportEvent::Message(crate::event::InboundMessage::text(
            from, body,
        )));
    }

    fn push(&self, event: TransportEvent) {
        // Receiver gone means the session is shutting down; scripted
        // events after that point are simply dropped.
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_sends_in_order() {
        let (transport, _handle) = MockTransport::new();
        transport.send_text("a", "one").await.unwrap();
        transport.send_text("b", "two").await.unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].to, "a");
        assert_eq!(sent[1].body, "two");
    }

    #[tokio::test]
    async fn scripted_send_failure_is_not_recorded() {
        let (transport, _handle) = MockTransport::new();
        transport.fail_sends_to("b", "rate limited");

        assert!(transport.send_text("b", "x").await.is_err());
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn events_arrive_in_push_order() {
        let (transport, handle) = MockTransport::new();
        handle.qr("CODE");
        handle.authenticated();

        assert!(matches!(
            transport.next_event().await,
            Some(TransportEvent::Qr(p)) if p == "CODE"
        ));
        assert!(matches!(
            transport.next_event().await,
            Some(TransportEvent::Authenticated)
        ));
    }

    #[tokio::test]
    async fn stream_closes_when_handle_dropped() {
        let (transport, handle) = MockTransport::new();
        drop(handle);
        assert!(transport.next_event().await.is_none());
    }
}
