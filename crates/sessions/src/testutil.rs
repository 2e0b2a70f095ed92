//! Helpers shared by the crate's unit tests.

use std::{collections::HashMap, sync::Arc, time::Duration};

use {
    enxame_common::SessionStatus,
    enxame_transport::{
        TransportClient, TransportFactory,
        mock::{MockHandle, MockTransport},
    },
    tokio::sync::broadcast,
};

use crate::worker::SessionEvent;

/// Factory that keeps each created mock around so tests can script
/// events and inspect calls per session.
pub(crate) struct TestFactory {
    created: std::sync::Mutex<HashMap<String, (Arc<MockTransport>, MockHandle)>>,
}

impl TestFactory {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            created: std::sync::Mutex::new(HashMap::new()),
        })
    }

    pub(crate) fn transport(&self, id: &str) -> Arc<MockTransport> {
        Arc::clone(&self.created.lock().unwrap()[id].0)
    }

    pub(crate) fn events(&self, id: &str) -> MockHandle {
        self.created.lock().unwrap()[id].1.clone()
    }
}

impl TransportFactory for TestFactory {
    fn create(&self, session_id: &str) -> Arc<dyn TransportClient> {
        let (transport, handle) = MockTransport::new();
        let transport = Arc::new(transport);
        self.created
            .lock()
            .unwrap()
            .insert(session_id.to_string(), (Arc::clone(&transport), handle));
        transport
    }
}

/// Block (with a generous timeout) until the session reports `want`.
pub(crate) async fn wait_for_status(
    rx: &mut broadcast::Receiver<SessionEvent>,
    want: SessionStatus,
) {
    tokio::time::timeout(Duration::from_secs(60), async {
        loop {
            match rx.recv().await {
                Ok(SessionEvent::StatusChanged { status }) if status == want => return,
                Ok(_) => {},
                Err(e) => panic!("event stream ended waiting for {want}: {e}"),
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for status {want}"))
}
