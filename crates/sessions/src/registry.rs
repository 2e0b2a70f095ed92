//! Concurrent directory of live session workers.
//!
//! The map itself is the only structure mutated from multiple call
//! sites; everything per-session lives behind the owning worker.
//! Registry operations therefore never block on transport I/O.

use std::{sync::Arc, time::Duration};

use {
    dashmap::{DashMap, mapref::entry::Entry},
    enxame_auto_reply::AutoResponder,
    enxame_common::{MessageRecord, SessionError, SessionStatus, SessionSummary, now_ms},
    enxame_config::EnxameConfig,
    enxame_transport::TransportFactory,
    tokio::sync::broadcast,
    tracing::{info, warn},
};

use crate::{
    reconnect::ReconnectPolicy,
    snapshot::{BackupSink, SessionSnapshot},
    worker::{self, SessionEvent, SessionHandle, WorkerConfig},
};

pub struct SessionRegistry {
    sessions: DashMap<String, Arc<SessionHandle>>,
    transports: Arc<dyn TransportFactory>,
    worker_cfg: WorkerConfig,
    policy: ReconnectPolicy,
    responder: Option<Arc<AutoResponder>>,
    final_sink: Option<Arc<dyn BackupSink>>,
    remove_grace: Duration,
}

impl SessionRegistry {
    /// Build a registry from config. Auto-reply and reconnect policy
    /// come from the config sections; use the `with_*` builders to
    /// override wiring (tests inject deterministic pieces).
    pub fn new(transports: Arc<dyn TransportFactory>, cfg: &EnxameConfig) -> Self {
        let responder = cfg
            .auto_reply
            .enabled
            .then(|| Arc::new(AutoResponder::from_config(&cfg.auto_reply)));
        Self {
            sessions: DashMap::new(),
            transports,
            worker_cfg: WorkerConfig::from_config(&cfg.sessions),
            policy: ReconnectPolicy::from_config(&cfg.reconnect),
            responder,
            final_sink: None,
            remove_grace: Duration::from_millis(cfg.sessions.remove_grace_ms),
        }
    }

    pub fn with_responder(mut self, responder: Arc<AutoResponder>) -> Self {
        self.responder = Some(responder);
        self
    }

    /// Sink that receives each session's final snapshot on teardown.
    pub fn with_final_sink(mut self, sink: Arc<dyn BackupSink>) -> Self {
        self.final_sink = Some(sink);
        self
    }

    pub fn with_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Create a session and start connecting in the background. Returns
    /// immediately; readiness is observable via `get` or `subscribe`.
    pub fn create(&self, id: &str, display_name: &str) -> Result<SessionSummary, SessionError> {
        match self.sessions.entry(id.to_string()) {
            Entry::Occupied(_) => Err(SessionError::DuplicateId(id.to_string())),
            Entry::Vacant(slot) => {
                let transport = self.transports.create(id);
                let handle = worker::spawn(
                    id,
                    display_name,
                    transport,
                    self.worker_cfg.clone(),
                    self.policy.clone(),
                    self.responder.clone(),
                    self.final_sink.clone(),
                );
                slot.insert(handle);
                info!(session_id = %id, display_name, "session created");
                Ok(SessionSummary {
                    id: id.to_string(),
                    display_name: display_name.to_string(),
                    status: SessionStatus::Created,
                    contacts_count: 0,
                    message_count: 0,
                    last_activity: now_ms(),
                })
            },
        }
    }

    /// Remove a session: graceful shutdown (final backup, transport
    /// disconnect) within the grace period, forced after it.
    pub async fn remove(&self, id: &str) -> Result<(), SessionError> {
        let (_, handle) = self
            .sessions
            .remove(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        if handle.shutdown(self.remove_grace).await {
            info!(session_id = %id, "session removed");
        } else {
            handle.force_terminate().await;
            warn!(session_id = %id, "worker did not stop within grace period, removal forced");
        }
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<SessionSummary, SessionError> {
        Ok(self.handle(id)?.summary().await)
    }

    pub async fn list(&self) -> Vec<SessionSummary> {
        // Collect handles first so no map shard stays locked across an
        // await.
        let handles: Vec<Arc<SessionHandle>> = self
            .sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        let mut summaries = Vec::with_capacity(handles.len());
        for handle in handles {
            summaries.push(handle.summary().await);
        }
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        summaries
    }

    /// The most recent `limit` messages, oldest first.
    pub async fn messages(&self, id: &str, limit: usize) -> Result<Vec<MessageRecord>, SessionError> {
        Ok(self.handle(id)?.messages(limit).await)
    }

    /// Pending pairing payload, if the session is awaiting a scan.
    pub async fn qr(&self, id: &str) -> Result<Option<String>, SessionError> {
        Ok(self.handle(id)?.qr().await)
    }

    /// Subscribe to one session's state-transition and message events.
    pub fn subscribe(&self, id: &str) -> Result<broadcast::Receiver<SessionEvent>, SessionError> {
        Ok(self.handle(id)?.subscribe())
    }

    pub async fn send_message(
        &self,
        id: &str,
        to: &str,
        body: &str,
    ) -> Result<String, SessionError> {
        self.handle(id)?.send_message(to, body).await
    }

    /// Owned snapshot for backups; never a live reference into worker
    /// state.
    pub async fn snapshot(&self, id: &str) -> Result<SessionSnapshot, SessionError> {
        Ok(self.handle(id)?.snapshot().await)
    }

    /// Shut every session down (process teardown).
    pub async fn shutdown_all(&self) {
        let ids: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            if let Err(e) = self.remove(&id).await {
                warn!(session_id = %id, error = %e, "shutdown_all: removal failed");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub(crate) fn handle(&self, id: &str) -> Result<Arc<SessionHandle>, SessionError> {
        self.sessions
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }
}
