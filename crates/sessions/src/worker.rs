//! One worker task per session.
//!
//! The worker is the sole writer of its session's state: transport
//! events, caller commands, and internal signals are serialized through
//! one `select!` loop, which gives in-order event processing without
//! locks around the hot path. Transport sends run on a bounded queue
//! drained by a dedicated sender task, so a slow send never stops the
//! loop from seeing a `disconnected` event.

use std::{sync::Arc, time::Duration};

use {
    enxame_auto_reply::AutoResponder,
    enxame_common::{
        ChatSummary, Contact, DeliveryStatus, MessageRecord, SessionError, SessionStatus,
        SessionSummary, TransportError,
    },
    enxame_config::SessionsConfig,
    enxame_transport::{TransportClient, TransportEvent},
    tokio::{
        sync::{Mutex, RwLock, broadcast, mpsc, oneshot},
        task::JoinHandle,
        time::Instant,
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use crate::{
    reconnect::ReconnectPolicy,
    snapshot::{BackupSink, SessionSnapshot},
    state::SessionState,
};

/// Per-session broadcast buffer; lagging dashboard subscribers drop
/// events rather than slow the worker.
const EVENT_BUFFER: usize = 256;
const COMMAND_BUFFER: usize = 32;
const CHAT_FETCH_LIMIT: usize = 50;

// ── Public types ─────────────────────────────────────────────────────────────

/// Runtime knobs for one worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub message_log_cap: usize,
    /// Pause before an auto-reply goes out, so the reply never races the
    /// processing of the message that triggered it.
    pub reply_delay: Duration,
    pub outbound_queue: usize,
}

impl WorkerConfig {
    pub fn from_config(cfg: &SessionsConfig) -> Self {
        Self {
            message_log_cap: cfg.message_log_cap,
            reply_delay: Duration::from_millis(cfg.reply_delay_ms),
            outbound_queue: cfg.outbound_queue.max(1),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::from_config(&SessionsConfig::default())
    }
}

/// Pushed to per-session subscribers (live dashboards).
#[derive(Debug, Clone)]
pub enum SessionEvent {
    StatusChanged { status: SessionStatus },
    QrUpdated { payload: String },
    MessageReceived(MessageRecord),
    MessageSent(MessageRecord),
}

// ── Plumbing ─────────────────────────────────────────────────────────────────

pub(crate) enum SessionCommand {
    Send {
        to: String,
        body: String,
        /// `None` for fire-and-forget sends (auto-replies).
        reply: Option<oneshot::Sender<Result<String, SessionError>>>,
    },
}

struct OutboundJob {
    to: String,
    body: String,
    reply: Option<oneshot::Sender<Result<String, SessionError>>>,
}

enum WorkerSignal {
    SendResult {
        to: String,
        body: String,
        result: Result<String, TransportError>,
    },
    ContactsLoaded(Vec<Contact>),
    ChatsLoaded(Vec<ChatSummary>),
}

enum Tick {
    Cancelled,
    Cmd(SessionCommand),
    Signal(WorkerSignal),
    Event(Option<TransportEvent>),
    ReconnectDue,
}

// ── Handle ───────────────────────────────────────────────────────────────────

/// Shared handle to a live session worker. All accessors return owned
/// snapshots; nothing here can mutate worker-internal state.
pub struct SessionHandle {
    id: String,
    display_name: String,
    state: Arc<RwLock<SessionState>>,
    cmd_tx: mpsc::Sender<SessionCommand>,
    events: broadcast::Sender<SessionEvent>,
    cancel: CancellationToken,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl SessionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Send a text message through this session. Valid only while
    /// `Ready`; fails fast with `NotReady` otherwise.
    pub async fn send_message(&self, to: &str, body: &str) -> Result<String, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(SessionCommand::Send {
                to: to.to_string(),
                body: body.to_string(),
                reply: Some(tx),
            })
            .await
            .map_err(|_| SessionError::Terminated(self.id.clone()))?;
        rx.await
            .map_err(|_| SessionError::Terminated(self.id.clone()))?
    }

    /// Subscribe to this session's state-transition and message events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn status(&self) -> SessionStatus {
        self.state.read().await.status()
    }

    pub async fn summary(&self) -> SessionSummary {
        self.state.read().await.summary()
    }

    pub async fn messages(&self, limit: usize) -> Vec<MessageRecord> {
        self.state.read().await.messages(limit)
    }

    /// Pending pairing payload, present only while awaiting a scan.
    pub async fn qr(&self) -> Option<String> {
        self.state.read().await.pending_qr().map(str::to_string)
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.state.read().await.snapshot()
    }

    /// Mark the session terminated without the worker's cooperation.
    /// Used after an aborted shutdown, where `finalize` never ran.
    pub(crate) async fn force_terminate(&self) {
        self.state.write().await.set_status(SessionStatus::Terminated);
        let _ = self.events.send(SessionEvent::StatusChanged {
            status: SessionStatus::Terminated,
        });
    }

    /// Stop the worker. Returns false when the grace period elapsed and
    /// the task had to be aborted.
    pub(crate) async fn shutdown(&self, grace: Duration) -> bool {
        self.cancel.cancel();
        let Some(mut join) = self.join.lock().await.take() else {
            return true;
        };
        match tokio::time::timeout(grace, &mut join).await {
            Ok(_) => true,
            Err(_) => {
                join.abort();
                false
            },
        }
    }
}

// ── Worker ───────────────────────────────────────────────────────────────────

pub(crate) struct SessionWorker {
    id: String,
    state: Arc<RwLock<SessionState>>,
    transport: Arc<dyn TransportClient>,
    cfg: WorkerConfig,
    policy: ReconnectPolicy,
    responder: Option<Arc<AutoResponder>>,
    final_sink: Option<Arc<dyn BackupSink>>,
    cmd_tx: mpsc::Sender<SessionCommand>,
    cmd_rx: mpsc::Receiver<SessionCommand>,
    signal_tx: mpsc::UnboundedSender<WorkerSignal>,
    signal_rx: mpsc::UnboundedReceiver<WorkerSignal>,
    outbound_tx: mpsc::Sender<OutboundJob>,
    outbound_rx: Option<mpsc::Receiver<OutboundJob>>,
    events: broadcast::Sender<SessionEvent>,
    cancel: CancellationToken,
    reconnect_at: Option<Instant>,
    events_closed: bool,
}

/// Build the worker, spawn its task, and return the shared handle.
pub(crate) fn spawn(
    id: &str,
    display_name: &str,
    transport: Arc<dyn TransportClient>,
    cfg: WorkerConfig,
    policy: ReconnectPolicy,
    responder: Option<Arc<AutoResponder>>,
    final_sink: Option<Arc<dyn BackupSink>>,
) -> Arc<SessionHandle> {
    let state = Arc::new(RwLock::new(SessionState::new(
        id,
        display_name,
        cfg.message_log_cap,
    )));
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let (signal_tx, signal_rx) = mpsc::unbounded_channel();
    let (outbound_tx, outbound_rx) = mpsc::channel(cfg.outbound_queue);
    let (events, _) = broadcast::channel(EVENT_BUFFER);
    let cancel = CancellationToken::new();

    let worker = SessionWorker {
        id: id.to_string(),
        state: Arc::clone(&state),
        transport,
        cfg,
        policy,
        responder,
        final_sink,
        cmd_tx: cmd_tx.clone(),
        cmd_rx,
        signal_tx,
        signal_rx,
        outbound_tx,
        outbound_rx: Some(outbound_rx),
        events: events.clone(),
        cancel: cancel.clone(),
        reconnect_at: None,
        events_closed: false,
    };
    let join = tokio::spawn(worker.run());

    Arc::new(SessionHandle {
        id: id.to_string(),
        display_name: display_name.to_string(),
        state,
        cmd_tx,
        events,
        cancel,
        join: Mutex::new(Some(join)),
    })
}

impl SessionWorker {
    async fn run(mut self) {
        info!(session_id = %self.id, "session worker starting");

        // Sender task: drains the outbound queue so transport sends
        // never block event consumption.
        if let Some(outbound_rx) = self.outbound_rx.take() {
            tokio::spawn(send_loop(
                Arc::clone(&self.transport),
                outbound_rx,
                self.signal_tx.clone(),
                self.cancel.clone(),
            ));
        }

        self.transition(SessionStatus::Initializing).await;
        self.connect().await;

        loop {
            if self.status().await.is_terminal() {
                break;
            }
            let tick = tokio::select! {
                _ = self.cancel.cancelled() => Tick::Cancelled,
                Some(cmd) = self.cmd_rx.recv() => Tick::Cmd(cmd),
                Some(sig) = self.signal_rx.recv() => Tick::Signal(sig),
                event = self.transport.next_event(), if !self.events_closed => Tick::Event(event),
                _ = sleep_until_opt(self.reconnect_at), if self.reconnect_at.is_some() => Tick::ReconnectDue,
            };
            match tick {
                Tick::Cancelled => break,
                Tick::Cmd(cmd) => self.handle_command(cmd).await,
                Tick::Signal(sig) => self.handle_signal(sig).await,
                Tick::Event(Some(event)) => self.handle_event(event).await,
                Tick::Event(None) => {
                    self.events_closed = true;
                    warn!(session_id = %self.id, "transport event stream closed");
                    self.enter_disconnected().await;
                },
                Tick::ReconnectDue => {
                    self.reconnect_at = None;
                    self.attempt_reconnect().await;
                },
            }
        }

        self.finalize().await;
    }

    async fn status(&self) -> SessionStatus {
        self.state.read().await.status()
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is the common case.
        let _ = self.events.send(event);
    }

    /// Move to `next` if not already there; logs and notifies on change.
    async fn transition(&mut self, next: SessionStatus) {
        let prev = {
            let mut st = self.state.write().await;
            let prev = st.status();
            if prev != next {
                st.set_status(next);
            }
            prev
        };
        if prev != next {
            info!(session_id = %self.id, from = %prev, to = %next, "session status changed");
            self.publish(SessionEvent::StatusChanged { status: next });
        }
    }

    async fn connect(&mut self) {
        if let Err(e) = self.transport.connect().await {
            warn!(session_id = %self.id, error = %e, "transport connect failed");
            self.enter_disconnected().await;
        }
    }

    /// Common path for every way a connection drops: schedule a backoff
    /// retry while budget remains, otherwise terminate.
    async fn enter_disconnected(&mut self) {
        if self.status().await.is_terminal() {
            return;
        }
        self.transition(SessionStatus::Disconnected).await;
        let attempts = self.state.read().await.restart_count();
        if self.policy.allows(attempts) {
            let delay = self.policy.delay(attempts);
            debug!(
                session_id = %self.id,
                attempt = attempts + 1,
                delay_ms = delay.as_millis() as u64,
                "reconnect scheduled"
            );
            self.reconnect_at = Some(Instant::now() + delay);
        } else {
            warn!(session_id = %self.id, attempts, "reconnect budget exhausted, terminating");
            self.transition(SessionStatus::Terminated).await;
        }
    }

    async fn attempt_reconnect(&mut self) {
        if self.status().await != SessionStatus::Disconnected {
            return;
        }
        self.transition(SessionStatus::Reconnecting).await;
        self.state.write().await.note_restart();
        self.transition(SessionStatus::Initializing).await;
        self.connect().await;
    }

    async fn handle_event(&mut self, event: TransportEvent) {
        let status = self.status().await;
        if status.is_terminal() {
            return;
        }
        match event {
            TransportEvent::Qr(payload) => match status {
                SessionStatus::Initializing | SessionStatus::AwaitingScan => {
                    self.transition(SessionStatus::AwaitingScan).await;
                    self.state.write().await.set_qr(payload.clone());
                    self.publish(SessionEvent::QrUpdated { payload });
                },
                _ => debug!(session_id = %self.id, status = %status, "dropping qr event"),
            },
            TransportEvent::Authenticated => {
                if status == SessionStatus::AwaitingScan {
                    self.transition(SessionStatus::Authenticated).await;
                } else {
                    debug!(session_id = %self.id, status = %status, "dropping authenticated event");
                }
            },
            TransportEvent::Ready => {
                if status == SessionStatus::Authenticated {
                    self.state.write().await.reset_restarts();
                    self.transition(SessionStatus::Ready).await;
                    self.spawn_refresh();
                } else {
                    debug!(session_id = %self.id, status = %status, "dropping ready event");
                }
            },
            TransportEvent::Disconnected { reason } => {
                info!(session_id = %self.id, reason = %reason, "transport disconnected");
                self.enter_disconnected().await;
            },
            TransportEvent::AuthFailure { reason } => {
                error!(session_id = %self.id, reason = %reason, "authentication failed");
                let failures = self.state.write().await.note_auth_failure();
                if self.policy.allows_auth(failures) {
                    self.enter_disconnected().await;
                } else {
                    warn!(
                        session_id = %self.id,
                        failures,
                        "auth failure budget exhausted, terminating"
                    );
                    self.transition(SessionStatus::Terminated).await;
                }
            },
            TransportEvent::Message(msg) => {
                if status != SessionStatus::Ready {
                    debug!(session_id = %self.id, status = %status, "dropping inbound message");
                    return;
                }
                let record =
                    MessageRecord::inbound(msg.id.clone(), &msg.from, &msg.body, msg.kind);
                self.state.write().await.record_message(record.clone());
                self.publish(SessionEvent::MessageReceived(record));
                self.maybe_auto_reply(&msg.from, &msg.body);
            },
        }
    }

    /// Evaluate the responder and, on a hit, enqueue the reply after the
    /// configured delay. Going back through the command channel keeps
    /// the reply causally behind its trigger and re-checks readiness at
    /// send time.
    fn maybe_auto_reply(&self, from: &str, body: &str) {
        let Some(responder) = &self.responder else {
            return;
        };
        let Some(reply) = responder.evaluate(body) else {
            return;
        };
        debug!(session_id = %self.id, to = %from, "auto-reply queued");
        let cmd_tx = self.cmd_tx.clone();
        let delay = self.cfg.reply_delay;
        let to = from.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = cmd_tx
                .send(SessionCommand::Send {
                    to,
                    body: reply,
                    reply: None,
                })
                .await;
        });
    }

    async fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Send { to, body, reply } => {
                let status = self.status().await;
                if status != SessionStatus::Ready {
                    match reply {
                        Some(tx) => {
                            let _ = tx.send(Err(SessionError::NotReady {
                                id: self.id.clone(),
                                status,
                            }));
                        },
                        None => {
                            debug!(
                                session_id = %self.id,
                                status = %status,
                                "dropping auto-reply, session no longer ready"
                            );
                        },
                    }
                    return;
                }
                match self.outbound_tx.try_send(OutboundJob { to, body, reply }) {
                    Ok(()) => {},
                    Err(mpsc::error::TrySendError::Full(job)) => {
                        warn!(session_id = %self.id, "outbound queue full, rejecting send");
                        if let Some(tx) = job.reply {
                            let _ = tx.send(Err(TransportError::QueueFull.into()));
                        }
                    },
                    Err(mpsc::error::TrySendError::Closed(job)) => {
                        if let Some(tx) = job.reply {
                            let _ = tx.send(Err(SessionError::Terminated(self.id.clone())));
                        }
                    },
                }
            },
        }
    }

    async fn handle_signal(&mut self, signal: WorkerSignal) {
        match signal {
            WorkerSignal::SendResult { to, body, result } => {
                let record = match result {
                    Ok(id) => {
                        MessageRecord::outbound(Some(id), &to, &body, DeliveryStatus::Sent)
                    },
                    Err(e) => {
                        warn!(session_id = %self.id, target = %to, error = %e, "send failed");
                        MessageRecord::outbound(None, &to, &body, DeliveryStatus::Failed)
                    },
                };
                self.state.write().await.record_message(record.clone());
                self.publish(SessionEvent::MessageSent(record));
            },
            WorkerSignal::ContactsLoaded(contacts) => {
                debug!(session_id = %self.id, count = contacts.len(), "contacts reloaded");
                self.state.write().await.replace_contacts(contacts);
            },
            WorkerSignal::ChatsLoaded(chats) => {
                debug!(session_id = %self.id, count = chats.len(), "recent chats reloaded");
                self.state.write().await.set_recent_chats(chats);
            },
        }
    }

    /// Best-effort contacts/chats reload on entering `Ready`. Failure is
    /// logged and does not affect readiness.
    fn spawn_refresh(&self) {
        let transport = Arc::clone(&self.transport);
        let signals = self.signal_tx.clone();
        let id = self.id.clone();
        tokio::spawn(async move {
            match transport.fetch_contacts().await {
                Ok(contacts) => {
                    let _ = signals.send(WorkerSignal::ContactsLoaded(contacts));
                },
                Err(e) => warn!(session_id = %id, error = %e, "contact reload failed"),
            }
            match transport.fetch_recent_chats(CHAT_FETCH_LIMIT).await {
                Ok(chats) => {
                    let _ = signals.send(WorkerSignal::ChatsLoaded(chats));
                },
                Err(e) => warn!(session_id = %id, error = %e, "chat reload failed"),
            }
        });
    }

    /// Final backup, transport teardown, terminal status.
    async fn finalize(&mut self) {
        if let Some(sink) = &self.final_sink {
            let snap = self.state.read().await.snapshot();
            if let Err(e) = sink.store(&snap).await {
                warn!(session_id = %self.id, error = %e, "final backup failed");
            }
        }
        if let Err(e) = self.transport.disconnect().await {
            debug!(session_id = %self.id, error = %e, "disconnect during teardown failed");
        }
        self.transition(SessionStatus::Terminated).await;
        info!(session_id = %self.id, "session worker stopped");
    }
}

async fn sleep_until_opt(at: Option<Instant>) {
    match at {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Drains the outbound queue. In-flight sends finish even after
/// cancellation; queued ones are dropped with the channel.
async fn send_loop(
    transport: Arc<dyn TransportClient>,
    mut jobs: mpsc::Receiver<OutboundJob>,
    signals: mpsc::UnboundedSender<WorkerSignal>,
    cancel: CancellationToken,
) {
    loop {
        let job = tokio::select! {
            _ = cancel.cancelled() => break,
            job = jobs.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };
        let result = transport.send_text(&job.to, &job.body).await;
        if let Some(tx) = job.reply {
            let _ = tx.send(result.clone().map_err(SessionError::from));
        }
        let _ = signals.send(WorkerSignal::SendResult {
            to: job.to,
            body: job.body,
            result,
        });
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
