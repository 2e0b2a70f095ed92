use std::collections::{HashMap, VecDeque};

use enxame_common::{
    ChatSummary, Contact, MessageRecord, SessionStatus, SessionSummary, now_ms,
};

use crate::snapshot::SessionSnapshot;

/// Per-session data, owned and mutated exclusively by the session's
/// worker. Everyone else reads owned snapshots through the registry.
///
/// Invariant: `pending_qr` is set iff `status == AwaitingScan`.
/// `set_status` clears the payload on any transition away from
/// `AwaitingScan`, and `set_qr` refuses to store one in any other
/// status, so the two can't drift apart.
#[derive(Debug)]
pub struct SessionState {
    id: String,
    display_name: String,
    status: SessionStatus,
    pending_qr: Option<String>,
    contacts: HashMap<String, Contact>,
    recent_chats: Vec<ChatSummary>,
    message_log: VecDeque<MessageRecord>,
    message_log_cap: usize,
    last_activity: u64,
    restart_count: u32,
    last_restart_at: Option<u64>,
    auth_failures: u32,
}

impl SessionState {
    pub fn new(id: &str, display_name: &str, message_log_cap: usize) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            status: SessionStatus::Created,
            pending_qr: None,
            contacts: HashMap::new(),
            recent_chats: Vec::new(),
            message_log: VecDeque::new(),
            message_log_cap: message_log_cap.max(1),
            last_activity: now_ms(),
            restart_count: 0,
            last_restart_at: None,
            auth_failures: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Transition to `next`, stamping activity. Leaving `AwaitingScan`
    /// drops the pending QR payload.
    pub fn set_status(&mut self, next: SessionStatus) {
        if next != SessionStatus::AwaitingScan {
            self.pending_qr = None;
        }
        self.status = next;
        self.touch();
    }

    /// Store a pairing payload. Ignored unless the session is awaiting a
    /// scan; transports rotate codes, so repeats replace the previous one.
    pub fn set_qr(&mut self, payload: String) {
        if self.status == SessionStatus::AwaitingScan {
            self.pending_qr = Some(payload);
        }
    }

    pub fn pending_qr(&self) -> Option<&str> {
        self.pending_qr.as_deref()
    }

    /// Append to the message log, evicting the oldest record when the
    /// cap is reached.
    pub fn record_message(&mut self, record: MessageRecord) {
        while self.message_log.len() >= self.message_log_cap {
            self.message_log.pop_front();
        }
        self.message_log.push_back(record);
        self.touch();
    }

    /// Replace the contact cache wholesale. Partial merges would race
    /// with a reload in flight.
    pub fn replace_contacts(&mut self, contacts: Vec<Contact>) {
        self.contacts = contacts.into_iter().map(|c| (c.id.clone(), c)).collect();
    }

    pub fn set_recent_chats(&mut self, chats: Vec<ChatSummary>) {
        self.recent_chats = chats;
    }

    /// Bump reconnect bookkeeping when a backoff timer fires.
    pub fn note_restart(&mut self) {
        self.restart_count += 1;
        self.last_restart_at = Some(now_ms());
    }

    pub fn restart_count(&self) -> u32 {
        self.restart_count
    }

    /// Reconnect attempts start over once a connection fully recovers.
    pub fn reset_restarts(&mut self) {
        self.restart_count = 0;
    }

    pub fn note_auth_failure(&mut self) -> u32 {
        self.auth_failures += 1;
        self.auth_failures
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            status: self.status,
            contacts_count: self.contacts.len(),
            message_count: self.message_log.len(),
            last_activity: self.last_activity,
        }
    }

    /// The most recent `limit` records, oldest first.
    pub fn messages(&self, limit: usize) -> Vec<MessageRecord> {
        let skip = self.message_log.len().saturating_sub(limit);
        self.message_log.iter().skip(skip).cloned().collect()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::new(self.summary(), self.message_log.iter().cloned().collect())
    }

    fn touch(&mut self) {
        self.last_activity = now_ms();
    }
}

#[cfg(test)]
mod tests {
    use enxame_common::{DeliveryStatus, MessageKind};
    use rand::{Rng, SeedableRng, rngs::StdRng};

    use super::*;

    fn inbound(n: usize) -> MessageRecord {
        MessageRecord::inbound(Some(format!("m{n}")), "peer", &format!("body {n}"), MessageKind::Text)
    }

    #[test]
    fn log_never_exceeds_cap_and_evicts_fifo() {
        let mut state = SessionState::new("s1", "Test", 5);
        for n in 0..12 {
            state.record_message(inbound(n));
            assert!(state.summary().message_count <= 5);
        }
        let ids: Vec<String> = state.messages(100).into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["m7", "m8", "m9", "m10", "m11"]);
    }

    #[test]
    fn messages_returns_most_recent_in_order() {
        let mut state = SessionState::new("s1", "Test", 10);
        for n in 0..4 {
            state.record_message(inbound(n));
        }
        let last_two: Vec<String> = state.messages(2).into_iter().map(|m| m.id).collect();
        assert_eq!(last_two, vec!["m2", "m3"]);
    }

    #[test]
    fn qr_only_sticks_while_awaiting_scan() {
        let mut state = SessionState::new("s1", "Test", 10);
        state.set_qr("EARLY".into());
        assert!(state.pending_qr().is_none());

        state.set_status(SessionStatus::AwaitingScan);
        state.set_qr("CODE".into());
        assert_eq!(state.pending_qr(), Some("CODE"));

        state.set_qr("ROTATED".into());
        assert_eq!(state.pending_qr(), Some("ROTATED"));

        state.set_status(SessionStatus::Authenticated);
        assert!(state.pending_qr().is_none());
    }

    /// The QR/status invariant holds under arbitrary interleavings of
    /// transitions, QR payloads, and messages.
    #[test]
    fn qr_invariant_holds_under_random_event_sequences() {
        let statuses = [
            SessionStatus::Created,
            SessionStatus::Initializing,
            SessionStatus::AwaitingScan,
            SessionStatus::Authenticated,
            SessionStatus::Ready,
            SessionStatus::Disconnected,
            SessionStatus::Reconnecting,
            SessionStatus::Terminated,
        ];
        let mut rng = StdRng::seed_from_u64(0x5e55);
        for _ in 0..200 {
            let mut state = SessionState::new("s1", "Test", 8);
            for step in 0..50 {
                match rng.random_range(0..3u8) {
                    0 => state.set_status(statuses[rng.random_range(0..statuses.len())]),
                    1 => state.set_qr(format!("qr-{step}")),
                    _ => state.record_message(inbound(step)),
                }
                if state.status() != SessionStatus::AwaitingScan {
                    assert!(state.pending_qr().is_none(), "qr outside awaiting-scan");
                }
            }
        }
    }

    #[test]
    fn snapshot_is_owned_copy() {
        let mut state = SessionState::new("s1", "Test", 10);
        state.record_message(inbound(0));
        let snap = state.snapshot();
        state.record_message(inbound(1));

        assert_eq!(snap.messages.len(), 1);
        assert_eq!(state.summary().message_count, 2);
        assert_eq!(snap.summary.id, "s1");
    }

    #[test]
    fn outbound_failures_are_logged_too() {
        let mut state = SessionState::new("s1", "Test", 10);
        state.record_message(MessageRecord::outbound(
            None,
            "peer",
            "hello",
            DeliveryStatus::Failed,
        ));
        let log = state.messages(10);
        assert_eq!(log[0].delivery_status, DeliveryStatus::Failed);
    }
}
