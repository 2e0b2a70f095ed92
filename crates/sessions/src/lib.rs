//! Multi-tenant session orchestration.
//!
//! Each session pairs one [`state::SessionState`] with one injected
//! transport client, owned by a single worker task that serializes every
//! event and command for that session. The [`registry::SessionRegistry`]
//! is the concurrent directory of live workers; cross-session operations
//! (broadcast fan-out, periodic backups) go through its snapshot
//! accessors and never touch worker-internal state directly.

pub mod broadcast;
pub mod reconnect;
pub mod registry;
pub mod snapshot;
pub mod state;
#[cfg(test)]
pub(crate) mod testutil;
pub mod worker;

pub use {
    broadcast::{BroadcastCoordinator, BroadcastOptions, BroadcastResult, TargetOutcome},
    reconnect::ReconnectPolicy,
    registry::SessionRegistry,
    snapshot::{BackupError, BackupSink, SessionSnapshot},
    worker::{SessionEvent, SessionHandle, WorkerConfig},
};
