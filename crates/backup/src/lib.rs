//! Periodic session snapshots with retention.
//!
//! The scheduler walks the registry on a fixed interval and hands each
//! session's snapshot to a [`enxame_sessions::BackupSink`]; a separate,
//! slower cycle prunes artifacts past the retention window. One
//! session's backup failure never touches its siblings.

pub mod scheduler;
pub mod sink;

pub use {scheduler::BackupScheduler, sink::FileSink};
