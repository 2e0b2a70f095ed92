//! Rate-limited fan-out of one message to many counterparts.
//!
//! Targets are attempted strictly in list order through the owning
//! session's worker. One target failing never aborts the batch; the
//! caller gets one outcome per target plus aggregate counts. Retries
//! are deliberately not built in — a retry is a new `broadcast` call.

use std::{sync::Arc, time::Duration};

use {
    enxame_common::SessionError,
    enxame_config::BroadcastConfig,
    tokio::time::Instant,
    tracing::{debug, warn},
};

use crate::registry::SessionRegistry;

/// What happened to one broadcast target.
#[derive(Debug, Clone)]
pub enum TargetOutcome {
    Sent { message_id: String },
    Failed { error: String },
    /// The overall deadline passed before this target was attempted.
    Skipped,
}

#[derive(Debug, Clone)]
pub struct TargetResult {
    pub target: String,
    pub outcome: TargetOutcome,
}

/// Aggregate result of one broadcast. `targets` preserves input order.
#[derive(Debug, Clone)]
pub struct BroadcastResult {
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
    pub targets: Vec<TargetResult>,
}

impl BroadcastResult {
    /// Targets attempted (sent or failed, not skipped).
    pub fn attempted(&self) -> usize {
        self.sent + self.failed
    }
}

#[derive(Debug, Clone)]
pub struct BroadcastOptions {
    /// Pause between consecutive targets.
    pub per_target_delay: Duration,
    /// Overall budget; targets not yet attempted when it runs out are
    /// marked `Skipped`.
    pub deadline: Option<Duration>,
}

impl Default for BroadcastOptions {
    fn default() -> Self {
        Self {
            per_target_delay: Duration::from_millis(BroadcastConfig::default().per_target_delay_ms),
            deadline: None,
        }
    }
}

impl BroadcastOptions {
    pub fn from_config(cfg: &BroadcastConfig) -> Self {
        Self {
            per_target_delay: Duration::from_millis(cfg.per_target_delay_ms),
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Fans one message out through a session's worker with pacing and
/// per-target failure isolation.
pub struct BroadcastCoordinator {
    registry: Arc<SessionRegistry>,
    defaults: BroadcastOptions,
}

impl BroadcastCoordinator {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self {
            registry,
            defaults: BroadcastOptions::default(),
        }
    }

    pub fn with_defaults(mut self, defaults: BroadcastOptions) -> Self {
        self.defaults = defaults;
        self
    }

    /// Broadcast with the coordinator's default pacing.
    pub async fn broadcast(
        &self,
        session_id: &str,
        body: &str,
        targets: &[String],
    ) -> Result<BroadcastResult, SessionError> {
        self.broadcast_with(session_id, body, targets, self.defaults.clone())
            .await
    }

    /// Broadcast with explicit pacing/deadline. Fails only when the
    /// session is unknown; everything per-target is reported as data.
    pub async fn broadcast_with(
        &self,
        session_id: &str,
        body: &str,
        targets: &[String],
        opts: BroadcastOptions,
    ) -> Result<BroadcastResult, SessionError> {
        let handle = self.registry.handle(session_id)?;
        let deadline = opts.deadline.map(|d| Instant::now() + d);

        let mut result = BroadcastResult {
            sent: 0,
            failed: 0,
            skipped: 0,
            targets: Vec::with_capacity(targets.len()),
        };

        for (index, target) in targets.iter().enumerate() {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                result.skipped += 1;
                result.targets.push(TargetResult {
                    target: target.clone(),
                    outcome: TargetOutcome::Skipped,
                });
                continue;
            }

            match handle.send_message(target, body).await {
                Ok(message_id) => {
                    result.sent += 1;
                    result.targets.push(TargetResult {
                        target: target.clone(),
                        outcome: TargetOutcome::Sent { message_id },
                    });
                },
                Err(e) => {
                    warn!(
                        session_id,
                        target = %target,
                        error = %e,
                        "broadcast target failed"
                    );
                    result.failed += 1;
                    result.targets.push(TargetResult {
                        target: target.clone(),
                        outcome: TargetOutcome::Failed {
                            error: e.to_string(),
                        },
                    });
                },
            }

            if index + 1 < targets.len() {
                tokio::time::sleep(opts.per_target_delay).await;
            }
        }

        debug!(
            session_id,
            sent = result.sent,
            failed = result.failed,
            skipped = result.skipped,
            "broadcast finished"
        );
        Ok(result)
    }
}
