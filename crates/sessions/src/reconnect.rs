use std::time::Duration;

use {enxame_config::ReconnectConfig, rand::Rng};

/// Backoff policy for re-opening a dropped transport connection.
///
/// Delays double per attempt from `initial` up to `cap`, with additive
/// jitter of up to half the base so a fleet of sessions dropped by the
/// same outage doesn't reconnect in lockstep. Transient disconnects are
/// unlimited by default; auth failures get a small separate budget.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub initial: Duration,
    pub cap: Duration,
    pub max_attempts: Option<u32>,
    pub max_auth_failures: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_config(&ReconnectConfig::default())
    }
}

impl ReconnectPolicy {
    pub fn from_config(cfg: &ReconnectConfig) -> Self {
        Self {
            initial: Duration::from_millis(cfg.initial_delay_ms.max(1)),
            cap: Duration::from_millis(cfg.max_delay_ms.max(cfg.initial_delay_ms.max(1))),
            max_attempts: cfg.max_attempts,
            max_auth_failures: cfg.max_auth_failures,
        }
    }

    /// Whether another reconnect may be attempted after `attempts`
    /// completed ones.
    pub fn allows(&self, attempts: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempts < max)
    }

    /// Whether another pairing attempt may follow `failures` auth
    /// rejections.
    pub fn allows_auth(&self, failures: u32) -> bool {
        failures < self.max_auth_failures
    }

    /// Delay before attempt number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self
            .initial
            .saturating_mul(1u32 << attempt.min(16))
            .min(self.cap);
        let base_ms = base.as_millis() as u64;
        let jitter = rand::rng().random_range(0..=base_ms / 2);
        Duration::from_millis(base_ms + jitter)
    }
}
