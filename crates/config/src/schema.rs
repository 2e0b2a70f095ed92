//! Config schema types (sessions, reconnect, auto-reply, broadcast, backup).

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnxameConfig {
    pub sessions: SessionsConfig,
    pub reconnect: ReconnectConfig,
    pub auto_reply: AutoReplyConfig,
    pub broadcast: BroadcastConfig,
    pub backup: BackupConfig,
}

/// Per-session runtime knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    /// Ring-buffer cap for the per-session message log.
    pub message_log_cap: usize,
    /// Delay before an auto-reply is sent, so replies never beat the
    /// triggering message's processing.
    pub reply_delay_ms: u64,
    /// Bound on queued outbound sends per session.
    pub outbound_queue: usize,
    /// Grace period a removal waits for the worker to wind down before
    /// forcing teardown.
    pub remove_grace_ms: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            message_log_cap: 1000,
            reply_delay_ms: 1500,
            outbound_queue: 64,
            remove_grace_ms: 5000,
        }
    }
}

/// Reconnect backoff policy knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Reconnect attempt ceiling for transient disconnects.
    /// `None` means unlimited.
    pub max_attempts: Option<u32>,
    /// Auth failures are not transient: after this many the session is
    /// terminated and must be re-created.
    pub max_auth_failures: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 2000,
            max_delay_ms: 60_000,
            max_attempts: None,
            max_auth_failures: 3,
        }
    }
}

/// One keyword-triggered reply rule. First matching rule wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyRuleConfig {
    /// Case-insensitive substrings; any of them matching fires the rule.
    pub keywords: Vec<String>,
    /// Reply template. `{price}` is substituted from the quote source.
    pub template: String,
}

/// Auto-responder rule table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoReplyConfig {
    pub enabled: bool,
    pub rules: Vec<ReplyRuleConfig>,
    /// Gate for the fallback reply: when no rule matches, only answer at
    /// all if the message contains one of these.
    pub trigger_keywords: Vec<String>,
    pub fallback: Option<String>,
}

impl Default for AutoReplyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rules: vec![
                ReplyRuleConfig {
                    keywords: vec!["soja".into()],
                    template: "A saca da soja está cotada em R$ {price} hoje.".into(),
                },
                ReplyRuleConfig {
                    keywords: vec!["milho".into()],
                    template: "A saca do milho está em R$ {price} no momento.".into(),
                },
                ReplyRuleConfig {
                    keywords: vec!["trigo".into()],
                    template: "O trigo está cotado em R$ {price} a saca.".into(),
                },
            ],
            trigger_keywords: vec![
                "preço".into(),
                "preco".into(),
                "cotação".into(),
                "cotacao".into(),
                "valor".into(),
                "saca".into(),
            ],
            fallback: Some(
                "Envie o nome do grão (soja, milho ou trigo) para receber a cotação.".into(),
            ),
        }
    }
}

/// Broadcast pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcastConfig {
    /// Pause between targets, to stay under transport-side rate limits.
    pub per_target_delay_ms: u64,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            per_target_delay_ms: 1000,
        }
    }
}

/// Periodic snapshot/retention job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub cleanup_interval_secs: u64,
    pub retention_days: u64,
    /// Artifact directory. Defaults to `~/.enxame/backups` when unset.
    pub dir: Option<String>,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 3600,
            cleanup_interval_secs: 86_400,
            retention_days: 7,
            dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_complete() {
        let cfg = EnxameConfig::default();
        assert_eq!(cfg.sessions.message_log_cap, 1000);
        assert!(cfg.reconnect.max_attempts.is_none());
        assert!(cfg.auto_reply.enabled);
        assert!(!cfg.auto_reply.rules.is_empty());
        assert_eq!(cfg.broadcast.per_target_delay_ms, 1000);
        assert_eq!(cfg.backup.retention_days, 7);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: EnxameConfig = toml::from_str(
            r#"
            [sessions]
            message_log_cap = 50

            [reconnect]
            max_attempts = 5
            "#,
        )
        .unwrap();
        assert_eq!(cfg.sessions.message_log_cap, 50);
        assert_eq!(cfg.sessions.reply_delay_ms, 1500);
        assert_eq!(cfg.reconnect.max_attempts, Some(5));
        assert_eq!(cfg.reconnect.max_auth_failures, 3);
    }

    #[test]
    fn rules_parse_from_toml() {
        let cfg: EnxameConfig = toml::from_str(
            r#"
            [[auto_reply.rules]]
            keywords = ["café"]
            template = "Café a R$ {price}."
            "#,
        )
        .unwrap();
        assert_eq!(cfg.auto_reply.rules.len(), 1);
        assert_eq!(cfg.auto_reply.rules[0].keywords, vec!["café"]);
    }
}
