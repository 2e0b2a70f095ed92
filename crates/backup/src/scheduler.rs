use std::{sync::Arc, time::Duration};

use {
    enxame_common::now_ms,
    enxame_config::BackupConfig,
    enxame_sessions::{BackupSink, SessionRegistry},
    tokio::task::JoinHandle,
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

/// Periodic snapshot + retention job over every session in the
/// registry. Reads go through the registry's snapshot accessor, never
/// through live worker state.
pub struct BackupScheduler {
    registry: Arc<SessionRegistry>,
    sink: Arc<dyn BackupSink>,
    interval: Duration,
    cleanup_interval: Duration,
    retention: Duration,
}

impl BackupScheduler {
    pub fn new(
        registry: Arc<SessionRegistry>,
        sink: Arc<dyn BackupSink>,
        cfg: &BackupConfig,
    ) -> Self {
        Self {
            registry,
            sink,
            interval: Duration::from_secs(cfg.interval_secs.max(1)),
            cleanup_interval: Duration::from_secs(cfg.cleanup_interval_secs.max(1)),
            retention: Duration::from_secs(cfg.retention_days.saturating_mul(86_400)),
        }
    }

    /// Run until cancelled, on a background task.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    pub async fn run(self, cancel: CancellationToken) {
        let mut snapshots = tokio::time::interval(self.interval);
        let mut cleanup = tokio::time::interval(self.cleanup_interval);
        // Both tickers fire immediately on creation; consume that so the
        // first real cycle lands one full interval after startup.
        snapshots.tick().await;
        cleanup.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = snapshots.tick() => self.backup_cycle().await,
                _ = cleanup.tick() => self.cleanup_cycle().await,
            }
        }
        debug!("backup scheduler stopped");
    }

    /// Snapshot every session once. A failing session is logged and
    /// skipped; the rest of the cycle continues.
    pub async fn backup_cycle(&self) {
        let sessions = self.registry.list().await;
        let mut stored = 0usize;
        let mut failed = 0usize;
        for summary in &sessions {
            let snap = match self.registry.snapshot(&summary.id).await {
                Ok(snap) => snap,
                // Removed between list() and here.
                Err(e) => {
                    debug!(session_id = %summary.id, error = %e, "session gone mid-cycle");
                    continue;
                },
            };
            match self.sink.store(&snap).await {
                Ok(()) => stored += 1,
                Err(e) => {
                    failed += 1;
                    warn!(session_id = %summary.id, error = %e, "backup failed, skipping session");
                },
            }
        }
        info!(stored, failed, "backup cycle finished");
    }

    /// Drop artifacts older than the retention window.
    pub async fn cleanup_cycle(&self) {
        let cutoff = now_ms().saturating_sub(self.retention.as_millis() as u64);
        match self.sink.prune(cutoff).await {
            Ok(removed) => info!(removed, "backup cleanup finished"),
            Err(e) => warn!(error = %e, "backup cleanup failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use {
        async_trait::async_trait,
        enxame_config::EnxameConfig,
        enxame_sessions::{BackupError, SessionSnapshot},
        enxame_transport::{
            TransportClient,
            mock::{MockHandle, MockTransport},
        },
    };

    use super::*;

    /// Sink that records stored session ids and can fail for one of
    /// them.
    struct RecordingSink {
        stored: Mutex<Vec<String>>,
        fail_for: Option<String>,
        pruned_cutoffs: Mutex<Vec<u64>>,
    }

    impl RecordingSink {
        fn new(fail_for: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                stored: Mutex::new(Vec::new()),
                fail_for: fail_for.map(str::to_string),
                pruned_cutoffs: Mutex::new(Vec::new()),
            })
        }

        fn stored(&self) -> Vec<String> {
            self.stored.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BackupSink for RecordingSink {
        async fn store(&self, snapshot: &SessionSnapshot) -> Result<(), BackupError> {
            if self.fail_for.as_deref() == Some(snapshot.summary.id.as_str()) {
                return Err(BackupError::Sink("disk full".into()));
            }
            self.stored.lock().unwrap().push(snapshot.summary.id.clone());
            Ok(())
        }

        async fn prune(&self, cutoff_ms: u64) -> Result<usize, BackupError> {
            self.pruned_cutoffs.lock().unwrap().push(cutoff_ms);
            Ok(0)
        }
    }

    fn mock_factory() -> Arc<impl enxame_transport::TransportFactory> {
        let handles: Arc<Mutex<Vec<MockHandle>>> = Arc::new(Mutex::new(Vec::new()));
        Arc::new(move |_: &str| {
            let (transport, handle) = MockTransport::new();
            handles.lock().unwrap().push(handle);
            Arc::new(transport) as Arc<dyn TransportClient>
        })
    }

    fn test_registry() -> Arc<SessionRegistry> {
        Arc::new(SessionRegistry::new(
            mock_factory(),
            &EnxameConfig::default(),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn cycle_stores_every_session() {
        let registry = test_registry();
        registry.create("a", "Alpha").unwrap();
        registry.create("b", "Beta").unwrap();

        let sink = RecordingSink::new(None);
        let scheduler = BackupScheduler::new(
            Arc::clone(&registry),
            Arc::clone(&sink) as Arc<dyn BackupSink>,
            &EnxameConfig::default().backup,
        );
        scheduler.backup_cycle().await;

        let mut stored = sink.stored();
        stored.sort();
        assert_eq!(stored, vec!["a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn one_failing_session_does_not_block_the_rest() {
        let registry = test_registry();
        registry.create("a", "Alpha").unwrap();
        registry.create("b", "Beta").unwrap();
        registry.create("c", "Gamma").unwrap();

        let sink = RecordingSink::new(Some("b"));
        let scheduler = BackupScheduler::new(
            Arc::clone(&registry),
            Arc::clone(&sink) as Arc<dyn BackupSink>,
            &EnxameConfig::default().backup,
        );
        scheduler.backup_cycle().await;

        let mut stored = sink.stored();
        stored.sort();
        assert_eq!(stored, vec!["a", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn cleanup_uses_retention_window() {
        let registry = test_registry();
        let sink = RecordingSink::new(None);
        let cfg = EnxameConfig::default().backup;
        let scheduler = BackupScheduler::new(
            registry,
            Arc::clone(&sink) as Arc<dyn BackupSink>,
            &cfg,
        );
        scheduler.cleanup_cycle().await;

        let cutoffs = sink.pruned_cutoffs.lock().unwrap().clone();
        assert_eq!(cutoffs.len(), 1);
        // Cutoff sits retention_days in the past.
        let expected = now_ms().saturating_sub(cfg.retention_days * 86_400 * 1000);
        assert!(cutoffs[0].abs_diff(expected) < 60_000);
    }

    #[tokio::test(start_paused = true)]
    async fn scheduler_runs_on_its_interval() {
        let registry = test_registry();
        registry.create("a", "Alpha").unwrap();

        let sink = RecordingSink::new(None);
        let scheduler = BackupScheduler::new(
            Arc::clone(&registry),
            Arc::clone(&sink) as Arc<dyn BackupSink>,
            &EnxameConfig::default().backup,
        );
        let cancel = CancellationToken::new();
        let task = scheduler.spawn(cancel.clone());

        // Nothing before the first interval elapses.
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(sink.stored().is_empty());

        tokio::time::timeout(Duration::from_secs(7200), async {
            while sink.stored().is_empty() {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
        })
        .await
        .expect("hourly cycle never ran");

        cancel.cancel();
        let _ = task.await;
    }

    #[tokio::test(start_paused = true)]
    async fn final_snapshot_flushes_on_session_removal() {
        let sink = RecordingSink::new(None);
        let registry = Arc::new(
            SessionRegistry::new(mock_factory(), &EnxameConfig::default())
                .with_final_sink(Arc::clone(&sink) as Arc<dyn BackupSink>),
        );
        registry.create("a", "Alpha").unwrap();

        registry.remove("a").await.unwrap();
        assert_eq!(sink.stored(), vec!["a"]);
        assert_eq!(
            registry.get("a").await.unwrap_err().to_string(),
            "unknown session `a`"
        );
    }
}
