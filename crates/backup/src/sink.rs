use std::path::PathBuf;

use {
    async_trait::async_trait,
    enxame_config::BackupConfig,
    enxame_sessions::{BackupError, BackupSink, SessionSnapshot},
    tracing::debug,
};

/// Snapshots as JSON files at `<root>/<session_id>/<captured_at>.json`.
///
/// The file name doubles as the artifact's timestamp key, which is what
/// `prune` compares against — no metadata reads needed.
pub struct FileSink {
    root: PathBuf,
}

impl FileSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root from config, or `~/.enxame/backups` when unset.
    pub fn from_config(cfg: &BackupConfig) -> Self {
        let root = cfg
            .dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| enxame_config::data_dir().join("backups"));
        Self::new(root)
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }
}

#[async_trait]
impl BackupSink for FileSink {
    async fn store(&self, snapshot: &SessionSnapshot) -> Result<(), BackupError> {
        let dir = self.root.join(&snapshot.summary.id);
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(format!("{}.json", snapshot.captured_at));
        let data = serde_json::to_vec_pretty(snapshot)?;
        tokio::fs::write(&path, data).await?;
        debug!(path = %path.display(), "snapshot stored");
        Ok(())
    }

    async fn prune(&self, cutoff_ms: u64) -> Result<usize, BackupError> {
        let mut removed = 0;
        let mut sessions = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            // Nothing stored yet.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        while let Some(session_dir) = sessions.next_entry().await? {
            if !session_dir.file_type().await?.is_dir() {
                continue;
            }
            let mut artifacts = tokio::fs::read_dir(session_dir.path()).await?;
            while let Some(artifact) = artifacts.next_entry().await? {
                let path = artifact.path();
                let Some(captured_at) = path
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .and_then(|stem| stem.parse::<u64>().ok())
                else {
                    continue;
                };
                if captured_at < cutoff_ms {
                    tokio::fs::remove_file(&path).await?;
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}
