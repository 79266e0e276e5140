//! Single-file TOML snapshot store.
//!
//! Persists the session snapshot to one fixed TOML file with atomic
//! replacement (temp file + rename) and an advisory lock. Every operation
//! honors the total contract of [`SnapshotStore`]: failures are logged and
//! swallowed, never surfaced, because losing a save must not interrupt
//! gameplay.

use std::fs::{self, File, OpenOptions};
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fs2::FileExt;

use cradle_core::session::model::SessionSnapshot;
use cradle_core::session::store::SnapshotStore;

use crate::dto::SnapshotDoc;
use crate::paths::CradlePaths;

/// Snapshot store backed by one TOML file.
#[derive(Debug, Clone)]
pub struct TomlSnapshotStore {
    path: PathBuf,
}

impl TomlSnapshotStore {
    /// Creates a store over an explicit file path.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Creates a store at the default platform location.
    pub fn at_default_location() -> Result<Self, crate::paths::PathError> {
        Ok(Self::new(CradlePaths::save_file()?))
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Holds the advisory lock for the duration of the returned guard.
    fn acquire_lock(&self) -> std::io::Result<File> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())?;
        lock.lock_exclusive()?;
        Ok(lock)
    }

    fn save_blocking(path: &Path, lock: File, doc: &SnapshotDoc) -> std::io::Result<()> {
        let serialized = toml::to_string_pretty(doc)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let tmp_path = path.with_extension("toml.tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            tmp.write_all(serialized.as_bytes())?;
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;

        drop(lock);
        Ok(())
    }

    fn load_blocking(path: &Path, lock: File) -> std::io::Result<Option<SnapshotDoc>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        drop(lock);
        if content.trim().is_empty() {
            return Ok(None);
        }
        let doc: SnapshotDoc = toml::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(Some(doc))
    }
}

#[async_trait]
impl SnapshotStore for TomlSnapshotStore {
    async fn save(&self, snapshot: &SessionSnapshot) {
        if !snapshot.is_persistable() {
            tracing::debug!(target: "persistence", "skipping save: no player or child yet");
            return;
        }

        let path = self.path.clone();
        let doc = SnapshotDoc::wrap(snapshot);
        let store = self.clone();
        let result = tokio::task::spawn_blocking(move || {
            let lock = store.acquire_lock()?;
            Self::save_blocking(&path, lock, &doc)
        })
        .await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(target: "persistence", error = %e, "failed to save snapshot; continuing unsaved");
            }
            Err(e) => {
                tracing::warn!(target: "persistence", error = %e, "snapshot save task failed");
            }
        }
    }

    async fn load(&self) -> Option<SessionSnapshot> {
        let path = self.path.clone();
        let store = self.clone();
        let result = tokio::task::spawn_blocking(move || {
            let lock = store.acquire_lock()?;
            Self::load_blocking(&path, lock)
        })
        .await;

        let doc = match result {
            Ok(Ok(doc)) => doc?,
            Ok(Err(e)) => {
                tracing::warn!(target: "persistence", error = %e, "failed to load snapshot");
                return None;
            }
            Err(e) => {
                tracing::warn!(target: "persistence", error = %e, "snapshot load task failed");
                return None;
            }
        };

        if !doc.version_matches() {
            tracing::info!(
                target: "persistence",
                stored = %doc.schema_version,
                current = %crate::dto::SNAPSHOT_SCHEMA_VERSION,
                "discarding snapshot with mismatched schema version"
            );
            self.clear().await;
            return None;
        }

        Some(doc.session)
    }

    async fn clear(&self) {
        let path = self.path.clone();
        let result = tokio::task::spawn_blocking(move || {
            if path.exists() {
                fs::remove_file(&path)
            } else {
                Ok(())
            }
        })
        .await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(target: "persistence", error = %e, "failed to clear snapshot");
            }
            Err(e) => {
                tracing::warn!(target: "persistence", error = %e, "snapshot clear task failed");
            }
        }
    }
}
