//! In-memory snapshot store for tests and headless demos.

use async_trait::async_trait;
use tokio::sync::RwLock;

use cradle_core::session::model::SessionSnapshot;
use cradle_core::session::store::SnapshotStore;

/// Snapshot store holding the blob in memory.
///
/// Follows the same contract as the file-backed store, including the
/// "no player or child, no save" gate, so controller tests exercise the
/// real persistence behavior.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    slot: RwLock<Option<SessionSnapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn save(&self, snapshot: &SessionSnapshot) {
        if !snapshot.is_persistable() {
            tracing::debug!(target: "persistence", "skipping save: no player or child yet");
            return;
        }
        *self.slot.write().await = Some(snapshot.clone());
    }

    async fn load(&self) -> Option<SessionSnapshot> {
        self.slot.read().await.clone()
    }

    async fn clear(&self) {
        *self.slot.write().await = None;
    }
}
