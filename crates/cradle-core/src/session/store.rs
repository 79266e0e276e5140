//! Snapshot store trait.

use async_trait::async_trait;

use super::model::SessionSnapshot;

/// An abstract store for the single persisted session snapshot.
///
/// The contract is deliberately total: no operation ever raises to its
/// caller, because a persistence failure must never interrupt gameplay.
/// Implementations log failures and carry on; a session that cannot be
/// saved simply continues unsaved.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Persists the snapshot.
    ///
    /// A no-op (logged) when the snapshot lacks a player or a child; storage
    /// failures (quota, serialization, I/O) are swallowed after logging.
    async fn save(&self, snapshot: &SessionSnapshot);

    /// Loads the stored snapshot.
    ///
    /// Returns `None` when nothing is stored, the blob cannot be read, or
    /// its schema version tag does not match the current schema. In the
    /// mismatch case the stale blob is also cleared.
    async fn load(&self) -> Option<SessionSnapshot>;

    /// Best-effort removal of the stored snapshot.
    async fn clear(&self);
}
