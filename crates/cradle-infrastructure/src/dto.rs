//! Persistence DTO for the session snapshot.
//!
//! The stored blob wraps the domain snapshot with a schema version tag.
//! There is no migration chain: a mismatched tag means the blob belongs to
//! a different build of the game and is discarded on load.

use semver::Version;
use serde::{Deserialize, Serialize};

use cradle_core::session::model::SessionSnapshot;

/// Current schema version of the stored blob.
pub const SNAPSHOT_SCHEMA_VERSION: &str = "1.0.0";

/// The on-disk document: version tag plus payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotDoc {
    pub schema_version: String,
    pub session: SessionSnapshot,
}

impl SnapshotDoc {
    /// Wraps a snapshot with the current schema version.
    pub fn wrap(snapshot: &SessionSnapshot) -> Self {
        Self {
            schema_version: SNAPSHOT_SCHEMA_VERSION.to_string(),
            session: snapshot.clone(),
        }
    }

    /// True when the stored tag matches the current schema version.
    ///
    /// Both sides must parse as semver and compare equal; an unparseable
    /// tag counts as a mismatch.
    pub fn version_matches(&self) -> bool {
        let current = Version::parse(SNAPSHOT_SCHEMA_VERSION);
        let stored = Version::parse(&self.schema_version);
        matches!((current, stored), (Ok(c), Ok(s)) if c == s)
    }
}
