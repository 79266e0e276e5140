//! Session snapshot domain model.
//!
//! This module contains the durable session record that every phase
//! transition mutates and the persistence layer stores as a single blob.
//! It is the "pure" domain model, independent of any storage format or
//! schema version; version tagging happens in the persistence DTO.

use serde::{Deserialize, Serialize};

use super::history::{History, TurnRecord};
use super::question::Question;

/// Child age at which the game generates the final summary.
pub const DEFAULT_ENDING_AGE: u8 = 18;

/// Question text used for the synthetic seed record in a fresh history.
pub const SEED_QUESTION_TEXT: &str = "A new life begins";

/// The role the player takes in the story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentRole {
    Mother,
    Father,
    Guardian,
}

/// The player's own profile, chosen at session start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub role: ParentRole,
    pub gender: String,
    pub age: u8,
}

/// The child whose life the session narrates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildProfile {
    pub name: String,
    pub gender: String,
    /// Current age in years; advanced by one per completed turn.
    pub age: u8,
    /// Short descriptive traits ("curious", "stubborn", ...).
    #[serde(default)]
    pub traits: Vec<String>,
}

/// A bounded integer counter clamped to `[0, 10]` at every mutation.
///
/// Finance and relationship levels both use this type, so the clamp can
/// never be forgotten at a call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Level(u8);

impl Level {
    pub const MIN: u8 = 0;
    pub const MAX: u8 = 10;

    /// Creates a level, clamping the input into range.
    pub fn new(value: u8) -> Self {
        Self(value.min(Self::MAX))
    }

    /// Returns the raw value.
    pub fn value(self) -> u8 {
        self.0
    }

    /// Applies a signed delta, clamping the result into `[0, 10]`.
    #[must_use]
    pub fn apply(self, delta: i32) -> Self {
        let next = (i32::from(self.0) + delta).clamp(i32::from(Self::MIN), i32::from(Self::MAX));
        Self(next as u8)
    }

    /// True when the counter has bottomed out.
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl Default for Level {
    fn default() -> Self {
        Self(5)
    }
}

impl From<Level> for u8 {
    fn from(level: Level) -> Self {
        level.0
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Write-ahead marker recorded before an outcome-generation call is issued
/// and cleared only on that call's success.
///
/// Its presence after an error is the signal the recovery protocol uses to
/// re-present the interrupted turn after a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingChoice {
    pub question_id: String,
    pub option_id: String,
    pub question_text: String,
    pub option_text: String,
}

/// The durable unit of session state.
///
/// Created when a new session starts, mutated by every phase transition,
/// persisted after each mutation that includes both a player and a child,
/// and discarded on load when the stored schema version does not match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SessionSnapshot {
    pub player: Option<PlayerProfile>,
    pub child: Option<ChildProfile>,
    /// Free-text description of the player, from the initial scene.
    #[serde(default)]
    pub player_description: String,
    /// Free-text description of the child, from the initial scene.
    #[serde(default)]
    pub child_description: String,
    /// Ordered turn history; at most one record per age.
    #[serde(default)]
    pub history: History,
    #[serde(default)]
    pub finance: Level,
    #[serde(default)]
    pub relationship: Level,
    /// Set when finance bottoms out at zero; cleared once it is positive.
    #[serde(default)]
    pub bankrupt: bool,
    #[serde(default)]
    pub single_parent: bool,
    /// Narrative text shown in the feedback phase (initial narrative or the
    /// last outcome).
    #[serde(default)]
    pub feedback_text: String,
    /// The question currently presented to the player, if any.
    pub current_question: Option<Question>,
    /// Write-ahead marker for an outcome call in flight (or interrupted).
    pub pending_choice: Option<PendingChoice>,
    /// Lookahead question returned by the last outcome call; consumed by the
    /// next `continue_game` instead of a fresh fetch.
    pub prefetched_question: Option<Question>,
    /// Final summary text once the game has ended.
    pub ending: Option<String>,
    /// Set when the last outcome flagged that the story should end early.
    #[serde(default)]
    pub ending_flagged: bool,
    /// Last recorded failure, inspected by the recovery protocol on resume.
    pub last_error: Option<String>,
    /// Timestamp when the session was created (RFC 3339).
    #[serde(default)]
    pub created_at: String,
    /// Timestamp when the session was last updated (RFC 3339).
    #[serde(default)]
    pub updated_at: String,
}

impl SessionSnapshot {
    /// Creates a fresh snapshot with both profiles set and a seeded history.
    pub fn new(player: PlayerProfile, child: ChildProfile) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        let seed = TurnRecord::seed(child.age);
        let mut history = History::default();
        history.upsert(seed);
        Self {
            player: Some(player),
            child: Some(child),
            history,
            created_at: now.clone(),
            updated_at: now,
            ..Self::default()
        }
    }

    /// Current child age, or 0 when no child is set yet.
    pub fn child_age(&self) -> u8 {
        self.child.as_ref().map_or(0, |c| c.age)
    }

    /// True when the history holds nothing but the synthetic seed record.
    pub fn only_seed_history(&self) -> bool {
        self.history.len() == 1
            && self
                .history
                .records()
                .first()
                .is_some_and(|r| r.question == SEED_QUESTION_TEXT)
    }

    /// True when the snapshot is complete enough to persist.
    pub fn is_persistable(&self) -> bool {
        self.player.is_some() && self.child.is_some()
    }

    /// Refreshes the updated-at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }
}
