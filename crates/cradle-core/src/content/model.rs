//! Content payload models.
//!
//! These are the structured results the generation service resolves with,
//! after wire normalization (`wire` module).

use serde::{Deserialize, Serialize};

use crate::session::history::TurnRecord;
use crate::session::model::{ChildProfile, Level, PlayerProfile};
use crate::session::question::Question;

/// The opening scenario a new session starts from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialScene {
    pub player: PlayerProfile,
    pub child: ChildProfile,
    pub player_description: String,
    pub child_description: String,
    pub finance: Level,
    pub relationship: Level,
    #[serde(default)]
    pub single_parent: bool,
    /// Opening narrative shown as the first feedback text.
    pub narrative: String,
}

/// The result of an outcome-generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedOutcome {
    /// Narrative outcome of the chosen option.
    pub text: String,
    /// Optional reference to a generated illustration.
    pub image_ref: Option<String>,
    /// The service decided the story should end after this turn.
    #[serde(default)]
    pub ending: bool,
    /// Lookahead question for the next turn, saving a round trip.
    pub next_question: Option<Question>,
}

/// The final summary generated when the game ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndingSummary {
    pub text: String,
}

/// Everything the generation service needs to know about the session.
///
/// Built from the snapshot before each call; read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    pub player: PlayerProfile,
    pub child: ChildProfile,
    pub player_description: String,
    pub child_description: String,
    pub finance: Level,
    pub relationship: Level,
    pub single_parent: bool,
    /// Prior turns, oldest first.
    pub history: Vec<TurnRecord>,
}
