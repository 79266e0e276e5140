//! Questions, options, and the player's choice input.

use serde::{Deserialize, Serialize};

/// Pseudo-option id accepted after a failed outcome call: re-issue the fetch.
pub const RETRY_OPTION_ID: &str = "retry";
/// Pseudo-option id accepted after a failed outcome call: hard reset of the
/// in-flight turn via saved-game recovery.
pub const RELOAD_OPTION_ID: &str = "reload";

/// One selectable answer to a question.
///
/// This is the single normalized option schema: wire documents may carry
/// deltas under legacy keys (`cost`, `financeDelta`, ad hoc `isRecovery`),
/// but by the time an option reaches the engine it looks like this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub finance_delta: i32,
    #[serde(default)]
    pub relationship_delta: i32,
    /// Tagged as a way out of bankruptcy; gets the generous reset rule.
    #[serde(default)]
    pub is_recovery: bool,
    /// Choosing this option ends the story at the next continue.
    #[serde(default)]
    pub triggers_ending: bool,
}

impl QuestionOption {
    /// A plain option with no counter effect, used by fallback and recovery
    /// questions.
    pub fn neutral(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            finance_delta: 0,
            relationship_delta: 0,
            is_recovery: false,
            triggers_ending: false,
        }
    }

    /// True for the `retry`/`reload` pseudo-options, which bypass the
    /// simulator entirely.
    pub fn is_pseudo(&self) -> bool {
        self.id == RETRY_OPTION_ID || self.id == RELOAD_OPTION_ID
    }
}

/// A question presented for one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub options: Vec<QuestionOption>,
    /// Marks a milestone the narrative treats as important.
    #[serde(default)]
    pub important_event: bool,
}

impl Question {
    /// Looks up an option by id.
    pub fn option(&self, id: &str) -> Option<&QuestionOption> {
        self.options.iter().find(|o| o.id == id)
    }
}

/// What `select_option` accepts from the player.
#[derive(Debug, Clone, PartialEq)]
pub enum ChoiceInput {
    /// A regular option id from the active question (or a recovery
    /// pseudo-id).
    Option(String),
    /// A free-text custom answer, the premium action gated by the credit
    /// ledger. Custom answers carry no counter deltas of their own.
    Custom(String),
}

impl ChoiceInput {
    pub fn option(id: impl Into<String>) -> Self {
        Self::Option(id.into())
    }

    pub fn custom(text: impl Into<String>) -> Self {
        Self::Custom(text.into())
    }
}
