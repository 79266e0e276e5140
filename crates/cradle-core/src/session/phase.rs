//! Session controller phases.

use serde::{Deserialize, Serialize};

/// A named state of the session controller.
///
/// Transitions:
/// `Uninitialized → Initializing → {Welcome | InitializationFailed}`;
/// `Welcome → Feedback`; `Feedback → LoadingQuestion → Playing →
/// GeneratingOutcome → Feedback`; `Feedback → EndingGame → Summary`.
/// `Summary` and `InitializationFailed` are terminal pending user action.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GamePhase {
    #[default]
    Uninitialized,
    Initializing,
    Welcome,
    InitializationFailed,
    /// Presenting the last outcome (or initial narrative) to the player.
    Feedback,
    LoadingQuestion,
    /// A question is on screen and awaiting a choice.
    Playing,
    GeneratingOutcome,
    EndingGame,
    Summary,
}

impl GamePhase {
    /// True for phases that accept no further turns without a reset or retry.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Summary | Self::InitializationFailed)
    }

    /// True while an external call for this phase is expected to be running.
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            Self::Initializing | Self::LoadingQuestion | Self::GeneratingOutcome | Self::EndingGame
        )
    }
}
