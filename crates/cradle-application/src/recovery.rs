//! Recovery protocol.
//!
//! When a session resumes after a crash or failed network call, the last
//! recorded error string is matched against known transient-failure
//! signatures to decide how to rebuild a playable turn.

use once_cell::sync::Lazy;

use cradle_core::session::model::PendingChoice;
use cradle_core::session::question::{
    Question, QuestionOption, RELOAD_OPTION_ID, RETRY_OPTION_ID,
};

/// The failure classes the protocol knows how to resume from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientFailure {
    Network,
    Timeout,
    MalformedDocument,
    GenerationService,
}

/// Substring signatures of errors worth recovering from, matched
/// case-insensitively against the recorded error string.
static SIGNATURES: Lazy<Vec<(&'static str, TransientFailure)>> = Lazy::new(|| {
    vec![
        ("timed out", TransientFailure::Timeout),
        ("timeout", TransientFailure::Timeout),
        ("network", TransientFailure::Network),
        ("connection", TransientFailure::Network),
        ("unreachable", TransientFailure::Network),
        ("malformed", TransientFailure::MalformedDocument),
        ("parse", TransientFailure::MalformedDocument),
        ("unexpected end", TransientFailure::MalformedDocument),
        ("content service", TransientFailure::GenerationService),
        ("content generation", TransientFailure::GenerationService),
        ("stream broke", TransientFailure::GenerationService),
    ]
});

/// Classifies a recorded error string.
///
/// `None` means the error is not one of the known transient shapes and the
/// protocol should not attempt anything clever with it.
pub fn classify(error: &str) -> Option<TransientFailure> {
    let lowered = error.to_lowercase();
    SIGNATURES
        .iter()
        .find(|(needle, _)| lowered.contains(needle))
        .map(|(_, failure)| *failure)
}

/// Synthesizes the question re-presenting an interrupted turn.
///
/// The player sees the original question with their original choice, plus
/// the `retry` and `reload` pseudo-options. All three are neutral: the
/// simulator already ran before the outcome call failed, so answering this
/// question must never move the counters again.
pub fn recovery_question(pending: &PendingChoice) -> Question {
    Question {
        id: format!("recovery-{}", pending.question_id),
        text: pending.question_text.clone(),
        options: vec![
            QuestionOption::neutral(pending.option_id.clone(), pending.option_text.clone()),
            QuestionOption::neutral(RETRY_OPTION_ID, "Try that again"),
            QuestionOption::neutral(RELOAD_OPTION_ID, "Go back to the last save"),
        ],
        important_event: false,
    }
}
