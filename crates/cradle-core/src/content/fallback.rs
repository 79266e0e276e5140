//! Locally synthesized fallback content.
//!
//! When a question fetch fails the turn loop must not get structurally
//! stuck, so the controller substitutes one of these generic questions and
//! logs the real error instead of propagating it.

use rand::seq::SliceRandom;
use uuid::Uuid;

use crate::session::question::{Question, QuestionOption};

const FALLBACK_QUESTIONS: &[&str] = &[
    "A quiet evening at home. How do you spend it with {name}?",
    "{name} seems a little restless today. What do you do?",
    "The weekend is free for once. What do you plan with {name}?",
];

/// Builds a generic two-option question for the given child.
///
/// Both options are neutral: a fallback turn never moves the counters, it
/// only keeps the story going until the service is reachable again.
pub fn fallback_question(child_name: &str) -> Question {
    let mut rng = rand::thread_rng();
    let template = FALLBACK_QUESTIONS
        .choose(&mut rng)
        .copied()
        .unwrap_or(FALLBACK_QUESTIONS[0]);

    Question {
        id: Uuid::new_v4().to_string(),
        text: template.replace("{name}", child_name),
        options: vec![
            QuestionOption::neutral("opt1", "Spend the time together"),
            QuestionOption::neutral("opt2", "Let them have some space"),
        ],
        important_event: false,
    }
}
