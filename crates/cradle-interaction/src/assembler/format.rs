//! Display formatters.
//!
//! Each content kind has one formatter for a fully parsed document and one
//! for the partially captured fields of an in-flight stream. At the final
//! chunk both paths agree, which is what makes incremental rendering safe
//! to show.

use cradle_core::content::model::{GeneratedOutcome, InitialScene};
use cradle_core::session::question::Question;

use super::scan::{CapturedFields, FieldValue};

/// Shown at the end of a field that is still streaming.
pub const ELLIPSIS: &str = "\u{2026}";

/// Marker appended under a question flagged as an important event.
pub const IMPORTANT_EVENT_MARKER: &str = "\u{2726} An important event";

/// Blank lines reserved for the options block before it starts arriving,
/// sized to a typical two-to-four option list so the layout does not jump.
pub const OPTIONS_PLACEHOLDER_LINES: usize = 3;

/// Blank lines reserved per missing section of the initial scene.
const SECTION_PLACEHOLDER_LINES: usize = 1;

/// Formats a complete question document.
pub fn format_question(question: &Question) -> String {
    let mut lines = vec![question.text.clone(), String::new()];
    for (i, option) in question.options.iter().enumerate() {
        lines.push(format!("{}. {}", i + 1, option.text));
    }
    if question.important_event {
        lines.push(String::new());
        lines.push(IMPORTANT_EVENT_MARKER.to_string());
    }
    lines.join("\n")
}

/// Formats a complete outcome document. Outcome-only: any lookahead
/// question riding along is not display material.
pub fn format_outcome(outcome: &GeneratedOutcome) -> String {
    outcome.text.clone()
}

/// Formats a complete initial scene.
pub fn format_initial(scene: &InitialScene) -> String {
    [
        scene.player_description.clone(),
        String::new(),
        scene.child_description.clone(),
        String::new(),
        scene.narrative.clone(),
    ]
    .join("\n")
}

fn partial_text(value: &FieldValue) -> String {
    if value.complete {
        value.text.clone()
    } else {
        format!("{}{}", value.text, ELLIPSIS)
    }
}

/// Formats the partially captured fields of a question document.
pub fn format_question_partial(fields: &CapturedFields) -> String {
    if !fields.question.present {
        return String::new();
    }

    let mut lines = vec![partial_text(&fields.question), String::new()];

    if !fields.options_started {
        // Reserve room for the options so the block does not grow and
        // shove the layout around once they arrive.
        for _ in 0..OPTIONS_PLACEHOLDER_LINES {
            lines.push(String::new());
        }
    } else {
        let mut number = 0;
        for option in &fields.options {
            if option.text.present {
                number += 1;
                lines.push(format!("{}. {}", number, partial_text(&option.text)));
            }
        }
    }

    if fields.options_closed && fields.important_event == Some(true) {
        lines.push(String::new());
        lines.push(IMPORTANT_EVENT_MARKER.to_string());
    }

    lines.join("\n")
}

/// Formats the partially captured fields of an outcome document.
pub fn format_outcome_partial(fields: &CapturedFields) -> String {
    if !fields.outcome.present {
        return String::new();
    }
    partial_text(&fields.outcome)
}

/// Formats the partially captured fields of an initial-scene document.
pub fn format_initial_partial(fields: &CapturedFields) -> String {
    let sections = [
        &fields.player_description,
        &fields.child_description,
        &fields.narrative,
    ];

    if sections.iter().all(|s| !s.present) {
        return String::new();
    }

    let mut lines = Vec::new();
    for (i, section) in sections.iter().enumerate() {
        if i > 0 {
            lines.push(String::new());
        }
        if section.present {
            lines.push(partial_text(section));
        } else {
            for _ in 0..SECTION_PLACEHOLDER_LINES {
                lines.push(String::new());
            }
        }
    }
    lines.join("\n")
}
