//! Streaming response assembler.
//!
//! Converts a monotonically growing, not-yet-valid JSON buffer into a
//! human-readable display string at every chunk boundary. Two paths:
//!
//! 1. Fast path: once the scanner reports the root object balanced, the
//!    span is parsed as a complete document and handed to the matching
//!    formatter.
//! 2. Progressive path: while the document is still open, the resumable
//!    scanner's partially captured fields are rendered with trailing
//!    ellipses and reserved layout space.
//!
//! Options stream independently: each `{"id":.., "text":..}` record shows
//! as soon as its text begins, complete or not, so fully delivered options
//! are never held hostage by later ones.

pub mod format;
pub mod scan;

use cradle_core::content::wire::{WireInitialScene, WireOutcome, WireQuestion};

use format::{
    format_initial, format_initial_partial, format_outcome, format_outcome_partial,
    format_question, format_question_partial,
};
use scan::DocScanner;

/// What kind of document the stream is expected to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Question,
    Outcome,
    Initial,
}

/// Incremental extractor of display text from a growing document buffer.
#[derive(Debug)]
pub struct StreamAssembler {
    kind: ContentKind,
    buf: String,
    scanner: DocScanner,
    complete: bool,
    display: String,
}

impl StreamAssembler {
    pub fn new(kind: ContentKind) -> Self {
        Self {
            kind,
            buf: String::new(),
            scanner: DocScanner::new(),
            complete: false,
            display: String::new(),
        }
    }

    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    /// The raw accumulated text.
    pub fn raw(&self) -> &str {
        &self.buf
    }

    /// True once the document has balanced out (or `finish` was called).
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// The current display text.
    pub fn display_text(&self) -> &str {
        &self.display
    }

    /// Feeds the accumulated stream text and returns the updated display
    /// string.
    ///
    /// Progress callbacks deliver the full buffer so far; only the new
    /// suffix is scanned. A buffer that shrank (a restarted request) resets
    /// the scanner.
    pub fn push(&mut self, accumulated: &str) -> &str {
        if accumulated.len() < self.buf.len() || !accumulated.is_char_boundary(self.buf.len()) {
            tracing::debug!(target: "content", "stream buffer regressed; rescanning");
            self.scanner = DocScanner::new();
            self.buf.clear();
        }
        let suffix = &accumulated[self.buf.len()..];
        self.scanner.feed(suffix);
        self.buf.push_str(suffix);
        self.render();
        &self.display
    }

    /// Marks the stream finished and returns the final display string.
    pub fn finish(&mut self) -> &str {
        self.complete = true;
        self.render();
        &self.display
    }

    fn render(&mut self) {
        if self.scanner.document_complete() {
            if let Some(text) = self.try_complete_document() {
                self.display = text;
                self.complete = true;
                return;
            }
        }

        self.display = match self.kind {
            ContentKind::Question => format_question_partial(&self.scanner.fields),
            ContentKind::Outcome => format_outcome_partial(&self.scanner.fields),
            ContentKind::Initial => format_initial_partial(&self.scanner.fields),
        };
    }

    /// Fast path: parse the balanced root span as a complete document of
    /// the expected kind.
    fn try_complete_document(&self) -> Option<String> {
        let (start, end) = self.scanner.root_span()?;
        let span = self.buf.get(start..end)?;
        match self.kind {
            ContentKind::Question => serde_json::from_str::<WireQuestion>(span)
                .ok()
                .map(|q| format_question(&q.normalize())),
            ContentKind::Outcome => serde_json::from_str::<WireOutcome>(span)
                .ok()
                .map(|o| format_outcome(&o.normalize())),
            ContentKind::Initial => serde_json::from_str::<WireInitialScene>(span)
                .ok()
                .map(|s| format_initial(&s.normalize())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::format::{ELLIPSIS, IMPORTANT_EVENT_MARKER, OPTIONS_PLACEHOLDER_LINES};
    use super::*;

    const QUESTION_DOC: &str = r#"{
        "question": "Kindergarten enrollment day. Which one?",
        "options": [
            {"id": "a", "text": "The public one nearby", "financeDelta": 0},
            {"id": "b", "text": "A private academy", "cost": 3}
        ],
        "importantEvent": true
    }"#;

    #[test]
    fn one_shot_question_formats_fully() {
        let mut assembler = StreamAssembler::new(ContentKind::Question);
        let text = assembler.push(QUESTION_DOC).to_string();
        assert!(text.starts_with("Kindergarten enrollment day. Which one?"));
        assert!(text.contains("1. The public one nearby"));
        assert!(text.contains("2. A private academy"));
        assert!(text.contains(IMPORTANT_EVENT_MARKER));
        assert!(assembler.is_complete());
    }

    #[test]
    fn incremental_converges_to_one_shot() {
        let mut one_shot = StreamAssembler::new(ContentKind::Question);
        let expected = one_shot.push(QUESTION_DOC).to_string();

        let mut incremental = StreamAssembler::new(ContentKind::Question);
        let mut accumulated = String::new();
        let mut final_text = String::new();
        for c in QUESTION_DOC.chars() {
            accumulated.push(c);
            final_text = incremental.push(&accumulated).to_string();
        }
        assert_eq!(final_text, expected);
        assert!(incremental.is_complete());
    }

    #[test]
    fn open_question_field_gets_ellipsis_and_reserved_options_space() {
        let mut assembler = StreamAssembler::new(ContentKind::Question);
        let text = assembler
            .push(r#"{"question": "Will you move to the ci"#)
            .to_string();
        assert!(text.starts_with(&format!("Will you move to the ci{ELLIPSIS}")));
        // Reserved blank lines keep the block height stable.
        let blank_lines = text.lines().filter(|l| l.is_empty()).count();
        assert!(blank_lines >= OPTIONS_PLACEHOLDER_LINES);
    }

    #[test]
    fn complete_field_shows_without_ellipsis_while_document_open() {
        let mut assembler = StreamAssembler::new(ContentKind::Question);
        let text = assembler
            .push(r#"{"question": "A full question?", "options": ["#)
            .to_string();
        assert!(text.starts_with("A full question?"));
        assert!(!text.lines().next().unwrap().contains(ELLIPSIS));
    }

    #[test]
    fn streamed_options_appear_one_by_one() {
        let mut assembler = StreamAssembler::new(ContentKind::Question);
        let partial = r#"{"question": "q", "options": [{"id": "a", "text": "done option"}, {"id": "b", "text": "still com"#;
        let text = assembler.push(partial).to_string();
        assert!(text.contains("1. done option"));
        assert!(!text.lines().any(|l| l == "1. done option…"));
        assert!(text.contains(&format!("2. still com{ELLIPSIS}")));
    }

    #[test]
    fn outcome_kind_renders_text_only() {
        let mut assembler = StreamAssembler::new(ContentKind::Outcome);
        let doc = r#"{"outcome": "The move went well.", "ending": false, "nextQuestion": {"question": "next?", "options": []}}"#;
        let text = assembler.push(doc).to_string();
        assert_eq!(text, "The move went well.");
    }

    #[test]
    fn outcome_partial_streams_with_ellipsis() {
        let mut assembler = StreamAssembler::new(ContentKind::Outcome);
        let text = assembler.push(r#"{"outcome": "The move went"#).to_string();
        assert_eq!(text, format!("The move went{ELLIPSIS}"));
        assert!(!assembler.is_complete());
    }

    #[test]
    fn initial_scene_sections_stream_in_order() {
        let mut assembler = StreamAssembler::new(ContentKind::Initial);
        let partial =
            r#"{"player": {"role": "dad", "gender": "male", "age": 34}, "playerDescription": "A tired but hopeful father", "childDescription": "A loud, happy ba"#;
        let text = assembler.push(partial).to_string();
        assert!(text.contains("A tired but hopeful father"));
        assert!(text.contains(&format!("A loud, happy ba{ELLIPSIS}")));
    }

    #[test]
    fn junk_around_document_is_tolerated() {
        let mut assembler = StreamAssembler::new(ContentKind::Outcome);
        let text = assembler
            .push("Sure! Here's the outcome:\n{\"outcome\": \"ok\"}\nHope that helps")
            .to_string();
        assert_eq!(text, "ok");
        assert!(assembler.is_complete());
    }

    #[test]
    fn empty_buffer_renders_empty() {
        let mut assembler = StreamAssembler::new(ContentKind::Question);
        assert_eq!(assembler.push(""), "");
        assert!(!assembler.is_complete());
    }
}
