//! Resumable document scanner.
//!
//! A single-pass tokenizer over a growing JSON text buffer. Each byte is
//! examined exactly once: the scanner keeps its cursor, container stack,
//! and string-escape state between chunks, so feeding a long stream stays
//! linear instead of re-scanning the whole buffer on every chunk.
//!
//! While scanning it captures the string values of the fields the display
//! formatters care about - top-level `question`/`outcome`/`narrative`/
//! description fields, the `child.name`, and each `{"id":.., "text":..}`
//! record inside the `options` array - even while those strings are still
//! open. Escape sequences are decoded on the fly; the escape flag tracks
//! backslash parity, so an escaped quote never terminates a capture.

/// A string field captured (possibly partially) from the stream.
#[derive(Debug, Clone, Default)]
pub struct FieldValue {
    pub text: String,
    /// The opening quote has been seen.
    pub present: bool,
    /// The closing quote has been seen (escape-aware).
    pub complete: bool,
}

impl FieldValue {
    fn begin(&mut self) {
        self.present = true;
        self.text.clear();
    }
}

/// One record of the `options` array as it streams in.
#[derive(Debug, Clone, Default)]
pub struct OptionCapture {
    pub id: FieldValue,
    pub text: FieldValue,
    /// The whole option object has closed.
    pub closed: bool,
}

/// Everything captured so far.
#[derive(Debug, Clone, Default)]
pub struct CapturedFields {
    pub question: FieldValue,
    pub outcome: FieldValue,
    pub narrative: FieldValue,
    pub player_description: FieldValue,
    pub child_description: FieldValue,
    pub child_name: FieldValue,
    pub ending: FieldValue,
    pub options: Vec<OptionCapture>,
    pub options_started: bool,
    pub options_closed: bool,
    pub important_event: Option<bool>,
}

impl CapturedFields {
    fn option_mut(&mut self, index: usize) -> &mut OptionCapture {
        if self.options.len() <= index {
            self.options.resize_with(index + 1, OptionCapture::default);
        }
        &mut self.options[index]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaptureTarget {
    Question,
    Outcome,
    Narrative,
    PlayerDescription,
    ChildDescription,
    ChildName,
    Ending,
    OptionId(usize),
    OptionText(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LiteralTarget {
    ImportantEvent,
    OptionId(usize),
}

#[derive(Debug, Clone)]
enum Container {
    Object {
        expect_key: bool,
        pending_key: Option<String>,
        key_in_parent: Option<String>,
    },
    Array {
        index: usize,
        key_in_parent: Option<String>,
    },
}

/// The incremental tokenizer.
#[derive(Debug)]
pub struct DocScanner {
    stack: Vec<Container>,
    in_string: bool,
    string_is_key: bool,
    escape: bool,
    unicode: Option<(u8, u32)>,
    key_buf: String,
    capture: Option<CaptureTarget>,
    literal: Option<(LiteralTarget, String)>,
    /// Byte offset of the root `{` in the full buffer, once seen.
    root_start: Option<usize>,
    /// Byte offset one past the root `}`, once the document balanced out.
    root_end: Option<usize>,
    offset: usize,
    pub fields: CapturedFields,
}

impl Default for DocScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl DocScanner {
    pub fn new() -> Self {
        Self {
            stack: Vec::new(),
            in_string: false,
            string_is_key: false,
            escape: false,
            unicode: None,
            key_buf: String::new(),
            capture: None,
            literal: None,
            root_start: None,
            root_end: None,
            offset: 0,
            fields: CapturedFields::default(),
        }
    }

    /// Feeds the next chunk of the stream. Only ever call with text that
    /// extends what was previously fed.
    pub fn feed(&mut self, chunk: &str) {
        for c in chunk.chars() {
            self.feed_char(c);
            self.offset += c.len_utf8();
        }
    }

    /// True once the root object has balanced out.
    pub fn document_complete(&self) -> bool {
        self.root_end.is_some()
    }

    /// The byte span of the root document within the full buffer, if the
    /// root `{` has been seen. The end falls back to the current offset
    /// while the document is still open.
    pub fn root_span(&self) -> Option<(usize, usize)> {
        self.root_start
            .map(|start| (start, self.root_end.unwrap_or(self.offset)))
    }

    fn feed_char(&mut self, c: char) {
        if self.in_string {
            self.feed_string_char(c);
            return;
        }

        if self.literal.is_some() && !matches!(c, ',' | '}' | ']') && !c.is_whitespace() {
            if let Some((_, buf)) = self.literal.as_mut() {
                buf.push(c);
            }
            return;
        }

        match c {
            '"' => {
                self.commit_literal();
                self.begin_string();
            }
            '{' => {
                self.commit_literal();
                if self.stack.is_empty() {
                    if self.root_end.is_some() {
                        // Trailing junk after a complete document; ignore.
                        return;
                    }
                    self.root_start.get_or_insert(self.offset);
                }
                let key_in_parent = self.consume_parent_key();
                self.mark_option_start();
                self.stack.push(Container::Object {
                    expect_key: true,
                    pending_key: None,
                    key_in_parent,
                });
            }
            '}' => {
                self.commit_literal();
                self.close_container();
            }
            '[' => {
                self.commit_literal();
                if self.stack.is_empty() {
                    // Documents are objects; a bracket outside one is junk.
                    return;
                }
                let key_in_parent = self.consume_parent_key();
                if self.stack.len() == 1 && key_in_parent.as_deref() == Some("options") {
                    self.fields.options_started = true;
                }
                self.stack.push(Container::Array {
                    index: 0,
                    key_in_parent,
                });
            }
            ']' => {
                self.commit_literal();
                self.close_container();
            }
            ':' => {
                if let Some(Container::Object { expect_key, .. }) = self.stack.last_mut() {
                    *expect_key = false;
                }
            }
            ',' => {
                self.commit_literal();
                match self.stack.last_mut() {
                    Some(Container::Object { expect_key, .. }) => *expect_key = true,
                    Some(Container::Array { index, .. }) => *index += 1,
                    None => {}
                }
            }
            c if c.is_whitespace() => {}
            c => {
                // Start of a bare literal (number, true/false/null).
                if let Some(target) = self.literal_target() {
                    self.literal = Some((target, c.to_string()));
                }
            }
        }
    }

    fn feed_string_char(&mut self, c: char) {
        if let Some((remaining, acc)) = self.unicode {
            if let Some(digit) = c.to_digit(16) {
                let acc = acc * 16 + digit;
                if remaining == 1 {
                    self.unicode = None;
                    let decoded = char::from_u32(acc).unwrap_or('\u{FFFD}');
                    self.push_string_char(decoded);
                } else {
                    self.unicode = Some((remaining - 1, acc));
                }
            } else {
                // Malformed escape; drop it and resume normal scanning.
                self.unicode = None;
                self.feed_string_char(c);
            }
            return;
        }

        if self.escape {
            self.escape = false;
            match c {
                '"' => self.push_string_char('"'),
                '\\' => self.push_string_char('\\'),
                'n' => self.push_string_char('\n'),
                't' => self.push_string_char('\t'),
                'r' => self.push_string_char('\r'),
                'u' => self.unicode = Some((4, 0)),
                other => self.push_string_char(other),
            }
            return;
        }

        match c {
            '\\' => self.escape = true,
            '"' => {
                self.in_string = false;
                self.end_string();
            }
            other => self.push_string_char(other),
        }
    }

    fn begin_string(&mut self) {
        self.in_string = true;
        self.escape = false;
        self.string_is_key = matches!(
            self.stack.last(),
            Some(Container::Object {
                expect_key: true,
                ..
            })
        );
        if self.string_is_key {
            self.key_buf.clear();
        } else {
            self.capture = self.value_target();
            if let Some(target) = self.capture {
                self.field_mut(target).begin();
            }
        }
    }

    fn end_string(&mut self) {
        if self.string_is_key {
            let key = std::mem::take(&mut self.key_buf);
            if let Some(Container::Object { pending_key, .. }) = self.stack.last_mut() {
                *pending_key = Some(key);
            }
        } else if let Some(target) = self.capture.take() {
            self.field_mut(target).complete = true;
        }
    }

    fn push_string_char(&mut self, c: char) {
        if self.string_is_key && self.in_string {
            self.key_buf.push(c);
        } else if let Some(target) = self.capture {
            self.field_mut(target).text.push(c);
        }
    }

    /// Takes the key the next value belongs to out of the enclosing object.
    fn consume_parent_key(&mut self) -> Option<String> {
        match self.stack.last_mut() {
            Some(Container::Object { pending_key, .. }) => pending_key.take(),
            Some(Container::Array { key_in_parent, .. }) => key_in_parent.clone(),
            None => None,
        }
    }

    fn mark_option_start(&mut self) {
        if let Some(index) = self.current_option_index() {
            self.fields.option_mut(index);
        }
    }

    fn close_container(&mut self) {
        let closed = self.stack.pop();
        match closed {
            Some(Container::Object { key_in_parent, .. }) => {
                if let Some(index) = self.current_option_index_from_stack() {
                    if key_in_parent.as_deref() == Some("options") {
                        self.fields.option_mut(index).closed = true;
                    }
                }
                if self.stack.is_empty() && self.root_start.is_some() && self.root_end.is_none() {
                    self.root_end = Some(self.offset + 1);
                }
            }
            Some(Container::Array { key_in_parent, .. }) => {
                if self.stack.len() == 1 && key_in_parent.as_deref() == Some("options") {
                    self.fields.options_closed = true;
                }
            }
            None => {}
        }
    }

    /// Index into the options array when the scanner currently sits inside
    /// an option object (stack: root / options array / option object).
    fn current_option_index(&self) -> Option<usize> {
        match (self.stack.first(), self.stack.get(1)) {
            (
                Some(Container::Object { .. }),
                Some(Container::Array {
                    index,
                    key_in_parent,
                }),
            ) if key_in_parent.as_deref() == Some("options") && self.stack.len() == 2 => {
                Some(*index)
            }
            _ => None,
        }
    }

    /// Same as `current_option_index`, evaluated after the option object
    /// itself was popped (stack: root / options array).
    fn current_option_index_from_stack(&self) -> Option<usize> {
        match self.stack.get(1) {
            Some(Container::Array {
                index,
                key_in_parent,
            }) if key_in_parent.as_deref() == Some("options") && self.stack.len() == 2 => {
                Some(*index)
            }
            _ => None,
        }
    }

    /// Resolves where a value string beginning now should be captured.
    fn value_target(&self) -> Option<CaptureTarget> {
        let pending = match self.stack.last() {
            Some(Container::Object { pending_key, .. }) => pending_key.as_deref(),
            _ => None,
        }?;

        match self.stack.len() {
            1 => match pending {
                "question" => Some(CaptureTarget::Question),
                "outcome" => Some(CaptureTarget::Outcome),
                "narrative" => Some(CaptureTarget::Narrative),
                "playerDescription" => Some(CaptureTarget::PlayerDescription),
                "childDescription" => Some(CaptureTarget::ChildDescription),
                "ending" => Some(CaptureTarget::Ending),
                _ => None,
            },
            2 => {
                let parent_key = match self.stack.first() {
                    Some(Container::Object { .. }) => match self.stack.get(1) {
                        Some(Container::Object { key_in_parent, .. }) => key_in_parent.as_deref(),
                        _ => None,
                    },
                    _ => None,
                };
                if parent_key == Some("child") && pending == "name" {
                    Some(CaptureTarget::ChildName)
                } else {
                    None
                }
            }
            3 => {
                let index = self.option_index_for_value()?;
                match pending {
                    "id" => Some(CaptureTarget::OptionId(index)),
                    "text" => Some(CaptureTarget::OptionText(index)),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn option_index_for_value(&self) -> Option<usize> {
        match (self.stack.get(1), self.stack.get(2)) {
            (
                Some(Container::Array {
                    index,
                    key_in_parent,
                }),
                Some(Container::Object { .. }),
            ) if key_in_parent.as_deref() == Some("options") => Some(*index),
            _ => None,
        }
    }

    /// Resolves where a bare literal beginning now should be captured.
    fn literal_target(&self) -> Option<LiteralTarget> {
        let pending = match self.stack.last() {
            Some(Container::Object {
                pending_key,
                expect_key: false,
                ..
            }) => pending_key.as_deref(),
            _ => None,
        }?;

        if self.stack.len() == 1 && pending == "importantEvent" {
            return Some(LiteralTarget::ImportantEvent);
        }
        if self.stack.len() == 3 && pending == "id" {
            return self.option_index_for_value().map(LiteralTarget::OptionId);
        }
        None
    }

    fn commit_literal(&mut self) {
        let Some((target, raw)) = self.literal.take() else {
            return;
        };
        match target {
            LiteralTarget::ImportantEvent => {
                self.fields.important_event = Some(raw.trim() == "true");
            }
            LiteralTarget::OptionId(index) => {
                let value = self.fields.option_mut(index);
                value.id.present = true;
                value.id.complete = true;
                value.id.text = raw.trim().to_string();
            }
        }
    }

    fn field_mut(&mut self, target: CaptureTarget) -> &mut FieldValue {
        match target {
            CaptureTarget::Question => &mut self.fields.question,
            CaptureTarget::Outcome => &mut self.fields.outcome,
            CaptureTarget::Narrative => &mut self.fields.narrative,
            CaptureTarget::PlayerDescription => &mut self.fields.player_description,
            CaptureTarget::ChildDescription => &mut self.fields.child_description,
            CaptureTarget::ChildName => &mut self.fields.child_name,
            CaptureTarget::Ending => &mut self.fields.ending,
            CaptureTarget::OptionId(index) => &mut self.fields.option_mut(index).id,
            CaptureTarget::OptionText(index) => &mut self.fields.option_mut(index).text,
        }
    }
}
