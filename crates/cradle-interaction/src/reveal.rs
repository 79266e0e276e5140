//! Reveal scheduler.
//!
//! Paces the display of extracted text: instead of jumping to each new
//! extraction length, a cursor advances in bounded multi-character chunks
//! with reading-cadence delays. New text interrupts the in-flight delay so
//! the run restarts against the longer target; a completion signal drains
//! the remainder and fires a one-shot callback exactly once.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Timing knobs for the reveal cadence. Injectable so tests run instantly.
#[derive(Debug, Clone)]
pub struct RevealTiming {
    /// Default pause between chunks.
    pub base_delay: Duration,
    /// Pause after sentence-ending punctuation.
    pub sentence_delay: Duration,
    /// Pause after a newline boundary.
    pub newline_delay: Duration,
    /// Minimum characters revealed per step.
    pub min_chunk: usize,
    /// Maximum characters revealed per step.
    pub max_chunk: usize,
    /// How far back from the tentative stop to look for a nicer boundary.
    pub lookahead: usize,
}

impl Default for RevealTiming {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(35),
            sentence_delay: Duration::from_millis(280),
            newline_delay: Duration::from_millis(15),
            min_chunk: 3,
            max_chunk: 12,
            lookahead: 8,
        }
    }
}

impl RevealTiming {
    /// All-zero delays for tests.
    pub fn instant() -> Self {
        Self {
            base_delay: Duration::ZERO,
            sentence_delay: Duration::ZERO,
            newline_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Picks where the next chunk should stop, in characters.
///
/// Advances at least `min_chunk` and at most `max_chunk` characters,
/// preferring to stop just after a whitespace or punctuation boundary
/// found within `lookahead` characters behind the tentative stop.
pub fn next_chunk_end(chars: &[char], shown: usize, timing: &RevealTiming) -> usize {
    let len = chars.len();
    if shown >= len {
        return len;
    }
    let tentative = (shown + timing.max_chunk).min(len);
    if tentative == len {
        return len;
    }

    let floor = (shown + timing.min_chunk).min(tentative);
    let window_start = tentative.saturating_sub(timing.lookahead).max(floor);
    for end in (window_start..=tentative).rev() {
        if end == 0 {
            break;
        }
        let c = chars[end - 1];
        if c.is_whitespace() || matches!(c, '.' | ',' | '!' | '?' | ';' | ':') {
            return end;
        }
    }
    tentative
}

/// The pause that follows a chunk ending in the given character.
pub fn delay_after(last: Option<char>, timing: &RevealTiming) -> Duration {
    match last {
        Some('.') | Some('!') | Some('?') | Some('\u{3002}') => timing.sentence_delay,
        Some('\n') => timing.newline_delay,
        _ => timing.base_delay,
    }
}

#[derive(Debug, Default)]
struct RevealState {
    target: Vec<char>,
    shown: usize,
    complete: bool,
}

/// Drives paced text reveal on a background task.
pub struct RevealScheduler {
    state: Arc<Mutex<RevealState>>,
    notify: Arc<Notify>,
    cancel: CancellationToken,
}

impl RevealScheduler {
    /// Spawns the reveal task.
    ///
    /// `on_update` receives each newly revealed prefix; `on_complete` fires
    /// exactly once, after the completion signal has been drained to the
    /// end of the text.
    pub fn spawn(
        timing: RevealTiming,
        on_update: impl Fn(String) + Send + Sync + 'static,
        on_complete: impl FnOnce() + Send + 'static,
    ) -> Self {
        let state = Arc::new(Mutex::new(RevealState::default()));
        let notify = Arc::new(Notify::new());
        let cancel = CancellationToken::new();

        let task_state = state.clone();
        let task_notify = notify.clone();
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            run_reveal(timing, task_state, task_notify, task_cancel, on_update, on_complete).await;
        });

        Self {
            state,
            notify,
            cancel,
        }
    }

    /// Supersedes the in-flight run with newer extracted text.
    pub fn push_text(&self, text: &str) {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.target = text.chars().collect();
            if state.shown > state.target.len() {
                state.shown = state.target.len();
            }
        }
        self.notify.notify_one();
    }

    /// Signals that no more text is coming; the scheduler drains the rest
    /// and fires the completion callback.
    pub fn complete(&self) {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.complete = true;
        }
        self.notify.notify_one();
    }

    /// Abandons the run without firing the completion callback.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for RevealScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

enum Step {
    /// Reveal this prefix, then pause.
    Reveal(String, Duration),
    /// Caught up but the stream is still open; wait for more text.
    Idle,
    /// Everything revealed and the stream is complete.
    Done,
}

async fn run_reveal(
    timing: RevealTiming,
    state: Arc<Mutex<RevealState>>,
    notify: Arc<Notify>,
    cancel: CancellationToken,
    on_update: impl Fn(String),
    on_complete: impl FnOnce(),
) {
    loop {
        // Take one step under the lock, then sleep outside it.
        let step = {
            let mut guard = state.lock().unwrap_or_else(|e| e.into_inner());
            if guard.shown < guard.target.len() {
                let end = next_chunk_end(&guard.target, guard.shown, &timing);
                guard.shown = end;
                let prefix: String = guard.target[..end].iter().collect();
                let last = end.checked_sub(1).map(|i| guard.target[i]);
                Step::Reveal(prefix, delay_after(last, &timing))
            } else if guard.complete {
                Step::Done
            } else {
                Step::Idle
            }
        };

        match step {
            Step::Done => {
                on_complete();
                return;
            }
            Step::Idle => {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = notify.notified() => {}
                }
            }
            Step::Reveal(prefix, delay) => {
                on_update(prefix);
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = notify.notified() => {}
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}
