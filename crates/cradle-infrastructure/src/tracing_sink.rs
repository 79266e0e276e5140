//! Tracing-backed event sink.

use cradle_core::telemetry::{EventSink, GameEvent};

/// Reports game events as structured tracing records.
///
/// Recording is synchronous and infallible; there is nothing to block on
/// and nothing to propagate, which is exactly the contract the controller
/// relies on.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn record(&self, event: GameEvent) {
        match event {
            GameEvent::ChoiceMade {
                age,
                question_id,
                option_id,
            } => {
                tracing::info!(target: "telemetry", age, %question_id, %option_id, "choice made");
            }
            GameEvent::BankruptcyEntered { age } => {
                tracing::info!(target: "telemetry", age, "bankruptcy entered");
            }
            GameEvent::GameEnded { age } => {
                tracing::info!(target: "telemetry", age, "game ended");
            }
            GameEvent::FallbackServed { age } => {
                tracing::info!(target: "telemetry", age, "fallback question served");
            }
        }
    }
}
