//! Content-generation service trait.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::session::question::Question;

use super::model::{EndingSummary, GeneratedOutcome, InitialScene, SessionContext};

/// Callback receiving the accumulated partial text of a streamed response.
///
/// Invoked zero or more times before the call resolves with its final
/// structured result. Callers pass the full buffer so far, not a delta.
pub type ProgressSink = Arc<dyn Fn(&str) + Send + Sync>;

/// The content-generation service the engine consumes.
///
/// This is a narrow contract over an external collaborator: prompt
/// assembly, model choice, and transport all live behind it. Every method
/// may fail with a `Generation` error; the controller converts those into
/// fallback content or a recoverable phase, never a stuck turn loop.
#[async_trait]
pub trait ContentService: Send + Sync {
    /// Generates the opening scenario for a new session.
    async fn generate_initial_scene(
        &self,
        requirements: Option<&str>,
        progress: Option<ProgressSink>,
    ) -> Result<InitialScene>;

    /// Generates the question for the current turn.
    ///
    /// With a progress sink the transport streams, reporting partial text;
    /// without one it resolves in a single round trip.
    async fn generate_question(
        &self,
        ctx: &SessionContext,
        progress: Option<ProgressSink>,
    ) -> Result<Question>;

    /// Generates the outcome for a chosen option, possibly carrying a
    /// lookahead question for the next turn.
    async fn generate_outcome(
        &self,
        ctx: &SessionContext,
        question: &Question,
        choice_text: &str,
        progress: Option<ProgressSink>,
    ) -> Result<GeneratedOutcome>;

    /// Generates the final summary once the game has ended.
    async fn generate_ending(&self, ctx: &SessionContext) -> Result<EndingSummary>;
}
