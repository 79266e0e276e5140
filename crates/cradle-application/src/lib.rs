//! Cradle application layer.
//!
//! The game session controller (phase state machine) and the recovery
//! protocol it delegates to when resuming a saved session.

pub mod controller;
pub mod recovery;

pub use controller::{CUSTOM_ANSWER_COST, DisplayCallback, GameController, ResumeOutcome};
pub use recovery::TransientFailure;
