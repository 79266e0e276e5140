//! Content-generation domain: payload models, the wire schema the
//! generation service speaks, the service trait, and locally synthesized
//! fallback content.

pub mod fallback;
pub mod model;
pub mod service;
pub mod wire;

pub use fallback::fallback_question;
pub use model::{EndingSummary, GeneratedOutcome, InitialScene, SessionContext};
pub use service::{ContentService, ProgressSink};
