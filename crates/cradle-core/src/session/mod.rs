//! Session domain: the durable snapshot, its turn history, and the phase
//! state the controller moves through.

pub mod history;
pub mod model;
pub mod phase;
pub mod question;
pub mod store;

pub use history::{History, TurnRecord};
pub use model::{
    ChildProfile, Level, ParentRole, PendingChoice, PlayerProfile, SessionSnapshot,
    DEFAULT_ENDING_AGE, SEED_QUESTION_TEXT,
};
pub use phase::GamePhase;
pub use question::{ChoiceInput, Question, QuestionOption, RELOAD_OPTION_ID, RETRY_OPTION_ID};
pub use store::SnapshotStore;
