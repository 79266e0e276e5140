//! Wire schema spoken by the content-generation service.
//!
//! The service streams JSON documents with camelCase keys, and older
//! prompts still produce duck-typed option fields (`cost` for a spend
//! instead of `financeDelta`, an ad hoc `isRecovery` tag). Everything is
//! normalized into the single domain option schema here, exactly once, at
//! the ingestion boundary.

use serde::Deserialize;
use uuid::Uuid;

use crate::session::model::{ChildProfile, Level, ParentRole, PlayerProfile};
use crate::session::question::{Question, QuestionOption};

use super::model::{EndingSummary, GeneratedOutcome, InitialScene};

/// An option as the service emits it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireOption {
    #[serde(default)]
    pub id: Option<String>,
    pub text: String,
    /// Preferred delta key.
    #[serde(default)]
    pub finance_delta: Option<i32>,
    /// Legacy key: a positive cost means money spent.
    #[serde(default)]
    pub cost: Option<i32>,
    #[serde(default)]
    pub marital_delta: Option<i32>,
    #[serde(default)]
    pub is_recovery: bool,
    #[serde(default)]
    pub triggers_ending: bool,
}

impl WireOption {
    /// Normalizes into the domain schema.
    ///
    /// `financeDelta` wins over `cost`; a bare `cost` is negated. Missing
    /// ids fall back to a positional id so a malformed document still
    /// yields selectable options.
    pub fn normalize(self, index: usize) -> QuestionOption {
        let finance_delta = self
            .finance_delta
            .or(self.cost.map(|c| -c))
            .unwrap_or(0);
        QuestionOption {
            id: self.id.unwrap_or_else(|| format!("opt{}", index + 1)),
            text: self.text,
            finance_delta,
            relationship_delta: self.marital_delta.unwrap_or(0),
            is_recovery: self.is_recovery,
            triggers_ending: self.triggers_ending,
        }
    }
}

/// A question document.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireQuestion {
    #[serde(default)]
    pub id: Option<String>,
    pub question: String,
    #[serde(default)]
    pub options: Vec<WireOption>,
    #[serde(default)]
    pub important_event: bool,
}

impl WireQuestion {
    pub fn normalize(self) -> Question {
        Question {
            id: self.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            text: self.question,
            options: self
                .options
                .into_iter()
                .enumerate()
                .map(|(i, o)| o.normalize(i))
                .collect(),
            important_event: self.important_event,
        }
    }
}

/// An outcome document, optionally carrying the lookahead question.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireOutcome {
    pub outcome: String,
    #[serde(default)]
    pub image_ref: Option<String>,
    #[serde(default)]
    pub ending: bool,
    #[serde(default)]
    pub next_question: Option<WireQuestion>,
}

impl WireOutcome {
    pub fn normalize(self) -> GeneratedOutcome {
        GeneratedOutcome {
            text: self.outcome,
            image_ref: self.image_ref,
            ending: self.ending,
            next_question: self.next_question.map(WireQuestion::normalize),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePlayer {
    pub role: String,
    pub gender: String,
    pub age: u8,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireChild {
    pub name: String,
    pub gender: String,
    #[serde(default)]
    pub age: u8,
    #[serde(default)]
    pub traits: Vec<String>,
}

/// An initial-scene document.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireInitialScene {
    pub player: WirePlayer,
    pub child: WireChild,
    #[serde(default)]
    pub player_description: String,
    #[serde(default)]
    pub child_description: String,
    #[serde(default)]
    pub finance: Option<u8>,
    /// Legacy name for the relationship counter.
    #[serde(default)]
    pub marital: Option<u8>,
    #[serde(default)]
    pub relationship: Option<u8>,
    #[serde(default)]
    pub single_parent: bool,
    #[serde(default)]
    pub narrative: String,
}

impl WireInitialScene {
    pub fn normalize(self) -> InitialScene {
        let relationship = self.relationship.or(self.marital);
        InitialScene {
            player: PlayerProfile {
                role: parse_role(&self.player.role),
                gender: self.player.gender,
                age: self.player.age,
            },
            child: ChildProfile {
                name: self.child.name,
                gender: self.child.gender,
                age: self.child.age,
                traits: self.child.traits,
            },
            player_description: self.player_description,
            child_description: self.child_description,
            finance: self.finance.map(Level::new).unwrap_or_default(),
            relationship: relationship.map(Level::new).unwrap_or_default(),
            single_parent: self.single_parent,
            narrative: self.narrative,
        }
    }
}

/// An ending document.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireEnding {
    pub ending: String,
}

impl WireEnding {
    pub fn normalize(self) -> EndingSummary {
        EndingSummary { text: self.ending }
    }
}

fn parse_role(raw: &str) -> ParentRole {
    match raw.to_ascii_lowercase().as_str() {
        "mother" | "mom" => ParentRole::Mother,
        "father" | "dad" => ParentRole::Father,
        _ => ParentRole::Guardian,
    }
}
