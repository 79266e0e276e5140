//! Turn history container.

use serde::{Deserialize, Serialize};

use super::model::SEED_QUESTION_TEXT;

/// One age-indexed question→choice→outcome cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    /// Child age this turn happened at.
    pub age: u8,
    /// The question text as presented.
    pub question: String,
    /// The option text the player chose.
    pub choice: String,
    /// The narrative outcome text.
    pub outcome: String,
    /// Optional reference to a generated illustration.
    pub image_ref: Option<String>,
}

impl TurnRecord {
    /// The synthetic record seeding a fresh history before the first turn.
    pub fn seed(age: u8) -> Self {
        Self {
            age,
            question: SEED_QUESTION_TEXT.to_string(),
            choice: String::new(),
            outcome: String::new(),
            image_ref: None,
        }
    }
}

/// Ordered collection of turn records.
///
/// Invariant: at most one record per age, records sorted by age. Both are
/// enforced here so no caller can corrupt the history by hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct History {
    records: Vec<TurnRecord>,
}

impl History {
    /// Inserts a record, replacing any existing record for the same age and
    /// keeping the collection sorted.
    pub fn upsert(&mut self, record: TurnRecord) {
        match self.records.binary_search_by_key(&record.age, |r| r.age) {
            Ok(idx) => self.records[idx] = record,
            Err(idx) => self.records.insert(idx, record),
        }
    }

    /// Returns the record for a given age, if present.
    pub fn at_age(&self, age: u8) -> Option<&TurnRecord> {
        self.records
            .binary_search_by_key(&age, |r| r.age)
            .ok()
            .map(|idx| &self.records[idx])
    }

    /// All records in age order.
    pub fn records(&self) -> &[TurnRecord] {
        &self.records
    }

    /// The most recent (highest-age) record.
    pub fn last(&self) -> Option<&TurnRecord> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
