//! Submitted response sets and their validated, canonical form.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{InstrumentRef, Stratum};

/// A submitted answer as it arrives from the caller: a number or a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseValue {
    Number(f64),
    Text(String),
}

impl fmt::Display for ResponseValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseValue::Number(n) => write!(f, "{n}"),
            ResponseValue::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<f64> for ResponseValue {
    fn from(value: f64) -> Self {
        ResponseValue::Number(value)
    }
}

impl From<i32> for ResponseValue {
    fn from(value: i32) -> Self {
        ResponseValue::Number(f64::from(value))
    }
}

impl From<&str> for ResponseValue {
    fn from(value: &str) -> Self {
        ResponseValue::Text(value.to_string())
    }
}

/// A respondent's answers to one instrument version.
///
/// Owned by the caller; the engine only borrows it for the duration of an evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSet {
    /// Opaque respondent reference, only used to stamp the profile.
    pub respondent: String,
    pub instrument: InstrumentRef,
    pub stratum: Stratum,
    /// Item identifier to submitted value.
    #[serde(default)]
    pub answers: BTreeMap<String, ResponseValue>,
}

impl ResponseSet {
    pub fn new(respondent: impl Into<String>, instrument: InstrumentRef, stratum: Stratum) -> Self {
        Self {
            respondent: respondent.into(),
            instrument,
            stratum,
            answers: BTreeMap::new(),
        }
    }

    /// Builder-style helper for adding an answer.
    pub fn with_answer(mut self, item: impl Into<String>, value: impl Into<ResponseValue>) -> Self {
        self.answers.insert(item.into(), value.into());
        self
    }
}

/// One accepted answer in canonical form.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedAnswer {
    /// Canonical numeric value inside the item's domain.
    pub value: f64,
    /// Chosen option id, for choice items.
    pub option: Option<String>,
}

/// Responses after validation: every value is a canonical number inside its item's domain.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedResponses {
    answers: BTreeMap<String, ValidatedAnswer>,
}

impl ValidatedResponses {
    pub(crate) fn new(answers: BTreeMap<String, ValidatedAnswer>) -> Self {
        Self { answers }
    }

    pub fn get(&self, item: &str) -> Option<f64> {
        self.answers.get(item).map(|a| a.value)
    }

    pub fn answer(&self, item: &str) -> Option<&ValidatedAnswer> {
        self.answers.get(item)
    }

    /// Number of answered items.
    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }
}
