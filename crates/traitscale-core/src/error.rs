//! Evaluation error types.
//!
//! Every error carries the instrument reference plus the dimension, stratum or
//! item identifiers involved, so callers can render their own messages. None
//! of these failures is retried by the engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{InstrumentRef, Stratum, ValueDomain};
use crate::response::ResponseValue;

/// One offending item in a submitted response set.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationIssue {
    /// A required item has no response.
    #[error("no response for required item {item}")]
    MissingResponse { item: String },

    /// The response cannot be coerced into the item's domain.
    #[error("response {value} for item {item} is outside {domain}")]
    OutOfDomain {
        item: String,
        value: ResponseValue,
        domain: ValueDomain,
    },

    /// The response names an item the instrument does not define.
    #[error("item {item} is not part of the instrument")]
    UnknownItem { item: String },
}

impl ValidationIssue {
    pub fn item(&self) -> &str {
        match self {
            ValidationIssue::MissingResponse { item }
            | ValidationIssue::OutOfDomain { item, .. }
            | ValidationIssue::UnknownItem { item } => item,
        }
    }
}

/// Malformed input: every offending item, not just the first.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{} invalid response(s) for {instrument}", .issues.len())]
pub struct ValidationError {
    pub instrument: InstrumentRef,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    /// Identifiers of all offending items, in report order.
    pub fn items(&self) -> Vec<&str> {
        self.issues.iter().map(ValidationIssue::item).collect()
    }

    pub fn missing(&self) -> impl Iterator<Item = &str> {
        self.issues.iter().filter_map(|issue| match issue {
            ValidationIssue::MissingResponse { item } => Some(item.as_str()),
            _ => None,
        })
    }

    pub fn out_of_domain(&self) -> impl Iterator<Item = &str> {
        self.issues.iter().filter_map(|issue| match issue {
            ValidationIssue::OutOfDomain { item, .. } => Some(item.as_str()),
            _ => None,
        })
    }

    pub fn unknown(&self) -> impl Iterator<Item = &str> {
        self.issues.iter().filter_map(|issue| match issue {
            ValidationIssue::UnknownItem { item } => Some(item.as_str()),
            _ => None,
        })
    }
}

/// Failure of one dimension's scoring pipeline.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DimensionError {
    /// No validated response contributes to the dimension.
    #[error("dimension {dimension} of {instrument} has no scorable responses")]
    IncompleteDimension {
        instrument: InstrumentRef,
        dimension: String,
    },

    /// Neither the requested stratum nor the fallback stratum has a norm table.
    #[error(
        "no norm table for dimension {dimension} of {instrument} in stratum {stratum} (fallback: {})",
        fallback_label(.fallback)
    )]
    NormTableNotFound {
        instrument: InstrumentRef,
        dimension: String,
        stratum: Stratum,
        fallback: Option<Stratum>,
    },

    /// The dimension defines no cut points.
    #[error("dimension {dimension} of {instrument} has no band cut points")]
    MissingBandConfig {
        instrument: InstrumentRef,
        dimension: String,
    },

    /// The aggregated raw score escaped the dimension's declared range.
    #[error("raw score {raw} of dimension {dimension} ({instrument}) is outside {min}..={max}")]
    RawScoreOutOfRange {
        instrument: InstrumentRef,
        dimension: String,
        raw: f64,
        min: f64,
        max: f64,
    },
}

fn fallback_label(fallback: &Option<Stratum>) -> String {
    fallback
        .as_ref()
        .map_or_else(|| "none".to_string(), Stratum::to_string)
}

impl DimensionError {
    pub fn dimension(&self) -> &str {
        match self {
            DimensionError::IncompleteDimension { dimension, .. }
            | DimensionError::NormTableNotFound { dimension, .. }
            | DimensionError::MissingBandConfig { dimension, .. }
            | DimensionError::RawScoreOutOfRange { dimension, .. } => dimension,
        }
    }

    /// Returns `true` when the failure stems from reference data rather than the respondent.
    pub fn is_reference_data_fault(&self) -> bool {
        matches!(
            self,
            DimensionError::NormTableNotFound { .. }
                | DimensionError::MissingBandConfig { .. }
                | DimensionError::RawScoreOutOfRange { .. }
        )
    }
}

/// A dimension that could not be scored, as recorded on a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionFailure {
    pub dimension: String,
    pub mandatory: bool,
    pub error: DimensionError,
}

/// Terminal result of an evaluation that produced no profile.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    /// The requested instrument version is not in the bound snapshot.
    #[error("instrument {0} is not loaded")]
    UnknownInstrument(InstrumentRef),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// At least one mandatory dimension failed.
    #[error("profile for {instrument} is incomplete: {} mandatory dimension(s) failed", .failures.iter().filter(|f| f.mandatory).count())]
    IncompleteProfile {
        instrument: InstrumentRef,
        failures: Vec<DimensionFailure>,
    },
}

impl EvaluationError {
    /// Returns `true` when the respondent's input caused the failure.
    pub fn is_input_fault(&self) -> bool {
        match self {
            EvaluationError::Validation(_) => true,
            EvaluationError::UnknownInstrument(_) => false,
            EvaluationError::IncompleteProfile { failures, .. } => failures
                .iter()
                .filter(|f| f.mandatory)
                .all(|f| !f.error.is_reference_data_fault()),
        }
    }
}

/// A defect found while checking reference data at load time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinitionIssue {
    /// What the issue is about (e.g. "entrepreneurial-traits@1.0.0/leadership").
    pub subject: String,
    pub message: String,
}

impl DefinitionIssue {
    pub fn new(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            message: message.into(),
        }
    }
}

/// Reference data rejected at load time, with every issue found.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{} reference-data issue(s), first: {}", .issues.len(), first_issue(.issues))]
pub struct DefinitionError {
    pub issues: Vec<DefinitionIssue>,
}

fn first_issue(issues: &[DefinitionIssue]) -> String {
    issues
        .first()
        .map(|issue| format!("[{}] {}", issue.subject, issue.message))
        .unwrap_or_default()
}
