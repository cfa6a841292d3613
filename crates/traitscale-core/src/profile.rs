//! Per-dimension results, composite indices and profile assembly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::banding::{classify, Band};
use crate::error::{DimensionError, DimensionFailure, EvaluationError};
use crate::model::{Composite, Instrument, InstrumentRef, ScoreBasis, Stratum};
use crate::standardize::AnchorPosition;
use crate::statistics::{summarize, HighlightConfig, ProfileSummary};

/// Scored outcome of one dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionResult {
    pub dimension: String,
    pub name: String,
    pub raw_score: f64,
    pub percentile: f64,
    pub standard_score: f64,
    pub band: Band,
    pub items_answered: usize,
    pub items_expected: usize,
    /// Stratum of the norm table actually used.
    pub norm_stratum: Stratum,
    /// Whether `norm_stratum` came from the fallback rather than the respondent.
    pub norm_fallback: bool,
    pub anchor_position: AnchorPosition,
}

impl DimensionResult {
    pub fn score(&self, basis: ScoreBasis) -> f64 {
        match basis {
            ScoreBasis::Standard => self.standard_score,
            ScoreBasis::Percentile => self.percentile,
        }
    }
}

/// Value of an instrument-level composite index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeResult {
    pub composite: String,
    pub name: String,
    pub basis: ScoreBasis,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub band: Option<Band>,
}

/// Full evaluation outcome, owned by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub respondent: String,
    pub instrument: InstrumentRef,
    /// Stratum the respondent declared.
    pub stratum: Stratum,
    pub evaluated_at: DateTime<Utc>,
    /// Scored dimensions, in instrument order.
    pub dimensions: Vec<DimensionResult>,
    pub composites: Vec<CompositeResult>,
    /// Optional dimensions that could not be scored.
    #[serde(default)]
    pub failures: Vec<DimensionFailure>,
    /// Composites skipped because a component dimension failed.
    #[serde(default)]
    pub unavailable_composites: Vec<String>,
    pub summary: ProfileSummary,
}

impl Profile {
    pub fn dimension(&self, id: &str) -> Option<&DimensionResult> {
        self.dimensions.iter().find(|d| d.dimension == id)
    }

    pub fn composite(&self, id: &str) -> Option<&CompositeResult> {
        self.composites.iter().find(|c| c.composite == id)
    }

    /// `true` when every dimension of the instrument was scored.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Weighted mean of component dimension scores, or `None` if a component is absent.
pub fn compute_composite(composite: &Composite, dimensions: &[DimensionResult]) -> Option<CompositeResult> {
    let mut weighted = 0.0;
    let mut total_weight = 0.0;
    for component in &composite.components {
        let result = dimensions
            .iter()
            .find(|d| d.dimension == component.dimension)?;
        weighted += component.weight * result.score(composite.basis);
        total_weight += component.weight;
    }
    if total_weight <= 0.0 {
        return None;
    }

    let value = weighted / total_weight;
    Some(CompositeResult {
        composite: composite.id.clone(),
        name: composite.name.clone(),
        basis: composite.basis,
        value,
        band: classify(&composite.bands, value),
    })
}

/// Collects dimension outcomes and assembles the immutable profile.
///
/// Composites are computed from the collected results only; raw responses are
/// never consulted here.
pub struct ProfileBuilder<'a> {
    instrument: &'a Instrument,
    respondent: String,
    stratum: Stratum,
    evaluated_at: DateTime<Utc>,
    items_answered: usize,
    dimensions: Vec<DimensionResult>,
    failures: Vec<DimensionFailure>,
}

impl<'a> ProfileBuilder<'a> {
    pub fn new(
        instrument: &'a Instrument,
        respondent: impl Into<String>,
        stratum: Stratum,
        evaluated_at: DateTime<Utc>,
        items_answered: usize,
    ) -> Self {
        Self {
            instrument,
            respondent: respondent.into(),
            stratum,
            evaluated_at,
            items_answered,
            dimensions: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Record the outcome of one dimension's pipeline.
    pub fn record(&mut self, outcome: Result<DimensionResult, DimensionError>) {
        match outcome {
            Ok(result) => self.dimensions.push(result),
            Err(error) => {
                let mandatory = self
                    .instrument
                    .dimension(error.dimension())
                    .map_or(true, |d| d.mandatory);
                self.failures.push(DimensionFailure {
                    dimension: error.dimension().to_string(),
                    mandatory,
                    error,
                });
            }
        }
    }

    /// Build the profile, failing if any mandatory dimension has no result.
    pub fn build(mut self, highlights: &HighlightConfig) -> Result<Profile, EvaluationError> {
        let instrument_ref = self.instrument.reference();

        for dimension in &self.instrument.dimensions {
            let scored = self.dimensions.iter().any(|d| d.dimension == dimension.id);
            let failed = self.failures.iter().any(|f| f.dimension == dimension.id);
            if !scored && !failed {
                self.failures.push(DimensionFailure {
                    dimension: dimension.id.clone(),
                    mandatory: dimension.mandatory,
                    error: DimensionError::IncompleteDimension {
                        instrument: instrument_ref.clone(),
                        dimension: dimension.id.clone(),
                    },
                });
            }
        }

        if self.failures.iter().any(|f| f.mandatory) {
            return Err(EvaluationError::IncompleteProfile {
                instrument: instrument_ref,
                failures: self.failures,
            });
        }

        let mut composites = Vec::new();
        let mut unavailable_composites = Vec::new();
        for composite in &self.instrument.composites {
            match compute_composite(composite, &self.dimensions) {
                Some(result) => composites.push(result),
                None => unavailable_composites.push(composite.id.clone()),
            }
        }

        let summary = summarize(
            &self.dimensions,
            self.items_answered,
            self.instrument.items.len(),
            highlights,
        );

        Ok(Profile {
            respondent: self.respondent,
            instrument: instrument_ref,
            stratum: self.stratum,
            evaluated_at: self.evaluated_at,
            dimensions: self.dimensions,
            composites,
            failures: self.failures,
            unavailable_composites,
            summary,
        })
    }
}
