//! Evaluation engine. Runs one response set through the scoring pipeline.
//!
//! An [`Evaluator`] is bound to a single [`ReferenceSnapshot`]; every stage of
//! an evaluation reads that snapshot and nothing else, so results are a pure
//! function of (responses, snapshot, configuration, timestamp).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::aggregate_dimension;
use crate::banding::classify_dimension;
use crate::error::{DimensionError, EvaluationError};
use crate::model::{Dimension, Instrument, Stratum};
use crate::profile::{DimensionResult, Profile, ProfileBuilder};
use crate::response::{ResponseSet, ValidatedResponses};
use crate::snapshot::ReferenceSnapshot;
use crate::standardize::standardize;
use crate::statistics::HighlightConfig;
use crate::validate::validate_responses;

/// Engine-wide evaluation settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    #[serde(default)]
    pub highlights: HighlightConfig,
    /// Used when an instrument declares no default stratum of its own.
    #[serde(default)]
    pub fallback_stratum: Option<Stratum>,
}

/// Scores response sets against one immutable snapshot.
#[derive(Debug, Clone)]
pub struct Evaluator {
    snapshot: Arc<ReferenceSnapshot>,
    config: EvaluatorConfig,
}

impl Evaluator {
    pub fn new(snapshot: Arc<ReferenceSnapshot>, config: EvaluatorConfig) -> Self {
        Self { snapshot, config }
    }

    pub fn snapshot(&self) -> &Arc<ReferenceSnapshot> {
        &self.snapshot
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Evaluate `responses` into a profile stamped with `evaluated_at`.
    ///
    /// The instrument version and stratum come from the response set. Optional
    /// dimensions that fail are recorded on the profile; a failed mandatory
    /// dimension fails the evaluation.
    pub fn evaluate(
        &self,
        responses: &ResponseSet,
        evaluated_at: DateTime<Utc>,
    ) -> Result<Profile, EvaluationError> {
        let Some(instrument) = self.snapshot.instrument(&responses.instrument) else {
            tracing::error!(
                respondent = %responses.respondent,
                instrument = %responses.instrument,
                snapshot = self.snapshot.label(),
                fault = "reference_data",
                "instrument not loaded"
            );
            return Err(EvaluationError::UnknownInstrument(responses.instrument.clone()));
        };

        let validated = validate_responses(instrument, responses).map_err(|e| {
            tracing::warn!(
                respondent = %responses.respondent,
                instrument = %responses.instrument,
                items = ?e.items(),
                fault = "input",
                "{e}"
            );
            e
        })?;

        let mut builder = ProfileBuilder::new(
            instrument,
            responses.respondent.clone(),
            responses.stratum.clone(),
            evaluated_at,
            validated.len(),
        );
        for dimension in &instrument.dimensions {
            let outcome = self.score_dimension(instrument, dimension, &validated, &responses.stratum);
            match &outcome {
                Err(e) if e.is_reference_data_fault() => tracing::error!(
                    instrument = %responses.instrument,
                    dimension = %dimension.id,
                    stratum = %responses.stratum,
                    mandatory = dimension.mandatory,
                    fault = "reference_data",
                    "{e}"
                ),
                Err(e) => tracing::warn!(
                    respondent = %responses.respondent,
                    dimension = %dimension.id,
                    mandatory = dimension.mandatory,
                    fault = "input",
                    "{e}"
                ),
                Ok(_) => {}
            }
            builder.record(outcome);
        }

        let profile = builder.build(&self.config.highlights)?;

        tracing::info!(
            respondent = %profile.respondent,
            instrument = %profile.instrument,
            stratum = %profile.stratum,
            dimensions = profile.dimensions.len(),
            failures = profile.failures.len(),
            "evaluated profile"
        );
        Ok(profile)
    }

    /// Stratum consulted when the respondent's own stratum has no table.
    fn fallback_for<'a>(&'a self, instrument: &'a Instrument) -> Option<&'a Stratum> {
        instrument
            .default_stratum
            .as_ref()
            .or(self.config.fallback_stratum.as_ref())
    }

    fn score_dimension(
        &self,
        instrument: &Instrument,
        dimension: &Dimension,
        validated: &ValidatedResponses,
        stratum: &Stratum,
    ) -> Result<DimensionResult, DimensionError> {
        let reference = instrument.reference();
        let raw = aggregate_dimension(instrument, dimension, validated)?;

        let resolved = self.snapshot.norms().resolve(
            &reference,
            &dimension.id,
            stratum,
            self.fallback_for(instrument),
        )?;
        let standardized = standardize(&resolved.table.anchors, raw.value).ok_or_else(|| {
            DimensionError::NormTableNotFound {
                instrument: reference.clone(),
                dimension: dimension.id.clone(),
                stratum: stratum.clone(),
                fallback: self.fallback_for(instrument).cloned(),
            }
        })?;
        let band = classify_dimension(&reference, dimension, &standardized)?;

        Ok(DimensionResult {
            dimension: dimension.id.clone(),
            name: dimension.name.clone(),
            raw_score: raw.value,
            percentile: standardized.percentile,
            standard_score: standardized.standard,
            band,
            items_answered: raw.items_answered,
            items_expected: raw.items_expected,
            norm_stratum: resolved.table.stratum.clone(),
            norm_fallback: resolved.fallback,
            anchor_position: standardized.position,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Aggregation, CutPoint, InstrumentRef, Item, ItemLoading, Polarity, RawRange, ScoreBasis,
        ValueDomain,
    };
    use crate::norms::{NormAnchor, NormTable};
    use crate::snapshot::SnapshotRegistry;
    use crate::standardize::AnchorPosition;
    use chrono::TimeZone;

    fn likert(id: &str, dimension: &str, polarity: Polarity, required: bool) -> Item {
        Item {
            id: id.into(),
            text: String::new(),
            domain: ValueDomain::Scale { min: 1, max: 5 },
            loadings: vec![ItemLoading {
                dimension: dimension.into(),
                weight: 1.0,
            }],
            polarity,
            required,
        }
    }

    fn dimension(id: &str, mandatory: bool, bands: Vec<CutPoint>) -> Dimension {
        Dimension {
            id: id.into(),
            name: id.into(),
            description: String::new(),
            raw_range: RawRange { min: 2.0, max: 10.0 },
            aggregation: Aggregation::Sum,
            mandatory,
            band_basis: ScoreBasis::Standard,
            bands,
        }
    }

    fn bands() -> Vec<CutPoint> {
        vec![
            CutPoint { threshold: 0.0, label: "low".into() },
            CutPoint { threshold: 45.0, label: "average".into() },
            CutPoint { threshold: 55.0, label: "high".into() },
        ]
    }

    fn instrument() -> Instrument {
        Instrument {
            id: "extraversion-mini".into(),
            version: "1.0.0".into(),
            name: "Extraversion (mini)".into(),
            description: String::new(),
            default_stratum: Some(Stratum::new("general")),
            items: vec![
                likert("E1", "extraversion", Polarity::Direct, true),
                likert("E2", "extraversion", Polarity::Reverse, true),
                likert("O1", "openness", Polarity::Direct, false),
                likert("O2", "openness", Polarity::Direct, false),
            ],
            dimensions: vec![
                dimension("extraversion", true, bands()),
                dimension("openness", false, bands()),
            ],
            composites: vec![],
        }
    }

    fn table(dimension: &str, stratum: &str) -> NormTable {
        NormTable {
            instrument: InstrumentRef::new("extraversion-mini", "1.0.0"),
            dimension: dimension.into(),
            stratum: Stratum::new(stratum),
            anchors: vec![
                NormAnchor::new(2.0, 1.0, 30.0),
                NormAnchor::new(6.0, 10.0, 40.0),
                NormAnchor::new(10.0, 50.0, 50.0),
                NormAnchor::new(14.0, 90.0, 60.0),
            ],
        }
    }

    fn evaluator(instrument: Instrument, tables: Vec<NormTable>) -> Evaluator {
        let snapshot = ReferenceSnapshot::build("test", vec![instrument], tables).unwrap();
        Evaluator::new(Arc::new(snapshot), EvaluatorConfig::default())
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn responses(stratum: &str) -> ResponseSet {
        ResponseSet::new(
            "resp-001",
            InstrumentRef::new("extraversion-mini", "1.0.0"),
            Stratum::new(stratum),
        )
        .with_answer("E1", 4)
        .with_answer("E2", 2)
        .with_answer("O1", 3)
        .with_answer("O2", 3)
    }

    #[test]
    fn scores_reverse_keyed_dimension() {
        let eval = evaluator(
            instrument(),
            vec![table("extraversion", "general"), table("openness", "general")],
        );
        let profile = eval.evaluate(&responses("general"), at()).unwrap();

        let e = profile.dimension("extraversion").unwrap();
        assert_eq!(e.raw_score, 8.0);
        assert_eq!(e.percentile, 30.0);
        assert_eq!(e.standard_score, 45.0);
        assert_eq!(e.band.label, "average");
        assert_eq!(e.anchor_position, AnchorPosition::Interpolated);
        assert!(!e.norm_fallback);
        assert!(profile.is_complete());
        assert_eq!(profile.evaluated_at, at());
    }

    #[test]
    fn evaluation_is_idempotent() {
        let eval = evaluator(
            instrument(),
            vec![table("extraversion", "general"), table("openness", "general")],
        );
        let first = eval.evaluate(&responses("general"), at()).unwrap();
        let second = eval.evaluate(&responses("general"), at()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_stratum_falls_back_to_default() {
        let eval = evaluator(
            instrument(),
            vec![table("extraversion", "general"), table("openness", "general")],
        );
        let profile = eval.evaluate(&responses("adult/18-29"), at()).unwrap();
        let e = profile.dimension("extraversion").unwrap();
        assert!(e.norm_fallback);
        assert_eq!(e.norm_stratum, Stratum::new("general"));
        assert_eq!(profile.stratum, Stratum::new("adult/18-29"));
    }

    #[test]
    fn unknown_instrument_version() {
        let eval = evaluator(instrument(), vec![table("extraversion", "general")]);
        let mut set = responses("general");
        set.instrument = InstrumentRef::new("extraversion-mini", "2.0.0");
        let err = eval.evaluate(&set, at()).unwrap_err();
        assert_eq!(
            err,
            EvaluationError::UnknownInstrument(InstrumentRef::new("extraversion-mini", "2.0.0"))
        );
        assert!(!err.is_input_fault());
    }

    #[test]
    fn validation_reports_every_offending_item() {
        let eval = evaluator(instrument(), vec![table("extraversion", "general")]);
        let set = ResponseSet::new(
            "resp-002",
            InstrumentRef::new("extraversion-mini", "1.0.0"),
            Stratum::new("general"),
        )
        .with_answer("E1", 9)
        .with_answer("X9", 1);
        match eval.evaluate(&set, at()).unwrap_err() {
            EvaluationError::Validation(v) => {
                assert_eq!(v.out_of_domain().collect::<Vec<_>>(), vec!["E1"]);
                assert_eq!(v.missing().collect::<Vec<_>>(), vec!["E2"]);
                assert_eq!(v.unknown().collect::<Vec<_>>(), vec!["X9"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn optional_dimension_without_answers_is_partial() {
        let eval = evaluator(
            instrument(),
            vec![table("extraversion", "general"), table("openness", "general")],
        );
        let set = ResponseSet::new(
            "resp-003",
            InstrumentRef::new("extraversion-mini", "1.0.0"),
            Stratum::new("general"),
        )
        .with_answer("E1", 4)
        .with_answer("E2", 2);
        let profile = eval.evaluate(&set, at()).unwrap();
        assert_eq!(profile.dimensions.len(), 1);
        assert_eq!(profile.failures[0].dimension, "openness");
        assert!(matches!(
            profile.failures[0].error,
            DimensionError::IncompleteDimension { .. }
        ));
        assert_eq!(profile.summary.completion_rate, 50.0);
    }

    #[test]
    fn optional_dimension_is_prorated_when_partially_answered() {
        let eval = evaluator(
            instrument(),
            vec![table("extraversion", "general"), table("openness", "general")],
        );
        let set = ResponseSet::new(
            "resp-004",
            InstrumentRef::new("extraversion-mini", "1.0.0"),
            Stratum::new("general"),
        )
        .with_answer("E1", 4)
        .with_answer("E2", 2)
        .with_answer("O1", 3);
        let profile = eval.evaluate(&set, at()).unwrap();
        let o = profile.dimension("openness").unwrap();
        assert_eq!(o.raw_score, 6.0);
        assert_eq!((o.items_answered, o.items_expected), (1, 2));
    }

    #[test]
    fn missing_norms_for_mandatory_dimension_fail_profile() {
        let eval = evaluator(instrument(), vec![table("openness", "general")]);
        match eval.evaluate(&responses("general"), at()).unwrap_err() {
            EvaluationError::IncompleteProfile { failures, .. } => {
                let failure = failures.iter().find(|f| f.dimension == "extraversion").unwrap();
                assert!(failure.mandatory);
                assert!(matches!(failure.error, DimensionError::NormTableNotFound { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_bands_on_optional_dimension_is_recorded() {
        let mut inst = instrument();
        inst.dimensions[1].bands.clear();
        let eval = evaluator(
            inst,
            vec![table("extraversion", "general"), table("openness", "general")],
        );
        let profile = eval.evaluate(&responses("general"), at()).unwrap();
        assert!(matches!(
            profile.failures[0].error,
            DimensionError::MissingBandConfig { .. }
        ));
    }

    #[test]
    fn config_fallback_applies_without_instrument_default() {
        let mut inst = instrument();
        inst.default_stratum = None;
        let snapshot = ReferenceSnapshot::build(
            "test",
            vec![inst],
            vec![table("extraversion", "general"), table("openness", "general")],
        )
        .unwrap();
        let registry = SnapshotRegistry::new(snapshot);

        let strict = registry.evaluator(EvaluatorConfig::default());
        assert!(strict.evaluate(&responses("retired"), at()).is_err());

        let lenient = registry.evaluator(EvaluatorConfig {
            fallback_stratum: Some(Stratum::new("general")),
            ..Default::default()
        });
        let profile = lenient.evaluate(&responses("retired"), at()).unwrap();
        assert!(profile.dimension("extraversion").unwrap().norm_fallback);
    }

    #[test]
    fn in_flight_evaluator_keeps_its_snapshot() {
        let registry = SnapshotRegistry::new(
            ReferenceSnapshot::build(
                "v1",
                vec![instrument()],
                vec![table("extraversion", "general"), table("openness", "general")],
            )
            .unwrap(),
        );
        let evaluator = registry.evaluator(EvaluatorConfig::default());
        registry.publish(ReferenceSnapshot::empty());

        assert!(evaluator.evaluate(&responses("general"), at()).is_ok());
        let fresh = registry.evaluator(EvaluatorConfig::default());
        assert!(matches!(
            fresh.evaluate(&responses("general"), at()),
            Err(EvaluationError::UnknownInstrument(_))
        ));
    }
}
