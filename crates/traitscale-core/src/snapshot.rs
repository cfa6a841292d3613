//! Immutable reference-data snapshots and their atomic publication.
//!
//! A snapshot is checked once when it is built. Evaluations hold an
//! `Arc<ReferenceSnapshot>` for their whole lifetime, so publishing a new
//! snapshot never affects an evaluation already in flight.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::Context;
use chrono::{DateTime, Utc};

use crate::engine::{Evaluator, EvaluatorConfig};
use crate::error::{DefinitionError, DefinitionIssue};
use crate::model::{Aggregation, CutPoint, Instrument, InstrumentRef, ValueDomain};
use crate::norms::{NormLibrary, NormTable};
use crate::traits::ReferenceDataProvider;

/// Instruments and norm tables as one consistent, read-only version.
#[derive(Debug, Clone)]
pub struct ReferenceSnapshot {
    label: String,
    loaded_at: DateTime<Utc>,
    instruments: BTreeMap<InstrumentRef, Instrument>,
    norms: NormLibrary,
}

impl ReferenceSnapshot {
    /// Check and assemble a snapshot, rejecting it if any definition is defective.
    pub fn build(
        label: impl Into<String>,
        instruments: Vec<Instrument>,
        norm_tables: Vec<NormTable>,
    ) -> Result<Self, DefinitionError> {
        let issues = inspect(&instruments, &norm_tables);
        if !issues.is_empty() {
            return Err(DefinitionError { issues });
        }

        let instruments: BTreeMap<InstrumentRef, Instrument> = instruments
            .into_iter()
            .map(|instrument| (instrument.reference(), instrument))
            .collect();
        let mut norms = NormLibrary::new();
        for table in norm_tables {
            norms.insert(table);
        }

        Ok(Self {
            label: label.into(),
            loaded_at: Utc::now(),
            instruments,
            norms,
        })
    }

    /// A snapshot with no instruments.
    pub fn empty() -> Self {
        Self {
            label: "empty".to_string(),
            loaded_at: Utc::now(),
            instruments: BTreeMap::new(),
            norms: NormLibrary::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn instrument(&self, reference: &InstrumentRef) -> Option<&Instrument> {
        self.instruments.get(reference)
    }

    pub fn instruments(&self) -> impl Iterator<Item = &Instrument> {
        self.instruments.values()
    }

    pub fn norms(&self) -> &NormLibrary {
        &self.norms
    }

    /// Non-fatal gaps: dimensions without cut points or without any norm table.
    ///
    /// These load fine but fail at evaluation time with `MissingBandConfig` or
    /// `NormTableNotFound`.
    pub fn coverage_warnings(&self) -> Vec<DefinitionIssue> {
        let mut warnings = Vec::new();
        for instrument in self.instruments.values() {
            let reference = instrument.reference();
            for dimension in &instrument.dimensions {
                let subject = format!("{reference}/{}", dimension.id);
                if dimension.bands.is_empty() {
                    warnings.push(DefinitionIssue::new(&subject, "no band cut points configured"));
                }
                let has_table = self
                    .norms
                    .iter()
                    .any(|table| table.instrument == reference && table.dimension == dimension.id);
                if !has_table {
                    warnings.push(DefinitionIssue::new(&subject, "no norm table in any stratum"));
                }
            }
        }
        warnings
    }
}

/// Check instruments and norm tables together, returning every issue found.
pub fn inspect(instruments: &[Instrument], norm_tables: &[NormTable]) -> Vec<DefinitionIssue> {
    let mut issues = Vec::new();

    let mut seen_instruments = HashSet::new();
    for instrument in instruments {
        if !seen_instruments.insert(instrument.reference()) {
            issues.push(DefinitionIssue::new(
                instrument.reference().to_string(),
                "duplicate instrument version",
            ));
        }
        issues.extend(inspect_instrument(instrument));
    }

    let mut seen_tables = HashSet::new();
    for table in norm_tables {
        if !seen_tables.insert(table.key()) {
            issues.push(DefinitionIssue::new(
                format!("norms {}", table.key()),
                "duplicate norm table",
            ));
        }
        let instrument = instruments
            .iter()
            .find(|i| i.reference() == table.instrument);
        issues.extend(inspect_norm_table(table, instrument));
    }

    issues
}

/// Structural checks of one instrument definition.
pub fn inspect_instrument(instrument: &Instrument) -> Vec<DefinitionIssue> {
    let reference = instrument.reference();
    let mut issues = Vec::new();
    let mut push = |subject: String, message: String| issues.push(DefinitionIssue::new(subject, message));

    if instrument.id.trim().is_empty() || instrument.version.trim().is_empty() {
        push(reference.to_string(), "instrument id and version must be non-empty".into());
    }

    let mut dimension_ids = HashSet::new();
    for dimension in &instrument.dimensions {
        if !dimension_ids.insert(dimension.id.as_str()) {
            push(format!("{reference}/{}", dimension.id), "duplicate dimension id".into());
        }
    }

    let mut item_ids = HashSet::new();
    for item in &instrument.items {
        let subject = format!("{reference}#{}", item.id);
        if !item_ids.insert(item.id.as_str()) {
            push(subject.clone(), "duplicate item id".into());
        }
        if item.loadings.is_empty() {
            push(subject.clone(), "item loads onto no dimension".into());
        }
        let mut loaded = HashSet::new();
        for loading in &item.loadings {
            if !loaded.insert(loading.dimension.as_str()) {
                push(subject.clone(), format!("duplicate loading onto dimension {}", loading.dimension));
            }
            if !dimension_ids.contains(loading.dimension.as_str()) {
                push(subject.clone(), format!("unknown dimension {}", loading.dimension));
            }
            if !(loading.weight.is_finite() && loading.weight > 0.0) {
                push(subject.clone(), format!("weight {} must be positive", loading.weight));
            }
        }
        match &item.domain {
            ValueDomain::Scale { min, max } if min >= max => {
                push(subject.clone(), format!("empty or inverted scale {min}..={max}"));
            }
            ValueDomain::Choice { options } => {
                if options.is_empty() {
                    push(subject.clone(), "choice domain has no options".into());
                }
                let mut option_ids = HashSet::new();
                for option in options {
                    if !option_ids.insert(option.id.as_str()) {
                        push(subject.clone(), format!("duplicate option {}", option.id));
                    }
                    if !option.value.is_finite() {
                        push(subject.clone(), format!("option {} has a non-finite value", option.id));
                    }
                    for (dimension, score) in &option.scores {
                        if !loaded.contains(dimension.as_str()) {
                            push(
                                subject.clone(),
                                format!("option {} scores dimension {dimension} the item does not load onto", option.id),
                            );
                        }
                        if !score.is_finite() {
                            push(
                                subject.clone(),
                                format!("option {} has a non-finite score for {dimension}", option.id),
                            );
                        }
                    }
                }
            }
            ValueDomain::Scale { .. } => {}
        }
    }

    for dimension in &instrument.dimensions {
        let subject = format!("{reference}/{}", dimension.id);
        let range = dimension.raw_range;
        if !(range.min.is_finite() && range.max.is_finite()) || range.min > range.max {
            push(subject.clone(), format!("invalid raw range {}..={}", range.min, range.max));
        }

        let contributions: Vec<((f64, f64), f64)> = instrument
            .items_for(&dimension.id)
            .map(|(item, weight)| (item.domain.bounds_for(&dimension.id), weight))
            .collect();
        if contributions.is_empty() {
            push(subject.clone(), "no items load onto this dimension".into());
        } else {
            let (lowest, highest) = theoretical_range(dimension.aggregation, &contributions);
            if !(range.contains(lowest) && range.contains(highest)) {
                push(
                    subject.clone(),
                    format!(
                        "declared raw range {}..={} does not contain attainable range {lowest}..={highest}",
                        range.min, range.max
                    ),
                );
            }
        }

        if let Some(message) = cut_point_issue(&dimension.bands) {
            push(subject, message);
        }
    }

    for composite in &instrument.composites {
        let subject = format!("{reference}/{}", composite.id);
        if composite.components.is_empty() {
            push(subject.clone(), "composite has no components".into());
        }
        for component in &composite.components {
            if !dimension_ids.contains(component.dimension.as_str()) {
                push(subject.clone(), format!("unknown dimension {}", component.dimension));
            }
            if !(component.weight.is_finite() && component.weight > 0.0) {
                push(subject.clone(), format!("weight {} must be positive", component.weight));
            }
        }
        if let Some(message) = cut_point_issue(&composite.bands) {
            push(subject, message);
        }
    }

    issues
}

fn theoretical_range(aggregation: Aggregation, contributions: &[((f64, f64), f64)]) -> (f64, f64) {
    match aggregation {
        Aggregation::Sum => contributions
            .iter()
            .fold((0.0, 0.0), |(lo, hi), ((min, max), w)| (lo + w * min, hi + w * max)),
        Aggregation::Mean => contributions.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY),
            |(lo, hi), ((min, max), _)| (lo.min(*min), hi.max(*max)),
        ),
    }
}

fn cut_point_issue(cuts: &[CutPoint]) -> Option<String> {
    if cuts.iter().any(|cut| !cut.threshold.is_finite()) {
        return Some("band thresholds must be finite".into());
    }
    cuts.windows(2)
        .find(|pair| pair[1].threshold <= pair[0].threshold)
        .map(|pair| {
            format!(
                "band thresholds must ascend strictly ({} {} then {} {})",
                pair[0].label, pair[0].threshold, pair[1].label, pair[1].threshold
            )
        })
}

/// Checks of one norm table against the instrument it claims to norm.
pub fn inspect_norm_table(table: &NormTable, instrument: Option<&Instrument>) -> Vec<DefinitionIssue> {
    let subject = format!("norms {}", table.key());
    let mut issues = Vec::new();

    let Some(instrument) = instrument else {
        issues.push(DefinitionIssue::new(
            subject,
            format!("unknown instrument {}", table.instrument),
        ));
        return issues;
    };
    let Some(dimension) = instrument.dimension(&table.dimension) else {
        issues.push(DefinitionIssue::new(
            subject,
            format!("unknown dimension {}", table.dimension),
        ));
        return issues;
    };
    let (Some(first), Some(last)) = (table.anchors.first(), table.anchors.last()) else {
        issues.push(DefinitionIssue::new(subject, "norm table has no anchors"));
        return issues;
    };

    for anchor in &table.anchors {
        if !(anchor.raw.is_finite() && anchor.standard.is_finite()) {
            issues.push(DefinitionIssue::new(&subject, "anchors must be finite"));
        }
        if !(0.0..=100.0).contains(&anchor.percentile) {
            issues.push(DefinitionIssue::new(
                &subject,
                format!("percentile {} at raw {} is outside 0..=100", anchor.percentile, anchor.raw),
            ));
        }
    }

    for pair in table.anchors.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if b.raw <= a.raw {
            issues.push(DefinitionIssue::new(
                &subject,
                format!("raw anchors must ascend strictly ({} then {})", a.raw, b.raw),
            ));
        }
        if b.percentile < a.percentile || b.standard < a.standard {
            issues.push(DefinitionIssue::new(
                &subject,
                format!("standardized scores decrease between raw {} and {}", a.raw, b.raw),
            ));
        }
    }

    let range = dimension.raw_range;
    if first.raw > range.min || last.raw < range.max {
        issues.push(DefinitionIssue::new(
            &subject,
            format!(
                "anchors {}..={} do not cover raw range {}..={}",
                first.raw, last.raw, range.min, range.max
            ),
        ));
    }

    issues
}

/// Holds the published snapshot and swaps it atomically.
pub struct SnapshotRegistry {
    current: RwLock<Arc<ReferenceSnapshot>>,
}

impl SnapshotRegistry {
    pub fn new(snapshot: ReferenceSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// The snapshot published at the time of the call.
    pub fn current(&self) -> Arc<ReferenceSnapshot> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Install `snapshot` as the current version and return it.
    pub fn publish(&self, snapshot: ReferenceSnapshot) -> Arc<ReferenceSnapshot> {
        let snapshot = Arc::new(snapshot);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::clone(&snapshot);
        drop(guard);

        tracing::info!(
            label = snapshot.label(),
            instruments = snapshot.instruments.len(),
            norm_tables = snapshot.norms.len(),
            "published reference snapshot"
        );
        snapshot
    }

    /// Load a fresh snapshot from `provider` and publish it.
    ///
    /// On failure the previously published snapshot stays current.
    pub fn reload(&self, provider: &dyn ReferenceDataProvider) -> anyhow::Result<Arc<ReferenceSnapshot>> {
        let snapshot = provider
            .load()
            .with_context(|| format!("failed to load reference data from {}", provider.name()))?;
        Ok(self.publish(snapshot))
    }

    /// An evaluator bound to the current snapshot for its whole lifetime.
    pub fn evaluator(&self, config: EvaluatorConfig) -> Evaluator {
        Evaluator::new(self.current(), config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        ChoiceOption, Dimension, Item, ItemLoading, Polarity, RawRange, ScoreBasis, Stratum,
    };
    use crate::norms::NormAnchor;

    fn item(id: &str, dimension: &str) -> Item {
        Item {
            id: id.into(),
            text: String::new(),
            domain: ValueDomain::Scale { min: 1, max: 5 },
            loadings: vec![ItemLoading {
                dimension: dimension.into(),
                weight: 1.0,
            }],
            polarity: Polarity::Direct,
            required: true,
        }
    }

    fn instrument() -> Instrument {
        Instrument {
            id: "demo".into(),
            version: "1.0.0".into(),
            name: "Demo".into(),
            description: String::new(),
            default_stratum: Some(Stratum::new("general")),
            items: vec![item("E1", "extraversion"), item("E2", "extraversion")],
            dimensions: vec![Dimension {
                id: "extraversion".into(),
                name: "Extraversion".into(),
                description: String::new(),
                raw_range: RawRange { min: 2.0, max: 10.0 },
                aggregation: Aggregation::Sum,
                mandatory: true,
                band_basis: ScoreBasis::Standard,
                bands: vec![
                    CutPoint { threshold: 0.0, label: "low".into() },
                    CutPoint { threshold: 50.0, label: "high".into() },
                ],
            }],
            composites: vec![],
        }
    }

    fn table(anchors: Vec<NormAnchor>) -> NormTable {
        NormTable {
            instrument: InstrumentRef::new("demo", "1.0.0"),
            dimension: "extraversion".into(),
            stratum: Stratum::new("general"),
            anchors,
        }
    }

    fn good_table() -> NormTable {
        table(vec![
            NormAnchor::new(2.0, 1.0, 30.0),
            NormAnchor::new(6.0, 10.0, 40.0),
            NormAnchor::new(10.0, 50.0, 50.0),
        ])
    }

    #[test]
    fn builds_clean_snapshot() {
        let snapshot = ReferenceSnapshot::build("test", vec![instrument()], vec![good_table()]).unwrap();
        assert!(snapshot.instrument(&InstrumentRef::new("demo", "1.0.0")).is_some());
        assert_eq!(snapshot.norms().len(), 1);
        assert!(snapshot.coverage_warnings().is_empty());
    }

    #[test]
    fn rejects_unordered_and_uncovering_anchors() {
        let bad = table(vec![NormAnchor::new(6.0, 10.0, 40.0), NormAnchor::new(4.0, 50.0, 50.0)]);
        let err = ReferenceSnapshot::build("test", vec![instrument()], vec![bad]).unwrap_err();
        let messages: Vec<&str> = err.issues.iter().map(|i| i.message.as_str()).collect();
        assert!(messages.iter().any(|m| m.contains("ascend strictly")));
        assert!(messages.iter().any(|m| m.contains("do not cover")));
    }

    #[test]
    fn rejects_decreasing_and_out_of_range_percentiles() {
        let bad = table(vec![
            NormAnchor::new(2.0, 50.0, 30.0),
            NormAnchor::new(10.0, 120.0, 20.0),
        ]);
        let issues = inspect_norm_table(&bad, Some(&instrument()));
        assert!(issues.iter().any(|i| i.message.contains("outside 0..=100")));
        assert!(issues.iter().any(|i| i.message.contains("decrease")));
    }

    #[test]
    fn rejects_broken_instrument_definitions() {
        let mut inst = instrument();
        inst.items.push(item("E1", "missing"));
        inst.items.push(Item {
            domain: ValueDomain::Choice {
                options: vec![
                    ChoiceOption::new("A", 1.0),
                    ChoiceOption::new("A", 2.0),
                ],
            },
            ..item("E3", "extraversion")
        });
        inst.dimensions[0].bands.reverse();
        let issues = inspect_instrument(&inst);
        let messages: Vec<&str> = issues.iter().map(|i| i.message.as_str()).collect();
        assert!(messages.contains(&"duplicate item id"));
        assert!(messages.iter().any(|m| m.contains("unknown dimension missing")));
        assert!(messages.iter().any(|m| m.contains("duplicate option A")));
        assert!(messages.iter().any(|m| m.contains("does not contain attainable range")));
        assert!(messages.iter().any(|m| m.contains("ascend strictly")));
    }

    #[test]
    fn fractional_weights_fit_declared_range() {
        let mut inst = instrument();
        inst.items = ["E1", "E2", "E3"]
            .into_iter()
            .map(|id| Item {
                domain: ValueDomain::Scale { min: 1, max: 3 },
                loadings: vec![ItemLoading {
                    dimension: "extraversion".into(),
                    weight: 0.7,
                }],
                ..item(id, "extraversion")
            })
            .collect();
        inst.dimensions[0].raw_range = RawRange { min: 2.1, max: 6.3 };
        assert_eq!(inspect_instrument(&inst), vec![]);

        inst.dimensions[0].raw_range = RawRange { min: 2.2, max: 6.3 };
        assert_eq!(inspect_instrument(&inst).len(), 1);
    }

    #[test]
    fn rejects_repeated_loading_onto_one_dimension() {
        let mut inst = instrument();
        inst.items[1].loadings.push(ItemLoading {
            dimension: "extraversion".into(),
            weight: 1.0,
        });
        let issues = inspect_instrument(&inst);
        assert!(issues
            .iter()
            .any(|i| i.subject == "demo@1.0.0#E2" && i.message == "duplicate loading onto dimension extraversion"));
    }

    #[test]
    fn option_scores_must_target_loaded_dimensions() {
        let mut option = ChoiceOption::new("A", 1.0);
        option.scores.insert("openness".into(), 4.0);
        option.scores.insert("extraversion".into(), f64::NAN);
        let mut inst = instrument();
        inst.items[1].domain = ValueDomain::Choice {
            options: vec![option, ChoiceOption::new("B", 5.0)],
        };
        let messages: Vec<String> = inspect_instrument(&inst).into_iter().map(|i| i.message).collect();
        assert!(messages
            .iter()
            .any(|m| m == "option A scores dimension openness the item does not load onto"));
        assert!(messages
            .iter()
            .any(|m| m == "option A has a non-finite score for extraversion"));
    }

    #[test]
    fn table_for_unknown_instrument_is_rejected() {
        let mut orphan = good_table();
        orphan.instrument = InstrumentRef::new("other", "1.0.0");
        let err = ReferenceSnapshot::build("test", vec![instrument()], vec![orphan]).unwrap_err();
        assert!(err.issues[0].message.contains("unknown instrument"));
    }

    #[test]
    fn missing_bands_and_norms_are_warnings_only() {
        let mut inst = instrument();
        inst.dimensions[0].bands.clear();
        let snapshot = ReferenceSnapshot::build("test", vec![inst], vec![]).unwrap();
        let warnings = snapshot.coverage_warnings();
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn publish_swaps_without_touching_held_snapshots() {
        let registry = SnapshotRegistry::new(ReferenceSnapshot::empty());
        let held = registry.current();
        let next = ReferenceSnapshot::build("v2", vec![instrument()], vec![good_table()]).unwrap();
        registry.publish(next);

        assert_eq!(held.label(), "empty");
        assert_eq!(held.instruments().count(), 0);
        assert_eq!(registry.current().label(), "v2");
    }

    struct FailingProvider;

    impl ReferenceDataProvider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }

        fn load(&self) -> anyhow::Result<ReferenceSnapshot> {
            anyhow::bail!("store offline")
        }
    }

    #[test]
    fn failed_reload_keeps_current_snapshot() {
        let registry = SnapshotRegistry::new(
            ReferenceSnapshot::build("v1", vec![instrument()], vec![good_table()]).unwrap(),
        );
        let err = registry.reload(&FailingProvider).unwrap_err();
        assert!(format!("{err:#}").contains("store offline"));
        assert_eq!(registry.current().label(), "v1");
    }
}
