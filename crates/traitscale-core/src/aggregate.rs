//! Raw score aggregation per dimension.

use crate::error::DimensionError;
use crate::model::{Aggregation, Dimension, Instrument, Item, Polarity, ValueDomain};
use crate::response::{ValidatedAnswer, ValidatedResponses};

/// Unstandardized score of one dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct RawScore {
    pub dimension: String,
    pub value: f64,
    pub items_answered: usize,
    pub items_expected: usize,
}

/// Mirror a value across its domain: `(max + min) - value`.
///
/// Applying it twice with the same bounds returns the original value.
pub fn reverse_score(value: f64, min: f64, max: f64) -> f64 {
    (max + min) - value
}

/// Value an answer contributes to `dimension`, before reverse scoring.
///
/// Choice options may score each dimension differently; everything else
/// contributes its canonical value.
fn item_value(item: &Item, dimension: &str, answer: &ValidatedAnswer) -> f64 {
    match (&item.domain, answer.option.as_deref()) {
        (ValueDomain::Choice { options }, Some(chosen)) => options
            .iter()
            .find(|o| o.id == chosen)
            .map_or(answer.value, |o| o.score_for(dimension)),
        _ => answer.value,
    }
}

/// Aggregate the validated responses loading onto `dimension`.
///
/// `Sum` is prorated by `total_weight / answered_weight` when optional items
/// are unanswered; with every item answered the factor is exactly one.
pub fn aggregate_dimension(
    instrument: &Instrument,
    dimension: &Dimension,
    responses: &ValidatedResponses,
) -> Result<RawScore, DimensionError> {
    let mut weighted_sum = 0.0;
    let mut answered_weight = 0.0;
    let mut total_weight = 0.0;
    let mut items_answered = 0;
    let mut items_expected = 0;

    for (item, weight) in instrument.items_for(&dimension.id) {
        items_expected += 1;
        total_weight += weight;

        let Some(answer) = responses.answer(&item.id) else {
            continue;
        };
        let value = item_value(item, &dimension.id, answer);
        let scored = match item.polarity {
            Polarity::Direct => value,
            Polarity::Reverse => {
                let (min, max) = item.domain.bounds_for(&dimension.id);
                reverse_score(value, min, max)
            }
        };
        weighted_sum += weight * scored;
        answered_weight += weight;
        items_answered += 1;
    }

    if items_answered == 0 || answered_weight <= 0.0 {
        return Err(DimensionError::IncompleteDimension {
            instrument: instrument.reference(),
            dimension: dimension.id.clone(),
        });
    }

    let value = match dimension.aggregation {
        Aggregation::Sum if items_answered == items_expected => weighted_sum,
        Aggregation::Sum => weighted_sum * (total_weight / answered_weight),
        Aggregation::Mean => weighted_sum / answered_weight,
    };

    if !dimension.raw_range.contains(value) {
        return Err(DimensionError::RawScoreOutOfRange {
            instrument: instrument.reference(),
            dimension: dimension.id.clone(),
            raw: value,
            min: dimension.raw_range.min,
            max: dimension.raw_range.max,
        });
    }

    tracing::debug!(
        instrument = %instrument.reference(),
        dimension = %dimension.id,
        raw = value,
        items_answered,
        items_expected,
        "aggregated raw score"
    );

    Ok(RawScore {
        dimension: dimension.id.clone(),
        value,
        items_answered,
        items_expected,
    })
}
