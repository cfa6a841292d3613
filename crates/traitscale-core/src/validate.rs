//! Item response validation.
//!
//! Checks completeness, value domains and item membership in one pass and
//! coerces every accepted value to its canonical numeric form. Coercion
//! happens here only; later stages read `ValidatedResponses`.

use std::collections::BTreeMap;

use crate::error::{ValidationError, ValidationIssue};
use crate::model::{Instrument, ValueDomain};
use crate::response::{ResponseSet, ResponseValue, ValidatedAnswer, ValidatedResponses};

/// Validate `responses` against `instrument`, reporting every offending item.
pub fn validate_responses(
    instrument: &Instrument,
    responses: &ResponseSet,
) -> Result<ValidatedResponses, ValidationError> {
    let mut issues = Vec::new();
    let mut values = BTreeMap::new();

    for item in &instrument.items {
        match responses.answers.get(&item.id) {
            Some(value) => match accept(&item.domain, value) {
                Some(answer) => {
                    values.insert(item.id.clone(), answer);
                }
                None => issues.push(ValidationIssue::OutOfDomain {
                    item: item.id.clone(),
                    value: value.clone(),
                    domain: item.domain.clone(),
                }),
            },
            None if item.required => issues.push(ValidationIssue::MissingResponse {
                item: item.id.clone(),
            }),
            None => {}
        }
    }

    for item_id in responses.answers.keys() {
        if instrument.item(item_id).is_none() {
            issues.push(ValidationIssue::UnknownItem {
                item: item_id.clone(),
            });
        }
    }

    if issues.is_empty() {
        Ok(ValidatedResponses::new(values))
    } else {
        Err(ValidationError {
            instrument: instrument.reference(),
            issues,
        })
    }
}

/// Coerce a submitted value into `domain`, or `None` if it does not belong there.
pub fn coerce(domain: &ValueDomain, value: &ResponseValue) -> Option<f64> {
    accept(domain, value).map(|answer| answer.value)
}

fn accept(domain: &ValueDomain, value: &ResponseValue) -> Option<ValidatedAnswer> {
    match domain {
        ValueDomain::Scale { min, max } => {
            let number = match value {
                ResponseValue::Number(n) => *n,
                ResponseValue::Text(s) => s.trim().parse::<f64>().ok()?,
            };
            let integral = number.is_finite() && number.fract() == 0.0;
            (integral && number >= f64::from(*min) && number <= f64::from(*max)).then_some(
                ValidatedAnswer {
                    value: number,
                    option: None,
                },
            )
        }
        ValueDomain::Choice { options } => {
            let chosen = match value {
                ResponseValue::Text(s) => {
                    let wanted = s.trim();
                    options.iter().find(|o| o.id == wanted)
                }
                ResponseValue::Number(n) => options.iter().find(|o| o.value == *n),
            }?;
            Some(ValidatedAnswer {
                value: chosen.value,
                option: Some(chosen.id.clone()),
            })
        }
    }
}
