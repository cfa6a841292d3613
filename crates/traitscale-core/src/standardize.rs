//! Raw-to-standardized conversion by linear interpolation over norm anchors.
//!
//! The norm table is the source of truth: standard scores are read or
//! interpolated from it, never derived from a parametric distribution.

use serde::{Deserialize, Serialize};

use crate::norms::NormAnchor;

/// Where a raw score fell relative to the table's anchors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorPosition {
    /// Equal to a tabulated raw score.
    Exact,
    /// Between two anchors.
    Interpolated,
    /// Below the lowest anchor; clamped to it.
    ClampedLow,
    /// Above the highest anchor; clamped to it.
    ClampedHigh,
}

/// Standardized outputs for one raw score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Standardized {
    /// Percentile rank in `[0, 100]`.
    pub percentile: f64,
    /// Standard score on the table's own scale.
    pub standard: f64,
    pub position: AnchorPosition,
}

/// Standardize `raw` against ascending `anchors`.
///
/// Returns `None` only for an empty table, which snapshot checks never admit.
pub fn standardize(anchors: &[NormAnchor], raw: f64) -> Option<Standardized> {
    let first = anchors.first()?;
    let last = anchors.last()?;

    if raw < first.raw {
        return Some(at_anchor(first, AnchorPosition::ClampedLow));
    }
    if raw > last.raw {
        return Some(at_anchor(last, AnchorPosition::ClampedHigh));
    }

    // First anchor whose raw score is >= `raw`; in bounds after the checks above.
    let idx = anchors.partition_point(|anchor| anchor.raw < raw);
    let upper = anchors.get(idx)?;
    if upper.raw == raw || idx == 0 {
        return Some(at_anchor(upper, AnchorPosition::Exact));
    }
    let lower = &anchors[idx - 1];

    let t = (raw - lower.raw) / (upper.raw - lower.raw);
    Some(Standardized {
        percentile: clamp_percentile(lerp(lower.percentile, upper.percentile, t)),
        standard: lerp(lower.standard, upper.standard, t),
        position: AnchorPosition::Interpolated,
    })
}

fn at_anchor(anchor: &NormAnchor, position: AnchorPosition) -> Standardized {
    Standardized {
        percentile: clamp_percentile(anchor.percentile),
        standard: anchor.standard,
        position,
    }
}

fn lerp(from: f64, to: f64, t: f64) -> f64 {
    from + t * (to - from)
}

fn clamp_percentile(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}
