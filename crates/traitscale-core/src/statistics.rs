//! Profile summary statistics: completion, mean percentile and highlights.

use serde::{Deserialize, Serialize};

use crate::profile::DimensionResult;

/// Percentile thresholds that mark a dimension as a strength or development area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightConfig {
    /// Dimensions at or above this percentile are strengths.
    #[serde(default = "default_strength_percentile")]
    pub strength_percentile: f64,
    /// Dimensions at or below this percentile are development areas.
    #[serde(default = "default_development_percentile")]
    pub development_percentile: f64,
    /// Maximum entries per list.
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_strength_percentile() -> f64 {
    75.0
}

fn default_development_percentile() -> f64 {
    25.0
}

fn default_limit() -> usize {
    3
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            strength_percentile: default_strength_percentile(),
            development_percentile: default_development_percentile(),
            limit: default_limit(),
        }
    }
}

/// Instrument-independent summary of a profile. Identifiers only, no prose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSummary {
    /// Answered items as a percentage of the instrument's items, one decimal.
    pub completion_rate: f64,
    /// Mean percentile over scored dimensions.
    pub mean_percentile: Option<f64>,
    /// Highest-percentile dimensions first.
    pub strengths: Vec<String>,
    /// Lowest-percentile dimensions first.
    pub development_areas: Vec<String>,
}

/// Percentage of answered items, rounded to one decimal.
pub fn completion_rate(answered: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let rate = answered as f64 / total as f64 * 100.0;
    (rate * 10.0).round() / 10.0
}

/// Summarize scored dimensions. Ties keep instrument order.
pub fn summarize(
    dimensions: &[DimensionResult],
    items_answered: usize,
    items_total: usize,
    config: &HighlightConfig,
) -> ProfileSummary {
    let mean_percentile = if dimensions.is_empty() {
        None
    } else {
        Some(dimensions.iter().map(|d| d.percentile).sum::<f64>() / dimensions.len() as f64)
    };

    let mut strong: Vec<&DimensionResult> = dimensions
        .iter()
        .filter(|d| d.percentile >= config.strength_percentile)
        .collect();
    strong.sort_by(|a, b| b.percentile.total_cmp(&a.percentile));

    let mut weak: Vec<&DimensionResult> = dimensions
        .iter()
        .filter(|d| d.percentile <= config.development_percentile)
        .collect();
    weak.sort_by(|a, b| a.percentile.total_cmp(&b.percentile));

    ProfileSummary {
        completion_rate: completion_rate(items_answered, items_total),
        mean_percentile,
        strengths: strong
            .into_iter()
            .take(config.limit)
            .map(|d| d.dimension.clone())
            .collect(),
        development_areas: weak
            .into_iter()
            .take(config.limit)
            .map(|d| d.dimension.clone())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::banding::Band;
    use crate::model::Stratum;
    use crate::standardize::AnchorPosition;

    fn result(id: &str, percentile: f64) -> DimensionResult {
        DimensionResult {
            dimension: id.into(),
            name: id.into(),
            raw_score: 0.0,
            percentile,
            standard_score: 50.0,
            band: Band {
                label: "average".into(),
                ordinal: 1,
            },
            items_answered: 1,
            items_expected: 1,
            norm_stratum: Stratum::new("general"),
            norm_fallback: false,
            anchor_position: AnchorPosition::Exact,
        }
    }

    #[test]
    fn completion_rate_rounds_to_one_decimal() {
        assert_eq!(completion_rate(2, 3), 66.7);
        assert_eq!(completion_rate(3, 3), 100.0);
        assert_eq!(completion_rate(0, 0), 0.0);
    }

    #[test]
    fn highlights_are_ordered_and_limited() {
        let dims = vec![
            result("a", 80.0),
            result("b", 95.0),
            result("c", 10.0),
            result("d", 76.0),
            result("e", 20.0),
            result("f", 90.0),
        ];
        let config = HighlightConfig {
            limit: 2,
            ..Default::default()
        };
        let summary = summarize(&dims, 10, 12, &config);
        assert_eq!(summary.strengths, vec!["b", "f"]);
        assert_eq!(summary.development_areas, vec!["c", "e"]);
        assert_eq!(summary.completion_rate, 83.3);
    }

    #[test]
    fn ties_keep_instrument_order() {
        let dims = vec![result("x", 80.0), result("y", 80.0)];
        let summary = summarize(&dims, 1, 1, &HighlightConfig::default());
        assert_eq!(summary.strengths, vec!["x", "y"]);
    }

    #[test]
    fn empty_profile_has_no_mean() {
        let summary = summarize(&[], 0, 4, &HighlightConfig::default());
        assert_eq!(summary.mean_percentile, None);
        assert!(summary.strengths.is_empty());
    }
}
