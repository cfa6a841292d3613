//! Classification of standardized scores into ordinal bands.

use serde::{Deserialize, Serialize};

use crate::error::DimensionError;
use crate::model::{CutPoint, Dimension, InstrumentRef, ScoreBasis};
use crate::standardize::Standardized;

/// An ordinal interpretive band; `ordinal` 0 is the lowest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Band {
    pub label: String,
    pub ordinal: usize,
}

/// Pick the band whose threshold is the greatest one `<= score`.
///
/// Thresholds are inclusive lower bounds and ascending; the first band also
/// covers every score below the second threshold.
pub fn classify(cuts: &[CutPoint], score: f64) -> Option<Band> {
    if cuts.is_empty() {
        return None;
    }
    let reached = cuts.partition_point(|cut| cut.threshold <= score);
    let ordinal = reached.saturating_sub(1);
    Some(Band {
        label: cuts[ordinal].label.clone(),
        ordinal,
    })
}

/// The score a basis selects from standardized outputs.
pub fn basis_score(basis: ScoreBasis, standardized: &Standardized) -> f64 {
    match basis {
        ScoreBasis::Standard => standardized.standard,
        ScoreBasis::Percentile => standardized.percentile,
    }
}

/// Classify a dimension's standardized score using its configured cut points.
pub fn classify_dimension(
    instrument: &InstrumentRef,
    dimension: &Dimension,
    standardized: &Standardized,
) -> Result<Band, DimensionError> {
    let score = basis_score(dimension.band_basis, standardized);
    classify(&dimension.bands, score).ok_or_else(|| DimensionError::MissingBandConfig {
        instrument: instrument.clone(),
        dimension: dimension.id.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawRange;
    use crate::standardize::AnchorPosition;

    fn cuts() -> Vec<CutPoint> {
        vec![
            CutPoint { threshold: 0.0, label: "low".into() },
            CutPoint { threshold: 45.0, label: "average".into() },
            CutPoint { threshold: 55.0, label: "high".into() },
        ]
    }

    #[test]
    fn picks_greatest_threshold_not_above_score() {
        assert_eq!(classify(&cuts(), 50.0).unwrap().label, "average");
        assert_eq!(classify(&cuts(), 70.0).unwrap().label, "high");
        assert_eq!(classify(&cuts(), 10.0).unwrap().ordinal, 0);
    }

    #[test]
    fn first_band_covers_negative_infinity() {
        let band = classify(&cuts(), -1000.0).unwrap();
        assert_eq!(band.label, "low");
        assert_eq!(band.ordinal, 0);
    }

    #[test]
    fn ties_resolve_to_higher_band() {
        let band = classify(&cuts(), 45.0).unwrap();
        assert_eq!(band.label, "average");
        assert_eq!(band.ordinal, 1);
        assert_eq!(classify(&cuts(), 55.0).unwrap().label, "high");
    }

    #[test]
    fn missing_band_config_is_an_error() {
        let dimension = Dimension {
            id: "grit".into(),
            name: "Grit".into(),
            description: String::new(),
            raw_range: RawRange { min: 1.0, max: 5.0 },
            aggregation: Default::default(),
            mandatory: true,
            band_basis: ScoreBasis::Standard,
            bands: vec![],
        };
        let standardized = Standardized {
            percentile: 50.0,
            standard: 50.0,
            position: AnchorPosition::Exact,
        };
        let err =
            classify_dimension(&InstrumentRef::new("demo", "1"), &dimension, &standardized)
                .unwrap_err();
        assert!(matches!(err, DimensionError::MissingBandConfig { .. }));
    }

    #[test]
    fn percentile_basis() {
        let standardized = Standardized {
            percentile: 80.0,
            standard: 40.0,
            position: AnchorPosition::Interpolated,
        };
        assert_eq!(basis_score(ScoreBasis::Percentile, &standardized), 80.0);
        assert_eq!(basis_score(ScoreBasis::Standard, &standardized), 40.0);
    }
}
