//! Reference data model: instruments, items, dimensions and composites.
//!
//! These records are immutable once loaded. A new instrument version is a new
//! `Instrument` value, never an in-place edit of an existing one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Identifies one published version of an instrument.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstrumentRef {
    /// Instrument identifier (e.g. "entrepreneurial-traits").
    pub id: String,
    /// Published version (e.g. "1.0.0").
    pub version: String,
}

impl InstrumentRef {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for InstrumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.version)
    }
}

impl FromStr for InstrumentRef {
    type Err = String;

    /// Parse the `id@version` form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.rsplit_once('@') {
            Some((id, version)) if !id.is_empty() && !version.is_empty() => {
                Ok(InstrumentRef::new(id, version))
            }
            _ => Err(format!("expected <id>@<version>, got: {s}")),
        }
    }
}

/// A demographic grouping used to select norm tables (e.g. "general", "adult/18-29").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stratum(pub String);

impl Stratum {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Compose a stratum from a population group and an optional age band.
    pub fn compose(population: &str, age_band: Option<&str>) -> Self {
        match age_band {
            Some(band) => Self(format!("{population}/{band}")),
            None => Self(population.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Stratum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether an item is scored as answered or mirrored across its domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    #[default]
    Direct,
    Reverse,
}

/// A labelled answer option with its numeric scoring value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub id: String,
    pub value: f64,
    /// Per-dimension scores that replace `value` on the named dimensions.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub scores: BTreeMap<String, f64>,
}

impl ChoiceOption {
    pub fn new(id: impl Into<String>, value: f64) -> Self {
        Self {
            id: id.into(),
            value,
            scores: BTreeMap::new(),
        }
    }

    /// Score this option contributes to `dimension`.
    pub fn score_for(&self, dimension: &str) -> f64 {
        self.scores.get(dimension).copied().unwrap_or(self.value)
    }
}

/// The values an item accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ValueDomain {
    /// Bounded integer scale, inclusive on both ends (e.g. a 1-5 Likert scale).
    Scale { min: i32, max: i32 },
    /// Labelled options, each mapped to a numeric value.
    Choice { options: Vec<ChoiceOption> },
}

impl ValueDomain {
    /// Lowest and highest score the domain contributes to `dimension`.
    ///
    /// An empty choice list yields `(0.0, 0.0)`; snapshot checks reject such domains.
    pub fn bounds_for(&self, dimension: &str) -> (f64, f64) {
        match self {
            ValueDomain::Scale { min, max } => (f64::from(*min), f64::from(*max)),
            ValueDomain::Choice { options } => {
                let mut values = options.iter().map(|o| o.score_for(dimension));
                let Some(first) = values.next() else {
                    return (0.0, 0.0);
                };
                values.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)))
            }
        }
    }
}

impl fmt::Display for ValueDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueDomain::Scale { min, max } => write!(f, "scale {min}..={max}"),
            ValueDomain::Choice { options } => {
                let ids: Vec<&str> = options.iter().map(|o| o.id.as_str()).collect();
                write!(f, "choice [{}]", ids.join(", "))
            }
        }
    }
}

/// How strongly an item contributes to a dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemLoading {
    pub dimension: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

/// A single question of an instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    #[serde(default)]
    pub text: String,
    pub domain: ValueDomain,
    /// Dimensions this item is scored on.
    pub loadings: Vec<ItemLoading>,
    #[serde(default)]
    pub polarity: Polarity,
    /// Required items must be answered for the response set to validate.
    #[serde(default = "default_true")]
    pub required: bool,
}

/// How item values combine into a raw dimension score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    /// Weighted sum, prorated when optional items are unanswered.
    #[default]
    Sum,
    /// Weighted mean of answered item values.
    Mean,
}

/// Which standardized output a classification or composite is based on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreBasis {
    #[default]
    Standard,
    Percentile,
}

/// Inclusive lower bound of an interpretive band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CutPoint {
    pub threshold: f64,
    pub label: String,
}

/// Declared range of a dimension's raw score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawRange {
    pub min: f64,
    pub max: f64,
}

impl RawRange {
    const TOLERANCE: f64 = 1e-9;

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min - Self::TOLERANCE && value <= self.max + Self::TOLERANCE
    }
}

/// A scored trait or scale within an instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub raw_range: RawRange,
    #[serde(default)]
    pub aggregation: Aggregation,
    /// A failure on a mandatory dimension fails the whole profile.
    #[serde(default = "default_true")]
    pub mandatory: bool,
    #[serde(default)]
    pub band_basis: ScoreBasis,
    /// Ascending cut points; the first band covers everything below the second threshold.
    #[serde(default)]
    pub bands: Vec<CutPoint>,
}

/// One dimension's contribution to a composite index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeComponent {
    pub dimension: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

/// Instrument-level index computed as a weighted mean over dimension results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Composite {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub basis: ScoreBasis,
    pub components: Vec<CompositeComponent>,
    #[serde(default)]
    pub bands: Vec<CutPoint>,
}

/// A versioned psychometric test definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub id: String,
    pub version: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Stratum whose norms apply when the respondent's stratum has no table.
    #[serde(default)]
    pub default_stratum: Option<Stratum>,
    pub items: Vec<Item>,
    pub dimensions: Vec<Dimension>,
    #[serde(default)]
    pub composites: Vec<Composite>,
}

impl Instrument {
    pub fn reference(&self) -> InstrumentRef {
        InstrumentRef::new(&self.id, &self.version)
    }

    pub fn item(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn dimension(&self, id: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|dim| dim.id == id)
    }

    /// Items loading onto `dimension`, paired with their weight.
    pub fn items_for<'a>(&'a self, dimension: &'a str) -> impl Iterator<Item = (&'a Item, f64)> + 'a {
        self.items.iter().flat_map(move |item| {
            item.loadings
                .iter()
                .filter(move |loading| loading.dimension == dimension)
                .map(move |loading| (item, loading.weight))
        })
    }
}
