//! Norm tables and stratum-aware resolution.
//!
//! Tables are keyed by (instrument version, dimension, stratum) in an ordered
//! map, so resolution is O(log n) over the loaded tables.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::DimensionError;
use crate::model::{InstrumentRef, Stratum};

/// One tabulated point: a raw score and its percentile and standard score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormAnchor {
    pub raw: f64,
    pub percentile: f64,
    pub standard: f64,
}

impl NormAnchor {
    pub fn new(raw: f64, percentile: f64, standard: f64) -> Self {
        Self {
            raw,
            percentile,
            standard,
        }
    }
}

/// Empirical raw-to-standardized mapping for one dimension and stratum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormTable {
    pub instrument: InstrumentRef,
    pub dimension: String,
    pub stratum: Stratum,
    /// Strictly ascending in `raw`.
    pub anchors: Vec<NormAnchor>,
}

impl NormTable {
    pub fn key(&self) -> NormKey {
        NormKey {
            instrument: self.instrument.clone(),
            dimension: self.dimension.clone(),
            stratum: self.stratum.clone(),
        }
    }
}

/// Lookup key of a norm table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NormKey {
    pub instrument: InstrumentRef,
    pub dimension: String,
    pub stratum: Stratum,
}

impl std::fmt::Display for NormKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.instrument, self.dimension, self.stratum)
    }
}

/// A resolved table and whether the fallback stratum supplied it.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedNorm<'a> {
    pub table: &'a NormTable,
    pub fallback: bool,
}

/// All norm tables of a snapshot.
#[derive(Debug, Clone, Default)]
pub struct NormLibrary {
    tables: BTreeMap<NormKey, NormTable>,
}

impl NormLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a table, returning the one it replaced, if any.
    pub fn insert(&mut self, table: NormTable) -> Option<NormTable> {
        self.tables.insert(table.key(), table)
    }

    pub fn get(&self, key: &NormKey) -> Option<&NormTable> {
        self.tables.get(key)
    }

    /// Find the table for `dimension` in `stratum`, falling back to `fallback`.
    ///
    /// There is no fallback to raw scores: without a table the dimension cannot
    /// be standardized.
    pub fn resolve(
        &self,
        instrument: &InstrumentRef,
        dimension: &str,
        stratum: &Stratum,
        fallback: Option<&Stratum>,
    ) -> Result<ResolvedNorm<'_>, DimensionError> {
        let mut key = NormKey {
            instrument: instrument.clone(),
            dimension: dimension.to_string(),
            stratum: stratum.clone(),
        };
        if let Some(table) = self.tables.get(&key) {
            return Ok(ResolvedNorm {
                table,
                fallback: false,
            });
        }

        if let Some(default) = fallback.filter(|default| *default != stratum) {
            key.stratum = default.clone();
            if let Some(table) = self.tables.get(&key) {
                tracing::debug!(
                    instrument = %instrument,
                    dimension,
                    requested = %stratum,
                    used = %default,
                    "norm table resolved through fallback stratum"
                );
                return Ok(ResolvedNorm {
                    table,
                    fallback: true,
                });
            }
        }

        Err(DimensionError::NormTableNotFound {
            instrument: instrument.clone(),
            dimension: dimension.to_string(),
            stratum: stratum.clone(),
            fallback: fallback.cloned(),
        })
    }

    /// Strata with at least one table for `instrument`.
    pub fn strata(&self, instrument: &InstrumentRef) -> BTreeSet<&Stratum> {
        self.tables
            .keys()
            .filter(|key| &key.instrument == instrument)
            .map(|key| &key.stratum)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NormTable> {
        self.tables.values()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
