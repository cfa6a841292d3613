//! Stored profile records with JSON persistence and retest comparison.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::banding::Band;
use crate::model::InstrumentRef;
use crate::profile::Profile;

/// A persisted profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    /// Unique record identifier.
    pub id: Uuid,
    /// When the record was stored.
    pub stored_at: DateTime<Utc>,
    pub profile: Profile,
}

impl ProfileRecord {
    /// Wrap a profile in a new record with a fresh id.
    pub fn new(profile: Profile) -> Self {
        Self {
            id: Uuid::new_v4(),
            stored_at: Utc::now(),
            profile,
        }
    }

    /// Save the record as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize profile record")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write profile record to {}", path.display()))?;
        Ok(())
    }

    /// Load a record from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read profile record from {}", path.display()))?;
        let record: ProfileRecord =
            serde_json::from_str(&content).context("failed to parse profile record JSON")?;
        Ok(record)
    }
}

/// Load a profile from JSON, accepting either a stored record or a bare profile.
pub fn load_profile(path: &Path) -> Result<Profile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read profile from {}", path.display()))?;
    if let Ok(record) = serde_json::from_str::<ProfileRecord>(&content) {
        return Ok(record.profile);
    }
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse profile JSON: {}", path.display()))
}

impl Profile {
    /// Compare this profile against an earlier one of the same instrument.
    ///
    /// Standard-score deltas within `threshold` count as unchanged.
    pub fn compare(&self, baseline: &Profile, threshold: f64) -> Result<ChangeReport> {
        if self.instrument.id != baseline.instrument.id {
            anyhow::bail!(
                "cannot compare profiles of different instruments: {} vs {}",
                baseline.instrument,
                self.instrument
            );
        }

        let mut changes = Vec::new();
        let mut only_current = Vec::new();
        for current in &self.dimensions {
            let Some(before) = baseline.dimension(&current.dimension) else {
                only_current.push(current.dimension.clone());
                continue;
            };
            let delta = current.standard_score - before.standard_score;
            let direction = if delta > threshold {
                ChangeDirection::Increased
            } else if delta < -threshold {
                ChangeDirection::Decreased
            } else {
                ChangeDirection::Unchanged
            };
            let band_change = (before.band != current.band).then(|| BandTransition {
                from: before.band.clone(),
                to: current.band.clone(),
            });
            changes.push(DimensionChange {
                dimension: current.dimension.clone(),
                baseline_standard: before.standard_score,
                current_standard: current.standard_score,
                delta,
                percentile_delta: current.percentile - before.percentile,
                direction,
                band_change,
            });
        }

        let only_baseline = baseline
            .dimensions
            .iter()
            .filter(|d| self.dimension(&d.dimension).is_none())
            .map(|d| d.dimension.clone())
            .collect();

        Ok(ChangeReport {
            respondent: self.respondent.clone(),
            baseline_instrument: baseline.instrument.clone(),
            current_instrument: self.instrument.clone(),
            baseline_at: baseline.evaluated_at,
            current_at: self.evaluated_at,
            threshold,
            changes,
            only_baseline,
            only_current,
        })
    }
}

/// Direction of a standard-score change beyond the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeDirection {
    Increased,
    Decreased,
    Unchanged,
}

/// Band before and after a retest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandTransition {
    pub from: Band,
    pub to: Band,
}

/// Change of one dimension between two profiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionChange {
    pub dimension: String,
    pub baseline_standard: f64,
    pub current_standard: f64,
    pub delta: f64,
    pub percentile_delta: f64,
    pub direction: ChangeDirection,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub band_change: Option<BandTransition>,
}

/// Result of comparing two profiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeReport {
    pub respondent: String,
    pub baseline_instrument: InstrumentRef,
    pub current_instrument: InstrumentRef,
    pub baseline_at: DateTime<Utc>,
    pub current_at: DateTime<Utc>,
    pub threshold: f64,
    /// Dimensions scored in both profiles, in current-profile order.
    pub changes: Vec<DimensionChange>,
    /// Dimensions only the baseline scored.
    pub only_baseline: Vec<String>,
    /// Dimensions only the current profile scored.
    pub only_current: Vec<String>,
}

impl ChangeReport {
    pub fn count(&self, direction: ChangeDirection) -> usize {
        self.changes.iter().filter(|c| c.direction == direction).count()
    }

    pub fn band_transitions(&self) -> impl Iterator<Item = &DimensionChange> {
        self.changes.iter().filter(|c| c.band_change.is_some())
    }

    /// Format the change report as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!(
            "**Summary:** {} increased, {} decreased, {} unchanged (threshold {:.1})\n\n",
            self.count(ChangeDirection::Increased),
            self.count(ChangeDirection::Decreased),
            self.count(ChangeDirection::Unchanged),
            self.threshold
        ));

        if self.baseline_instrument != self.current_instrument {
            md.push_str(&format!(
                "_Instrument version changed: {} -> {}_\n\n",
                self.baseline_instrument, self.current_instrument
            ));
        }

        if !self.changes.is_empty() {
            md.push_str("| Dimension | Baseline | Current | Delta | Band |\n");
            md.push_str("|-----------|----------|---------|-------|------|\n");
            for c in &self.changes {
                let band = match &c.band_change {
                    Some(t) => format!("{} -> {}", t.from.label, t.to.label),
                    None => "-".to_string(),
                };
                md.push_str(&format!(
                    "| {} | {:.1} | {:.1} | {:+.1} | {} |\n",
                    c.dimension, c.baseline_standard, c.current_standard, c.delta, band
                ));
            }
            md.push('\n');
        }

        if !self.only_baseline.is_empty() {
            md.push_str(&format!(
                "Only in baseline: {}\n",
                self.only_baseline.join(", ")
            ));
        }
        if !self.only_current.is_empty() {
            md.push_str(&format!("Only in current: {}\n", self.only_current.join(", ")));
        }

        md
    }
}
