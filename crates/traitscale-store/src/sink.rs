//! Profile records persisted as JSON files.

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use uuid::Uuid;

use traitscale_core::profile::Profile;
use traitscale_core::report::ProfileRecord;
use traitscale_core::traits::ProfileSink;

use crate::error::StoreError;

/// Writes one `<record-id>.json` file per stored profile.
pub struct JsonDirectorySink {
    dir: PathBuf,
}

impl JsonDirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding record `id`.
    pub fn path_for(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }
}

#[async_trait]
impl ProfileSink for JsonDirectorySink {
    fn name(&self) -> &str {
        "json-directory"
    }

    async fn store(&self, profile: &Profile) -> anyhow::Result<ProfileRecord> {
        let record = ProfileRecord::new(profile.clone());
        let json = serde_json::to_string_pretty(&record).context("failed to serialize profile record")?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create {}", self.dir.display()))?;
        let path = self.path_for(record.id);
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("failed to write profile record to {}", path.display()))?;

        tracing::debug!(id = %record.id, path = %path.display(), "stored profile record");
        Ok(record)
    }

    async fn fetch(&self, id: Uuid) -> anyhow::Result<Option<ProfileRecord>> {
        let path = self.path_for(id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()));
            }
        };
        let record = serde_json::from_str(&content)
            .map_err(|source| StoreError::CorruptRecord { id, path, source })?;
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use traitscale_core::banding::Band;
    use traitscale_core::profile::DimensionResult;
    use traitscale_core::standardize::AnchorPosition;
    use traitscale_core::statistics::ProfileSummary;
    use traitscale_core::{InstrumentRef, Stratum};

    fn profile() -> Profile {
        Profile {
            respondent: "resp-001".into(),
            instrument: InstrumentRef::new("extraversion-mini", "1.0.0"),
            stratum: Stratum::new("general"),
            evaluated_at: Utc::now(),
            dimensions: vec![],
            composites: vec![],
            failures: vec![],
            unavailable_composites: vec![],
            summary: ProfileSummary {
                completion_rate: 100.0,
                mean_percentile: None,
                strengths: vec![],
                development_areas: vec![],
            },
        }
    }

    #[tokio::test]
    async fn store_then_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonDirectorySink::new(dir.path().join("profiles"));

        let record = sink.store(&profile()).await.unwrap();
        assert!(sink.path_for(record.id).exists());

        let fetched = sink.fetch(record.id).await.unwrap().unwrap();
        assert_eq!(fetched, record);
    }

    #[tokio::test]
    async fn fractional_scores_survive_storage() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonDirectorySink::new(dir.path());

        let mut profile = profile();
        for (i, divisor) in [11.0, 3.0, 7.0, 600.0].into_iter().enumerate() {
            profile.dimensions.push(DimensionResult {
                dimension: format!("d{i}"),
                name: format!("D{i}"),
                raw_score: 13.0 / divisor,
                percentile: 68.5 / divisor,
                standard_score: 50.0 + 1.0 / divisor,
                band: Band {
                    label: "average".into(),
                    ordinal: 1,
                },
                items_answered: 3,
                items_expected: 3,
                norm_stratum: Stratum::new("general"),
                norm_fallback: false,
                anchor_position: AnchorPosition::Interpolated,
            });
        }
        profile.summary.mean_percentile = Some(68.5 / 9.0);

        let record = sink.store(&profile).await.unwrap();
        let fetched = sink.fetch(record.id).await.unwrap().unwrap();
        assert_eq!(fetched.profile, profile);
        for (stored, original) in fetched.profile.dimensions.iter().zip(&profile.dimensions) {
            assert_eq!(stored.raw_score.to_bits(), original.raw_score.to_bits());
        }
    }

    #[tokio::test]
    async fn fetch_unknown_id_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonDirectorySink::new(dir.path());
        assert!(sink.fetch(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_record_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonDirectorySink::new(dir.path());
        let id = Uuid::new_v4();
        std::fs::write(sink.path_for(id), "{ not json").unwrap();

        let err = sink.fetch(id).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::CorruptRecord { .. })
        ));
    }
}
