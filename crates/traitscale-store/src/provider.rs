//! Reference data loaded from a directory of TOML files.

use std::path::{Path, PathBuf};

use traitscale_core::parser::load_reference_directory;
use traitscale_core::snapshot::ReferenceSnapshot;
use traitscale_core::traits::ReferenceDataProvider;

use crate::error::StoreError;

/// Loads every `.toml` file under a directory into one snapshot.
pub struct DirectoryProvider {
    dir: PathBuf,
    name: String,
}

impl DirectoryProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let name = dir.display().to_string();
        Self { dir, name }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ReferenceDataProvider for DirectoryProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> anyhow::Result<ReferenceSnapshot> {
        if !self.dir.is_dir() {
            return Err(StoreError::ReferenceDirMissing(self.dir.clone()).into());
        }

        let data = load_reference_directory(&self.dir)?;
        let snapshot = ReferenceSnapshot::build(&self.name, data.instruments, data.norm_tables)
            .map_err(|source| StoreError::InvalidReferenceData {
                dir: self.dir.clone(),
                source,
            })?;

        for warning in snapshot.coverage_warnings() {
            tracing::warn!(subject = %warning.subject, "{}", warning.message);
        }
        tracing::info!(
            dir = %self.dir.display(),
            instruments = snapshot.instruments().count(),
            norm_tables = snapshot.norms().len(),
            "loaded reference data"
        );
        Ok(snapshot)
    }
}
