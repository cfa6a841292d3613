pub mod batch;
pub mod compare;
pub mod evaluate;
pub mod init;
pub mod list;
pub mod validate;

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::Result;

use traitscale_core::snapshot::SnapshotRegistry;
use traitscale_core::traits::ReferenceDataProvider;
use traitscale_core::EvaluationError;
use traitscale_store::config::load_config_from;
use traitscale_store::{DirectoryProvider, TraitscaleConfig};

/// Load configuration, applying a `--reference-dir` override.
pub(crate) fn load_settings(
    config_path: Option<PathBuf>,
    reference_dir: Option<PathBuf>,
) -> Result<TraitscaleConfig> {
    let mut config = load_config_from(config_path.as_deref())?;
    if let Some(dir) = reference_dir {
        config.reference_dir = dir;
    }
    Ok(config)
}

/// Load the configured reference directory and publish it as the current snapshot.
pub(crate) fn load_registry(config: &TraitscaleConfig) -> Result<SnapshotRegistry> {
    let provider = DirectoryProvider::new(&config.reference_dir);
    Ok(SnapshotRegistry::new(provider.load()?))
}

/// Multi-line explanation of an evaluation failure.
pub(crate) fn describe_failure(error: &EvaluationError) -> String {
    let mut out = error.to_string();
    match error {
        EvaluationError::Validation(v) => {
            for issue in &v.issues {
                let _ = write!(out, "\n  - {issue}");
            }
        }
        EvaluationError::IncompleteProfile { failures, .. } => {
            for failure in failures {
                let kind = if failure.mandatory { "mandatory" } else { "optional" };
                let _ = write!(out, "\n  - [{kind}] {}", failure.error);
            }
        }
        EvaluationError::UnknownInstrument(_) => {}
    }
    out
}
