//! Store error types.

use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

use traitscale_core::error::DefinitionError;

/// Errors raised by the file-backed provider and sink.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The configured reference directory does not exist.
    #[error("reference directory not found: {}", .0.display())]
    ReferenceDirMissing(PathBuf),

    /// The reference data parsed but failed the definition checks.
    #[error("reference data in {} is invalid: {source}", .dir.display())]
    InvalidReferenceData {
        dir: PathBuf,
        #[source]
        source: DefinitionError,
    },

    /// A stored record exists but cannot be decoded.
    #[error("profile record {id} at {} is corrupt: {source}", .path.display())]
    CorruptRecord {
        id: Uuid,
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
