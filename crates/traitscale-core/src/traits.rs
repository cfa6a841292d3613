//! Seams between the engine and its storage.
//!
//! Reference data is loaded synchronously and published as a snapshot;
//! profiles are persisted asynchronously through a sink.

use async_trait::async_trait;
use uuid::Uuid;

use crate::profile::Profile;
use crate::report::ProfileRecord;
use crate::snapshot::ReferenceSnapshot;

// ---------------------------------------------------------------------------
// Reference data
// ---------------------------------------------------------------------------

/// Source of instruments and norm tables.
pub trait ReferenceDataProvider: Send + Sync {
    /// Human-readable source name (e.g. a directory path).
    fn name(&self) -> &str;

    /// Load and check a complete snapshot.
    fn load(&self) -> anyhow::Result<ReferenceSnapshot>;
}

// ---------------------------------------------------------------------------
// Profile persistence
// ---------------------------------------------------------------------------

/// Destination for evaluated profiles.
#[async_trait]
pub trait ProfileSink: Send + Sync {
    /// Human-readable sink name.
    fn name(&self) -> &str;

    /// Persist a profile, returning the stored record.
    async fn store(&self, profile: &Profile) -> anyhow::Result<ProfileRecord>;

    /// Fetch a previously stored record.
    async fn fetch(&self, id: Uuid) -> anyhow::Result<Option<ProfileRecord>>;
}
