//! In-memory provider and sink for testing.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use uuid::Uuid;

use traitscale_core::model::Instrument;
use traitscale_core::norms::NormTable;
use traitscale_core::profile::Profile;
use traitscale_core::report::ProfileRecord;
use traitscale_core::snapshot::ReferenceSnapshot;
use traitscale_core::traits::{ProfileSink, ReferenceDataProvider};

/// Serves a fixed set of instruments and norm tables.
///
/// Each `load` re-checks the definitions, exactly like a file-backed provider.
pub struct InMemoryProvider {
    instruments: Mutex<Vec<Instrument>>,
    norm_tables: Mutex<Vec<NormTable>>,
    load_count: AtomicU32,
}

impl InMemoryProvider {
    pub fn new(instruments: Vec<Instrument>, norm_tables: Vec<NormTable>) -> Self {
        Self {
            instruments: Mutex::new(instruments),
            norm_tables: Mutex::new(norm_tables),
            load_count: AtomicU32::new(0),
        }
    }

    /// Replace the served norm tables, e.g. to simulate a norm update.
    pub fn set_norm_tables(&self, tables: Vec<NormTable>) {
        *self.norm_tables.lock().unwrap_or_else(PoisonError::into_inner) = tables;
    }

    /// Number of `load` calls made.
    pub fn load_count(&self) -> u32 {
        self.load_count.load(Ordering::Relaxed)
    }
}

impl ReferenceDataProvider for InMemoryProvider {
    fn name(&self) -> &str {
        "in-memory"
    }

    fn load(&self) -> anyhow::Result<ReferenceSnapshot> {
        let generation = self.load_count.fetch_add(1, Ordering::Relaxed) + 1;
        let instruments = self
            .instruments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let tables = self
            .norm_tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Ok(ReferenceSnapshot::build(
            format!("in-memory#{generation}"),
            instruments,
            tables,
        )?)
    }
}

/// Keeps stored records in memory.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<ProfileRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records stored so far, in store order.
    pub fn records(&self) -> Vec<ProfileRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ProfileSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn store(&self, profile: &Profile) -> anyhow::Result<ProfileRecord> {
        let record = ProfileRecord::new(profile.clone());
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(record)
    }

    async fn fetch(&self, id: Uuid) -> anyhow::Result<Option<ProfileRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }
}
