//! traitscale-store: reference data sources, profile persistence and configuration.
//!
//! Implements the `ReferenceDataProvider` and `ProfileSink` traits of
//! `traitscale-core` for a directory of TOML files, a directory of JSON
//! records, and in-memory stand-ins for tests.

pub mod config;
pub mod error;
pub mod mock;
pub mod provider;
pub mod sink;

pub use config::{load_config, load_config_from, TraitscaleConfig};
pub use error::StoreError;
pub use provider::DirectoryProvider;
pub use sink::JsonDirectorySink;
