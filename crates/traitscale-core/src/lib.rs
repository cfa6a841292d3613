//! traitscale-core: psychometric scoring engine.
//!
//! Turns a respondent's item responses into norm-referenced trait scores:
//! validation, raw-score aggregation, norm table resolution, standardization,
//! banding and profile assembly, all bound to one immutable reference-data
//! snapshot per evaluation.

pub mod aggregate;
pub mod banding;
pub mod engine;
pub mod error;
pub mod model;
pub mod norms;
pub mod parser;
pub mod profile;
pub mod report;
pub mod response;
pub mod snapshot;
pub mod standardize;
pub mod statistics;
pub mod traits;
pub mod validate;

pub use engine::{Evaluator, EvaluatorConfig};
pub use error::{DimensionError, EvaluationError, ValidationError, ValidationIssue};
pub use model::{Instrument, InstrumentRef, Stratum};
pub use profile::Profile;
pub use response::ResponseSet;
pub use snapshot::{ReferenceSnapshot, SnapshotRegistry};
