//! The `traitscale validate` command.

use std::path::PathBuf;

use anyhow::Result;

use traitscale_core::parser::load_reference_directory;
use traitscale_core::snapshot::{inspect, ReferenceSnapshot};

use super::load_settings;

pub fn execute(reference_dir: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_settings(config_path, reference_dir)?;
    let data = load_reference_directory(&config.reference_dir)?;

    for instrument in &data.instruments {
        let reference = instrument.reference();
        let tables = data
            .norm_tables
            .iter()
            .filter(|t| t.instrument == reference)
            .count();
        println!(
            "Instrument: {} ({reference}) {} items, {} dimensions, {} composites, {tables} norm tables",
            instrument.name,
            instrument.items.len(),
            instrument.dimensions.len(),
            instrument.composites.len(),
        );
    }

    let issues = inspect(&data.instruments, &data.norm_tables);
    for issue in &issues {
        println!("  [{}] ERROR: {}", issue.subject, issue.message);
    }
    if !issues.is_empty() {
        anyhow::bail!("{} definition issue(s) found", issues.len());
    }

    let snapshot = ReferenceSnapshot::build(
        config.reference_dir.display().to_string(),
        data.instruments,
        data.norm_tables,
    )?;
    let warnings = snapshot.coverage_warnings();
    for w in &warnings {
        println!("  [{}] WARNING: {}", w.subject, w.message);
    }

    if warnings.is_empty() {
        println!("All reference data valid.");
    } else {
        println!("\n{} warning(s) found.", warnings.len());
    }

    Ok(())
}
