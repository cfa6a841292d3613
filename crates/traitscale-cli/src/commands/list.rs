//! The `traitscale list` command.

use std::path::PathBuf;

use anyhow::Result;

use super::{load_registry, load_settings};

pub fn execute(reference_dir: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<()> {
    use comfy_table::Table;

    let config = load_settings(config_path, reference_dir)?;
    let registry = load_registry(&config)?;
    let snapshot = registry.current();

    if snapshot.instruments().next().is_none() {
        println!(
            "No instruments found in {}. Run `traitscale init` to create an example.",
            config.reference_dir.display()
        );
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        "Instrument",
        "Version",
        "Name",
        "Items",
        "Dimensions",
        "Default stratum",
        "Norm strata",
    ]);
    for instrument in snapshot.instruments() {
        let strata: Vec<String> = snapshot
            .norms()
            .strata(&instrument.reference())
            .into_iter()
            .map(ToString::to_string)
            .collect();
        table.add_row(vec![
            instrument.id.clone(),
            instrument.version.clone(),
            instrument.name.clone(),
            instrument.items.len().to_string(),
            instrument.dimensions.len().to_string(),
            instrument
                .default_stratum
                .as_ref()
                .map_or_else(|| "-".to_string(), ToString::to_string),
            strata.join(", "),
        ]);
    }
    println!("{table}");

    Ok(())
}
