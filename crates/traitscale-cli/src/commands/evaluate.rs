//! The `traitscale evaluate` command.

use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;

use traitscale_core::parser::parse_response_set;
use traitscale_core::traits::ProfileSink;
use traitscale_core::Profile;
use traitscale_store::JsonDirectorySink;

use super::{describe_failure, load_registry, load_settings};

pub async fn execute(
    responses_path: PathBuf,
    reference_dir: Option<PathBuf>,
    persist: bool,
    output: Option<PathBuf>,
    format: String,
    config_path: Option<PathBuf>,
) -> Result<()> {
    anyhow::ensure!(
        matches!(format.as_str(), "table" | "json"),
        "unknown format '{format}', expected table or json"
    );

    let config = load_settings(config_path, reference_dir)?;
    let responses = parse_response_set(&responses_path)?;
    let registry = load_registry(&config)?;
    let evaluator = registry.evaluator(config.evaluator_config());

    let profile = evaluator
        .evaluate(&responses, Utc::now())
        .map_err(|e| anyhow::anyhow!("{}", describe_failure(&e)))?;

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&profile)?),
        _ => print_profile(&profile),
    }

    if persist {
        let sink = JsonDirectorySink::new(output.unwrap_or(config.output_dir));
        let record = sink.store(&profile).await?;
        eprintln!("Profile saved to: {}", sink.path_for(record.id).display());
    }

    Ok(())
}

fn print_profile(profile: &Profile) {
    use comfy_table::Table;

    println!(
        "Profile: {} :: {} (stratum {})",
        profile.respondent, profile.instrument, profile.stratum
    );

    let mut table = Table::new();
    table.set_header(vec![
        "Dimension",
        "Raw",
        "Percentile",
        "Standard",
        "Band",
        "Items",
        "Norms",
    ]);
    for d in &profile.dimensions {
        let norms = if d.norm_fallback {
            format!("{} (fallback)", d.norm_stratum)
        } else {
            d.norm_stratum.to_string()
        };
        table.add_row(vec![
            d.name.clone(),
            format!("{:.2}", d.raw_score),
            format!("{:.1}", d.percentile),
            format!("{:.1}", d.standard_score),
            d.band.label.clone(),
            format!("{}/{}", d.items_answered, d.items_expected),
            norms,
        ]);
    }
    println!("{table}");

    if !profile.composites.is_empty() {
        let mut composites = Table::new();
        composites.set_header(vec!["Composite", "Value", "Band"]);
        for c in &profile.composites {
            composites.add_row(vec![
                c.name.clone(),
                format!("{:.1}", c.value),
                c.band.as_ref().map_or_else(|| "-".to_string(), |b| b.label.clone()),
            ]);
        }
        println!("{composites}");
    }

    for failure in &profile.failures {
        println!("Not scored: {}", failure.error);
    }
    for composite in &profile.unavailable_composites {
        println!("Unavailable composite: {composite}");
    }

    let summary = &profile.summary;
    println!("Completion: {:.1}%", summary.completion_rate);
    if let Some(mean) = summary.mean_percentile {
        println!("Mean percentile: {mean:.1}");
    }
    if !summary.strengths.is_empty() {
        println!("Strengths: {}", summary.strengths.join(", "));
    }
    if !summary.development_areas.is_empty() {
        println!("Development areas: {}", summary.development_areas.join(", "));
    }
}
