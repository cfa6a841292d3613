//! The `traitscale compare` command.

use std::path::PathBuf;

use anyhow::Result;

use traitscale_core::report::{load_profile, ChangeDirection};

pub fn execute(
    baseline_path: PathBuf,
    current_path: PathBuf,
    threshold: f64,
    fail_on_decrease: bool,
    format: String,
) -> Result<()> {
    anyhow::ensure!(threshold >= 0.0, "threshold must not be negative");

    let baseline = load_profile(&baseline_path)?;
    let current = load_profile(&current_path)?;

    let report = current.compare(&baseline, threshold)?;

    match format.as_str() {
        "markdown" | "md" => {
            println!("{}", report.to_markdown());
        }
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            // text format
            println!(
                "Comparison for {}: {} increased, {} decreased, {} unchanged",
                report.respondent,
                report.count(ChangeDirection::Increased),
                report.count(ChangeDirection::Decreased),
                report.count(ChangeDirection::Unchanged)
            );

            for c in report
                .changes
                .iter()
                .filter(|c| c.direction != ChangeDirection::Unchanged)
            {
                println!(
                    "  {} {:.1} -> {:.1} ({:+.1})",
                    c.dimension, c.baseline_standard, c.current_standard, c.delta
                );
            }

            let transitions: Vec<_> = report.band_transitions().collect();
            if !transitions.is_empty() {
                println!("\nBand changes:");
                for c in transitions {
                    if let Some(t) = &c.band_change {
                        println!("  {}: {} -> {}", c.dimension, t.from.label, t.to.label);
                    }
                }
            }

            if !report.only_baseline.is_empty() {
                println!("\nOnly in baseline: {}", report.only_baseline.join(", "));
            }
            if !report.only_current.is_empty() {
                println!("Only in current: {}", report.only_current.join(", "));
            }
        }
    }

    if fail_on_decrease && report.count(ChangeDirection::Decreased) > 0 {
        std::process::exit(1);
    }

    Ok(())
}
