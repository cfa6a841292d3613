//! The `traitscale batch` command.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tokio::sync::Semaphore;
use uuid::Uuid;

use traitscale_core::parser::load_response_directory;
use traitscale_core::traits::ProfileSink;
use traitscale_store::JsonDirectorySink;

use super::{describe_failure, load_registry, load_settings};

/// Outcome of one response file.
#[derive(Debug, Serialize)]
struct BatchOutcome {
    file: String,
    respondent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    record: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub async fn execute(
    responses_dir: PathBuf,
    reference_dir: Option<PathBuf>,
    parallelism: Option<usize>,
    output: Option<PathBuf>,
    format: String,
    config_path: Option<PathBuf>,
) -> Result<()> {
    anyhow::ensure!(
        matches!(format.as_str(), "table" | "json"),
        "unknown format '{format}', expected table or json"
    );

    let config = load_settings(config_path, reference_dir)?;
    let parallelism = parallelism.unwrap_or(config.parallelism);
    anyhow::ensure!(parallelism >= 1, "parallelism must be at least 1");

    let sets = load_response_directory(&responses_dir)?;
    anyhow::ensure!(
        !sets.is_empty(),
        "no response sets found in {}",
        responses_dir.display()
    );

    // One snapshot and one timestamp for the whole batch.
    let registry = load_registry(&config)?;
    let evaluator = Arc::new(registry.evaluator(config.evaluator_config()));
    let evaluated_at = Utc::now();
    let sink = Arc::new(JsonDirectorySink::new(output.unwrap_or(config.output_dir)));
    let semaphore = Arc::new(Semaphore::new(parallelism));

    eprintln!(
        "traitscale v{}: evaluating {} response set(s), parallelism {parallelism}",
        env!("CARGO_PKG_VERSION"),
        sets.len()
    );
    let start = Instant::now();

    let mut futures = FuturesUnordered::new();
    for (index, (path, set)) in sets.into_iter().enumerate() {
        let evaluator = Arc::clone(&evaluator);
        let sink = Arc::clone(&sink);
        let semaphore = Arc::clone(&semaphore);

        futures.push(async move {
            let file = path
                .file_name()
                .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
            let respondent = set.respondent.clone();

            let inner = async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| anyhow::anyhow!("semaphore closed"))?;
                let outcome =
                    tokio::task::spawn_blocking(move || evaluator.evaluate(&set, evaluated_at))
                        .await?;
                let profile = outcome.map_err(|e| anyhow::anyhow!("{}", describe_failure(&e)))?;
                let record = sink.store(&profile).await?;
                anyhow::Ok(record.id)
            };

            let outcome = match inner.await {
                Ok(id) => BatchOutcome {
                    file,
                    respondent,
                    record: Some(id),
                    error: None,
                },
                Err(e) => {
                    tracing::error!("evaluation failed for {file}: {e:#}");
                    BatchOutcome {
                        file,
                        respondent,
                        record: None,
                        error: Some(format!("{e:#}")),
                    }
                }
            };
            (index, outcome)
        });
    }

    let mut outcomes = Vec::new();
    while let Some(outcome) = futures.next().await {
        outcomes.push(outcome);
    }
    outcomes.sort_by_key(|(index, _)| *index);
    let outcomes: Vec<BatchOutcome> = outcomes.into_iter().map(|(_, o)| o).collect();

    let failed = outcomes.iter().filter(|o| o.error.is_some()).count();
    eprintln!(
        "\nComplete: {}/{} stored, {failed} failed ({:.1}s)",
        outcomes.len() - failed,
        outcomes.len(),
        start.elapsed().as_secs_f64()
    );
    eprintln!("Profiles saved to: {}", sink.dir().display());

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&outcomes)?),
        _ => print_summary(&outcomes),
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} evaluation(s) failed", outcomes.len());
    }
    Ok(())
}

fn print_summary(outcomes: &[BatchOutcome]) {
    use comfy_table::Table;

    let mut table = Table::new();
    table.set_header(vec!["File", "Respondent", "Status", "Record"]);
    for o in outcomes {
        let (status, record) = match (&o.record, &o.error) {
            (Some(id), _) => ("stored".to_string(), id.to_string()),
            (None, Some(e)) => (first_line(e), "-".to_string()),
            (None, None) => ("skipped".to_string(), "-".to_string()),
        };
        table.add_row(vec![o.file.clone(), o.respondent.clone(), status, record]);
    }
    println!("{table}");
}

fn first_line(s: &str) -> String {
    s.lines().next().unwrap_or_default().to_string()
}
