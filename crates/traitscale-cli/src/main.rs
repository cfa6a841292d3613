//! traitscale CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "traitscale", version, about = "Norm-referenced psychometric scoring engine")]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate one response set into a profile
    Evaluate {
        /// Response set JSON file
        #[arg(long)]
        responses: PathBuf,

        /// Directory of instrument and norm TOML files
        #[arg(long)]
        reference_dir: Option<PathBuf>,

        /// Store the profile as a record in the output directory
        #[arg(long)]
        persist: bool,

        /// Output directory for stored records
        #[arg(long)]
        output: Option<PathBuf>,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Evaluate every response set in a directory and store the profiles
    Batch {
        /// Directory of response set JSON files
        #[arg(long)]
        responses: PathBuf,

        /// Directory of instrument and norm TOML files
        #[arg(long)]
        reference_dir: Option<PathBuf>,

        /// Max concurrent evaluations
        #[arg(long)]
        parallelism: Option<usize>,

        /// Output directory for stored records
        #[arg(long)]
        output: Option<PathBuf>,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Check instrument and norm definitions without evaluating anything
    Validate {
        /// Directory of instrument and norm TOML files
        #[arg(long)]
        reference_dir: Option<PathBuf>,
    },

    /// List loaded instruments and their norm strata
    List {
        /// Directory of instrument and norm TOML files
        #[arg(long)]
        reference_dir: Option<PathBuf>,
    },

    /// Compare two profiles of the same respondent
    Compare {
        /// Baseline profile or record JSON
        #[arg(long)]
        baseline: PathBuf,

        /// Current profile or record JSON
        #[arg(long)]
        current: PathBuf,

        /// Standard-score change treated as noise
        #[arg(long, default_value = "1.0")]
        threshold: f64,

        /// Exit code 1 if any dimension decreased
        #[arg(long)]
        fail_on_decrease: bool,

        /// Output format: text, json, markdown
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Create starter config, instrument and response set
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("traitscale=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config;

    let result = match cli.command {
        Commands::Evaluate {
            responses,
            reference_dir,
            persist,
            output,
            format,
        } => {
            commands::evaluate::execute(responses, reference_dir, persist, output, format, config)
                .await
        }
        Commands::Batch {
            responses,
            reference_dir,
            parallelism,
            output,
            format,
        } => {
            commands::batch::execute(responses, reference_dir, parallelism, output, format, config)
                .await
        }
        Commands::Validate { reference_dir } => commands::validate::execute(reference_dir, config),
        Commands::List { reference_dir } => commands::list::execute(reference_dir, config),
        Commands::Compare {
            baseline,
            current,
            threshold,
            fail_on_decrease,
            format,
        } => commands::compare::execute(baseline, current, threshold, fail_on_decrease, format),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
