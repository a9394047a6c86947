//! Windlass CLI - extract task cohorts from a predicates table.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use windlass_cli::table::{read_frame, write_table, TableError};
use windlass_config::TaskConfig;
use windlass_core::ConfigError;
use windlass_engine::{query, EngineError, SchemaError};

const EXIT_CONFIG: u8 = 2;
const EXIT_SCHEMA: u8 = 3;
const EXIT_UNEXPECTED: u8 = 1;

#[derive(Parser)]
#[command(name = "windlass")]
#[command(version = "0.1.0")]
#[command(about = "Extract task cohorts from longitudinal event streams", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a task configuration over a predicates table
    Extract {
        /// Path to the task configuration YAML
        #[arg(short, long)]
        config: PathBuf,

        /// Optional predicates-only overlay YAML
        #[arg(short, long)]
        predicates: Option<PathBuf>,

        /// Path to the predicates table CSV
        #[arg(short, long)]
        input: PathBuf,

        /// Path for the result CSV
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Validate a task configuration and print its window tree
    Check {
        /// Path to the task configuration YAML
        #[arg(short, long)]
        config: PathBuf,

        /// Optional predicates-only overlay YAML
        #[arg(short, long)]
        predicates: Option<PathBuf>,
    },
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Extract {
            config,
            predicates,
            input,
            output,
        } => {
            let task = TaskConfig::load_with_overlay(&config, predicates.as_ref())
                .with_context(|| format!("loading task configuration '{}'", config.display()))?;
            let frame = read_frame(&input)
                .with_context(|| format!("reading predicates table '{}'", input.display()))?;
            info!(
                "loaded {} event rows across {} subjects",
                frame.n_rows(),
                frame.groups().len()
            );
            let table = query(&task, frame)?;
            info!("writing {} result rows to '{}'", table.rows.len(), output.display());
            write_table(&output, &table)
                .with_context(|| format!("writing result table '{}'", output.display()))?;
            Ok(())
        }
        Commands::Check { config, predicates } => {
            let task = TaskConfig::load_with_overlay(&config, predicates.as_ref())
                .with_context(|| format!("loading task configuration '{}'", config.display()))?;
            println!(
                "configuration is valid: {} predicates, {} windows",
                task.predicates().len(),
                task.windows().len()
            );
            println!("{}", task.tree());
            Ok(())
        }
    }
}

fn exit_code(error: &anyhow::Error) -> u8 {
    if error.downcast_ref::<ConfigError>().is_some() {
        return EXIT_CONFIG;
    }
    if error.downcast_ref::<SchemaError>().is_some() {
        return EXIT_SCHEMA;
    }
    if let Some(engine) = error.downcast_ref::<EngineError>() {
        return match engine {
            EngineError::Schema(_) => EXIT_SCHEMA,
            _ => EXIT_UNEXPECTED,
        };
    }
    if let Some(table) = error.downcast_ref::<TableError>() {
        return match table {
            TableError::Schema(_)
            | TableError::Header { .. }
            | TableError::Value { .. }
            | TableError::Csv { .. } => EXIT_SCHEMA,
            TableError::Io { .. } => EXIT_UNEXPECTED,
        };
    }
    EXIT_UNEXPECTED
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("warning: logging already initialized");
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}
