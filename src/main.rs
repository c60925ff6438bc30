//! Rehearse - data-driven UI replay from the command line
//!
//! Replays a recorded step sequence against a page fixture (offline
//! dry-run), substituting values from a CSV data file row by row, and
//! writes the structured run export as JSON.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use rehearse_dom::{MemoryDocument, MemoryTransport};
use rehearse_run::{RunConfig, RunOrchestrator, RunStatus};
use rehearse_step::{StepExecutor, StepOptions};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rehearse_cli::{load_mappings, load_page, load_rows, load_steps, print_summary, write_export};

/// Rehearse - replay recorded UI interactions over tabular data
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Log level when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recording against a page fixture
    Run(RunArgs),

    /// Print a summary of a recording without replaying it
    Inspect(InspectArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Recorded steps (JSON)
    #[arg(long, value_name = "FILE")]
    steps: PathBuf,

    /// Page fixture to replay against (JSON node specs)
    #[arg(long, value_name = "FILE")]
    page: PathBuf,

    /// Data rows (CSV with a header row)
    #[arg(long, value_name = "FILE")]
    data: Option<PathBuf>,

    /// Field-mapping table, CSV column to step label (JSON object)
    #[arg(long, value_name = "FILE")]
    mapping: Option<PathBuf>,

    /// Where to write the structured export (JSON)
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Halt the whole run on the first failed step
    #[arg(long)]
    stop_on_error: bool,

    /// Skip steps whose element never appears instead of failing them
    #[arg(long)]
    skip_missing: bool,

    /// Base inter-step delay (e.g. 300ms, 1s)
    #[arg(long, default_value = "300ms", value_parser = humantime::parse_duration)]
    base_delay: Duration,

    /// Budget for locating each step's element
    #[arg(long, default_value = "2s", value_parser = humantime::parse_duration)]
    find_timeout: Duration,

    /// Pacing divisor; 2.0 replays twice as fast
    #[arg(long, default_value_t = 1.0)]
    speed: f64,

    /// Project identifier stamped into the export
    #[arg(long)]
    project: Option<String>,
}

#[derive(Args)]
struct InspectArgs {
    /// Recorded steps (JSON)
    #[arg(long, value_name = "FILE")]
    steps: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log_level.clone())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Run(args) => cmd_run(args).await,
        Commands::Inspect(args) => cmd_inspect(args),
    }
}

async fn cmd_run(args: RunArgs) -> Result<()> {
    let steps = load_steps(&args.steps)?;
    let page = load_page(&args.page)?;
    let rows = match &args.data {
        Some(path) => load_rows(path)?,
        None => Vec::new(),
    };
    let mappings = match &args.mapping {
        Some(path) => load_mappings(path)?,
        None => Default::default(),
    };

    let document = Arc::new(MemoryDocument::from_specs(page));
    let transport = Arc::new(MemoryTransport::new(document.clone()));
    let executor = Arc::new(StepExecutor::new(document, transport.clone()));

    let mut step_options = StepOptions::default().with_find_timeout(args.find_timeout);
    if args.skip_missing {
        step_options = step_options.skip_on_not_found();
    }
    let mut config = RunConfig::default()
        .with_base_delay(args.base_delay)
        .with_playback_speed(args.speed)
        .with_step_options(step_options);
    if args.stop_on_error {
        config = config.stop_on_error();
    }
    if let Some(project) = args.project {
        config = config.with_project(rehearse_core_types::ProjectId(project));
    }

    let orchestrator = RunOrchestrator::new(executor, transport, config);
    let export = orchestrator.run(steps, rows, mappings).await?;

    print_summary(&export);
    if let Some(output) = &args.output {
        write_export(output, &export)?;
        info!(file = %output.display(), "export written");
    }

    if export.status != RunStatus::Completed {
        bail!("replay {}", export.status);
    }
    if export.failed > 0 {
        bail!("replay completed with {} failed step(s)", export.failed);
    }
    Ok(())
}

fn cmd_inspect(args: InspectArgs) -> Result<()> {
    let steps = load_steps(&args.steps)?;

    println!("{} steps", steps.len());
    for (index, step) in steps.iter().enumerate() {
        let locators = [
            step.bundle.id.as_ref().map(|_| "id"),
            step.bundle.name.as_ref().map(|_| "name"),
            (!step.path.is_empty()).then_some("path"),
            step.bundle.aria_label.as_ref().map(|_| "aria"),
            step.bundle.placeholder.as_ref().map(|_| "placeholder"),
            (!step.bundle.data_attributes.is_empty()).then_some("data"),
            step.bundle.css_selector.as_ref().map(|_| "css"),
            step.bundle.text.as_ref().map(|_| "text"),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(",");

        println!(
            "  {:>3} {:<6} '{}' [{}]{}",
            index,
            step.event.as_str(),
            step.label,
            if locators.is_empty() { "-" } else { locators.as_str() },
            step.value
                .as_deref()
                .map(|v| format!(" value={:?}", v))
                .unwrap_or_default()
        );
    }
    Ok(())
}
