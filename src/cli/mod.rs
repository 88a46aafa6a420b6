// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, parsed with `clap`.
// All real work is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `describe` — prints a JSON summary of a dataset manifest
//   2. `sweep`    — streams every epoch through the pipeline and
//                   writes per-epoch metrics
//
// Reference: Rust Book §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, DescribeArgs, SweepArgs};

use crate::application::sweep_use_case::PipelineConfig;
use crate::infra::config_store::ConfigStore;

#[derive(Parser, Debug)]
#[command(
    name = "chunkfeed",
    version,
    about = "Stream labelled image datasets from a manifest into training batches."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the use case. The CLI only routes, never computes.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Describe(args) => run_describe(args),
            Commands::Sweep(args)    => run_sweep(args),
        }
    }
}

fn load_or(config: Option<&str>, fallback: impl FnOnce() -> PipelineConfig) -> Result<PipelineConfig> {
    match config {
        Some(path) => {
            tracing::info!("Loading pipeline config from '{}'", path);
            ConfigStore::new(path).load()
        }
        None => Ok(fallback()),
    }
}

fn run_describe(args: DescribeArgs) -> Result<()> {
    use crate::application::describe_use_case::DescribeUseCase;

    let cfg = load_or(args.config.as_deref(), || args.dataset.clone().into())?;
    let summary = DescribeUseCase::new(cfg, args.probe).execute()?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn run_sweep(args: SweepArgs) -> Result<()> {
    use crate::application::sweep_use_case::SweepUseCase;

    let config = args.config.clone();
    let cfg = load_or(config.as_deref(), || args.into())?;
    let metrics_dir = cfg.metrics_dir.clone();

    let history = SweepUseCase::new(cfg).execute()?;

    let sequences: usize = history.iter().map(|m| m.sequences).sum();
    println!(
        "Sweep complete: {} epochs, {} sequences. Metrics in '{}'.",
        history.len(),
        sequences,
        metrics_dir
    );
    Ok(())
}
