// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `describe` and `sweep`, and all
// their flags.
//
// Both take the same dataset flags (DatasetArgs, flattened in).
// `--config run.json` replaces every dataset and sweep flag with
// the contents of a saved PipelineConfig.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::sweep_use_case::PipelineConfig;
use crate::data::decoder::ColorMode;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Summarise a dataset manifest as JSON
    Describe(DescribeArgs),

    /// Stream every epoch through the pipeline and log throughput
    Sweep(SweepArgs),
}

/// Flags shared by every command that opens a dataset.
#[derive(Args, Debug, Clone)]
pub struct DatasetArgs {
    /// Tab-separated manifest: <path>\t<class id> per line
    #[arg(long, required_unless_present = "config")]
    pub manifest: Option<String>,

    /// Directory relative record paths are resolved against
    /// (defaults to the manifest's directory)
    #[arg(long)]
    pub data_root: Option<String>,

    /// Number of classes; every class id must be below this
    #[arg(long, default_value_t = 10)]
    pub label_dim: usize,

    /// Feature element type: float or double
    #[arg(long, default_value = "float")]
    pub feature_type: String,

    /// Label element type: float or double
    #[arg(long, default_value = "float")]
    pub label_type: String,

    /// Image channel handling: rgb, gray or native
    #[arg(long, default_value = "rgb", value_parser = parse_color_mode)]
    pub color: ColorMode,

    /// Sequences decoded together as one chunk
    #[arg(long, default_value_t = 1)]
    pub sequences_per_chunk: usize,

    /// Chunks kept decoded in memory (0 = no limit)
    #[arg(long, default_value_t = 64)]
    pub max_resident_chunks: usize,
}

#[derive(Args, Debug)]
pub struct DescribeArgs {
    #[command(flatten)]
    pub dataset: DatasetArgs,

    /// Decode this many leading sequences to report their layouts
    #[arg(long, default_value_t = 0)]
    pub probe: usize,

    /// Load dataset settings from a saved pipeline config
    #[arg(long)]
    pub config: Option<String>,
}

#[derive(Args, Debug)]
pub struct SweepArgs {
    #[command(flatten)]
    pub dataset: DatasetArgs,

    /// Sequences requested per get_sequences call
    #[arg(long, default_value_t = 32)]
    pub minibatch_size: usize,

    /// Full passes over the dataset
    #[arg(long, default_value_t = 1)]
    pub epochs: usize,

    /// Visit at most this many sequences per epoch
    #[arg(long)]
    pub total_size: Option<usize>,

    /// Shuffle seed
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Keep manifest order instead of shuffling
    #[arg(long)]
    pub no_shuffle: bool,

    /// Release each minibatch's chunks as soon as it is assembled
    #[arg(long)]
    pub release_after_batch: bool,

    /// Where metrics.csv and the resolved config are written
    #[arg(long, default_value = "runs")]
    pub metrics_dir: String,

    /// Load every setting from a saved pipeline config
    #[arg(long)]
    pub config: Option<String>,
}

fn parse_color_mode(s: &str) -> Result<ColorMode, String> {
    match s.to_ascii_lowercase().as_str() {
        "rgb" => Ok(ColorMode::Rgb),
        "gray" | "grey" => Ok(ColorMode::Gray),
        "native" => Ok(ColorMode::Native),
        other => Err(format!("unknown color mode '{other}' (expected rgb, gray or native)")),
    }
}

impl DatasetArgs {
    fn apply(self, cfg: &mut PipelineConfig) {
        if let Some(manifest) = self.manifest {
            cfg.manifest_path = manifest;
        }
        cfg.data_root            = self.data_root;
        cfg.label_dimension      = self.label_dim;
        cfg.feature_element_type = self.feature_type;
        cfg.label_element_type   = self.label_type;
        cfg.color_mode           = self.color;
        cfg.sequences_per_chunk  = self.sequences_per_chunk;
        cfg.max_resident_chunks  = self.max_resident_chunks;
    }
}

/// Boundary between Layer 1 and Layer 2: the application layer
/// never sees clap types.
impl From<DatasetArgs> for PipelineConfig {
    fn from(a: DatasetArgs) -> Self {
        let mut cfg = PipelineConfig::default();
        a.apply(&mut cfg);
        cfg
    }
}

impl From<SweepArgs> for PipelineConfig {
    fn from(a: SweepArgs) -> Self {
        let mut cfg = PipelineConfig::from(a.dataset);
        cfg.minibatch_size      = a.minibatch_size;
        cfg.epochs              = a.epochs;
        cfg.total_size          = a.total_size;
        cfg.seed                = (!a.no_shuffle).then_some(a.seed);
        cfg.release_after_batch = a.release_after_batch;
        cfg.metrics_dir         = a.metrics_dir;
        cfg
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    fn sweep(args: &[&str]) -> SweepArgs {
        let argv = ["chunkfeed", "sweep"].iter().chain(args.iter()).copied();
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Sweep(a) => a,
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_sweep_flags_map_to_config() {
        let cfg: PipelineConfig = sweep(&[
            "--manifest", "d/map.txt",
            "--label-dim", "3",
            "--color", "gray",
            "--epochs", "4",
            "--no-shuffle",
        ])
        .into();
        assert_eq!(cfg.manifest_path, "d/map.txt");
        assert_eq!(cfg.label_dimension, 3);
        assert_eq!(cfg.color_mode, ColorMode::Gray);
        assert_eq!(cfg.epochs, 4);
        assert_eq!(cfg.seed, None);
    }

    #[test]
    fn test_seed_is_kept_when_shuffling() {
        let cfg: PipelineConfig = sweep(&["--manifest", "m.txt", "--seed", "9"]).into();
        assert_eq!(cfg.seed, Some(9));
    }

    #[test]
    fn test_manifest_or_config_is_required() {
        assert!(Cli::try_parse_from(["chunkfeed", "sweep"]).is_err());
        assert!(Cli::try_parse_from(["chunkfeed", "sweep", "--config", "run.json"]).is_ok());
    }

    #[test]
    fn test_unknown_color_mode() {
        assert!(parse_color_mode("cmyk").is_err());
        assert_eq!(parse_color_mode("GREY"), Ok(ColorMode::Gray));
    }
}
