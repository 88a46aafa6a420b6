// ============================================================
// Layer 5 — Metrics Logger
// ============================================================
// Records per-epoch sweep metrics to a CSV file.
//
// Metrics recorded per epoch:
//   - epoch:         the epoch number (1, 2, 3, ...)
//   - batches:       get_sequences calls made
//   - stacked:       minibatches turned into tensors
//   - sequences:     pairs returned
//   - feature_bytes: decoded feature bytes handed out
//   - chunk_loads:   chunks decoded this epoch
//   - chunk_hits:    require() calls served from memory
//   - evictions:     chunks dropped by the capacity bound
//   - elapsed_ms:    wall time for the epoch
//
// Output file: <metrics_dir>/metrics.csv
//
// Example CSV output:
//   epoch,batches,stacked,sequences,feature_bytes,chunk_loads,chunk_hits,evictions,elapsed_ms
//   1,13,13,100,1228800,100,0,92,412
//   2,13,13,100,1228800,92,8,92,388
//
// A cache that fits the dataset shows chunk_loads dropping to 0
// after the first epoch.
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

const CSV_HEADER: &str =
    "epoch,batches,stacked,sequences,feature_bytes,chunk_loads,chunk_hits,evictions,elapsed_ms";

/// One row of metrics for a single sweep epoch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch:         usize,
    pub batches:       usize,
    pub stacked:       usize,
    pub sequences:     usize,
    pub feature_bytes: usize,
    pub chunk_loads:   u64,
    pub chunk_hits:    u64,
    pub evictions:     u64,
    pub elapsed_ms:    u128,
}

impl EpochMetrics {
    /// Sequences per second, 0 when the epoch took no measurable time
    pub fn throughput(&self) -> f64 {
        if self.elapsed_ms == 0 {
            return 0.0;
        }
        self.sequences as f64 * 1000.0 / self.elapsed_ms as f64
    }

    /// Share of chunk requests served without decoding
    pub fn hit_rate(&self) -> f64 {
        let total = self.chunk_loads + self.chunk_hits;
        if total == 0 {
            return 0.0;
        }
        self.chunk_hits as f64 / total as f64
    }
}

/// Appends epoch metrics to a CSV file.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create metrics directory '{}'", dir.display()))?;

        let csv_path = dir.join("metrics.csv");

        // Appending across runs is allowed; only a new file gets a header
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "{CSV_HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        writeln!(
            f,
            "{},{},{},{},{},{},{},{},{}",
            m.epoch,
            m.batches,
            m.stacked,
            m.sequences,
            m.feature_bytes,
            m.chunk_loads,
            m.chunk_hits,
            m.evictions,
            m.elapsed_ms,
        )?;

        tracing::debug!(
            "Logged epoch {} metrics: {} sequences, hit rate {:.2}",
            m.epoch,
            m.sequences,
            m.hit_rate(),
        );

        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
