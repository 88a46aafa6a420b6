// ============================================================
// Layer 2 — SweepUseCase
// ============================================================
// Drives the data pipeline the way a training loop would,
// without a model on the other end:
//
//   Step 1: Build the deserializer      (Layer 4 - data)
//   Step 2: Build the epoch sampler     (Layer 4 - data)
//   Step 3: Save the resolved config    (Layer 5 - infra)
//   For each epoch:
//     Step 4: start_epoch               (Layer 4 - data)
//     Step 5: get_sequences per batch   (Layer 4 - data)
//     Step 6: stack into Burn tensors   (Layer 4 - data)
//     Step 7: release the batch chunks  (Layer 4 - data, optional)
//     Step 8: log epoch metrics         (Layer 5 - infra)
//
// Useful for measuring decode throughput and tuning the chunk
// cache size before wiring the pipeline into real training.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

use anyhow::{Context, Result};
use burn::backend::NdArray;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::data::{
    batcher::SequenceBatcher,
    decoder::ColorMode,
    deserializer::{Deserializer, DeserializerConfig},
    sampler::{EpochConfiguration, EpochSampler},
};
use crate::domain::record::ChunkPolicy;
use crate::infra::{
    config_store::ConfigStore,
    metrics::{EpochMetrics, MetricsLogger},
};

// ─── Pipeline Configuration ──────────────────────────────────────────────────
// Every knob of a pipeline run. Serialisable so a run can be saved
// next to its metrics and replayed with `--config`. Missing fields
// in a JSON file fall back to the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub manifest_path:        String,
    pub data_root:            Option<String>,
    pub label_dimension:      usize,
    pub feature_element_type: String,
    pub label_element_type:   String,
    pub color_mode:           ColorMode,
    pub max_resident_chunks:  usize,
    pub sequences_per_chunk:  usize,
    pub minibatch_size:       usize,
    pub epochs:               usize,
    pub total_size:           Option<usize>,
    pub seed:                 Option<u64>,
    pub release_after_batch:  bool,
    pub metrics_dir:          String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            manifest_path:        "data/map.txt".to_string(),
            data_root:            None,
            label_dimension:      10,
            feature_element_type: "float".to_string(),
            label_element_type:   "float".to_string(),
            color_mode:           ColorMode::Rgb,
            max_resident_chunks:  64,
            sequences_per_chunk:  1,
            minibatch_size:       32,
            epochs:               1,
            total_size:           None,
            seed:                 Some(42),
            release_after_batch:  false,
            metrics_dir:          "runs".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Epoch settings for the 1-based `epoch`.
    pub fn epoch(&self, epoch: usize) -> EpochConfiguration {
        EpochConfiguration {
            epoch,
            minibatch_size: self.minibatch_size,
            total_size:     self.total_size,
            seed:           self.seed,
        }
    }

    /// Record paths are resolved against `data_root`, or against the
    /// manifest's directory when no root is given.
    pub fn resolved_data_root(&self) -> Option<PathBuf> {
        match &self.data_root {
            Some(root) => Some(PathBuf::from(root)),
            None => Path::new(&self.manifest_path)
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf),
        }
    }
}

impl From<&PipelineConfig> for DeserializerConfig {
    fn from(cfg: &PipelineConfig) -> Self {
        Self {
            manifest_path:        PathBuf::from(&cfg.manifest_path),
            data_root:            cfg.resolved_data_root(),
            label_dimension:      cfg.label_dimension,
            feature_element_type: cfg.feature_element_type.clone(),
            label_element_type:   cfg.label_element_type.clone(),
            color_mode:           cfg.color_mode,
            max_resident_chunks:  cfg.max_resident_chunks,
            chunk_policy:         ChunkPolicy::with_group_size(cfg.sequences_per_chunk),
        }
    }
}

// ─── SweepUseCase ─────────────────────────────────────────────────────────────
pub struct SweepUseCase {
    config: PipelineConfig,
}

impl SweepUseCase {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run every epoch and return the per-epoch metrics.
    pub fn execute(&self) -> Result<Vec<EpochMetrics>> {
        let cfg = &self.config;

        // ── Step 1: Deserializer ──────────────────────────────────────────────
        let mut deserializer = Deserializer::new(&DeserializerConfig::from(cfg))
            .with_context(|| format!("Cannot open dataset '{}'", cfg.manifest_path))?;

        // ── Step 2: Sampler ───────────────────────────────────────────────────
        let sampler = EpochSampler::new(deserializer.describe_all());
        if sampler.is_empty() {
            tracing::warn!("Manifest '{}' lists no sequences", cfg.manifest_path);
        }

        // ── Step 3: Save the resolved config beside the metrics ───────────────
        let metrics = MetricsLogger::new(&cfg.metrics_dir)?;
        ConfigStore::new(Path::new(&cfg.metrics_dir).join("pipeline_config.json")).save(cfg)?;

        let batcher = SequenceBatcher::<NdArray>::new(Default::default());
        let mut history = Vec::with_capacity(cfg.epochs);

        for epoch in 1..=cfg.epochs {
            // ── Step 4: Epoch configuration ───────────────────────────────────
            let epoch_cfg = cfg.epoch(epoch);
            deserializer.start_epoch(epoch_cfg.clone());

            let started = Instant::now();
            let before = deserializer.chunk_stats();
            let mut row = EpochMetrics { epoch, ..Default::default() };

            for ids in sampler.minibatches(&epoch_cfg) {
                // ── Step 5: Fetch ─────────────────────────────────────────────
                let pairs = deserializer
                    .get_sequences(&ids)
                    .with_context(|| format!("Epoch {epoch}: fetching {} sequences failed", ids.len()))?;

                row.batches += 1;
                row.sequences += pairs.len();
                row.feature_bytes += pairs.iter().map(|p| p.features.data.byte_len()).sum::<usize>();

                // ── Step 6: Stack ─────────────────────────────────────────────
                if SequenceBatcher::<NdArray>::is_stackable(&pairs) {
                    let batch = batcher.batch(&pairs)?;
                    tracing::trace!("Batch features {:?}", batch.features.dims());
                    row.stacked += 1;
                } else {
                    tracing::debug!("Minibatch {} mixes sample layouts; not stacked", row.batches);
                }

                // ── Step 7: Release ───────────────────────────────────────────
                if cfg.release_after_batch {
                    let chunks: BTreeSet<usize> = ids
                        .iter()
                        .filter_map(|&id| deserializer.catalog().describe(id))
                        .map(|d| d.chunk_id)
                        .collect();
                    for chunk_id in chunks {
                        deserializer.release_chunk(chunk_id);
                    }
                }
            }

            // ── Step 8: Metrics ───────────────────────────────────────────────
            let after = deserializer.chunk_stats();
            row.chunk_loads = after.loads - before.loads;
            row.chunk_hits = after.hits - before.hits;
            row.evictions = after.evictions - before.evictions;
            row.elapsed_ms = started.elapsed().as_millis();

            metrics.log(&row)?;
            tracing::info!(
                "Epoch {}/{}: {} sequences in {} batches, {} chunk loads, {:.1} seq/s",
                epoch,
                cfg.epochs,
                row.sequences,
                row.batches,
                row.chunk_loads,
                row.throughput(),
            );
            history.push(row);
        }

        tracing::info!("Metrics written to '{}'", metrics.csv_path().display());
        Ok(history)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn dataset(n: usize, label_dimension: usize) -> (TempDir, PipelineConfig) {
        let dir = tempdir().unwrap();
        let mut manifest = String::new();
        for i in 0..n {
            let name = format!("s{i}.png");
            image::GrayImage::from_pixel(4, 4, image::Luma([i as u8]))
                .save(dir.path().join(&name))
                .unwrap();
            manifest.push_str(&format!("{name}\t{}\n", i % label_dimension));
        }
        let manifest_path = dir.path().join("map.txt");
        fs::write(&manifest_path, manifest).unwrap();

        let cfg = PipelineConfig {
            manifest_path: manifest_path.to_string_lossy().into_owned(),
            label_dimension,
            minibatch_size: 3,
            metrics_dir: dir.path().join("run").to_string_lossy().into_owned(),
            ..Default::default()
        };
        (dir, cfg)
    }

    #[test]
    fn test_sweep_visits_every_sequence_each_epoch() {
        let (_dir, mut cfg) = dataset(7, 3);
        cfg.epochs = 2;

        let history = SweepUseCase::new(cfg.clone()).execute().unwrap();
        assert_eq!(history.len(), 2);
        for row in &history {
            assert_eq!(row.sequences, 7);
            assert_eq!(row.batches, 3);
            assert_eq!(row.stacked, 3);
            // 4x4 RGB at f32
            assert_eq!(row.feature_bytes, 7 * 4 * 4 * 3 * 4);
        }
        // Everything fits the cache, so the second epoch decodes nothing
        assert_eq!(history[0].chunk_loads, 7);
        assert_eq!(history[1].chunk_loads, 0);
        assert_eq!(history[1].chunk_hits, 7);

        let csv = fs::read_to_string(Path::new(&cfg.metrics_dir).join("metrics.csv")).unwrap();
        assert_eq!(csv.lines().count(), 3);
        let saved = ConfigStore::new(Path::new(&cfg.metrics_dir).join("pipeline_config.json"))
            .load()
            .unwrap();
        assert_eq!(saved, cfg);
    }

    #[test]
    fn test_release_after_batch_forces_reloads() {
        let (_dir, mut cfg) = dataset(4, 2);
        cfg.epochs = 2;
        cfg.release_after_batch = true;

        let history = SweepUseCase::new(cfg).execute().unwrap();
        assert_eq!(history[1].chunk_loads, 4);
        assert_eq!(history[1].chunk_hits, 0);
    }

    #[test]
    fn test_total_size_caps_each_epoch() {
        let (_dir, mut cfg) = dataset(6, 2);
        cfg.total_size = Some(4);
        let history = SweepUseCase::new(cfg).execute().unwrap();
        assert_eq!(history[0].sequences, 4);
    }

    #[test]
    fn test_bad_label_dimension_fails() {
        let (_dir, mut cfg) = dataset(3, 3);
        cfg.label_dimension = 2;
        assert!(SweepUseCase::new(cfg).execute().is_err());
    }

    #[test]
    fn test_data_root_defaults_to_manifest_directory() {
        let cfg = PipelineConfig {
            manifest_path: "/data/set/map.txt".to_string(),
            ..Default::default()
        };
        assert_eq!(cfg.resolved_data_root(), Some(PathBuf::from("/data/set")));

        let bare = PipelineConfig { manifest_path: "map.txt".to_string(), ..Default::default() };
        assert_eq!(bare.resolved_data_root(), None);

        let explicit = PipelineConfig { data_root: Some("/imgs".to_string()), ..bare };
        assert_eq!(explicit.resolved_data_root(), Some(PathBuf::from("/imgs")));
    }
}
