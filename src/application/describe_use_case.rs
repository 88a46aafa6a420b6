// ============================================================
// Layer 2 — DescribeUseCase
// ============================================================
// Summarises a dataset without sweeping it:
//
//   Step 1: Build the deserializer          (Layer 4 - data)
//   Step 2: Count sequences, chunks, classes (Layer 4 - data)
//   Step 3: Optionally decode the first N    (Layer 4 - data)
//           sequences to report sample layouts
//
// The summary serialises to JSON for the CLI.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::application::sweep_use_case::PipelineConfig;
use crate::data::deserializer::{Deserializer, DeserializerConfig};
use crate::domain::record::ChunkPolicy;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub manifest:             String,
    pub sequences:            usize,
    pub chunks:               usize,
    pub chunk_policy:         ChunkPolicy,
    pub label_dimension:      usize,
    pub feature_element_type: String,
    pub label_element_type:   String,
    /// Sequences per class id
    pub class_histogram:      Vec<usize>,
    /// "WxHxC" → count, over the probed sequences
    pub probed_layouts:       BTreeMap<String, usize>,
}

pub struct DescribeUseCase {
    config: PipelineConfig,
    probe:  usize,
}

impl DescribeUseCase {
    /// `probe` is how many leading sequences to decode (0 = none).
    pub fn new(config: PipelineConfig, probe: usize) -> Self {
        Self { config, probe }
    }

    pub fn execute(&self) -> Result<DatasetSummary> {
        let cfg = &self.config;

        // ── Step 1 ────────────────────────────────────────────────────────────
        let mut deserializer = Deserializer::new(&DeserializerConfig::from(cfg))
            .with_context(|| format!("Cannot open dataset '{}'", cfg.manifest_path))?;

        // ── Step 2 ────────────────────────────────────────────────────────────
        let catalog = deserializer.catalog();
        let mut summary = DatasetSummary {
            manifest:             cfg.manifest_path.clone(),
            sequences:            catalog.len(),
            chunks:               catalog.chunk_count(),
            chunk_policy:         catalog.policy(),
            label_dimension:      catalog.label_dimension(),
            feature_element_type: deserializer.feature_element_type().to_string(),
            label_element_type:   deserializer.label_element_type().to_string(),
            class_histogram:      catalog.class_histogram(),
            probed_layouts:       BTreeMap::new(),
        };

        // ── Step 3 ────────────────────────────────────────────────────────────
        let ids: Vec<usize> = (0..self.probe.min(summary.sequences)).collect();
        for pair in deserializer.get_sequences_with(&ids, true)? {
            *summary
                .probed_layouts
                .entry(pair.features.layout.to_string())
                .or_insert(0) += 1;
        }

        tracing::info!(
            "Dataset '{}': {} sequences, {} chunks, {} classes",
            summary.manifest,
            summary.sequences,
            summary.chunks,
            summary.label_dimension
        );
        Ok(summary)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_summary_counts_and_layouts() {
        let dir = tempdir().unwrap();
        image::RgbImage::new(5, 3).save(dir.path().join("a.png")).unwrap();
        image::RgbImage::new(5, 3).save(dir.path().join("b.png")).unwrap();
        image::RgbImage::new(2, 2).save(dir.path().join("c.png")).unwrap();
        let manifest = dir.path().join("map.txt");
        fs::write(&manifest, "a.png\t0\nb.png\t2\nc.png\t2\n").unwrap();

        let cfg = PipelineConfig {
            manifest_path: manifest.to_string_lossy().into_owned(),
            label_dimension: 4,
            sequences_per_chunk: 2,
            ..Default::default()
        };

        let summary = DescribeUseCase::new(cfg, 10).execute().unwrap();
        assert_eq!(summary.sequences, 3);
        assert_eq!(summary.chunks, 2);
        assert_eq!(summary.class_histogram, vec![1, 0, 2, 0]);
        assert_eq!(summary.feature_element_type, "float32");
        assert_eq!(summary.probed_layouts.get("5x3x3"), Some(&2));
        assert_eq!(summary.probed_layouts.get("2x2x3"), Some(&1));
    }

    #[test]
    fn test_no_probe_decodes_nothing() {
        let dir = tempdir().unwrap();
        let manifest = dir.path().join("map.txt");
        // The image does not exist; without probing it is never opened
        fs::write(&manifest, "missing.png\t0\n").unwrap();

        let cfg = PipelineConfig {
            manifest_path: manifest.to_string_lossy().into_owned(),
            label_dimension: 1,
            ..Default::default()
        };
        let summary = DescribeUseCase::new(cfg, 0).execute().unwrap();
        assert_eq!(summary.sequences, 1);
        assert!(summary.probed_layouts.is_empty());
    }
}
