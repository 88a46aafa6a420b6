// ============================================================
// Layer 4 — Deserializer (facade)
// ============================================================
// The one object the training loop talks to. It ties the rest of
// the data layer together:
//
//   manifest ─▶ ManifestIndex ─▶ SequenceCatalog
//                                      │
//   get_sequences(ids) ────────────────┤
//                                      ▼
//                 ChunkStore::require ─▶ SampleDecoder
//                                      │
//                       LabelEncoder ──┤
//                                      ▼
//                       Vec<SequencePair> (same order as ids)
//
// Boundary operations exposed to the loop:
//   start_epoch      → record per-epoch configuration
//   get_sequences    → decoded (feature, label) pairs
//   require_chunk /
//   release_chunk    → explicit lifecycle for prefetching callers
//   describe_all     → catalog introspection for samplers
//
// Ownership: returned buffers are Arc handles. Nothing is cleared
// at the start of the next request; a buffer lives until both the
// store has released its chunk and the caller has dropped it.
//
// Failure: ids are validated before any chunk is touched. A
// decode failure aborts the request; chunks loaded earlier in the
// same request stay Loaded, the failing chunk stays NotLoaded,
// and every pin is dropped.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::data::catalog::SequenceCatalog;
use crate::data::chunk_store::{ChunkState, ChunkStats, ChunkStore};
use crate::data::decoder::{AutoDecoder, ColorMode};
use crate::data::label::LabelEncoder;
use crate::data::manifest::ManifestIndex;
use crate::data::sampler::EpochConfiguration;
use crate::domain::error::{PipelineError, Result};
use crate::domain::record::{ChunkPolicy, SequenceDescription};
use crate::domain::tensor::{ElementType, SampleLayout, Sequence, SequencePair, TensorBuffer};
use crate::domain::traits::{RecordSource, SampleDecoder};

/// Everything needed to stand up a deserializer from a manifest.
#[derive(Debug, Clone)]
pub struct DeserializerConfig {
    pub manifest_path: PathBuf,

    /// Relative record paths are joined onto this, if set
    pub data_root: Option<PathBuf>,

    pub label_dimension: usize,

    /// Type id such as "float" or "double"
    pub feature_element_type: String,

    pub label_element_type: String,

    pub color_mode: ColorMode,

    /// 0 keeps every loaded chunk resident
    pub max_resident_chunks: usize,

    pub chunk_policy: ChunkPolicy,
}

impl DeserializerConfig {
    pub fn new(manifest_path: impl Into<PathBuf>, label_dimension: usize) -> Self {
        Self {
            manifest_path: manifest_path.into(),
            data_root: None,
            label_dimension,
            feature_element_type: "float".to_string(),
            label_element_type: "float".to_string(),
            color_mode: ColorMode::default(),
            max_resident_chunks: 0,
            chunk_policy: ChunkPolicy::default(),
        }
    }
}

pub struct Deserializer {
    catalog:         SequenceCatalog,
    labels:          LabelEncoder,
    label_layout:    SampleLayout,
    labels_by_class: HashMap<usize, Arc<TensorBuffer>>,
    decoder:         Box<dyn SampleDecoder>,
    feature_type:    ElementType,
    data_root:       Option<PathBuf>,
    store:           ChunkStore,
    epoch:           Option<EpochConfiguration>,
}

impl Deserializer {
    /// Read the manifest, build the catalog and the label encoder.
    pub fn new(config: &DeserializerConfig) -> Result<Self> {
        let feature_type = config.feature_element_type.parse::<ElementType>()?;
        let labels = LabelEncoder::from_type_id(&config.label_element_type, config.label_dimension)?;

        let records = ManifestIndex::new(&config.manifest_path).load_all()?;
        let catalog = SequenceCatalog::build_with_policy(records, config.label_dimension, config.chunk_policy)?;

        let mut deserializer = Self::from_parts(
            catalog,
            labels,
            Box::new(AutoDecoder::new(config.color_mode)),
            feature_type,
            ChunkStore::new(config.max_resident_chunks),
        )?;
        deserializer.data_root = config.data_root.clone();

        tracing::info!(
            "Deserializer ready: {} sequences in {} chunks, features {}, labels {}x{}",
            deserializer.catalog.len(),
            deserializer.catalog.chunk_count(),
            feature_type,
            deserializer.labels.dimension(),
            deserializer.labels.element_type(),
        );
        Ok(deserializer)
    }

    /// Assemble from already-built components.
    pub fn from_parts(
        catalog:      SequenceCatalog,
        labels:       LabelEncoder,
        decoder:      Box<dyn SampleDecoder>,
        feature_type: ElementType,
        store:        ChunkStore,
    ) -> Result<Self> {
        if labels.dimension() != catalog.label_dimension() {
            return Err(PipelineError::invalid(format!(
                "label encoder dimension {} does not match catalog label dimension {}",
                labels.dimension(),
                catalog.label_dimension()
            )));
        }

        Ok(Self {
            label_layout: SampleLayout::vector(labels.dimension()),
            catalog,
            labels,
            labels_by_class: HashMap::new(),
            decoder,
            feature_type,
            data_root: None,
            store,
            epoch: None,
        })
    }

    pub fn catalog(&self) -> &SequenceCatalog {
        &self.catalog
    }

    pub fn feature_element_type(&self) -> ElementType {
        self.feature_type
    }

    pub fn label_element_type(&self) -> ElementType {
        self.labels.element_type()
    }

    /// Every sequence description, in id order. Restartable.
    pub fn describe_all(&self) -> std::slice::Iter<'_, SequenceDescription> {
        self.catalog.all()
    }

    /// Record the configuration for the coming epoch.
    ///
    /// Nothing in the core depends on it yet; it is the hook where
    /// per-epoch partitioning would plug in.
    pub fn start_epoch(&mut self, config: EpochConfiguration) {
        tracing::debug!(
            "Starting epoch {} (minibatch {}, total {:?})",
            config.epoch,
            config.minibatch_size,
            config.total_size
        );
        self.epoch = Some(config);
    }

    pub fn epoch_configuration(&self) -> Option<&EpochConfiguration> {
        self.epoch.as_ref()
    }

    /// Decoded (feature, label) pairs for `ids`, in the same order.
    /// An empty `ids` is rejected.
    pub fn get_sequences(&mut self, ids: &[usize]) -> Result<Vec<SequencePair>> {
        self.get_sequences_with(ids, false)
    }

    /// Like get_sequences, but an empty `ids` yields an empty result
    /// when `allow_empty` is set.
    pub fn get_sequences_with(&mut self, ids: &[usize], allow_empty: bool) -> Result<Vec<SequencePair>> {
        if ids.is_empty() {
            return if allow_empty {
                Ok(Vec::new())
            } else {
                Err(PipelineError::invalid("no sequence ids requested"))
            };
        }

        // Validate everything up front so a bad id never leaves
        // half a batch of chunk transitions behind.
        let descriptions = ids
            .iter()
            .map(|&id| self.catalog.require(id).copied())
            .collect::<Result<Vec<_>>>()?;

        let result = self.assemble(&descriptions);
        self.store.end_batch();

        if let Ok(pairs) = &result {
            tracing::debug!(
                "Assembled {} pairs, {} chunks resident",
                pairs.len(),
                self.store.resident_count()
            );
        }
        result
    }

    fn assemble(&mut self, descriptions: &[SequenceDescription]) -> Result<Vec<SequencePair>> {
        let mut pairs = Vec::with_capacity(descriptions.len());

        // Pin the whole batch first so loading one of its chunks cannot
        // evict another that is already resident
        for d in descriptions {
            self.store.pin(d.chunk_id);
        }

        for d in descriptions {
            load_chunk(
                &mut self.store,
                &self.catalog,
                self.decoder.as_ref(),
                self.data_root.as_deref(),
                self.feature_type,
                d.chunk_id,
            )?;

            let sample = self.store.sample(d.chunk_id, d.id).ok_or_else(|| {
                PipelineError::invalid(format!("chunk {} does not hold sequence {}", d.chunk_id, d.id))
            })?;

            let label = self.label_for(d.class_id)?;

            pairs.push(SequencePair {
                id: d.id,
                features: Sequence {
                    data: sample.data,
                    layout: sample.layout,
                    number_of_samples: d.number_of_samples,
                },
                label: Sequence {
                    data: label,
                    layout: self.label_layout,
                    number_of_samples: d.number_of_samples,
                },
            });
        }

        Ok(pairs)
    }

    /// One immutable label buffer per class, shared by every pair of
    /// that class.
    fn label_for(&mut self, class_id: usize) -> Result<Arc<TensorBuffer>> {
        if let Some(label) = self.labels_by_class.get(&class_id) {
            return Ok(Arc::clone(label));
        }
        let label = Arc::new(self.labels.encode_owned(class_id)?);
        self.labels_by_class.insert(class_id, Arc::clone(&label));
        Ok(label)
    }

    /// Load a chunk ahead of a request. Returns true if it was newly loaded.
    pub fn require_chunk(&mut self, chunk_id: usize) -> Result<bool> {
        load_chunk(
            &mut self.store,
            &self.catalog,
            self.decoder.as_ref(),
            self.data_root.as_deref(),
            self.feature_type,
            chunk_id,
        )
    }

    /// Drop a chunk's buffers. Unknown or already released ids are a no-op.
    pub fn release_chunk(&mut self, chunk_id: usize) -> bool {
        self.store.release(chunk_id)
    }

    pub fn chunk_state(&self, chunk_id: usize) -> ChunkState {
        self.store.state(chunk_id)
    }

    pub fn chunk_stats(&self) -> ChunkStats {
        self.store.stats()
    }

    pub fn resident_chunks(&self) -> usize {
        self.store.resident_count()
    }
}

fn resolve(root: Option<&Path>, path: &str) -> PathBuf {
    let path = Path::new(path);
    match root {
        Some(root) if path.is_relative() => root.join(path),
        _ => path.to_path_buf(),
    }
}

fn load_chunk(
    store:        &mut ChunkStore,
    catalog:      &SequenceCatalog,
    decoder:      &dyn SampleDecoder,
    root:         Option<&Path>,
    feature_type: ElementType,
    chunk_id:     usize,
) -> Result<bool> {
    if chunk_id >= catalog.chunk_count() {
        return Err(PipelineError::invalid(format!(
            "unknown chunk id {chunk_id} ({} chunks)",
            catalog.chunk_count()
        )));
    }

    store.require(chunk_id, catalog.chunk_members(chunk_id), |sequence_id| {
        let record = catalog
            .record(sequence_id)
            .ok_or(PipelineError::UnknownSequenceId { id: sequence_id })?;
        let path = resolve(root, &record.path);
        tracing::trace!("Decoding sequence {} with {} decoder", sequence_id, decoder.name());
        decoder.decode(&path, feature_type)
    })
}
