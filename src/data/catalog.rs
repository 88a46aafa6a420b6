// ============================================================
// Layer 4 — Sequence Catalog
// ============================================================
// Turns the manifest's raw records into stable, addressable
// sequence descriptions.
//
//   id       = the record's 0-based line offset
//   chunk_id = ChunkPolicy::chunk_for(id)
//
// Every class id is checked against the label dimension here,
// once, so later stages can index label buffers without
// re-validating. A single out-of-range entry rejects the whole
// catalog.
//
// Reference: Rust Book §8 (Vectors), §13 (Iterators)

use std::ops::Range;

use crate::domain::error::{PipelineError, Result};
use crate::domain::record::{ChunkPolicy, RecordDescriptor, SequenceDescription};

/// Immutable index of every sequence in a dataset.
#[derive(Debug, Clone)]
pub struct SequenceCatalog {
    records:         Vec<RecordDescriptor>,
    descriptions:    Vec<SequenceDescription>,
    policy:          ChunkPolicy,
    label_dimension: usize,
}

impl SequenceCatalog {
    /// Build with the default one-sequence-per-chunk policy.
    pub fn build(records: Vec<RecordDescriptor>, label_dimension: usize) -> Result<Self> {
        Self::build_with_policy(records, label_dimension, ChunkPolicy::OnePerSequence)
    }

    pub fn build_with_policy(
        records:         Vec<RecordDescriptor>,
        label_dimension: usize,
        policy:          ChunkPolicy,
    ) -> Result<Self> {
        if label_dimension == 0 {
            return Err(PipelineError::invalid("label dimension must be at least 1"));
        }

        let descriptions = records
            .iter()
            .enumerate()
            .map(|(id, record)| {
                if record.class_id >= label_dimension {
                    return Err(PipelineError::LabelOutOfRange {
                        id,
                        class_id: record.class_id,
                        label_dimension,
                    });
                }
                Ok(SequenceDescription {
                    id,
                    chunk_id: policy.chunk_for(id),
                    number_of_samples: 1,
                    class_id: record.class_id,
                    is_valid: true,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            "Catalog built: {} sequences, {} chunks, label dimension {}",
            descriptions.len(),
            chunk_count(descriptions.len(), policy),
            label_dimension
        );

        Ok(Self {
            records,
            descriptions,
            policy,
            label_dimension,
        })
    }

    /// O(1) lookup of one sequence.
    pub fn describe(&self, id: usize) -> Option<&SequenceDescription> {
        self.descriptions.get(id)
    }

    /// Fallible lookup used on the request path.
    pub fn require(&self, id: usize) -> Result<&SequenceDescription> {
        self.describe(id).ok_or(PipelineError::UnknownSequenceId { id })
    }

    /// Every description in id order. Each call starts a fresh iteration.
    pub fn all(&self) -> std::slice::Iter<'_, SequenceDescription> {
        self.descriptions.iter()
    }

    pub fn record(&self, id: usize) -> Option<&RecordDescriptor> {
        self.records.get(id)
    }

    pub fn len(&self) -> usize {
        self.descriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptions.is_empty()
    }

    pub fn label_dimension(&self) -> usize {
        self.label_dimension
    }

    pub fn policy(&self) -> ChunkPolicy {
        self.policy
    }

    pub fn chunk_count(&self) -> usize {
        chunk_count(self.descriptions.len(), self.policy)
    }

    /// Sequence ids belonging to `chunk_id`. Empty for unknown chunks.
    ///
    /// Both policies assign consecutive ids to a chunk, so the
    /// members are always a contiguous range.
    pub fn chunk_members(&self, chunk_id: usize) -> Range<usize> {
        let size = self.policy.group_size();
        let start = chunk_id.saturating_mul(size).min(self.len());
        let end = start.saturating_add(size).min(self.len());
        start..end
    }

    /// Number of sequences per class id, indexed by class.
    pub fn class_histogram(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.label_dimension];
        for d in &self.descriptions {
            counts[d.class_id] += 1;
        }
        counts
    }
}

fn chunk_count(sequences: usize, policy: ChunkPolicy) -> usize {
    let size = policy.group_size();
    (sequences + size - 1) / size
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn records(classes: &[usize]) -> Vec<RecordDescriptor> {
        classes
            .iter()
            .enumerate()
            .map(|(i, &c)| RecordDescriptor::new(format!("img{i}.png"), c))
            .collect()
    }

    #[test]
    fn test_ids_follow_manifest_order() {
        let catalog = SequenceCatalog::build(records(&[0, 2, 1, 1]), 3).unwrap();
        let ids: Vec<usize> = catalog.all().map(|d| d.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert_eq!(catalog.len(), 4);
    }

    #[test]
    fn test_all_is_restartable() {
        let catalog = SequenceCatalog::build(records(&[0, 1]), 2).unwrap();
        let first: Vec<_> = catalog.all().copied().collect();
        let second: Vec<_> = catalog.all().copied().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_default_policy_maps_chunk_to_id() {
        let catalog = SequenceCatalog::build(records(&[0, 0, 0]), 1).unwrap();
        for d in catalog.all() {
            assert_eq!(d.chunk_id, d.id);
            assert_eq!(d.number_of_samples, 1);
            assert!(d.is_valid);
        }
        assert_eq!(catalog.chunk_members(2), 2..3);
    }

    #[test]
    fn test_out_of_range_class_rejects_catalog() {
        let err = SequenceCatalog::build(records(&[0, 3, 1]), 3).unwrap_err();
        match err {
            PipelineError::LabelOutOfRange { id, class_id, label_dimension } => {
                assert_eq!((id, class_id, label_dimension), (1, 3, 3));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_zero_label_dimension_is_invalid() {
        let err = SequenceCatalog::build(Vec::new(), 0).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidArgument(_)));
    }

    #[test]
    fn test_grouped_policy_members() {
        let catalog = SequenceCatalog::build_with_policy(
            records(&[0, 0, 0, 0, 0]),
            1,
            ChunkPolicy::with_group_size(2),
        )
        .unwrap();
        assert_eq!(catalog.chunk_count(), 3);
        assert_eq!(catalog.chunk_members(0), 0..2);
        assert_eq!(catalog.chunk_members(2), 4..5);
        assert!(catalog.chunk_members(9).is_empty());
        assert_eq!(catalog.describe(3).map(|d| d.chunk_id), Some(1));
    }

    #[test]
    fn test_unknown_id_lookup() {
        let catalog = SequenceCatalog::build(records(&[0]), 1).unwrap();
        assert!(catalog.describe(1).is_none());
        assert!(matches!(
            catalog.require(7).unwrap_err(),
            PipelineError::UnknownSequenceId { id: 7 }
        ));
    }

    #[test]
    fn test_class_histogram() {
        let catalog = SequenceCatalog::build(records(&[2, 0, 2]), 3).unwrap();
        assert_eq!(catalog.class_histogram(), vec![1, 0, 2]);
    }
}
