// ============================================================
// Layer 3 — Record and Sequence Descriptions
// ============================================================
// Plain data describing what the manifest contains.
//
//   RecordDescriptor    → one manifest line, exactly as written
//   SequenceDescription → the catalog's stable view of a record
//                         (id, chunk affinity, sample count)
//
// Both are built once when the catalog is constructed and are
// read-only afterwards.
//
// Reference: Rust Book §5 (Structs)

use serde::{Deserialize, Serialize};

/// One raw manifest entry: where the sample lives and its class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDescriptor {
    /// Path (or other reference) to the sample's bytes, unresolved
    pub path: String,

    /// Class index used to build the one-hot label
    pub class_id: usize,
}

impl RecordDescriptor {
    pub fn new(path: impl Into<String>, class_id: usize) -> Self {
        Self {
            path: path.into(),
            class_id,
        }
    }
}

/// Catalog entry for one addressable sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceDescription {
    /// 0-based manifest line offset; stable for the catalog's lifetime
    pub id: usize,

    /// Chunk this sequence is loaded and evicted with
    pub chunk_id: usize,

    /// Always ≥ 1; image samples are single-sample sequences
    pub number_of_samples: usize,

    pub class_id: usize,

    pub is_valid: bool,
}

// ─── ChunkPolicy ──────────────────────────────────────────────────────────────
/// How sequences are grouped into chunks.
///
/// `OnePerSequence` gives every sequence its own chunk.
/// `Grouped` packs `sequences_per_chunk` consecutive ids into one
/// chunk so a whole group is decoded and evicted together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChunkPolicy {
    #[default]
    OnePerSequence,
    Grouped { sequences_per_chunk: usize },
}

impl ChunkPolicy {
    /// Build a policy from a group size; 0 and 1 both mean one per sequence.
    pub fn with_group_size(sequences_per_chunk: usize) -> Self {
        if sequences_per_chunk <= 1 {
            Self::OnePerSequence
        } else {
            Self::Grouped { sequences_per_chunk }
        }
    }

    /// Chunk id for a sequence id under this policy.
    pub fn chunk_for(&self, sequence_id: usize) -> usize {
        match *self {
            Self::OnePerSequence => sequence_id,
            Self::Grouped { sequences_per_chunk } => sequence_id / sequences_per_chunk.max(1),
        }
    }

    pub fn group_size(&self) -> usize {
        match *self {
            Self::OnePerSequence => 1,
            Self::Grouped { sequences_per_chunk } => sequences_per_chunk.max(1),
        }
    }
}
