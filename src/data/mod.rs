// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between a manifest file on disk and decoded,
// labelled tensors in memory.
//
//   manifest (path \t class_id per line)
//       │
//       ▼
//   ManifestIndex     → RecordDescriptors, in file order
//       │
//       ▼
//   SequenceCatalog   → ids, chunk ids, validated class ids
//       │
//       ▼
//   Deserializer      → get_sequences(ids)
//       │   ├── ChunkStore    → resident decoded chunks, LRU bound
//       │   ├── SampleDecoder → image / dense files to tensors
//       │   └── LabelEncoder  → one-hot label vectors
//       ▼
//   SequencePairs
//       │
//       ▼
//   SequenceBatcher   → Burn tensors [N, H, W, C] and [N, D]
//
// EpochSampler sits beside the deserializer and decides which ids
// each minibatch asks for.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads the tab-separated manifest
pub mod manifest;

/// Assigns ids and chunk ids, validates labels
pub mod catalog;

/// One-hot label vectors
pub mod label;

/// Image and dense-sample decoders
pub mod decoder;

/// Bounded cache of decoded chunks
pub mod chunk_store;

/// Facade the training loop talks to
pub mod deserializer;

/// Per-epoch shuffling and minibatching
pub mod sampler;

/// Stacks sequence pairs into Burn tensors
pub mod batcher;
