// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The two seams the rest of the pipeline is written against:
//
//   RecordSource  → anything that can enumerate raw records
//                   (the tab-delimited manifest today)
//   SampleDecoder → anything that can turn a record's bytes
//                   into a canonical tensor (images, dense
//                   pre-extracted tensors, ...)
//
// The chunk store, the label pairing and the ordering logic
// only ever see these traits, so no decoding backend leaks
// into the core.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)
//            Rust Book §17 (Trait Objects)

use std::path::Path;

use crate::domain::error::Result;
use crate::domain::record::RecordDescriptor;
use crate::domain::tensor::{DecodedSample, ElementType};

// ─── RecordSource ─────────────────────────────────────────────────────────────
/// Any component that can enumerate the records of a dataset.
///
/// Implementations:
///   - ManifestIndex → tab-delimited `<path>\t<classId>` file
pub trait RecordSource {
    /// Read every record, in source order. Must be restartable:
    /// calling it twice yields the same records.
    fn load_all(&self) -> Result<Vec<RecordDescriptor>>;
}

// ─── SampleDecoder ────────────────────────────────────────────────────────────
/// Any component that can decode one sample from disk.
///
/// Implementations:
///   - ImageDecoder → PNG / JPEG / BMP / ... via the `image` crate
///   - DenseDecoder → binary "DSMP" tensors in any storage order
///   - AutoDecoder  → sniffs the bytes and picks one of the above
///
/// Returned data must be contiguous, in canonical (width, height,
/// channels) order, and of exactly `target` element type.
pub trait SampleDecoder: Send + Sync {
    fn decode(&self, path: &Path, target: ElementType) -> Result<DecodedSample>;

    /// Short name used in log lines.
    fn name(&self) -> &'static str;
}
