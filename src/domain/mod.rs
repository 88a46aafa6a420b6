// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust structs, enums and traits that define what the
// loading pipeline talks about.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - NO decoding backends
//
// Everything in here can be unit tested without touching disk.
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Structured error taxonomy and Result alias
pub mod error;

// Manifest records, sequence descriptions, chunk grouping policy
pub mod record;

// Element types, tensor buffers, layouts and output sequences
pub mod tensor;

// Core abstractions (traits) that other layers implement
pub mod traits;
