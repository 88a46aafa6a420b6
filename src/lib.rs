// ============================================================
// chunkfeed
// ============================================================
// Streams a tab-delimited sample manifest into typed,
// fixed-layout tensor sequences for training loops.
//
// Layers, outermost first:
//   1. cli          — clap commands (binary only)
//   2. application  — use cases: describe, sweep
//   3. domain       — errors, records, tensors, traits
//   4. data         — manifest → catalog → deserializer → batches
//   5. infra        — config store, metrics CSV
//
// Library users normally only need `data::deserializer`.

pub mod application;
pub mod cli;
pub mod data;
pub mod domain;
pub mod infra;
