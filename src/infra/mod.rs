// ============================================================
// Layer 5 — Infrastructure Layer
// ============================================================
// Cross-cutting file concerns that don't belong to any one
// business layer:
//
//   config_store.rs — PipelineConfig as JSON, so a run can be
//                     saved next to its metrics and replayed
//
//   metrics.rs      — per-epoch sweep metrics (sequences,
//                     chunk loads, evictions, wall time)
//                     appended to a CSV file
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)

/// Pipeline config persistence
pub mod config_store;

/// Sweep metrics CSV logger
pub mod metrics;
