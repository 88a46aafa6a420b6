// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers to accomplish one goal each.
//
// Rules for this layer:
//   - No decoding or caching logic here (that's Layer 4)
//   - No printing here (that's Layer 1)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Dataset summary
pub mod describe_use_case;

// Multi-epoch pipeline sweep, plus PipelineConfig
pub mod sweep_use_case;
