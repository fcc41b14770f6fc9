// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers for one command:
//
//   prepare  — raw preference rows → batches on a device
//   evaluate — cached model outputs → benchmark scores
//
// Rules for this layer:
//   - No tensor math or scoring rules here
//   - No printing here (that's Layer 1)
//   - File access only through Layer 4 and Layer 6 helpers
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// The preference-data preparation workflow
pub mod prepare_use_case;

// The benchmark scoring workflow
pub mod evaluate_use_case;
