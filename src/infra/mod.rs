// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// File-system concerns shared by the use cases:
//
//   tokenizer_store.rs — loads tokenizer.json and
//                        tokenizer_config.json into an
//                        HfTokenizer (the TextTokenizer the
//                        encoder uses)
//
//   output_store.rs    — JSON cache of generated outputs per
//                        task, so scoring can be rerun without
//                        regenerating
//
//   metrics.rs         — appends per-task and overall scores
//                        to {output_dir}/scores.csv
//
// Everything here returns anyhow::Result with file paths in the
// error context.
//
// Reference: Rust Book §9 (Error Handling with anyhow)

/// HuggingFace tokenizer loading
pub mod tokenizer_store;

/// Raw output cache
pub mod output_store;

/// Score CSV logger
pub mod metrics;
