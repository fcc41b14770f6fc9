// ============================================================
// Layer 5 — Evaluation Scoring
// ============================================================
// Scores cached model outputs against benchmark items.
//
//   benchmark items (JSONL)      InferenceOutput list
//            │                           │
//            └──────────┬────────────────┘
//                       ▼
//               match_outputs        → (item, output) pairs,
//                       │              first output per id only
//                       ▼
//               Benchmark::judge     → DetailRecord + verdict
//                       │
//                       ▼
//               TaskScore            → confusion / match counts
//                       │
//                       ▼
//               BenchmarkAggregator  → mean over scored tasks

/// Pairs items with outputs by question_id
pub mod matcher;

/// Strict, loose and yes/no answer judgers
pub mod judge;

/// Confusion counts, match counts and task averaging
pub mod scoring;

/// Per-item detail records and where they are written
pub mod sink;

/// POPE and A-OKVQA task evaluation
pub mod benchmark;
