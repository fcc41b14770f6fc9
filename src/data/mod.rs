// ============================================================
// Layer 4 — Preference Data Pipeline
// ============================================================
// Everything from raw preference rows to device-ready batches.
//
//   JSON-lines file
//       │
//       ▼
//   InMemDataset<RawRecord>   → raw rows (optionally first N)
//       │
//       ▼
//   filter_indices            → drops rows the template rejects
//       │
//       ▼
//   PreferenceEncoder         → prompt ids + [better, worse]
//       │                       modality tensor per row
//       ▼
//   PreferenceDataset         → implements Burn's Dataset trait
//       │
//       ▼
//   PreferenceCollator        → pads, masks, stacks, places
//       │
//       ▼
//   DataLoader                → feeds batches to the trainer
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Field-mapping preference template and chat template
pub mod template;

/// Fixed-shape waveform feature processor
pub mod processor;

/// Validity filtering over raw rows
pub mod filter;

/// Raw record → PreferenceSample
pub mod encoder;

/// Implements Burn's Dataset trait for preference samples
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;
