// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The collaborators the core consumes but does not own:
//
//   PreferenceTemplate — record → (prompt, better/worse payloads),
//                        with OPTIONAL equality/validation checks
//   TextTokenizer      — prompt → token ids
//   ModalityProcessor  — signal → fixed-shape feature tensor
//   GenerationEngine   — prompts → generated texts
//
// Implementations in this crate:
//   - FieldTemplate     (data::template)
//   - HfTokenizer       (infra::tokenizer_store)
//   - WaveformProcessor (data::processor)
//   - no GenerationEngine; benchmarks are scored from cached
//     outputs unless the caller supplies one
//
// All of them are Send + Sync so a dataset holding them can be
// shared with burn's multi-worker DataLoader.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;
use burn::tensor::TensorData;

use crate::domain::error;
use crate::domain::inference::{GenerationRequest, RawGeneration, SamplingConfig};
use crate::domain::modality::MultiModalInfo;
use crate::domain::record::RawRecord;

// ─── RecordCheck ──────────────────────────────────────────────────────────────
/// A yes/no predicate over a raw record.
/// Any `Fn(&RawRecord) -> bool` closure is a RecordCheck.
pub trait RecordCheck: Send + Sync {
    fn check(&self, record: &RawRecord) -> bool;
}

impl<F> RecordCheck for F
where
    F: Fn(&RawRecord) -> bool + Send + Sync,
{
    fn check(&self, record: &RawRecord) -> bool {
        self(record)
    }
}

// ─── PreferenceTemplate ───────────────────────────────────────────────────────
/// Turns a raw record into a prompt plus the better/worse payloads.
///
/// The two checks are optional capabilities: a template that
/// does not provide them keeps the default `None`, and the
/// validity filter then treats every record as valid.
pub trait PreferenceTemplate: Send + Sync {
    fn format_preference_sample(
        &self,
        record: &RawRecord,
    ) -> error::Result<(String, MultiModalInfo)>;

    fn equality_check(&self) -> Option<&dyn RecordCheck> {
        None
    }

    fn validation_check(&self) -> Option<&dyn RecordCheck> {
        None
    }
}

// ─── TextTokenizer ────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Padding {
    DoNotPad,
    /// Pad on the right up to `max_length`
    MaxLength,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Truncation {
    DoNotTruncate,
    /// Trim the longest sequence first until `max_length` fits.
    /// With a single sequence this trims from the right.
    LongestFirst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    pub add_special_tokens: bool,
    pub padding:            Padding,
    pub truncation:         Truncation,
    /// `None` → the tokenizer's `model_max_length`
    pub max_length:         Option<usize>,
}

impl EncodeOptions {
    /// Raw prompt encoding for preference samples: no special
    /// tokens, no padding, longest-first truncation.
    pub fn prompt(max_length: Option<usize>) -> Self {
        Self {
            add_special_tokens: false,
            padding:            Padding::DoNotPad,
            truncation:         Truncation::LongestFirst,
            max_length,
        }
    }
}

pub trait TextTokenizer: Send + Sync {
    fn encode(&self, text: &str, options: &EncodeOptions) -> error::Result<Vec<u32>>;

    fn pad_token_id(&self) -> u32;

    fn model_max_length(&self) -> usize;
}

// ─── ModalityProcessor ────────────────────────────────────────────────────────
/// Deterministic signal → features transform. Every call on the
/// same instance yields a tensor of the same shape, which is what
/// lets the better and worse halves be stacked.
pub trait ModalityProcessor: Send + Sync {
    fn process(&self, samples: &[f32]) -> error::Result<TensorData>;

    /// The shape every processed payload has.
    fn output_shape(&self) -> Vec<usize>;
}

// ─── GenerationEngine ─────────────────────────────────────────────────────────
/// A batched text generator (vLLM, DeepSpeed, a remote API ...).
/// Must return exactly one RawGeneration per request, in order.
pub trait GenerationEngine {
    fn generate(
        &self,
        requests: &[GenerationRequest],
        sampling: &SamplingConfig,
    ) -> Result<Vec<RawGeneration>>;
}
