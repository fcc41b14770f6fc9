// ============================================================
// Layer 3 — Inference Types
// ============================================================
// What goes into and comes out of a generation engine when a
// benchmark is run:
//
//   GenerationRequest  → prompt text + optional modality file
//   RawGeneration      → candidate texts + engine metadata
//   InferenceOutput    → RawGeneration tagged with the
//                        benchmark question_id it answers
//
// InferenceOutput is the unit the scoring engine consumes.
// It is serialisable so a run's outputs can be cached on disk
// and rescored without regenerating.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::record::QuestionId;

/// One prompt sent to the generation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub question_id: QuestionId,
    pub prompt:      String,
    /// Path or URI of the image/audio the prompt refers to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modality_file: Option<String>,
}

/// Decoding parameters forwarded verbatim to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    pub max_new_tokens: usize,
    pub temperature:    f32,
    pub top_p:          f32,
    /// How many candidate responses to produce per prompt
    pub num_candidates: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            max_new_tokens: 512,
            temperature:    0.0,
            top_p:          1.0,
            num_candidates: 1,
        }
    }
}

/// The engine's answer to one request, before it is tagged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawGeneration {
    pub texts:  Vec<String>,
    pub prompt: String,
    #[serde(default)]
    pub metadata: Value,
}

/// A generated answer for one benchmark question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceOutput {
    pub question_id: QuestionId,
    /// Candidate generations, best first
    pub response:    Vec<String>,
    #[serde(default)]
    pub prompt_text: String,
    #[serde(default)]
    pub raw_generation_metadata: Value,
}

impl InferenceOutput {
    pub fn new(question_id: impl Into<QuestionId>, response: impl Into<String>) -> Self {
        Self {
            question_id: question_id.into(),
            response:    vec![response.into()],
            prompt_text: String::new(),
            raw_generation_metadata: Value::Null,
        }
    }

    pub fn from_generation(question_id: QuestionId, generation: RawGeneration) -> Self {
        Self {
            question_id,
            response:    generation.texts,
            prompt_text: generation.prompt,
            raw_generation_metadata: generation.metadata,
        }
    }

    /// The first candidate, which is the one that gets scored.
    /// An output with no candidates scores as an empty response.
    pub fn primary_response(&self) -> &str {
        self.response.first().map(String::as_str).unwrap_or("")
    }
}
