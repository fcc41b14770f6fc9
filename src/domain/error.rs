// ============================================================
// Layer 3 — Pipeline Errors
// ============================================================
// Failures fall into two families:
//
//   Configuration — detected while constructing a dataset,
//                   collator, processor or aggregator. Nothing
//                   usable is returned.
//   Per-item      — one record could not be encoded. The
//                   caller decides whether to abort or skip.
//
// Degenerate metrics, unmatched benchmark items and duplicate
// output identifiers are NOT errors and have no variant here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    // ── Configuration ────────────────────────────────────────────────────────
    #[error("Configuration error: {0}")]
    Config(String),

    // ── Per-item encoding ────────────────────────────────────────────────────
    #[error("Record is missing required field '{0}'")]
    MissingField(String),

    #[error("Field '{field}' has an unexpected value: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Preference record carries a '{present}' payload but no '{missing}' payload")]
    UnpairedModality {
        present: &'static str,
        missing: &'static str,
    },

    #[error("Modality payload '{0}' is empty")]
    EmptyModality(&'static str),

    #[error("Modality shape mismatch: expected {expected:?}, got {actual:?}")]
    ModalityShape {
        expected: Vec<usize>,
        actual:   Vec<usize>,
    },

    #[error("Tokenisation failed: {0}")]
    Tokenize(String),
}

impl PipelineError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field:  field.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
