// ============================================================
// Layer 3 — Modality Payloads
// ============================================================
// Datasets store a response's audio/image signal in one of
// two shapes:
//
//   [0.1, -0.2, ...]                              raw array
//   {"array": [...], "sampling_rate": 16000}      wrapped array
//
// ModalityPayload accepts both and is resolved to a plain
// slice once, at the processor boundary.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModalityPayload {
    Array(Vec<f32>),
    Wrapped {
        array: Vec<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sampling_rate: Option<u32>,
    },
}

impl ModalityPayload {
    /// The underlying signal, whichever form it arrived in.
    pub fn samples(&self) -> &[f32] {
        match self {
            Self::Array(array)          => array,
            Self::Wrapped { array, .. } => array,
        }
    }

    pub fn sampling_rate(&self) -> Option<u32> {
        match self {
            Self::Array(_)                      => None,
            Self::Wrapped { sampling_rate, .. } => *sampling_rate,
        }
    }
}

/// The multi-modal half of a formatted preference sample.
/// Either both payloads are present or the sample is text-only;
/// the encoder rejects a lone payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultiModalInfo {
    pub better: Option<ModalityPayload>,
    pub worse:  Option<ModalityPayload>,
}
