// ============================================================
// Layer 4 — Preference Sample Encoder
// ============================================================
// Converts ONE raw record into a PreferenceSample:
//
//   raw record
//       │  template.format_preference_sample()
//       ▼
//   (prompt, {better, worse})
//       │                         │
//       │ tokenizer.encode()      │ processor.process() ×2
//       ▼                         ▼
//   input_ids               better [..]    worse [..]
//                                  └── stack ──┘
//                                 modality [2, ..]
//
// Pair order is [better, worse]. The preference loss reads
// index 0 as chosen and index 1 as rejected.
//
// Encoding never skips a record. A malformed record is an
// error for that record; dropping rows is the validity
// filter's job.

use std::sync::Arc;

use burn::tensor::TensorData;

use crate::data::dataset::PreferenceSample;
use crate::domain::error::{PipelineError, Result};
use crate::domain::modality::{ModalityPayload, MultiModalInfo};
use crate::domain::record::RawRecord;
use crate::domain::traits::{EncodeOptions, ModalityProcessor, PreferenceTemplate, TextTokenizer};

/// Stateless after construction; safe to share between loader workers.
#[derive(Clone)]
pub struct PreferenceEncoder {
    template:   Arc<dyn PreferenceTemplate>,
    tokenizer:  Arc<dyn TextTokenizer>,
    processor:  Arc<dyn ModalityProcessor>,
    max_length: usize,
}

impl PreferenceEncoder {
    /// `max_length = None` uses the tokenizer's `model_max_length`.
    pub fn new(
        template:   Arc<dyn PreferenceTemplate>,
        tokenizer:  Arc<dyn TextTokenizer>,
        processor:  Arc<dyn ModalityProcessor>,
        max_length: Option<usize>,
    ) -> Result<Self> {
        let max_length = max_length.unwrap_or_else(|| tokenizer.model_max_length());
        if max_length == 0 {
            return Err(PipelineError::config("maximum prompt length must be positive"));
        }
        Ok(Self { template, tokenizer, processor, max_length })
    }

    pub fn template(&self) -> &dyn PreferenceTemplate {
        self.template.as_ref()
    }

    pub fn pad_token_id(&self) -> u32 {
        self.tokenizer.pad_token_id()
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn encode(&self, record: &RawRecord) -> Result<PreferenceSample> {
        let (prompt, info) = self.template.format_preference_sample(record)?;

        let input_ids = self.tokenizer
            .encode(&prompt, &EncodeOptions::prompt(Some(self.max_length)))?;

        let modality = self.encode_pair(info)?;

        Ok(PreferenceSample { input_ids, modality })
    }

    fn encode_pair(&self, info: MultiModalInfo) -> Result<Option<TensorData>> {
        let (better, worse) = match (info.better, info.worse) {
            (Some(b), Some(w)) => (b, w),
            (None, None)       => return Ok(None),
            (Some(_), None)    => {
                return Err(PipelineError::UnpairedModality { present: "better", missing: "worse" })
            }
            (None, Some(_))    => {
                return Err(PipelineError::UnpairedModality { present: "worse", missing: "better" })
            }
        };

        let better = self.process("better", &better)?;
        let worse  = self.process("worse", &worse)?;
        stack_pair(better, worse).map(Some)
    }

    fn process(&self, side: &'static str, payload: &ModalityPayload) -> Result<TensorData> {
        let samples = payload.samples();
        if samples.is_empty() {
            return Err(PipelineError::EmptyModality(side));
        }
        self.processor.process(samples)
    }
}

/// Stack two equally shaped tensors on a new leading axis:
/// [..] + [..] → [2, ..], better first.
pub fn stack_pair(better: TensorData, worse: TensorData) -> Result<TensorData> {
    if better.shape != worse.shape {
        return Err(PipelineError::ModalityShape {
            expected: better.shape.clone(),
            actual:   worse.shape.clone(),
        });
    }

    let mut shape = Vec::with_capacity(better.shape.len() + 1);
    shape.push(2);
    shape.extend_from_slice(&better.shape);

    let mut values = to_f32(better)?;
    values.extend(to_f32(worse)?);

    Ok(TensorData::new(values, shape))
}

fn to_f32(data: TensorData) -> Result<Vec<f32>> {
    data.convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| PipelineError::invalid("modality", format!("{e:?}")))
}
