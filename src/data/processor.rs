// ============================================================
// Layer 4 — Waveform Processor
// ============================================================
// Turns a raw mono waveform into a fixed-shape feature tensor
// of shape [1, target_len]:
//
//   1. Crop to target_len samples, or zero-pad on the right
//   2. Optionally scale so the peak amplitude is 1.0
//
// The output shape never depends on the input, which is what
// allows the better and worse waveforms of a preference pair
// to be stacked on a new leading axis.

use burn::tensor::TensorData;

use crate::domain::error::{PipelineError, Result};
use crate::domain::traits::ModalityProcessor;

#[derive(Debug, Clone, PartialEq)]
pub struct WaveformProcessor {
    target_len: usize,
    normalize:  bool,
}

impl WaveformProcessor {
    /// # Errors
    /// `target_len == 0` is a configuration error.
    pub fn new(target_len: usize, normalize: bool) -> Result<Self> {
        if target_len == 0 {
            return Err(PipelineError::config("waveform target length must be positive"));
        }
        Ok(Self { target_len, normalize })
    }
}

impl ModalityProcessor for WaveformProcessor {
    fn process(&self, samples: &[f32]) -> Result<TensorData> {
        if let Some(bad) = samples.iter().position(|x| !x.is_finite()) {
            return Err(PipelineError::invalid(
                "waveform",
                format!("non-finite sample at position {bad}"),
            ));
        }

        let mut wave = vec![0.0f32; self.target_len];
        let keep = samples.len().min(self.target_len);
        wave[..keep].copy_from_slice(&samples[..keep]);

        if self.normalize {
            let peak = wave.iter().fold(0.0f32, |m, x| m.max(x.abs()));
            if peak > 0.0 {
                wave.iter_mut().for_each(|x| *x /= peak);
            }
        }

        Ok(TensorData::new(wave, self.output_shape()))
    }

    fn output_shape(&self) -> Vec<usize> {
        vec![1, self.target_len]
    }
}
