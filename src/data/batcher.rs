// ============================================================
// Layer 4 — Preference Collator
// ============================================================
// Merges a Vec<PreferenceSample> of different prompt lengths
// into one PreferenceBatch.
//
// Two stages:
//
//   1. Host stage (HostBatch::build) — plain Vecs on the CPU
//      - right-pad input_ids to the longest sample with pad_id
//      - build the attention mask in the SAME loop, from each
//        sample's length (never from token values, since the
//        pad id may legitimately appear inside a prompt)
//      - stack every [2, ...] modality pair into one
//        contiguous f32 buffer of shape [B, 2, ...]; the pair
//        shape may have any rank (waveform [2, C, T], image
//        [2, C, H, W], ...)
//
//   2. Device stage (HostBatch::to_device) — one step that
//      creates every tensor on the target device. Modality goes
//      up flattened to [B, 2 * features] along with its pair
//      shape, since the tensor rank is a compile-time constant
//      and the processor's is not.
//
// A shape problem therefore always fails in stage 1, before
// any device is touched.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
    tensor::TensorData,
};

use crate::data::dataset::PreferenceSample;
use crate::domain::error::{PipelineError, Result};

// ─── PreferenceBatch ──────────────────────────────────────────────────────────
/// A batch ready for a preference-loss forward pass.
#[derive(Debug, Clone)]
pub struct PreferenceBatch<B: Backend> {
    /// Token ids, right-padded — shape: [batch_size, seq_len]
    pub input_ids: Tensor<B, 2, Int>,

    /// true = real token, false = padding — shape: [batch_size, seq_len]
    pub attention_mask: Tensor<B, 2, Bool>,

    /// Better/worse modality features
    pub modality: Option<ModalityBatch<B>>,
}

// ─── ModalityBatch ────────────────────────────────────────────────────────────
/// Stacked modality pairs, flattened per sample.
#[derive(Debug, Clone)]
pub struct ModalityBatch<B: Backend> {
    /// Row-major over `pair_shape` — shape: [batch_size, 2 * features]
    pub values: Tensor<B, 2>,

    /// Per-sample shape, always [2, ...] = [better, worse]
    pub pair_shape: Vec<usize>,
}

impl<B: Backend> ModalityBatch<B> {
    /// Full logical shape: [batch_size, 2, ...]
    pub fn dims(&self) -> Vec<usize> {
        let mut dims = vec![self.values.dims()[0]];
        dims.extend_from_slice(&self.pair_shape);
        dims
    }

    /// View as a rank-`D` tensor; `D` must equal `pair_shape.len() + 1`.
    pub fn reshaped<const D: usize>(&self) -> Result<Tensor<B, D>> {
        let dims: [usize; D] = self.dims().try_into().map_err(|dims: Vec<usize>| {
            PipelineError::invalid("modality", format!("cannot view shape {dims:?} as rank {D}"))
        })?;
        Ok(self.values.clone().reshape(dims))
    }
}

// ─── HostBatch ────────────────────────────────────────────────────────────────
/// The host-side result of collation, before device placement.
#[derive(Debug, Clone, PartialEq)]
pub struct HostBatch {
    pub batch_size:     usize,
    pub seq_len:        usize,
    /// Row-major [batch_size, seq_len]
    pub input_ids:      Vec<i64>,
    /// Row-major [batch_size, seq_len]
    pub attention_mask: Vec<bool>,
    /// Present when every sample carries modality
    pub modality:       Option<HostModality>,
}

/// Host-side stacked modality pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct HostModality {
    /// Per-sample shape [2, ...]
    pub pair_shape: Vec<usize>,
    /// Row-major [batch_size, pair_shape..]
    pub values:     Vec<f32>,
}

impl HostModality {
    /// Values per sample: the product of `pair_shape`.
    pub fn features(&self) -> usize {
        self.pair_shape.iter().product()
    }
}

impl HostBatch {
    pub fn build(samples: &[PreferenceSample], pad_id: u32) -> Result<Self> {
        if samples.is_empty() {
            return Err(PipelineError::invalid("batch", "cannot collate an empty batch"));
        }

        let batch_size = samples.len();
        let seq_len    = samples.iter().map(PreferenceSample::seq_len).max().unwrap_or(0);

        // ── Pad ids and build the mask together ──────────────────────────────
        let mut input_ids      = vec![pad_id as i64; batch_size * seq_len];
        let mut attention_mask = vec![false; batch_size * seq_len];

        for (row, sample) in samples.iter().enumerate() {
            let start = row * seq_len;
            for (col, &id) in sample.input_ids.iter().enumerate() {
                input_ids[start + col]      = id as i64;
                attention_mask[start + col] = true;
            }
        }

        let modality = stack_modality(samples)?;

        Ok(Self { batch_size, seq_len, input_ids, attention_mask, modality })
    }

    /// Create every tensor on `device` in one step.
    pub fn to_device<B: Backend>(&self, device: &B::Device) -> PreferenceBatch<B> {
        let shape = [self.batch_size, self.seq_len];

        let input_ids = Tensor::<B, 2, Int>::from_data(
            TensorData::new(self.input_ids.clone(), shape).convert::<B::IntElem>(),
            device,
        );

        let attention_mask = Tensor::<B, 2, Bool>::from_data(
            TensorData::new(self.attention_mask.clone(), shape),
            device,
        );

        let modality = self.modality.as_ref().map(|m| ModalityBatch {
            values: Tensor::<B, 2>::from_data(
                TensorData::new(m.values.clone(), [self.batch_size, m.features()])
                    .convert::<B::FloatElem>(),
                device,
            ),
            pair_shape: m.pair_shape.clone(),
        });

        PreferenceBatch { input_ids, attention_mask, modality }
    }
}

/// Stack per-sample [2, ...] tensors into [B, 2, ...].
/// All samples must carry modality, or none of them.
fn stack_modality(samples: &[PreferenceSample]) -> Result<Option<HostModality>> {
    let with_modality = samples.iter().filter(|s| s.modality.is_some()).count();
    if with_modality == 0 {
        return Ok(None);
    }
    if with_modality != samples.len() {
        return Err(PipelineError::invalid(
            "modality",
            format!("{with_modality} of {} samples carry modality", samples.len()),
        ));
    }

    let mut expected: Option<Vec<usize>> = None;
    let mut values: Vec<f32> = Vec::new();

    for data in samples.iter().filter_map(|s| s.modality.as_ref()) {
        if data.shape.first() != Some(&2) {
            return Err(PipelineError::invalid(
                "modality",
                format!("expected a [2, ...] pair tensor, got shape {:?}", data.shape),
            ));
        }
        match &expected {
            Some(shape) if *shape != data.shape => {
                return Err(PipelineError::ModalityShape {
                    expected: shape.clone(),
                    actual:   data.shape.clone(),
                });
            }
            Some(_) => {}
            None => expected = Some(data.shape.clone()),
        }

        let chunk = data.clone()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| PipelineError::invalid("modality", format!("{e:?}")))?;
        values.extend(chunk);
    }

    Ok(Some(HostModality { pair_shape: expected.unwrap_or_default(), values }))
}

// ─── PreferenceCollator ───────────────────────────────────────────────────────
/// Holds the pad id and target device. Never mutated after
/// construction, so one collator can serve every loader worker.
#[derive(Clone, Debug)]
pub struct PreferenceCollator<B: Backend> {
    pub pad_token_id: u32,
    pub device:       B::Device,
}

impl<B: Backend> PreferenceCollator<B> {
    pub fn new(pad_token_id: u32, device: B::Device) -> Self {
        Self { pad_token_id, device }
    }

    pub fn collate(&self, samples: &[PreferenceSample]) -> Result<PreferenceBatch<B>> {
        let host = HostBatch::build(samples, self.pad_token_id)?;
        Ok(host.to_device::<B>(&self.device))
    }
}

// ─── Burn Batcher Trait Implementation ────────────────────────────────────────
// The DataLoader calls .batch(items) with each mini-batch of samples.
impl<B: Backend> Batcher<PreferenceSample, PreferenceBatch<B>> for PreferenceCollator<B> {
    /// # Panics
    /// Panics on a malformed batch; the Batcher trait has no
    /// error channel. Use `collate` to handle the error instead.
    fn batch(&self, items: Vec<PreferenceSample>) -> PreferenceBatch<B> {
        match self.collate(&items) {
            Ok(batch) => batch,
            Err(e) => panic!("failed to collate preference batch: {e}"),
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn sample(ids: &[u32], fill: Option<(f32, f32)>) -> PreferenceSample {
        PreferenceSample {
            input_ids: ids.to_vec(),
            modality:  fill.map(|(b, w)| {
                TensorData::new(vec![b, b, b, w, w, w], [2, 1, 3])
            }),
        }
    }

    #[test]
    fn test_right_padding_and_mask() {
        let samples = vec![sample(&[5, 6, 7], None), sample(&[8], None)];
        let host = HostBatch::build(&samples, 0).unwrap();

        assert_eq!(host.seq_len, 3);
        assert_eq!(host.input_ids, vec![5, 6, 7, 8, 0, 0]);
        assert_eq!(host.attention_mask, vec![true, true, true, true, false, false]);
        assert!(host.modality.is_none());
    }

    #[test]
    fn test_mask_follows_length_not_pad_value() {
        // pad id 0 appears inside the first prompt
        let samples = vec![sample(&[4, 0, 9], None), sample(&[0], None)];
        let host = HostBatch::build(&samples, 0).unwrap();

        assert_eq!(host.input_ids, vec![4, 0, 9, 0, 0, 0]);
        assert_eq!(host.attention_mask, vec![true, true, true, true, false, false]);
    }

    #[test]
    fn test_modality_stacks_in_sample_order() {
        let samples = vec![
            sample(&[1], Some((1.0, 2.0))),
            sample(&[1, 2], Some((3.0, 4.0))),
        ];
        let host = HostBatch::build(&samples, 0).unwrap();
        let modality = host.modality.unwrap();

        assert_eq!(modality.pair_shape, vec![2, 1, 3]);
        assert_eq!(
            modality.values,
            vec![
                1.0, 1.0, 1.0, 2.0, 2.0, 2.0,
                3.0, 3.0, 3.0, 4.0, 4.0, 4.0,
            ]
        );
    }

    #[test]
    fn test_mixed_modality_rejected() {
        let samples = vec![sample(&[1], Some((1.0, 2.0))), sample(&[1], None)];
        assert!(HostBatch::build(&samples, 0).is_err());
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let odd = PreferenceSample {
            input_ids: vec![1],
            modality:  Some(TensorData::new(vec![0.0f32; 4], [2, 1, 2])),
        };
        let samples = vec![sample(&[1], Some((1.0, 2.0))), odd];
        assert!(matches!(
            HostBatch::build(&samples, 0),
            Err(PipelineError::ModalityShape { .. })
        ));
    }

    #[test]
    fn test_empty_batch_rejected() {
        assert!(HostBatch::build(&[], 0).is_err());
    }

    #[test]
    fn test_collation_is_deterministic() {
        let samples = vec![
            sample(&[3, 1, 4, 1, 5], Some((0.5, -0.5))),
            sample(&[9, 2], Some((0.25, 0.75))),
        ];
        let collator = PreferenceCollator::<TestBackend>::new(0, Default::default());

        let a = collator.collate(&samples).unwrap();
        let b = collator.collate(&samples).unwrap();

        assert_eq!(a.input_ids.into_data(), b.input_ids.into_data());
        assert_eq!(a.attention_mask.into_data(), b.attention_mask.into_data());
        assert_eq!(
            a.modality.unwrap().values.into_data(),
            b.modality.unwrap().values.into_data()
        );
    }

    #[test]
    fn test_device_tensors_match_host_batch() {
        let samples = vec![sample(&[7, 7], Some((1.0, 0.0))), sample(&[7], Some((0.0, 1.0)))];
        let collator = PreferenceCollator::<TestBackend>::new(99, Default::default());
        let batch = collator.batch(samples);

        assert_eq!(batch.input_ids.dims(), [2, 2]);
        assert_eq!(
            batch.input_ids.into_data().convert::<i64>().to_vec::<i64>().unwrap(),
            vec![7, 7, 7, 99]
        );
        assert_eq!(
            batch.attention_mask.into_data().to_vec::<bool>().unwrap(),
            vec![true, true, true, false]
        );
        let modality = batch.modality.unwrap();
        assert_eq!(modality.dims(), vec![2, 2, 1, 3]);
        assert_eq!(modality.values.dims(), [2, 6]);
        assert_eq!(modality.reshaped::<4>().unwrap().dims(), [2, 2, 1, 3]);
    }

    #[test]
    fn test_image_pairs_collate_at_rank_five() {
        // [2, C=3, H=2, W=2] per sample
        let image = |fill: f32| PreferenceSample {
            input_ids: vec![1],
            modality:  Some(TensorData::new(vec![fill; 24], [2, 3, 2, 2])),
        };
        let collator = PreferenceCollator::<TestBackend>::new(0, Default::default());
        let batch = collator.collate(&[image(1.0), image(2.0), image(3.0)]).unwrap();

        let modality = batch.modality.unwrap();
        assert_eq!(modality.dims(), vec![3, 2, 3, 2, 2]);
        let images = modality.reshaped::<5>().unwrap();
        assert_eq!(images.dims(), [3, 2, 3, 2, 2]);
        assert!(modality.reshaped::<4>().is_err());
    }

    #[test]
    fn test_tensor_without_pair_axis_rejected() {
        let single = PreferenceSample {
            input_ids: vec![1],
            modality:  Some(TensorData::new(vec![0.0f32; 3], [1, 3])),
        };
        assert!(matches!(
            HostBatch::build(&[single], 0),
            Err(PipelineError::InvalidField { .. })
        ));
    }
}
