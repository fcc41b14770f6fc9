// ============================================================
// Layer 4 — Preference Dataset
// ============================================================
// Wraps a raw dataset handle together with the encoder and the
// list of valid indices:
//
//   raw rows ──filter──▶ valid ──shard(rank)──▶ valid_indices
//   item_at(i) = encoder.encode(raw[valid_indices[i]])
//
// Samples are encoded lazily on every access and never cached,
// so the only data held in memory is whatever the raw handle
// holds. Implements Burn's Dataset trait so a DataLoader can
// drive it directly.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

use std::path::Path;

use burn::data::dataset::{transform::PartialDataset, Dataset, InMemDataset};
use burn::prelude::Backend;
use burn::tensor::TensorData;

use crate::data::batcher::PreferenceCollator;
use crate::data::encoder::PreferenceEncoder;
use crate::data::filter::{filter_indices, ExecutionContext};
use crate::domain::error::{PipelineError, Result};
use crate::domain::record::RawRecord;

/// One encoded preference sample.
/// `modality`, when present, has shape [2, ...] = [better, worse].
#[derive(Debug, Clone, PartialEq)]
pub struct PreferenceSample {
    pub input_ids: Vec<u32>,
    pub modality:  Option<TensorData>,
}

impl PreferenceSample {
    pub fn seq_len(&self) -> usize {
        self.input_ids.len()
    }
}

/// Raw rows read from a JSON-lines file.
pub type RawDataset = InMemDataset<RawRecord>;

/// Load a JSON-lines file of raw records, optionally keeping only
/// the first `size` rows.
pub fn load_raw_records(
    path: impl AsRef<Path>,
    size: Option<usize>,
) -> Result<PartialDataset<RawDataset, RawRecord>> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Err(PipelineError::config("dataset path must not be empty"));
    }

    let raw = InMemDataset::<RawRecord>::from_json_rows(path).map_err(|e| {
        PipelineError::config(format!("cannot read dataset '{}': {e}", path.display()))
    })?;

    Ok(select_first(raw, size))
}

/// `select(range(size))`: a view over the first `size` rows.
pub fn select_first<D>(dataset: D, size: Option<usize>) -> PartialDataset<D, RawRecord>
where
    D: Dataset<RawRecord>,
{
    let len = dataset.len();
    let end = size.map(|s| s.min(len)).unwrap_or(len);
    PartialDataset::new(dataset, 0, end)
}

pub struct PreferenceDataset<D> {
    raw:           D,
    encoder:       PreferenceEncoder,
    valid_indices: Vec<usize>,
}

impl<D> PreferenceDataset<D>
where
    D: Dataset<RawRecord>,
{
    /// Filters the raw rows once, up front, and keeps this rank's share.
    pub fn new(raw: D, encoder: PreferenceEncoder, ctx: &ExecutionContext) -> Self {
        let valid = filter_indices(&raw, encoder.template(), ctx);
        let valid_indices = ctx.shard(&valid);
        tracing::debug!(
            "Rank {}/{}: {} of {} valid samples",
            ctx.rank(),
            ctx.world_size(),
            valid_indices.len(),
            valid.len(),
        );
        Self { raw, encoder, valid_indices }
    }

    /// Number of valid samples owned by this rank.
    pub fn sample_count(&self) -> usize {
        self.valid_indices.len()
    }

    pub fn raw_count(&self) -> usize {
        self.raw.len()
    }

    pub fn valid_indices(&self) -> &[usize] {
        &self.valid_indices
    }

    /// Encode the `index`-th valid sample.
    pub fn item_at(&self, index: usize) -> Result<PreferenceSample> {
        let raw_index = *self.valid_indices.get(index).ok_or_else(|| {
            PipelineError::invalid(
                "index",
                format!("{index} out of range for {} valid samples", self.valid_indices.len()),
            )
        })?;

        let record = self.raw.get(raw_index).ok_or_else(|| {
            PipelineError::invalid("index", format!("raw row {raw_index} disappeared"))
        })?;

        self.encoder.encode(&record)
    }

    /// A collator padding with this dataset's pad token, placing
    /// batches on `device`.
    pub fn collator<B: Backend>(&self, device: B::Device) -> PreferenceCollator<B> {
        PreferenceCollator::new(self.encoder.pad_token_id(), device)
    }
}

impl<D> Dataset<PreferenceSample> for PreferenceDataset<D>
where
    D: Dataset<RawRecord>,
{
    /// # Panics
    /// Panics when a valid row fails to encode. Burn's Dataset
    /// cannot carry an error, and returning `None` would silently
    /// end a DataLoader epoch early. Call `item_at` to handle the
    /// error instead.
    fn get(&self, index: usize) -> Option<PreferenceSample> {
        if index >= self.valid_indices.len() {
            return None;
        }
        match self.item_at(index) {
            Ok(sample) => Some(sample),
            Err(e) => panic!("failed to encode preference sample {index}: {e}"),
        }
    }

    fn len(&self) -> usize {
        self.valid_indices.len()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::TempDir;

    use crate::data::encoder::tests::{test_encoder, WordLenTokenizer};
    use crate::data::processor::WaveformProcessor;
    use crate::data::template::{FieldTemplate, FieldTemplateConfig};
    use std::sync::Arc;

    fn rows() -> Vec<RawRecord> {
        vec![
            RawRecord::from_value(json!({"prompt": "first one", "better": [1.0], "worse": [2.0]})),
            RawRecord::from_value(json!({"prompt": "second",    "better": [3.0], "worse": [4.0], "skip": true})),
            RawRecord::from_value(json!({"prompt": "third",     "better": [5.0], "worse": [6.0]})),
        ]
    }

    fn filtering_encoder() -> PreferenceEncoder {
        let template = FieldTemplate::new(FieldTemplateConfig {
            prompt_key:    "prompt".into(),
            prompt_format: "{input}".into(),
            better_key:    "better".into(),
            worse_key:     "worse".into(),
            equal_key:     None,
            valid_key:     None,
        })
        .with_equality_check(|_: &RawRecord| false)
        .with_validation_check(|r: &RawRecord| !r.flag("skip"));

        PreferenceEncoder::new(
            Arc::new(template),
            Arc::new(WordLenTokenizer { pad_id: 0, max_len: 16 }),
            Arc::new(WaveformProcessor::new(2, false).unwrap()),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_len_counts_valid_rows_only() {
        let ds = PreferenceDataset::new(
            InMemDataset::new(rows()),
            filtering_encoder(),
            &ExecutionContext::single(),
        );
        assert_eq!(ds.raw_count(), 3);
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.valid_indices(), &[0, 2]);
    }

    #[test]
    fn test_item_at_maps_through_valid_indices() {
        let ds = PreferenceDataset::new(
            InMemDataset::new(rows()),
            filtering_encoder(),
            &ExecutionContext::single(),
        );
        let sample = ds.item_at(1).unwrap();
        // "third" → one word of length 5
        assert_eq!(sample.input_ids, vec![15]);
        assert_eq!(
            sample.modality.unwrap().to_vec::<f32>().unwrap(),
            vec![5.0, 0.0, 6.0, 0.0]
        );
    }

    #[test]
    fn test_two_ranks_split_the_valid_rows() {
        let mut raw = rows();
        raw.push(RawRecord::from_value(json!({"prompt": "fourth", "better": [7.0], "worse": [8.0]})));

        let shards: Vec<Vec<usize>> = (0..2)
            .map(|rank| {
                let ctx = ExecutionContext::new(rank, 2).unwrap();
                let ds  = PreferenceDataset::new(InMemDataset::new(raw.clone()), filtering_encoder(), &ctx);
                ds.valid_indices().to_vec()
            })
            .collect();

        // valid rows are 0, 2, 3
        assert_eq!(shards[0], vec![0, 2]);
        assert_eq!(shards[1], vec![3]);

        let ds = PreferenceDataset::new(
            InMemDataset::new(raw),
            filtering_encoder(),
            &ExecutionContext::new(1, 2).unwrap(),
        );
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.item_at(0).unwrap().input_ids, vec![16]);
    }

    #[test]
    fn test_out_of_range() {
        let ds = PreferenceDataset::new(
            InMemDataset::new(rows()),
            test_encoder(None),
            &ExecutionContext::single(),
        );
        assert!(ds.item_at(3).is_err());
        assert!(ds.get(3).is_none());
    }

    #[test]
    fn test_encoding_error_surfaces_from_item_at() {
        let raw = InMemDataset::new(vec![RawRecord::from_value(json!({"better": [1.0]}))]);
        let ds  = PreferenceDataset::new(raw, test_encoder(None), &ExecutionContext::single());
        assert!(matches!(ds.item_at(0), Err(PipelineError::MissingField(_))));
    }

    #[test]
    #[should_panic]
    fn test_encoding_error_panics_through_dataset_trait() {
        let raw = InMemDataset::new(vec![RawRecord::from_value(json!({"better": [1.0]}))]);
        let ds  = PreferenceDataset::new(raw, test_encoder(None), &ExecutionContext::single());
        let _ = ds.get(0);
    }

    #[test]
    fn test_select_first_caps_at_len() {
        let view = select_first(InMemDataset::new(rows()), Some(10));
        assert_eq!(view.len(), 3);
        let view = select_first(InMemDataset::new(rows()), Some(1));
        assert_eq!(view.len(), 1);
    }

    #[test]
    fn test_load_raw_records_from_jsonl() {
        let dir  = TempDir::new().unwrap();
        let path = dir.path().join("train.jsonl");
        let mut f = std::fs::File::create(&path).unwrap();
        for r in rows() {
            writeln!(f, "{}", serde_json::to_string(&r).unwrap()).unwrap();
        }

        let raw = load_raw_records(&path, Some(2)).unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(raw.get(0).unwrap().str_field("prompt").unwrap(), "first one");
    }

    #[test]
    fn test_empty_path_is_a_config_error() {
        assert!(matches!(load_raw_records("", None), Err(PipelineError::Config(_))));
    }
}
