// ============================================================
// Layer 2 — PrepareUseCase
// ============================================================
// Builds the preference dataset and drives it through Burn's
// DataLoader once, end to end:
//
//   Step 1: Load the field template         (Layer 4 - data)
//   Step 2: Load the tokenizer              (Layer 6 - infra)
//   Step 3: Build the waveform processor    (Layer 4 - data)
//   Step 4: Build the encoder               (Layer 4 - data)
//   Step 5: Load raw rows, keep first N     (Layer 4 - data)
//   Step 6: Filter invalid rows             (Layer 4 - data)
//   Step 7: Batch on the chosen device      (Layer 4 - data)
//
// The report is what a training run would consume: how many
// rows survived and what the batches look like.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, NdArray, Wgpu},
    data::{dataloader::DataLoaderBuilder, dataset::Dataset},
    prelude::*,
    tensor::ElementConversion,
};
use serde::{Deserialize, Serialize};

use crate::data::{
    dataset::{load_raw_records, PreferenceDataset},
    encoder::PreferenceEncoder,
    filter::ExecutionContext,
    processor::WaveformProcessor,
    template::FieldTemplate,
};
use crate::domain::record::RawRecord;
use crate::infra::tokenizer_store::TokenizerStore;

// ─── Prepare Configuration ───────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Cpu,
    Wgpu,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareConfig {
    pub data_path:     PathBuf,
    pub template_path: PathBuf,
    pub tokenizer_dir: PathBuf,
    /// Overrides the pad token from tokenizer_config.json
    pub pad_token:     Option<String>,
    /// Keep only the first `size` raw rows
    pub size:          Option<usize>,
    /// Prompt truncation length; `None` → tokenizer limit
    pub max_length:    Option<usize>,
    pub batch_size:    usize,
    /// Waveform length in samples after crop/pad
    pub target_len:    usize,
    pub normalize:     bool,
    pub num_workers:   usize,
    pub rank:          usize,
    pub world_size:    usize,
    pub device:        DeviceKind,
}

impl Default for PrepareConfig {
    fn default() -> Self {
        Self {
            data_path:     PathBuf::from("data/train.jsonl"),
            template_path: PathBuf::from("data/template.json"),
            tokenizer_dir: PathBuf::from("tokenizer"),
            pad_token:     None,
            size:          None,
            max_length:    None,
            batch_size:    8,
            target_len:    16_000,
            normalize:     false,
            num_workers:   1,
            rank:          0,
            world_size:    1,
            device:        DeviceKind::Cpu,
        }
    }
}

/// What one pass over the prepared data produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrepareReport {
    pub raw_rows:      usize,
    pub valid_samples: usize,
    pub batches:       usize,
    /// Real (unmasked) prompt tokens across all batches
    pub tokens:        usize,
    pub max_seq_len:   usize,
    /// [2, C, T] per sample, if the data carries modality
    pub modality_shape: Option<Vec<usize>>,
}

// ─── PrepareUseCase ───────────────────────────────────────────────────────────
pub struct PrepareUseCase {
    config: PrepareConfig,
}

impl PrepareUseCase {
    pub fn new(config: PrepareConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<PrepareReport> {
        let cfg = &self.config;
        if cfg.batch_size == 0 {
            bail!("batch size must be positive");
        }
        let ctx = ExecutionContext::new(cfg.rank, cfg.world_size)?;

        // ── Step 1: Template ──────────────────────────────────────────────────
        let template = FieldTemplate::from_file(&cfg.template_path)?;
        tracing::info!("Loaded template from '{}'", cfg.template_path.display());

        // ── Step 2: Tokenizer ─────────────────────────────────────────────────
        let tokenizer = TokenizerStore::new(&cfg.tokenizer_dir).load(cfg.pad_token.as_deref())?;

        // ── Step 3: Processor ─────────────────────────────────────────────────
        let processor = WaveformProcessor::new(cfg.target_len, cfg.normalize)?;

        // ── Step 4: Encoder ───────────────────────────────────────────────────
        let encoder = PreferenceEncoder::new(
            Arc::new(template),
            Arc::new(tokenizer),
            Arc::new(processor),
            cfg.max_length,
        )?;
        tracing::info!("Prompt max length: {}", encoder.max_length());

        // ── Step 5: Raw rows ──────────────────────────────────────────────────
        let raw = load_raw_records(&cfg.data_path, cfg.size)?;
        tracing::info!("Loaded {} raw rows from '{}'", raw.len(), cfg.data_path.display());

        // ── Step 6: Validity filter ───────────────────────────────────────────
        let dataset = PreferenceDataset::new(raw, encoder, &ctx);
        tracing::info!(
            "Rank {}/{}: {} of {} rows are valid preference samples for this rank",
            ctx.rank(),
            ctx.world_size(),
            dataset.sample_count(),
            dataset.raw_count()
        );
        if dataset.sample_count() == 0 {
            tracing::warn!("No valid samples in '{}'", cfg.data_path.display());
        }

        // ── Step 7: Batch ─────────────────────────────────────────────────────
        match cfg.device {
            DeviceKind::Cpu => {
                let device = NdArrayDevice::default();
                tracing::info!("Using NdArray device: {:?}", device);
                run_batches::<NdArray, _>(dataset, device, cfg, &ctx)
            }
            DeviceKind::Wgpu => {
                let device = WgpuDevice::default();
                tracing::info!("Using WGPU device: {:?}", device);
                run_batches::<Wgpu, _>(dataset, device, cfg, &ctx)
            }
        }
    }
}

/// One full pass of the DataLoader over the dataset.
fn run_batches<B, D>(
    dataset: PreferenceDataset<D>,
    device:  B::Device,
    cfg:     &PrepareConfig,
    ctx:     &ExecutionContext,
) -> Result<PrepareReport>
where
    B: Backend,
    D: Dataset<RawRecord> + 'static,
{
    let mut report = PrepareReport {
        raw_rows:      dataset.raw_count(),
        valid_samples: dataset.sample_count(),
        ..Default::default()
    };

    let expected_batches = report.valid_samples.div_ceil(cfg.batch_size);
    let collator = dataset.collator::<B>(device);
    let loader = DataLoaderBuilder::new(collator)
        .batch_size(cfg.batch_size)
        .num_workers(cfg.num_workers.max(1))
        .build(dataset);

    let bar = ctx.progress(expected_batches, "Collating");
    for batch in loader.iter() {
        let [_, seq_len] = batch.input_ids.dims();
        let real_tokens: i64 = batch.attention_mask.int().sum().into_scalar().elem();

        report.batches += 1;
        report.tokens += real_tokens as usize;
        report.max_seq_len = report.max_seq_len.max(seq_len);
        if report.modality_shape.is_none() {
            report.modality_shape = batch.modality.as_ref().map(|m| m.pair_shape.clone());
        }
        bar.inc(1);
    }
    bar.finish_and_clear();

    tracing::info!(
        "Collated {} batch(es): {} real tokens, longest prompt {}",
        report.batches,
        report.tokens,
        report.max_seq_len
    );
    Ok(report)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::tokenizer_store::tests::word_level_json;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn write_fixture(dir: &TempDir) -> PrepareConfig {
        let root = dir.path();

        let tok_dir = root.join("tokenizer");
        fs::create_dir_all(&tok_dir).unwrap();
        fs::write(tok_dir.join("tokenizer.json"), word_level_json().to_string()).unwrap();
        fs::write(
            tok_dir.join("tokenizer_config.json"),
            json!({"pad_token": "[PAD]", "model_max_length": 32}).to_string(),
        )
        .unwrap();

        fs::write(
            root.join("template.json"),
            json!({
                "prompt_key": "prompt",
                "better_key": "better_audio",
                "worse_key":  "worse_audio",
                "equal_key":  "is_different",
                "valid_key":  "is_valid",
            })
            .to_string(),
        )
        .unwrap();

        let rows = [
            json!({"prompt": "a dog barks", "better_audio": [0.1, 0.2], "worse_audio": [0.3], "is_different": true}),
            json!({"prompt": "a dog", "better_audio": [0.5], "worse_audio": [0.6, 0.7, 0.8, 0.9], "is_different": true}),
            // fails both checks → filtered out
            json!({"prompt": "dog", "better_audio": [0.1], "worse_audio": [0.1], "is_different": false, "is_valid": false}),
            json!({"prompt": "a dog barks loudly", "better_audio": {"array": [1.0], "sampling_rate": 16000}, "worse_audio": [0.0], "is_different": true}),
        ];
        let jsonl: String = rows.iter().map(|r| format!("{r}\n")).collect();
        fs::write(root.join("train.jsonl"), jsonl).unwrap();

        PrepareConfig {
            data_path:     root.join("train.jsonl"),
            template_path: root.join("template.json"),
            tokenizer_dir: tok_dir,
            target_len:    4,
            batch_size:    2,
            ..Default::default()
        }
    }

    #[test]
    fn test_prepare_end_to_end_on_cpu() {
        let dir = TempDir::new().unwrap();
        let report = PrepareUseCase::new(write_fixture(&dir)).execute().unwrap();

        assert_eq!(report.raw_rows, 4);
        assert_eq!(report.valid_samples, 3);
        assert_eq!(report.batches, 2);
        assert_eq!(report.tokens, 3 + 2 + 4);
        assert_eq!(report.modality_shape, Some(vec![2, 1, 4]));
    }

    #[test]
    fn test_size_and_max_length_limit_the_pass() {
        let dir = TempDir::new().unwrap();
        let cfg = PrepareConfig {
            size:       Some(1),
            max_length: Some(2),
            ..write_fixture(&dir)
        };
        let report = PrepareUseCase::new(cfg).execute().unwrap();

        assert_eq!(report.raw_rows, 1);
        assert_eq!(report.batches, 1);
        assert_eq!(report.tokens, 2);
        assert_eq!(report.max_seq_len, 2);
    }

    #[test]
    fn test_world_size_shards_the_valid_samples() {
        let dir = TempDir::new().unwrap();
        let base = write_fixture(&dir);

        let counts: Vec<usize> = (0..2)
            .map(|rank| {
                let cfg = PrepareConfig { rank, world_size: 2, ..base.clone() };
                PrepareUseCase::new(cfg).execute().unwrap().valid_samples
            })
            .collect();
        assert_eq!(counts, vec![2, 1]);
    }

    #[test]
    fn test_rank_outside_world_rejected() {
        let dir = TempDir::new().unwrap();
        let cfg = PrepareConfig { rank: 5, world_size: 2, ..write_fixture(&dir) };
        assert!(PrepareUseCase::new(cfg).execute().is_err());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let dir = TempDir::new().unwrap();
        let cfg = PrepareConfig { batch_size: 0, ..write_fixture(&dir) };
        assert!(PrepareUseCase::new(cfg).execute().is_err());
    }

    #[test]
    fn test_missing_data_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let cfg = PrepareConfig {
            data_path: dir.path().join("absent.jsonl"),
            ..write_fixture(&dir)
        };
        assert!(PrepareUseCase::new(cfg).execute().is_err());
    }
}
