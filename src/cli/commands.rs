// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `prepare` and `evaluate`
// and all their configurable flags.
//
// Each *Args struct converts into its application-layer config
// with From, so Layer 2 never sees clap types.
//
// Reference: Rust Book §12 (Building a CLI Program)

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::application::evaluate_use_case::EvaluateConfig;
use crate::application::prepare_use_case::{DeviceKind, PrepareConfig};
use crate::domain::inference::SamplingConfig;
use crate::eval::benchmark::Benchmark;

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the preference dataset and run it through the data loader
    Prepare(PrepareArgs),

    /// Score cached model outputs against a benchmark
    Evaluate(EvaluateArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceArg {
    Cpu,
    Wgpu,
}

impl From<DeviceArg> for DeviceKind {
    fn from(d: DeviceArg) -> Self {
        match d {
            DeviceArg::Cpu  => DeviceKind::Cpu,
            DeviceArg::Wgpu => DeviceKind::Wgpu,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BenchmarkArg {
    Pope,
    #[value(name = "a-okvqa")]
    AOkvqa,
}

impl From<BenchmarkArg> for Benchmark {
    fn from(b: BenchmarkArg) -> Self {
        match b {
            BenchmarkArg::Pope   => Benchmark::Pope,
            BenchmarkArg::AOkvqa => Benchmark::AOkvqa,
        }
    }
}

/// All arguments for the `prepare` command.
#[derive(Args, Debug)]
pub struct PrepareArgs {
    /// JSON-lines file of raw preference rows
    #[arg(long)]
    pub data_path: PathBuf,

    /// JSON field template describing prompt and payload keys
    #[arg(long)]
    pub template: PathBuf,

    /// Directory with tokenizer.json (and optionally tokenizer_config.json)
    #[arg(long)]
    pub tokenizer_dir: PathBuf,

    /// Pad token, if tokenizer_config.json does not name one
    #[arg(long)]
    pub pad_token: Option<String>,

    /// Only use the first N raw rows
    #[arg(long)]
    pub size: Option<usize>,

    /// Prompt truncation length (defaults to the tokenizer's limit)
    #[arg(long)]
    pub max_length: Option<usize>,

    #[arg(long, default_value_t = 8)]
    pub batch_size: usize,

    /// Waveform length in samples after crop or zero-pad
    #[arg(long, default_value_t = 16_000)]
    pub target_len: usize,

    /// Scale each waveform to unit peak amplitude
    #[arg(long)]
    pub normalize: bool,

    #[arg(long, default_value_t = 1)]
    pub num_workers: usize,

    /// This process's rank; only rank 0 shows progress
    #[arg(long, default_value_t = 0)]
    pub rank: usize,

    /// Number of ranks; each gets a contiguous share of the valid samples
    #[arg(long, default_value_t = 1)]
    pub world_size: usize,

    #[arg(long, value_enum, default_value_t = DeviceArg::Cpu)]
    pub device: DeviceArg,
}

impl From<PrepareArgs> for PrepareConfig {
    fn from(a: PrepareArgs) -> Self {
        PrepareConfig {
            data_path:     a.data_path,
            template_path: a.template,
            tokenizer_dir: a.tokenizer_dir,
            pad_token:     a.pad_token,
            size:          a.size,
            max_length:    a.max_length,
            batch_size:    a.batch_size,
            target_len:    a.target_len,
            normalize:     a.normalize,
            num_workers:   a.num_workers,
            rank:          a.rank,
            world_size:    a.world_size,
            device:        a.device.into(),
        }
    }
}

/// All arguments for the `evaluate` command
#[derive(Args, Debug)]
pub struct EvaluateArgs {
    #[arg(long, value_enum)]
    pub benchmark: BenchmarkArg,

    /// Directory holding one {task}.jsonl file per task
    #[arg(long)]
    pub task_dir: PathBuf,

    /// Raw output cache (JSON map of task → outputs);
    /// defaults to {output_dir}/raw_outputs_{model_id}.json
    #[arg(long)]
    pub outputs: Option<PathBuf>,

    /// Tasks to score (defaults to every task of the benchmark)
    #[arg(long, num_args = 1..)]
    pub tasks: Vec<String>,

    #[arg(long, default_value = "eval_output")]
    pub output_dir: PathBuf,

    /// Sub-directory of output_dir for per-item details
    #[arg(long, default_value = "default")]
    pub run_name: String,

    /// Model name written to the score log
    #[arg(long, default_value = "model")]
    pub model_id: String,
}

impl From<EvaluateArgs> for EvaluateConfig {
    fn from(a: EvaluateArgs) -> Self {
        EvaluateConfig {
            benchmark:     a.benchmark.into(),
            task_dir:      a.task_dir,
            outputs_path:  a.outputs,
            tasks:         a.tasks,
            output_dir:    a.output_dir,
            run_name:      a.run_name,
            model_id:      a.model_id,
            chat_template: None,
            sampling:      SamplingConfig::default(),
        }
    }
}
