// ============================================================
// Layer 2 — EvaluateUseCase
// ============================================================
// Scores one benchmark run, task by task:
//
//   Step 1: Get raw outputs          cache file, or the engine
//                                    if one was supplied and
//                                    the cache is missing
//   Step 2: For each task
//             load {task_dir}/{task}.jsonl          (data)
//             evaluate → details + TaskScore        (eval)
//             write {output_dir}/{run}/{task}.jsonl (eval)
//             append a row to scores.csv            (infra)
//   Step 3: Average over scored tasks, log overall  (eval)
//
// A task with no cached outputs is skipped with a warning and
// does not count towards the average.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

use crate::data::{dataset::load_raw_records, template::ChatTemplate};
use crate::domain::inference::SamplingConfig;
use crate::domain::record::RawRecord;
use crate::domain::traits::GenerationEngine;
use crate::eval::{
    benchmark::{evaluate, generate_outputs, Benchmark},
    scoring::{BenchmarkAggregator, OverallScore, TaskScore},
    sink::JsonlDetailSink,
};
use crate::infra::{
    metrics::{ScoreLogger, ScoreRow},
    output_store::{OutputStore, TaskOutputs},
};

// ─── Evaluate Configuration ──────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateConfig {
    pub benchmark:    Benchmark,
    /// Directory holding one `{task}.jsonl` per task
    pub task_dir:     PathBuf,
    /// Raw output cache; `None` → `{output_dir}/raw_outputs_{model_id}.json`
    pub outputs_path: Option<PathBuf>,
    /// Empty → the benchmark's own task list
    pub tasks:        Vec<String>,
    pub output_dir:   PathBuf,
    pub run_name:     String,
    pub model_id:     String,
    /// Prompt layout for generation; only read on the engine path
    /// (`EvaluateUseCase::with_engine`), so the CLI leaves it unset
    pub chat_template: Option<PathBuf>,
    /// Likewise engine-only
    pub sampling:     SamplingConfig,
}

impl EvaluateConfig {
    pub fn new(benchmark: Benchmark, task_dir: impl Into<PathBuf>, outputs_path: impl Into<PathBuf>) -> Self {
        Self {
            benchmark,
            task_dir:      task_dir.into(),
            outputs_path:  Some(outputs_path.into()),
            tasks:         Vec::new(),
            output_dir:    PathBuf::from("eval_output"),
            run_name:      "default".to_string(),
            model_id:      "model".to_string(),
            chat_template: None,
            sampling:      SamplingConfig::default(),
        }
    }

    pub fn task_names(&self) -> Vec<String> {
        if self.tasks.is_empty() {
            self.benchmark.default_tasks().iter().map(|t| t.to_string()).collect()
        } else {
            self.tasks.clone()
        }
    }

    pub fn output_store(&self) -> OutputStore {
        match &self.outputs_path {
            Some(path) => OutputStore::new(path),
            None => OutputStore::for_model(&self.output_dir, &self.model_id),
        }
    }

    fn task_file(&self, task: &str) -> PathBuf {
        self.task_dir.join(format!("{task}.jsonl"))
    }

    fn detail_file(&self, task: &str) -> PathBuf {
        self.output_dir.join(&self.run_name).join(format!("{task}.jsonl"))
    }
}

/// Per-task scores plus the run's average.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateReport {
    pub benchmark: Benchmark,
    pub tasks:     Vec<(String, TaskScore)>,
    pub overall:   OverallScore,
    pub csv_path:  PathBuf,
}

// ─── EvaluateUseCase ──────────────────────────────────────────────────────────
pub struct EvaluateUseCase {
    config: EvaluateConfig,
    engine: Option<Box<dyn GenerationEngine>>,
}

impl EvaluateUseCase {
    /// Score from the output cache only.
    pub fn new(config: EvaluateConfig) -> Self {
        Self { config, engine: None }
    }

    /// Generate (and cache) outputs with `engine` when the cache is missing.
    ///
    /// This is the library entry point for callers that bring their own
    /// generator; the `evaluate` command only scores an existing cache.
    /// `chat_template` and `sampling` in the config apply here.
    pub fn with_engine(config: EvaluateConfig, engine: Box<dyn GenerationEngine>) -> Self {
        Self { config, engine: Some(engine) }
    }

    pub fn execute(&self) -> Result<EvaluateReport> {
        let cfg   = &self.config;
        let tasks = cfg.task_names();

        // ── Step 1: Raw outputs ───────────────────────────────────────────────
        let outputs = self.raw_outputs(&tasks)?;

        // ── Step 2: Score each task ───────────────────────────────────────────
        let mut aggregator = BenchmarkAggregator::new(cfg.benchmark.declared_tasks())?;
        let logger = ScoreLogger::new(&cfg.output_dir)?;

        for task in &tasks {
            let Some(task_outputs) = outputs.get(task) else {
                tracing::warn!("No outputs for {}/{}; skipping", cfg.benchmark, task);
                continue;
            };

            let items = load_task_items(&cfg.task_file(task))?;
            let mut sink = JsonlDetailSink::create(cfg.detail_file(task))?;
            let (score, total_scored) = evaluate(cfg.benchmark, &items, task_outputs, &mut sink)?;

            tracing::info!(
                "{}/{}: scored {} of {} item(s), accuracy {:.2}%",
                cfg.benchmark,
                task,
                total_scored,
                items.len(),
                score.accuracy() * 100.0,
            );
            logger.log(&ScoreRow::for_task(
                &cfg.run_name,
                &cfg.model_id,
                cfg.benchmark.name(),
                task,
                &score,
            ))?;
            aggregator.add(task.clone(), score);
        }

        // ── Step 3: Overall ───────────────────────────────────────────────────
        let overall = aggregator.overall();
        logger.log(&ScoreRow::overall(&cfg.run_name, &cfg.model_id, cfg.benchmark.name(), &overall))?;
        tracing::info!(
            "{} overall over {} task(s): accuracy {:.2}%",
            cfg.benchmark,
            overall.tasks_scored,
            overall.accuracy * 100.0,
        );

        Ok(EvaluateReport {
            benchmark: cfg.benchmark,
            tasks:     aggregator.tasks().to_vec(),
            overall,
            csv_path:  logger.csv_path().to_path_buf(),
        })
    }

    fn raw_outputs(&self, tasks: &[String]) -> Result<TaskOutputs> {
        let cfg   = &self.config;
        let store = cfg.output_store();

        let engine = match &self.engine {
            Some(engine) if !store.exists() => engine,
            _ => return store.load(),
        };

        tracing::info!("No output cache at '{}'; generating", store.path().display());
        let chat = match &cfg.chat_template {
            Some(path) => ChatTemplate::from_file(path)?,
            None => ChatTemplate::default(),
        };

        let mut outputs = TaskOutputs::new();
        for task in tasks {
            let items = load_task_items(&cfg.task_file(task))?;
            let generated = generate_outputs(cfg.benchmark, engine.as_ref(), &items, &chat, &cfg.sampling)
                .with_context(|| format!("Generation failed for {}/{}", cfg.benchmark, task))?;
            tracing::info!("{}/{}: generated {} output(s)", cfg.benchmark, task, generated.len());
            outputs.insert(task.clone(), generated);
        }

        store.save(&outputs)?;
        Ok(outputs)
    }
}

/// Every row of one task file, in file order.
fn load_task_items(path: &Path) -> Result<Vec<RawRecord>> {
    let dataset = load_raw_records(path, None)
        .with_context(|| format!("Cannot load benchmark task '{}'", path.display()))?;
    Ok(dataset.iter().collect())
}
