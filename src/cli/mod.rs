// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `prepare`  — builds preference batches from raw rows
//   2. `evaluate` — scores cached outputs on POPE or A-OKVQA
//
// Scores are printed as percentages.
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, EvaluateArgs, PrepareArgs};

use crate::application::evaluate_use_case::{EvaluateConfig, EvaluateReport, EvaluateUseCase};
use crate::application::prepare_use_case::PrepareUseCase;
use crate::eval::scoring::{BinaryMetrics, TaskScore};

#[derive(Parser, Debug)]
#[command(
    name = "align-kit",
    version,
    about = "Prepare preference training data and score multi-modal benchmarks."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the matching use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Prepare(args)  => run_prepare(args),
            Commands::Evaluate(args) => run_evaluate(args),
        }
    }
}

fn run_prepare(args: PrepareArgs) -> Result<()> {
    tracing::info!("Preparing preference data from: {}", args.data_path.display());

    let report = PrepareUseCase::new(args.into()).execute()?;

    println!("\nRaw rows:       {}", report.raw_rows);
    println!("Valid samples:  {}", report.valid_samples);
    println!("Batches:        {}", report.batches);
    println!("Prompt tokens:  {}", report.tokens);
    println!("Longest prompt: {}", report.max_seq_len);
    match &report.modality_shape {
        Some(shape) => println!("Modality pair:  {shape:?}"),
        None        => println!("Modality pair:  none (text only)"),
    }
    Ok(())
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    let config: EvaluateConfig = args.into();
    tracing::info!("Evaluating outputs from: {}", config.output_store().path().display());

    let report = EvaluateUseCase::new(config).execute()?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &EvaluateReport) {
    let pct = |v: f64| format!("{:>9.2}", v * 100.0);

    println!("\n{} Benchmark", report.benchmark);
    println!(
        "{:<14} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9}",
        "task", "scored", "accuracy", "precision", "recall", "f1", "yes_ratio"
    );
    for (task, score) in &report.tasks {
        let binary = match score {
            TaskScore::Binary(counts) => Some(counts.metrics()),
            TaskScore::Match(_)       => None,
        };
        print_row(task, score.total(), score.accuracy(), binary.as_ref(), &pct);
    }
    let overall = &report.overall;
    print_row("overall", overall.total_scored, overall.accuracy, overall.binary.as_ref(), &pct);
    println!("\nScores appended to {}", report.csv_path.display());
}

fn print_row(
    task:     &str,
    scored:   usize,
    accuracy: f64,
    binary:   Option<&BinaryMetrics>,
    pct:      &dyn Fn(f64) -> String,
) {
    let rest = match binary {
        Some(m) => format!("{} {} {} {}", pct(m.precision), pct(m.recall), pct(m.f1), pct(m.yes_ratio)),
        None    => String::new(),
    };
    println!("{:<14} {:>9} {} {}", task, scored, pct(accuracy), rest);
}
