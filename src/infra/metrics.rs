// ============================================================
// Layer 6 — Score Logger
// ============================================================
// Records benchmark scores to a CSV file, one row per task plus
// one "overall" row per run.
//
// Output file: {output_dir}/scores.csv
//
// Example CSV output:
//   run,model_id,benchmark,task,num_scored,accuracy,precision,recall,f1,yes_ratio
//   r1,llava,POPE,random,3000,87.100000,90.200000,83.300000,86.600000,46.200000
//   r1,llava,POPE,overall,9000,85.900000,88.000000,83.300000,85.500000,47.400000
//   r1,llava,A-OKVQA,validation,1145,74.200000,,,,
//
// Scores are percentages. Columns that do not apply to a task
// (precision for a multiple-choice task, say) are left empty.
// The header is only written when the file is new, so runs
// append to one log. Free-text fields (run, model, task) are
// quoted by the csv writer when they contain a delimiter.

use std::{
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::eval::scoring::{BinaryMetrics, OverallScore, TaskScore};

const HEADER: [&str; 10] = [
    "run", "model_id", "benchmark", "task", "num_scored",
    "accuracy", "precision", "recall", "f1", "yes_ratio",
];

/// One row of the score log, in percentages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRow {
    pub run:        String,
    pub model_id:   String,
    pub benchmark:  String,
    pub task:       String,
    pub num_scored: usize,
    pub accuracy:   f64,
    pub binary:     Option<BinaryMetrics>,
}

impl ScoreRow {
    pub fn for_task(
        run:       &str,
        model_id:  &str,
        benchmark: &str,
        task:      &str,
        score:     &TaskScore,
    ) -> Self {
        let binary = match score {
            TaskScore::Binary(counts) => Some(counts.metrics()),
            TaskScore::Match(_)       => None,
        };
        Self {
            run:        run.into(),
            model_id:   model_id.into(),
            benchmark:  benchmark.into(),
            task:       task.into(),
            num_scored: score.total(),
            accuracy:   score.accuracy(),
            binary,
        }
    }

    pub fn overall(run: &str, model_id: &str, benchmark: &str, overall: &OverallScore) -> Self {
        Self {
            run:        run.into(),
            model_id:   model_id.into(),
            benchmark:  benchmark.into(),
            task:       "overall".into(),
            num_scored: overall.total_scored,
            accuracy:   overall.accuracy,
            binary:     overall.binary,
        }
    }

    fn to_record(&self) -> [String; 10] {
        let pct = |v: f64| format!("{:.6}", v * 100.0);
        let (precision, recall, f1, yes_ratio) = match &self.binary {
            Some(m) => (pct(m.precision), pct(m.recall), pct(m.f1), pct(m.yes_ratio)),
            None    => Default::default(),
        };
        [
            self.run.clone(),
            self.model_id.clone(),
            self.benchmark.clone(),
            self.task.clone(),
            self.num_scored.to_string(),
            pct(self.accuracy),
            precision,
            recall,
            f1,
            yes_ratio,
        ]
    }
}

/// Appends score rows to a CSV file.
pub struct ScoreLogger {
    csv_path: PathBuf,
}

impl ScoreLogger {
    /// Writes the CSV header if the file doesn't exist yet.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create output directory '{}'", dir.display()))?;

        let logger = Self { csv_path: dir.join("scores.csv") };
        if !logger.csv_path.exists() {
            logger.append(HEADER)?;
            tracing::debug!("Created score CSV: '{}'", logger.csv_path.display());
        }

        Ok(logger)
    }

    pub fn log(&self, row: &ScoreRow) -> Result<()> {
        self.append(row.to_record())?;

        tracing::debug!(
            "Logged {}/{}: accuracy={:.2}%",
            row.benchmark,
            row.task,
            row.accuracy * 100.0,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }

    fn append<I, T>(&self, record: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        let mut w = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        w.write_record(record)?;
        w.flush()?;
        Ok(())
    }
}
