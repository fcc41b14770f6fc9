// ============================================================
// Layer 6 — Raw Output Store
// ============================================================
// Caches a run's generated outputs so a benchmark can be
// rescored without calling the generation engine again.
//
// File layout (pretty JSON, one key per task):
//   {
//     "random":  [ InferenceOutput, ... ],
//     "popular": [ InferenceOutput, ... ]
//   }
//
// Tasks are kept in a BTreeMap so the file is stable across
// runs and diffs cleanly.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::domain::inference::InferenceOutput;

pub type TaskOutputs = BTreeMap<String, Vec<InferenceOutput>>;

pub struct OutputStore {
    path: PathBuf,
}

impl OutputStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `{dir}/raw_outputs_{model_id}.json`, slashes in the model id
    /// replaced so hub names like `org/model` stay one file.
    pub fn for_model(dir: impl AsRef<Path>, model_id: &str) -> Self {
        let file = format!("raw_outputs_{}.json", model_id.replace('/', "_"));
        Self::new(dir.as_ref().join(file))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn save(&self, outputs: &TaskOutputs) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create '{}'", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(outputs)?;
        fs::write(&self.path, json)
            .with_context(|| format!("Cannot write raw outputs to '{}'", self.path.display()))?;

        tracing::debug!(
            "Saved raw outputs for {} task(s) to '{}'",
            outputs.len(),
            self.path.display()
        );
        Ok(())
    }

    pub fn load(&self) -> Result<TaskOutputs> {
        let json = fs::read_to_string(&self.path).with_context(|| {
            format!(
                "Cannot read raw outputs from '{}'. Generate outputs before evaluating.",
                self.path.display()
            )
        })?;

        let outputs: TaskOutputs = serde_json::from_str(&json)
            .with_context(|| format!("Invalid raw output JSON in '{}'", self.path.display()))?;

        tracing::info!(
            "Loaded raw outputs for {} task(s) from '{}'",
            outputs.len(),
            self.path.display()
        );
        Ok(outputs)
    }
}
