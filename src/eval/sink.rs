// ============================================================
// Layer 5 — Detail Sink
// ============================================================
// Receives one DetailRecord per scored item, in scoring order.
// The scoring core never opens files itself; the caller picks
// where details go:
//
//   Vec<DetailRecord>  → in memory (tests, summaries)
//   JsonlDetailSink    → one JSON object per line on disk

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// What was asked, what was expected and what the model said.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailRecord {
    pub question:   String,
    pub prompt:     String,
    pub expected:   String,
    pub response:   String,
    /// The judger's reading of the response ("yes", "no", a letter ...)
    pub prediction: String,
    pub correct:    bool,
}

pub trait DetailSink {
    fn record(&mut self, detail: DetailRecord) -> Result<()>;

    /// Flush anything buffered. Called once after the last record.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl DetailSink for Vec<DetailRecord> {
    fn record(&mut self, detail: DetailRecord) -> Result<()> {
        self.push(detail);
        Ok(())
    }
}

// ─── JsonlDetailSink ──────────────────────────────────────────────────────────
pub struct JsonlDetailSink {
    path:   PathBuf,
    writer: BufWriter<File>,
    count:  usize,
}

impl JsonlDetailSink {
    /// Create (or truncate) `path`, creating parent directories.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create detail directory '{}'", parent.display()))?;
        }
        let file = File::create(&path)
            .with_context(|| format!("Cannot create detail file '{}'", path.display()))?;

        Ok(Self { path, writer: BufWriter::new(file), count: 0 })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

impl DetailSink for JsonlDetailSink {
    fn record(&mut self, detail: DetailRecord) -> Result<()> {
        serde_json::to_writer(&mut self.writer, &detail)
            .with_context(|| format!("Cannot serialise detail to '{}'", self.path.display()))?;
        self.writer.write_all(b"\n")?;
        self.count += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer
            .flush()
            .with_context(|| format!("Cannot flush '{}'", self.path.display()))?;
        tracing::debug!("Wrote {} detail record(s) to {}", self.count, self.path.display());
        Ok(())
    }
}
