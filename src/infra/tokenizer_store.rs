// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Loads a HuggingFace tokenizer directory:
//
//   {dir}/tokenizer.json         — required, read by the
//                                  `tokenizers` crate
//   {dir}/tokenizer_config.json  — optional; supplies
//                                  `pad_token` and
//                                  `model_max_length`
//
// Any truncation or padding baked into tokenizer.json is
// switched off on load. HfTokenizer applies EncodeOptions
// itself, per call, so one tokenizer serves every caller.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tokenizers::{PaddingDirection, Tokenizer, TruncationDirection};

use crate::domain::error::{self, PipelineError};
use crate::domain::traits::{EncodeOptions, Padding, TextTokenizer, Truncation};

/// Used when tokenizer_config.json is absent or carries the
/// "unbounded" sentinel HuggingFace writes for some models.
pub const DEFAULT_MODEL_MAX_LENGTH: usize = 2048;
const UNBOUNDED_SENTINEL: f64 = 1e12;

#[derive(Debug, Default, Deserialize)]
struct TokenizerConfigFile {
    #[serde(default)]
    pad_token: Option<Value>,
    #[serde(default)]
    model_max_length: Option<f64>,
}

impl TokenizerConfigFile {
    /// `pad_token` is either a plain string or an AddedToken object.
    fn pad_token(&self) -> Option<&str> {
        match self.pad_token.as_ref()? {
            Value::String(s) => Some(s),
            Value::Object(o) => o.get("content")?.as_str(),
            _ => None,
        }
    }

    fn model_max_length(&self) -> usize {
        match self.model_max_length {
            Some(n) if n >= 1.0 && n < UNBOUNDED_SENTINEL => n as usize,
            _ => DEFAULT_MODEL_MAX_LENGTH,
        }
    }
}

// ─── HfTokenizer ──────────────────────────────────────────────────────────────
pub struct HfTokenizer {
    inner:            Tokenizer,
    pad_token:        String,
    pad_token_id:     u32,
    model_max_length: usize,
}

impl HfTokenizer {
    /// Wrap a loaded tokenizer. The pad token must be in its vocabulary.
    pub fn new(
        mut inner:        Tokenizer,
        pad_token:        &str,
        model_max_length: usize,
    ) -> error::Result<Self> {
        let pad_token_id = inner.token_to_id(pad_token).ok_or_else(|| {
            PipelineError::config(format!("pad token '{pad_token}' is not in the vocabulary"))
        })?;
        if model_max_length == 0 {
            return Err(PipelineError::config("model_max_length must be positive"));
        }

        inner
            .with_truncation(None)
            .map_err(|e| PipelineError::config(format!("cannot disable truncation: {e}")))?;
        inner.with_padding(None);

        Ok(Self {
            inner,
            pad_token: pad_token.to_string(),
            pad_token_id,
            model_max_length,
        })
    }

    pub fn pad_token(&self) -> &str {
        &self.pad_token
    }

    pub fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(true)
    }
}

impl TextTokenizer for HfTokenizer {
    fn encode(&self, text: &str, options: &EncodeOptions) -> error::Result<Vec<u32>> {
        let mut encoding = self
            .inner
            .encode(text, options.add_special_tokens)
            .map_err(|e| PipelineError::Tokenize(e.to_string()))?;

        let max_length = options.max_length.unwrap_or(self.model_max_length);

        if options.truncation == Truncation::LongestFirst && encoding.len() > max_length {
            encoding.truncate(max_length, 0, TruncationDirection::Right);
        }
        if options.padding == Padding::MaxLength && encoding.len() < max_length {
            encoding.pad(
                max_length,
                self.pad_token_id,
                0,
                &self.pad_token,
                PaddingDirection::Right,
            );
        }

        Ok(encoding.get_ids().to_vec())
    }

    fn pad_token_id(&self) -> u32 {
        self.pad_token_id
    }

    fn model_max_length(&self) -> usize {
        self.model_max_length
    }
}

// ─── TokenizerStore ───────────────────────────────────────────────────────────
pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Load the tokenizer and its limits from the directory.
    /// `pad_override` wins over the config file's pad token.
    pub fn load(&self, pad_override: Option<&str>) -> Result<HfTokenizer> {
        let tok_path = self.dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tok_path)
            .map_err(|e| anyhow::anyhow!(
                "Cannot load tokenizer from '{}': {}", tok_path.display(), e
            ))?;

        let config = self.read_config()?;
        let pad_token = pad_override
            .or_else(|| config.pad_token())
            .ok_or_else(|| PipelineError::config(format!(
                "no pad token: set one in '{}' or pass it explicitly",
                self.dir.join("tokenizer_config.json").display()
            )))?;

        let tokenizer = HfTokenizer::new(tokenizer, pad_token, config.model_max_length())?;
        tracing::info!(
            "Loaded tokenizer from '{}' (vocab={}, pad='{}', max_length={})",
            self.dir.display(),
            tokenizer.vocab_size(),
            tokenizer.pad_token(),
            tokenizer.model_max_length(),
        );
        Ok(tokenizer)
    }

    fn read_config(&self) -> Result<TokenizerConfigFile> {
        let path = self.dir.join("tokenizer_config.json");
        if !path.exists() {
            tracing::debug!("No tokenizer_config.json in '{}'", self.dir.display());
            return Ok(TokenizerConfigFile::default());
        }
        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Invalid tokenizer config JSON in '{}'", path.display()))
    }
}
