// ============================================================
// Layer 4 — Templates
// ============================================================
// Two templates live here:
//
//   FieldTemplate — maps a preference record's fields onto a
//                   prompt string and a better/worse payload
//                   pair. Loaded from a small JSON file:
//
//       {
//         "prompt_key":    "prompt",
//         "prompt_format": "USER: {input} ASSISTANT:",
//         "better_key":    "better_audio",
//         "worse_key":     "worse_audio",
//         "equal_key":     "is_equal",          (optional)
//         "valid_key":     "is_valid"           (optional)
//       }
//
//                   `equal_key` / `valid_key` switch on the
//                   template's equality / validation checks.
//                   Leaving them out means the template has no
//                   such capability at all.
//
//   ChatTemplate  — system/user/assistant prompt pieces used
//                   to turn a benchmark question into the prompt
//                   sent to a generation engine.

use std::{fmt, fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::error::{self, PipelineError};
use crate::domain::modality::{ModalityPayload, MultiModalInfo};
use crate::domain::record::RawRecord;
use crate::domain::traits::{PreferenceTemplate, RecordCheck};

const INPUT_SLOT:  &str = "{input}";
const OUTPUT_SLOT: &str = "{output}";

fn default_prompt_format() -> String {
    INPUT_SLOT.to_string()
}

/// On-disk shape of a FieldTemplate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldTemplateConfig {
    pub prompt_key: String,
    #[serde(default = "default_prompt_format")]
    pub prompt_format: String,
    pub better_key: String,
    pub worse_key:  String,
    #[serde(default)]
    pub equal_key: Option<String>,
    #[serde(default)]
    pub valid_key: Option<String>,
}

/// A check that reads one boolean-ish field of the record.
struct FlagCheck(String);

impl RecordCheck for FlagCheck {
    fn check(&self, record: &RawRecord) -> bool {
        record.flag(&self.0)
    }
}

pub struct FieldTemplate {
    config:     FieldTemplateConfig,
    equality:   Option<Box<dyn RecordCheck>>,
    validation: Option<Box<dyn RecordCheck>>,
}

impl FieldTemplate {
    pub fn new(config: FieldTemplateConfig) -> Self {
        let equality = config.equal_key.clone()
            .map(|k| Box::new(FlagCheck(k)) as Box<dyn RecordCheck>);
        let validation = config.valid_key.clone()
            .map(|k| Box::new(FlagCheck(k)) as Box<dyn RecordCheck>);
        Self { config, equality, validation }
    }

    /// Load a template description from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read template '{}'", path.display()))?;
        let config: FieldTemplateConfig = serde_json::from_str(&json)
            .with_context(|| format!("Invalid template JSON in '{}'", path.display()))?;
        Ok(Self::new(config))
    }

    /// Replace (or add) the equality check with a custom predicate.
    pub fn with_equality_check(mut self, check: impl RecordCheck + 'static) -> Self {
        self.equality = Some(Box::new(check));
        self
    }

    /// Replace (or add) the validation check with a custom predicate.
    pub fn with_validation_check(mut self, check: impl RecordCheck + 'static) -> Self {
        self.validation = Some(Box::new(check));
        self
    }

    fn payload(&self, record: &RawRecord, key: &str) -> error::Result<Option<ModalityPayload>> {
        match record.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => serde_json::from_value(v.clone())
                .map(Some)
                .map_err(|e| PipelineError::invalid(key, format!("not a modality payload: {e}"))),
        }
    }
}

impl fmt::Debug for FieldTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldTemplate")
            .field("config", &self.config)
            .field("has_equality_check", &self.equality.is_some())
            .field("has_validation_check", &self.validation.is_some())
            .finish()
    }
}

impl PreferenceTemplate for FieldTemplate {
    fn format_preference_sample(
        &self,
        record: &RawRecord,
    ) -> error::Result<(String, MultiModalInfo)> {
        let input  = record.str_field(&self.config.prompt_key)?;
        let prompt = self.config.prompt_format.replace(INPUT_SLOT, input);

        let info = MultiModalInfo {
            better: self.payload(record, &self.config.better_key)?,
            worse:  self.payload(record, &self.config.worse_key)?,
        };
        Ok((prompt, info))
    }

    fn equality_check(&self) -> Option<&dyn RecordCheck> {
        self.equality.as_deref()
    }

    fn validation_check(&self) -> Option<&dyn RecordCheck> {
        self.validation.as_deref()
    }
}

// ─── ChatTemplate ─────────────────────────────────────────────────────────────
/// Prompt pieces for benchmark generation:
///   system_prompt + user_prompt{input} + assistant_prompt{output=""}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTemplate {
    #[serde(default)]
    pub system_prompt:    String,
    pub user_prompt:      String,
    pub assistant_prompt: String,
}

impl Default for ChatTemplate {
    fn default() -> Self {
        Self {
            system_prompt:    String::new(),
            user_prompt:      "USER: {input}".to_string(),
            assistant_prompt: " ASSISTANT:{output}".to_string(),
        }
    }
}

impl ChatTemplate {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read chat template '{}'", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Invalid chat template JSON in '{}'", path.display()))
    }

    /// Build a generation prompt for one question, leaving the
    /// assistant turn open.
    pub fn render(&self, question: &str) -> String {
        format!(
            "{}{}{}",
            self.system_prompt,
            self.user_prompt.replace(INPUT_SLOT, question),
            self.assistant_prompt.replace(OUTPUT_SLOT, ""),
        )
    }
}
