// ============================================================
// Layer 3 — RawRecord Domain Type
// ============================================================
// One row of a training or benchmark dataset, exactly as it
// was read from disk. Fields differ from dataset to dataset,
// so the record is kept as an opaque JSON object and every
// consumer pulls out only the fields it needs through the
// typed accessors below.
//
// Example preference row:
//   {"prompt": "a dog barking", "better_audio": [...],
//    "worse_audio": {"array": [...], "sampling_rate": 16000}}
//
// Example benchmark row (POPE):
//   {"question_id": 17, "question": "Is there a cat?",
//    "answer": "no", "image": "COCO_val2014_0001.jpg"}

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::error::{PipelineError, Result};

/// An immutable, schema-less dataset row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(Map<String, Value>);

impl RawRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Build a record from a `serde_json::json!({...})` literal.
    /// Non-object values produce an empty record.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// A required field, present and non-null.
    pub fn field(&self, field: &str) -> Result<&Value> {
        match self.0.get(field) {
            Some(Value::Null) | None => Err(PipelineError::MissingField(field.to_string())),
            Some(v) => Ok(v),
        }
    }

    pub fn str_field(&self, field: &str) -> Result<&str> {
        self.field(field)?
            .as_str()
            .ok_or_else(|| PipelineError::invalid(field, "expected a string"))
    }

    pub fn u64_field(&self, field: &str) -> Result<u64> {
        self.field(field)?
            .as_u64()
            .ok_or_else(|| PipelineError::invalid(field, "expected a non-negative integer"))
    }

    pub fn str_list_field(&self, field: &str) -> Result<Vec<&str>> {
        let items = self.field(field)?
            .as_array()
            .ok_or_else(|| PipelineError::invalid(field, "expected a list of strings"))?;

        items
            .iter()
            .map(|v| {
                v.as_str()
                    .ok_or_else(|| PipelineError::invalid(field, "expected a list of strings"))
            })
            .collect()
    }

    /// Interpret a field as a flag: booleans as-is, numbers as
    /// non-zero, strings as "true"/"yes"/"1". Missing → false.
    pub fn flag(&self, field: &str) -> bool {
        match self.0.get(field) {
            Some(Value::Bool(b))   => *b,
            Some(Value::Number(n)) => n.as_f64().map(|x| x != 0.0).unwrap_or(false),
            Some(Value::String(s)) => matches!(s.to_lowercase().as_str(), "true" | "yes" | "1"),
            _ => false,
        }
    }

    /// The benchmark identifier of this row.
    pub fn question_id(&self) -> Result<QuestionId> {
        QuestionId::from_value(self.field("question_id")?)
            .ok_or_else(|| PipelineError::invalid("question_id", "expected a string or integer"))
    }
}

// ─── QuestionId ───────────────────────────────────────────────────────────────
/// Benchmark identifiers arrive as strings in some datasets and
/// integers in others. Both normalise to the same key, so an
/// output tagged `17` matches an item tagged `"17"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct QuestionId(String);

impl QuestionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self(s.clone())),
            Value::Number(n) => Some(Self(n.to_string())),
            _ => None,
        }
    }
}

impl TryFrom<Value> for QuestionId {
    type Error = String;

    fn try_from(value: Value) -> std::result::Result<Self, Self::Error> {
        Self::from_value(&value).ok_or_else(|| format!("invalid question_id: {value}"))
    }
}

impl From<QuestionId> for Value {
    fn from(id: QuestionId) -> Self {
        Value::String(id.0)
    }
}

impl From<&str> for QuestionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<u64> for QuestionId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_and_null_fields_are_missing() {
        let r = RawRecord::from_value(json!({"a": null}));
        assert!(matches!(r.field("a"), Err(PipelineError::MissingField(_))));
        assert!(matches!(r.field("b"), Err(PipelineError::MissingField(_))));
    }

    #[test]
    fn test_wrong_type_is_invalid() {
        let r = RawRecord::from_value(json!({"answer": 3}));
        assert!(matches!(r.str_field("answer"), Err(PipelineError::InvalidField { .. })));
    }

    #[test]
    fn test_string_list() {
        let r = RawRecord::from_value(json!({"choices": ["cat", "dog"]}));
        assert_eq!(r.str_list_field("choices").unwrap(), vec!["cat", "dog"]);
    }

    #[test]
    fn test_question_id_normalises_numbers_and_strings() {
        let a = RawRecord::from_value(json!({"question_id": 17}));
        let b = RawRecord::from_value(json!({"question_id": "17"}));
        assert_eq!(a.question_id().unwrap(), b.question_id().unwrap());
    }

    #[test]
    fn test_question_id_deserialises_from_integer() {
        let id: QuestionId = serde_json::from_str("42").unwrap();
        assert_eq!(id.as_str(), "42");
    }

    #[test]
    fn test_flags() {
        let r = RawRecord::from_value(json!({"t": true, "n": 0, "s": "yes"}));
        assert!(r.flag("t"));
        assert!(!r.flag("n"));
        assert!(r.flag("s"));
        assert!(!r.flag("absent"));
    }
}
