//! The result a module emits.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `{changed, failed, msg?, diff?, job_response?, warnings}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub changed: bool,
    pub failed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_response: Option<Value>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl ResultEnvelope {
    pub fn changed(changed: bool) -> Self {
        Self {
            changed,
            ..Default::default()
        }
    }

    pub fn failure(msg: impl Into<String>) -> Self {
        Self {
            failed: true,
            msg: Some(msg.into()),
            ..Default::default()
        }
    }

    pub fn with_warnings(mut self, warnings: Warnings) -> Self {
        self.warnings.extend(warnings.into_vec());
        self
    }
}

/// Per-invocation warning collector; each distinct message is kept once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Warnings(Vec<String>);

impl Warnings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `msg`; returns false if it was already recorded.
    pub fn push(&mut self, msg: impl Into<String>) -> bool {
        let msg = msg.into();
        if self.0.contains(&msg) {
            return false;
        }
        self.0.push(msg);
        true
    }

    pub fn extend(&mut self, other: Warnings) {
        for msg in other.0 {
            self.push(msg);
        }
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialization_skips_absent_fields() {
        let envelope = ResultEnvelope::changed(true);
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({"changed": true, "failed": false, "warnings": []})
        );

        let failure = ResultEnvelope::failure("Error creating x: boom");
        let rendered = serde_json::to_value(&failure).unwrap();
        assert_eq!(rendered["failed"], json!(true));
        assert_eq!(rendered["msg"], json!("Error creating x: boom"));
    }

    #[test]
    fn test_warnings_dedup() {
        let mut warnings = Warnings::new();
        assert!(warnings.push("a"));
        assert!(!warnings.push("a"));
        assert!(warnings.push("b"));
        let envelope = ResultEnvelope::changed(false).with_warnings(warnings);
        assert_eq!(envelope.warnings, vec!["a", "b"]);
    }
}
