use chrono::Utc;
use serde_json::{json, Value};

/// Outcome of one provisioning step, as persisted in the status file.
///
/// Wire format: `Done` is the JSON literal `true`, `Value` a bare string,
/// `Failed` an arbitrary snapshot object. Anything else found on disk is
/// treated as a failure snapshot, so the step runs again.
#[derive(Debug, Clone, PartialEq)]
pub enum StepValue {
    Done,
    Value(String),
    Failed(Value),
}

impl StepValue {
    /// The gating predicate: only completed markers short-circuit
    /// re-execution. Failure snapshots are diagnostic and leave the step
    /// eligible to run again.
    pub fn is_complete(&self) -> bool {
        matches!(self, StepValue::Done | StepValue::Value(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            StepValue::Value(s) => Some(s),
            _ => None,
        }
    }

    pub fn failure(name: Option<&str>, message: &str) -> Self {
        StepValue::Failed(json!({
            "name": name,
            "message": message,
            "recordedAt": Utc::now(),
        }))
    }

    pub fn to_json(&self) -> Value {
        match self {
            StepValue::Done => Value::Bool(true),
            StepValue::Value(s) => Value::String(s.clone()),
            StepValue::Failed(snapshot) => snapshot.clone(),
        }
    }

    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(true) => Some(StepValue::Done),
            Value::String(s) => Some(StepValue::Value(s.clone())),
            other => Some(StepValue::Failed(other.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_success_markers_complete() {
        assert!(StepValue::Done.is_complete());
        assert!(StepValue::Value("0ZE000123".to_string()).is_complete());
        assert!(!StepValue::failure(Some("NotFound"), "no such org").is_complete());
    }

    #[test]
    fn test_json_round_trip() {
        for value in [
            StepValue::Done,
            StepValue::Value("storeUrl".to_string()),
            StepValue::Failed(json!({"name": "Timeout", "message": "timed out"})),
        ] {
            assert_eq!(StepValue::from_json(&value.to_json()), Some(value));
        }
    }

    #[test]
    fn test_unexpected_shapes_read_as_failures() {
        assert_eq!(
            StepValue::from_json(&Value::Bool(false)),
            Some(StepValue::Failed(Value::Bool(false)))
        );
        assert!(matches!(
            StepValue::from_json(&json!([1, 2])),
            Some(StepValue::Failed(_))
        ));
        assert_eq!(StepValue::from_json(&Value::Null), None);
    }
}
