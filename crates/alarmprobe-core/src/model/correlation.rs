// ── Correlation key ──

use std::fmt;

use serde_json::Value;

/// Field of an alarm that names the device it was raised for.
pub const CORRELATION_FIELD: &str = "resource_id";

/// Joins an asynchronously observed alarm to the device that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationKey(String);

impl CorrelationKey {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self(device_id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` when `message.resource_id` is a string equal to this key.
    pub fn matches(&self, message: &Value) -> bool {
        message
            .get(CORRELATION_FIELD)
            .and_then(Value::as_str)
            .is_some_and(|id| id == self.0)
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn matches_equal_resource_id() {
        let key = CorrelationKey::new("abc123");
        assert!(key.matches(&json!({"resource_id": "abc123", "id": "x"})));
    }

    #[test]
    fn rejects_other_device() {
        let key = CorrelationKey::new("abc123");
        assert!(!key.matches(&json!({"resource_id": "zzz999"})));
    }

    #[test]
    fn rejects_missing_or_non_string_resource_id() {
        let key = CorrelationKey::new("123");
        assert!(!key.matches(&json!({"id": "voltha.simulated_olt.123"})));
        assert!(!key.matches(&json!({"resource_id": 123})));
        assert!(!key.matches(&json!(["resource_id", "123"])));
    }
}
