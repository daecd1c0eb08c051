//! Structural validation of alarm messages.
//!
//! The schema is compiled once with `jsonschema`. Each known field gets its
//! own compiled sub-validator so a violation can always name the field that
//! failed; fields the schema does not list are accepted as-is.

use std::fmt;

use jsonschema::Validator;
use serde_json::{Value, json};

use crate::error::CoreError;

const STRING_FIELDS: [&str; 7] = [
    "id",
    "type",
    "category",
    "state",
    "severity",
    "resource_id",
    "description",
];
const NUMBER_FIELDS: [&str; 3] = ["raised_ts", "reported_ts", "changed_ts"];
const REQUIRED_WHEN_STRICT: [&str; 2] = ["id", "resource_id"];

/// JSON Schema document for alarm messages.
///
/// The lenient form type-checks fields only when present. The strict form
/// additionally requires `id` and `resource_id`.
pub fn alarm_schema_document(strict: bool) -> Value {
    let mut properties = serde_json::Map::new();
    for field in STRING_FIELDS {
        properties.insert(field.into(), json!({ "type": "string" }));
    }
    for field in NUMBER_FIELDS {
        properties.insert(field.into(), json!({ "type": "number" }));
    }
    properties.insert(
        "context".into(),
        json!({
            "type": "object",
            "additionalProperties": { "type": "string" }
        }),
    );

    let mut schema = json!({
        "type": "object",
        "properties": properties,
    });
    if strict {
        schema["required"] = json!(REQUIRED_WHEN_STRICT);
    }
    schema
}

// ── Violations ───────────────────────────────────────────────────────

/// One failed check. `field` is `None` for object-level failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: Option<String>,
    pub message: String,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{field}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// All schema failures found in one message, in field order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    pub violations: Vec<FieldViolation>,
}

impl SchemaViolation {
    /// Names of the fields that failed.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.violations.iter().filter_map(|v| v.field.as_deref())
    }
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

impl std::error::Error for SchemaViolation {}

// ── Validator ────────────────────────────────────────────────────────

/// Compiled alarm schema.
pub struct AlarmSchema {
    root: Validator,
    fields: Vec<(String, Validator)>,
    strict: bool,
}

impl fmt::Debug for AlarmSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlarmSchema")
            .field("strict", &self.strict)
            .field("fields", &self.fields.len())
            .finish_non_exhaustive()
    }
}

impl AlarmSchema {
    /// Every field optional, type-checked when present.
    pub fn lenient() -> Result<Self, CoreError> {
        Self::compile(false)
    }

    /// Like [`lenient`](Self::lenient), with `id` and `resource_id` required.
    pub fn strict() -> Result<Self, CoreError> {
        Self::compile(true)
    }

    pub fn new(strict: bool) -> Result<Self, CoreError> {
        Self::compile(strict)
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    fn compile(strict: bool) -> Result<Self, CoreError> {
        let document = alarm_schema_document(strict);

        let mut root_schema = json!({ "type": "object" });
        if let Some(required) = document.get("required") {
            root_schema["required"] = required.clone();
        }
        let root = compile_one(&root_schema)?;

        let mut fields = Vec::new();
        if let Some(Value::Object(properties)) = document.get("properties") {
            for (name, schema) in properties {
                fields.push((name.clone(), compile_one(schema)?));
            }
        }

        Ok(Self {
            root,
            fields,
            strict,
        })
    }

    /// Check `message` against the schema. Pure: the same message always
    /// yields the same result.
    pub fn validate(&self, message: &Value) -> Result<(), SchemaViolation> {
        let mut violations: Vec<FieldViolation> = self
            .root
            .iter_errors(message)
            .map(|e| FieldViolation {
                field: None,
                message: e.to_string(),
            })
            .collect();

        if let Value::Object(object) = message {
            for (name, validator) in &self.fields {
                let Some(value) = object.get(name) else {
                    continue;
                };
                violations.extend(validator.iter_errors(value).map(|e| FieldViolation {
                    field: Some(name.clone()),
                    message: e.to_string(),
                }));
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(SchemaViolation { violations })
        }
    }

    pub fn is_valid(&self, message: &Value) -> bool {
        self.validate(message).is_ok()
    }
}

fn compile_one(schema: &Value) -> Result<Validator, CoreError> {
    jsonschema::validator_for(schema)
        .map_err(|e| CoreError::Internal(format!("alarm schema does not compile: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn full_alarm() -> Value {
        json!({
            "id": "voltha.simulated_olt.abc123",
            "type": "COMMUNICATION",
            "category": "OLT",
            "state": "RAISED",
            "severity": "MAJOR",
            "resource_id": "abc123",
            "raised_ts": 1_500_000_000.5,
            "reported_ts": 1_500_000_001,
            "changed_ts": 0,
            "description": "simulated alarm",
            "context": { "pon": "1" }
        })
    }

    #[test]
    fn full_alarm_is_valid() {
        let schema = AlarmSchema::lenient().unwrap();
        assert_eq!(schema.validate(&full_alarm()), Ok(()));
    }

    #[test]
    fn missing_context_is_valid() {
        let schema = AlarmSchema::lenient().unwrap();
        let mut alarm = full_alarm();
        alarm.as_object_mut().unwrap().remove("context");
        assert!(schema.is_valid(&alarm));
    }

    #[test]
    fn empty_object_is_valid_when_lenient() {
        let schema = AlarmSchema::lenient().unwrap();
        assert!(schema.is_valid(&json!({})));
    }

    #[test]
    fn non_string_context_value_names_context() {
        let schema = AlarmSchema::lenient().unwrap();
        let err = schema.validate(&json!({ "context": { "k": 5 } })).unwrap_err();
        assert_eq!(err.fields().collect::<Vec<_>>(), vec!["context"]);
        assert!(err.to_string().starts_with("context: "), "got: {err}");
    }

    #[test]
    fn string_timestamp_is_rejected() {
        let schema = AlarmSchema::lenient().unwrap();
        let err = schema
            .validate(&json!({ "raised_ts": "yesterday", "severity": 3 }))
            .unwrap_err();
        let mut fields: Vec<_> = err.fields().collect();
        fields.sort_unstable();
        assert_eq!(fields, vec!["raised_ts", "severity"]);
    }

    #[test]
    fn unknown_fields_are_unconstrained() {
        let schema = AlarmSchema::lenient().unwrap();
        assert!(schema.is_valid(&json!({ "logical_device_id": 42, "extra": [1, 2] })));
    }

    #[test]
    fn non_object_is_rejected_at_root() {
        let schema = AlarmSchema::lenient().unwrap();
        let err = schema.validate(&json!(["not", "an", "object"])).unwrap_err();
        assert_eq!(err.violations.len(), 1);
        assert_eq!(err.violations[0].field, None);
    }

    #[test]
    fn strict_requires_id_and_resource_id() {
        let schema = AlarmSchema::strict().unwrap();
        assert!(schema.is_strict());
        assert!(!schema.is_valid(&json!({ "id": "voltha.a.b" })));
        assert!(schema.is_valid(&json!({ "id": "voltha.a.b", "resource_id": "b" })));
    }

    #[test]
    fn validation_is_idempotent() {
        let schema = AlarmSchema::lenient().unwrap();
        let bad = json!({ "context": { "k": 5 }, "id": 7 });
        assert_eq!(schema.validate(&bad), schema.validate(&bad));
        assert_eq!(schema.validate(&full_alarm()), schema.validate(&full_alarm()));
    }

    #[test]
    fn document_lists_every_field() {
        let doc = alarm_schema_document(false);
        let properties = doc["properties"].as_object().unwrap();
        assert_eq!(properties.len(), 11);
        assert!(doc.get("required").is_none());
        assert_eq!(alarm_schema_document(true)["required"], json!(["id", "resource_id"]));
    }
}
