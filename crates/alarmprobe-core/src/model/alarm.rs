// ── Alarm event domain type ──

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;

/// An alarm as published on the alarm topic.
///
/// Every field is optional on the wire; presence and types are enforced by
/// the schema validator, not by deserialization. Unknown fields are kept in
/// `extra` so nothing from the producer is silently dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlarmEvent {
    /// Structured id, `<namespace>.<producer>.<device id>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub alarm_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,

    /// Id of the device the alarm was raised for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raised_ts: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reported_ts: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_ts: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AlarmEvent {
    /// Typed view of an already schema-checked message.
    pub fn from_value(message: &Value) -> Result<Self, CoreError> {
        serde_json::from_value(message.clone()).map_err(|e| CoreError::MalformedMessage {
            message: e.to_string(),
            raw: message.to_string(),
        })
    }

    /// `raised_ts` as a UTC instant, when it is a valid epoch-seconds value.
    pub fn raised_at(&self) -> Option<DateTime<Utc>> {
        self.raised_ts.and_then(epoch_seconds)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
fn epoch_seconds(ts: f64) -> Option<DateTime<Utc>> {
    if !ts.is_finite() {
        return None;
    }
    let millis = (ts * 1000.0).round() as i64;
    DateTime::from_timestamp_millis(millis)
}
