// ── Core error types ──
//
// Scenario-level errors from alarmprobe-core. Every step of the scenario
// fails with one of these; the CLI renders them verbatim for the test runner.
// The `From<alarmprobe_api::Error>` impl translates transport-layer errors
// into the kinds the scenario distinguishes.

use thiserror::Error;

use crate::model::AdminState;
use crate::validate::{GrammarViolation, SchemaViolation};

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Setup errors ─────────────────────────────────────────────────
    #[error("No healthy instance of '{service}' in registry {registry}")]
    EndpointNotFound { service: String, registry: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Connection errors ────────────────────────────────────────────
    #[error("Transport failure talking to {target}: {reason}")]
    Transport { target: String, reason: String },

    #[error("Request to {target} timed out")]
    Timeout { target: String },

    // ── REST errors ──────────────────────────────────────────────────
    #[error("{method} {url}: expected HTTP {expected}, got {actual}")]
    UnexpectedStatus {
        method: String,
        url: String,
        expected: u16,
        actual: u16,
        body: String,
    },

    #[error("Unexpected response from {url}: {message}")]
    InvalidResponse { url: String, message: String },

    #[error("Device {device_id} has admin_state {actual}, expected {expected}")]
    AdminState {
        device_id: String,
        expected: AdminState,
        actual: AdminState,
    },

    // ── Observation errors ───────────────────────────────────────────
    #[error("Failed to find kafka alarm with device id:{device_id}")]
    AlarmNotFound {
        device_id: String,
        scanned: usize,
        waited_secs: u64,
    },

    #[error("Malformed message on alarm stream: {message}")]
    MalformedMessage { message: String, raw: String },

    #[error("Topic {topic} does not exist on broker {broker}")]
    TopicMissing { topic: String, broker: String },

    #[error("Observation cancelled")]
    Cancelled,

    // ── Validation errors ────────────────────────────────────────────
    #[error("Validation failed for alarm: {0}")]
    Schema(#[from] SchemaViolation),

    #[error("Invalid alarm id: {0}")]
    Grammar(#[from] GrammarViolation),

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// `true` for failures of the system under test, as opposed to failures
    /// to reach or configure it.
    pub fn is_assertion(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedStatus { .. }
                | Self::InvalidResponse { .. }
                | Self::AdminState { .. }
                | Self::AlarmNotFound { .. }
                | Self::MalformedMessage { .. }
                | Self::TopicMissing { .. }
                | Self::Schema(_)
                | Self::Grammar(_)
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<alarmprobe_api::Error> for CoreError {
    fn from(err: alarmprobe_api::Error) -> Self {
        use alarmprobe_api::Error as Api;

        match err {
            Api::Transport(ref e) => {
                let target = e
                    .url()
                    .map_or_else(|| "<unknown>".into(), ToString::to_string);
                if e.is_timeout() {
                    CoreError::Timeout { target }
                } else {
                    CoreError::Transport {
                        target,
                        reason: e.to_string(),
                    }
                }
            }
            Api::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            Api::Tls(reason) => CoreError::Transport {
                target: String::new(),
                reason: format!("TLS error: {reason}"),
            },
            Api::UnexpectedStatus {
                method,
                url,
                expected,
                actual,
                body,
            } => CoreError::UnexpectedStatus {
                method,
                url,
                expected,
                actual,
                body,
            },
            Api::UnexpectedContentType {
                url,
                expected,
                actual,
            } => CoreError::InvalidResponse {
                url,
                message: format!("expected content type {expected}, got {actual}"),
            },
            Api::EndpointNotFound { service, registry } => {
                CoreError::EndpointNotFound { service, registry }
            }
            Api::Kafka(e) => CoreError::Transport {
                target: "kafka".into(),
                reason: e.to_string(),
            },
            Api::BrokerTimeout { endpoint, .. } => CoreError::Timeout { target: endpoint },
            Api::InvalidBroker { endpoint, reason } => CoreError::Config {
                message: format!("invalid broker endpoint '{endpoint}': {reason}"),
            },
            Api::Deserialization { message, body } => CoreError::InvalidResponse {
                url: String::new(),
                message: if body.is_empty() {
                    message
                } else {
                    format!("{message}; body: {body}")
                },
            },
        }
    }
}
