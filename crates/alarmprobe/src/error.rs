//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with help
//! text and a distinct exit code per failure class.

use miette::Diagnostic;
use thiserror::Error;

use alarmprobe_config::ConfigError;
use alarmprobe_core::{CoreError, ScenarioFailure, Stage};

/// Process exit codes.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const ALARM_NOT_FOUND: i32 = 4;
    pub const VALIDATION: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Setup ────────────────────────────────────────────────────────
    #[error("No healthy instance of '{service}' in registry {registry}")]
    #[diagnostic(
        code(alarmprobe::endpoint_not_found),
        help(
            "Check that the service is registered and passing its health checks.\n\
             Or skip discovery with --rest-url / --broker."
        )
    )]
    EndpointNotFound { service: String, registry: String },

    #[error("Could not reach {target}: {reason}")]
    #[diagnostic(
        code(alarmprobe::connection_failed),
        help("Check that the service is running and reachable from this host.")
    )]
    ConnectionFailed { target: String, reason: String },

    #[error("Timed out talking to {target}")]
    #[diagnostic(
        code(alarmprobe::timeout),
        help("Increase the limit with --timeout or check the service's responsiveness.")
    )]
    Timeout { target: String },

    // ── Scenario assertions ──────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(
        code(alarmprobe::alarm_not_found),
        help(
            "Read {scanned} message(s) in {waited_secs}s without a match.\n\
             Try a longer --alarm-timeout, a larger --lookback, or more --max-messages."
        )
    )]
    AlarmNotFound {
        message: String,
        scanned: usize,
        waited_secs: u64,
    },

    #[error("{message}")]
    #[diagnostic(code(alarmprobe::validation_failed))]
    ValidationFailed { message: String },

    #[error("{message}")]
    #[diagnostic(code(alarmprobe::unexpected_response))]
    UnexpectedResponse { message: String },

    #[error("Topic '{topic}' does not exist on broker {broker}")]
    #[diagnostic(
        code(alarmprobe::topic_missing),
        help("Run: alarmprobe topic --list")
    )]
    TopicMissing { topic: String, broker: String },

    #[error("Scenario failed at {stage}")]
    #[diagnostic(code(alarmprobe::scenario_failed))]
    Scenario {
        stage: Stage,
        /// Exit code of the failure that ended the run.
        code: i32,
        #[source]
        #[diagnostic_source]
        source: Box<dyn Diagnostic + Send + Sync>,
    },

    #[error("Interrupted")]
    #[diagnostic(code(alarmprobe::interrupted))]
    Interrupted,

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(alarmprobe::usage))]
    Usage { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(alarmprobe::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: alarmprobe config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Config file already exists at {path}")]
    #[diagnostic(
        code(alarmprobe::config_exists),
        help("Use --force to overwrite it.")
    )]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(code(alarmprobe::config))]
    Config(ConfigError),

    // ── Internal ─────────────────────────────────────────────────────
    #[error("{0}")]
    #[diagnostic(code(alarmprobe::internal))]
    Internal(String),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(alarmprobe::json), help("Check the file contents and try again."))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::EndpointNotFound { .. } | Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::AlarmNotFound { .. } => exit_code::ALARM_NOT_FOUND,
            Self::ValidationFailed { .. }
            | Self::UnexpectedResponse { .. }
            | Self::TopicMissing { .. } => exit_code::VALIDATION,
            Self::Scenario { code, .. } => *code,
            Self::Usage { .. } | Self::ProfileNotFound { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::EndpointNotFound { service, registry } => {
                CliError::EndpointNotFound { service, registry }
            }
            CoreError::Transport { target, reason } => CliError::ConnectionFailed { target, reason },
            CoreError::Timeout { target } => CliError::Timeout { target },
            CoreError::Config { message } => CliError::Usage {
                field: "configuration".into(),
                reason: message,
            },
            ref e @ CoreError::AlarmNotFound {
                scanned,
                waited_secs,
                ..
            } => CliError::AlarmNotFound {
                message: e.to_string(),
                scanned,
                waited_secs,
            },
            CoreError::TopicMissing { topic, broker } => CliError::TopicMissing { topic, broker },
            CoreError::Cancelled => CliError::Interrupted,
            e @ (CoreError::Schema(_) | CoreError::Grammar(_) | CoreError::MalformedMessage { .. }) => {
                CliError::ValidationFailed {
                    message: e.to_string(),
                }
            }
            e @ (CoreError::UnexpectedStatus { .. }
            | CoreError::InvalidResponse { .. }
            | CoreError::AdminState { .. }) => CliError::UnexpectedResponse {
                message: e.to_string(),
            },
            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

impl From<ScenarioFailure> for CliError {
    fn from(failure: ScenarioFailure) -> Self {
        let inner = CliError::from(failure.error);
        CliError::Scenario {
            stage: failure.stage,
            code: inner.exit_code(),
            source: Box::new(inner),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::UnknownProfile { name } => CliError::ProfileNotFound {
                name,
                available: "(see: alarmprobe config profiles)".into(),
            },
            ConfigError::Validation { field, reason } => CliError::Usage { field, reason },
            other => CliError::Config(other),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn alarm_not_found_exits_4_naming_device() {
        let err: CliError = CoreError::AlarmNotFound {
            device_id: "abc123".into(),
            scanned: 10,
            waited_secs: 20,
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::ALARM_NOT_FOUND);
        assert_eq!(err.to_string(), "Failed to find kafka alarm with device id:abc123");
    }

    #[test]
    fn scenario_failure_keeps_inner_exit_code() {
        let failure = ScenarioFailure {
            stage: Stage::RestAvailabilityChecked,
            error: CoreError::Timeout {
                target: "http://gw/api/v1".into(),
            },
            device_id: None,
            stages: Vec::new(),
        };
        let err: CliError = failure.into();
        assert_eq!(err.exit_code(), exit_code::TIMEOUT);
        assert_eq!(err.to_string(), "Scenario failed at rest_availability_checked");

        let inner = err.diagnostic_source().unwrap();
        assert_eq!(inner.to_string(), "Timed out talking to http://gw/api/v1");
        assert_eq!(inner.code().unwrap().to_string(), "alarmprobe::timeout");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn connection_failure_keeps_reason() {
        let err: CliError = CoreError::Transport {
            target: "kafka:9092".into(),
            reason: "connection refused".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::CONNECTION);
        assert_eq!(err.to_string(), "Could not reach kafka:9092: connection refused");
    }

    #[test]
    fn endpoint_not_found_is_connection_class() {
        let err: CliError = CoreError::EndpointNotFound {
            service: "kafka".into(),
            registry: "localhost:8500".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::CONNECTION);
    }

    #[test]
    fn grammar_violation_is_validation_class() {
        let violation =
            alarmprobe_core::validate_alarm_id("voltha.other.abc123", "simulated_olt", "abc123")
                .unwrap_err();
        let err: CliError = CoreError::from(violation).into();
        assert_eq!(err.exit_code(), exit_code::VALIDATION);
    }
}
