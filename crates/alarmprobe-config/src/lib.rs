//! Shared configuration for the alarmprobe CLI.
//!
//! TOML profiles describing one deployment under test, registry token
//! resolution (env var or plaintext), and translation to
//! `alarmprobe_core::EnvironmentConfig`. The CLI layers its flag overrides
//! on top of what this crate produces.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use alarmprobe_core::config::{
    DEFAULT_BROKER_SERVICE, DEFAULT_DEVICE_TYPE, DEFAULT_REGISTRY, DEFAULT_REST_SERVICE,
    DEFAULT_TOPIC, parse_base_url,
};
use alarmprobe_core::{
    AlarmCheck, CoreError, EnvironmentConfig, MalformedPolicy, ServiceLocation, SubscribeOptions,
    TlsMode,
};

/// Prefix for environment overrides. Nested keys use `__`, e.g.
/// `ALARMPROBE_DEFAULTS__ALARM_TIMEOUT=40`.
pub const ENV_PREFIX: &str = "ALARMPROBE_";

/// Env var consulted for the registry token when a profile names none.
pub const REGISTRY_TOKEN_ENV: &str = "ALARMPROBE_REGISTRY_TOKEN";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found in config")]
    UnknownProfile { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named deployment profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Pick a profile: the explicit name, else `default_profile`. A missing
    /// default profile yields an empty one; a missing named profile is an
    /// error.
    pub fn profile(&self, name: Option<&str>) -> Result<(String, Profile), ConfigError> {
        if let Some(name) = name {
            return self
                .profiles
                .get(name)
                .cloned()
                .map(|p| (name.to_owned(), p))
                .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() });
        }
        let name = self.default_profile.clone().unwrap_or_else(|| "default".into());
        let profile = self.profiles.get(&name).cloned().unwrap_or_default();
        Ok((name, profile))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub insecure: bool,

    /// Per-request REST/registry timeout, seconds.
    #[serde(default = "default_http_timeout")]
    pub http_timeout: u64,

    /// Alarm observation budget, seconds.
    #[serde(default = "default_alarm_timeout")]
    pub alarm_timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: false,
            http_timeout: default_http_timeout(),
            alarm_timeout: default_alarm_timeout(),
        }
    }
}

fn default_output() -> String {
    "text".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_http_timeout() -> u64 {
    30
}
fn default_alarm_timeout() -> u64 {
    20
}

/// A named deployment under test. Every field is optional; unset fields
/// fall back to a single-host lab setup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    /// Registry agent address (e.g., "localhost:8500").
    pub registry: Option<String>,

    /// Environment variable holding the registry ACL token.
    pub registry_token_env: Option<String>,

    /// Registry ACL token (plaintext, prefer `registry_token_env`).
    pub registry_token: Option<String>,

    /// Registry name of the REST gateway.
    pub rest_service: Option<String>,

    /// Registry name of the message broker.
    pub broker_service: Option<String>,

    /// Fixed REST base URL; skips the registry lookup.
    pub rest_url: Option<String>,

    /// Fixed broker `host:port`; skips the registry lookup.
    pub broker: Option<String>,

    pub device_type: Option<String>,

    /// Expected producer segment of alarm ids. Defaults to the device type.
    pub producer: Option<String>,

    pub topic: Option<String>,

    /// Override `defaults.alarm_timeout`.
    pub alarm_timeout: Option<u64>,

    /// Override `defaults.http_timeout`.
    pub http_timeout: Option<u64>,

    pub max_messages: Option<usize>,
    pub lookback: Option<u32>,
    pub partitions: Option<Vec<i32>>,

    /// "skip" or "abort".
    pub on_malformed: Option<String>,

    pub strict_schema: Option<bool>,

    /// Disable and delete the device after the run.
    pub cleanup: Option<bool>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "alarmprobe", "alarmprobe").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("alarmprobe");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the full Config from `path` + environment. A missing file is the
/// same as an empty one.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

/// Registry token: the profile's env var, then [`REGISTRY_TOKEN_ENV`], then
/// plaintext in the profile. `None` when nothing is set.
pub fn resolve_registry_token(profile: &Profile) -> Option<SecretString> {
    let env_name = profile.registry_token_env.as_deref().unwrap_or(REGISTRY_TOKEN_ENV);
    if let Ok(val) = std::env::var(env_name) {
        if !val.is_empty() {
            return Some(SecretString::from(val));
        }
    }
    profile.registry_token.clone().map(SecretString::from)
}

fn tls_mode(profile: &Profile, defaults: &Defaults) -> TlsMode {
    if profile.insecure.unwrap_or(defaults.insecure) {
        TlsMode::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsMode::CustomCa(ca_path.clone())
    } else {
        TlsMode::System
    }
}

fn location(fixed: Option<&String>, service: Option<&String>, default_service: &str) -> ServiceLocation {
    match fixed {
        Some(value) => ServiceLocation::Fixed(value.clone()),
        None => ServiceLocation::Registry(
            service.cloned().unwrap_or_else(|| default_service.into()),
        ),
    }
}

/// Build an `EnvironmentConfig` from a profile. No CLI flag overrides.
pub fn profile_to_environment(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<EnvironmentConfig, ConfigError> {
    if let Some(ref raw) = profile.rest_url {
        parse_base_url(raw).map_err(|e| ConfigError::Validation {
            field: "rest_url".into(),
            reason: match e {
                CoreError::Config { message } => message,
                other => other.to_string(),
            },
        })?;
    }

    let on_malformed = match profile.on_malformed.as_deref() {
        None => MalformedPolicy::default(),
        Some(raw) => raw.parse().map_err(|_| ConfigError::Validation {
            field: "on_malformed".into(),
            reason: format!("expected 'skip' or 'abort', got '{raw}'"),
        })?,
    };

    let base_options = SubscribeOptions::default();
    let partitions = profile.partitions.clone().unwrap_or(base_options.partitions);
    if partitions.is_empty() {
        return Err(ConfigError::Validation {
            field: "partitions".into(),
            reason: "at least one partition is required".into(),
        });
    }
    let subscribe = SubscribeOptions {
        partitions,
        lookback: profile.lookback.unwrap_or(base_options.lookback),
        max_messages: profile.max_messages.or(base_options.max_messages),
        ..base_options
    };

    let device_type = profile
        .device_type
        .clone()
        .unwrap_or_else(|| DEFAULT_DEVICE_TYPE.into());

    let alarms = AlarmCheck {
        topic: profile.topic.clone().unwrap_or_else(|| DEFAULT_TOPIC.into()),
        producer: profile.producer.clone().unwrap_or_else(|| device_type.clone()),
        device_type,
        timeout: Duration::from_secs(profile.alarm_timeout.unwrap_or(defaults.alarm_timeout)),
        subscribe,
        on_malformed,
        strict_schema: profile.strict_schema.unwrap_or(false),
    };

    Ok(EnvironmentConfig {
        registry: profile
            .registry
            .clone()
            .unwrap_or_else(|| DEFAULT_REGISTRY.into()),
        registry_token: resolve_registry_token(profile),
        rest: location(
            profile.rest_url.as_ref(),
            profile.rest_service.as_ref(),
            DEFAULT_REST_SERVICE,
        ),
        broker: location(
            profile.broker.as_ref(),
            profile.broker_service.as_ref(),
            DEFAULT_BROKER_SERVICE,
        ),
        alarms,
        http_timeout: Duration::from_secs(profile.http_timeout.unwrap_or(defaults.http_timeout)),
        tls: tls_mode(profile, defaults),
        cleanup: profile.cleanup.unwrap_or(false),
    })
}
