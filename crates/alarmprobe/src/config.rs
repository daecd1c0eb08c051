//! CLI-side configuration: loads the TOML config and layers global and
//! per-command flags over the selected profile.
//!
//! Flags win over the profile, the profile wins over `[defaults]`.

use std::path::PathBuf;
use std::time::Duration;

use alarmprobe_config::{Config, Profile, load_config_from, profile_to_environment};
use alarmprobe_core::{EnvironmentConfig, MalformedPolicy, ServiceLocation, TlsMode};

use crate::cli::{GlobalOpts, MalformedArg, OutputFormat, RunArgs};
use crate::error::CliError;

/// Config file in effect: `--config` or the platform default.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(alarmprobe_config::config_path)
}

pub fn load_config(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(load_config_from(&config_path(global))?)
}

/// Profile name from `--profile`, else the config's default.
pub fn active_profile_name(global: &GlobalOpts, cfg: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| cfg.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Output format: flag, then `defaults.output`, then text.
pub fn output_format(global: &GlobalOpts, cfg: &Config) -> OutputFormat {
    if let Some(format) = global.output {
        return format;
    }
    match cfg.defaults.output.as_str() {
        "json" => OutputFormat::Json,
        "json-compact" | "json_compact" => OutputFormat::JsonCompact,
        "yaml" => OutputFormat::Yaml,
        _ => OutputFormat::Text,
    }
}

/// Resolve the environment from config + global flags.
pub fn environment(global: &GlobalOpts, cfg: &Config) -> Result<EnvironmentConfig, CliError> {
    let (_, profile) = selected_profile(global, cfg)?;
    let mut env = profile_to_environment(&profile, &cfg.defaults)?;

    if let Some(ref registry) = global.registry {
        env.registry.clone_from(registry);
    }
    if let Some(ref url) = global.rest_url {
        env.rest = ServiceLocation::Fixed(url.clone());
    }
    if let Some(ref broker) = global.broker {
        env.broker = ServiceLocation::Fixed(broker.clone());
    }
    if global.insecure {
        env.tls = TlsMode::DangerAcceptInvalid;
    }
    if let Some(secs) = global.timeout {
        env.http_timeout = Duration::from_secs(secs);
    }
    Ok(env)
}

/// Apply `run` flags on top of an environment.
pub fn apply_run_args(env: &mut EnvironmentConfig, args: &RunArgs) {
    let alarms = &mut env.alarms;
    if let Some(ref device_type) = args.device_type {
        alarms.device_type.clone_from(device_type);
        if args.producer.is_none() {
            alarms.producer.clone_from(device_type);
        }
    }
    if let Some(ref producer) = args.producer {
        alarms.producer.clone_from(producer);
    }
    if let Some(ref topic) = args.topic {
        alarms.topic.clone_from(topic);
    }
    if let Some(secs) = args.alarm_timeout {
        alarms.timeout = Duration::from_secs(secs);
    }
    if let Some(max) = args.max_messages {
        alarms.subscribe.max_messages = Some(max);
    }
    if let Some(lookback) = args.lookback {
        alarms.subscribe.lookback = lookback;
    }
    if !args.partitions.is_empty() {
        alarms.subscribe.partitions.clone_from(&args.partitions);
    }
    if let Some(policy) = args.on_malformed {
        alarms.on_malformed = match policy {
            MalformedArg::Skip => MalformedPolicy::Skip,
            MalformedArg::Abort => MalformedPolicy::Abort,
        };
    }
    if args.strict_schema {
        alarms.strict_schema = true;
    }
    if args.cleanup {
        env.cleanup = true;
    }
}

/// The profile `--profile` names (must exist), or the default one (may be
/// absent, in which case an empty profile stands in).
pub fn selected_profile(global: &GlobalOpts, cfg: &Config) -> Result<(String, Profile), CliError> {
    match global.profile.as_deref() {
        Some(name) if !cfg.profiles.contains_key(name) => Err(CliError::ProfileNotFound {
            name: name.to_owned(),
            available: available_profiles(cfg),
        }),
        name => Ok(cfg.profile(name)?),
    }
}

pub fn available_profiles(cfg: &Config) -> String {
    let mut names: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
    if names.is_empty() {
        return "(none)".into();
    }
    names.sort_unstable();
    names.join(", ")
}
