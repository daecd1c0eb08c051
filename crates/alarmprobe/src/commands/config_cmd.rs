//! Config subcommand handlers.

use alarmprobe_config::{Config, Profile, save_config_to};
use secrecy::ExposeSecret;
use serde::Serialize;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;
use crate::output;

/// Effective settings for `config show`. The registry token is never printed.
#[derive(Serialize)]
struct ShownConfig<'a> {
    path: String,
    profile: String,
    registry: &'a str,
    registry_token: &'static str,
    rest: String,
    broker: String,
    topic: &'a str,
    device_type: &'a str,
    producer: &'a str,
    alarm_timeout_secs: u64,
    http_timeout_secs: u64,
    max_messages: Option<usize>,
    lookback: u32,
    partitions: &'a [i32],
    on_malformed: String,
    strict_schema: bool,
    cleanup: bool,
}

fn location_text(location: &alarmprobe_core::ServiceLocation) -> String {
    match location {
        alarmprobe_core::ServiceLocation::Registry(service) => format!("registry:{service}"),
        alarmprobe_core::ServiceLocation::Fixed(value) => value.clone(),
    }
}

fn starter_config() -> Config {
    let mut cfg = Config::default();
    cfg.profiles.insert("default".into(), Profile::default());
    cfg
}

fn parse_bool(field: &str, value: &str) -> Result<bool, CliError> {
    value.parse().map_err(|_| CliError::Usage {
        field: field.into(),
        reason: "must be 'true' or 'false'".into(),
    })
}

fn parse_num<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, CliError> {
    value.parse().map_err(|_| CliError::Usage {
        field: field.into(),
        reason: format!("'{value}' is not a valid number"),
    })
}

fn set_key(profile: &mut Profile, key: &str, value: String) -> Result<(), CliError> {
    match key.replace('-', "_").as_str() {
        "registry" => profile.registry = Some(value),
        "registry_token_env" => profile.registry_token_env = Some(value),
        "rest_service" => profile.rest_service = Some(value),
        "broker_service" => profile.broker_service = Some(value),
        "rest_url" => profile.rest_url = Some(value),
        "broker" => profile.broker = Some(value),
        "device_type" => profile.device_type = Some(value),
        "producer" => profile.producer = Some(value),
        "topic" => profile.topic = Some(value),
        "alarm_timeout" => profile.alarm_timeout = Some(parse_num(key, &value)?),
        "http_timeout" => profile.http_timeout = Some(parse_num(key, &value)?),
        "max_messages" => profile.max_messages = Some(parse_num(key, &value)?),
        "lookback" => profile.lookback = Some(parse_num(key, &value)?),
        "partitions" => {
            let partitions = value
                .split(',')
                .map(|p| parse_num(key, p.trim()))
                .collect::<Result<Vec<i32>, _>>()?;
            profile.partitions = Some(partitions);
        }
        "on_malformed" => {
            if value != "skip" && value != "abort" {
                return Err(CliError::Usage {
                    field: "on_malformed".into(),
                    reason: "must be 'skip' or 'abort'".into(),
                });
            }
            profile.on_malformed = Some(value);
        }
        "strict_schema" => profile.strict_schema = Some(parse_bool(key, &value)?),
        "cleanup" => profile.cleanup = Some(parse_bool(key, &value)?),
        "insecure" => profile.insecure = Some(parse_bool(key, &value)?),
        "ca_cert" => profile.ca_cert = Some(value.into()),
        other => {
            return Err(CliError::Usage {
                field: other.into(),
                reason: format!(
                    "unknown config key '{other}'. Valid keys: registry, registry_token_env, \
                     rest_service, broker_service, rest_url, broker, device_type, producer, \
                     topic, alarm_timeout, http_timeout, max_messages, lookback, partitions, \
                     on_malformed, strict_schema, cleanup, insecure, ca_cert"
                ),
            });
        }
    }
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = config::config_path(global);

    match args.command {
        ConfigCommand::Path => {
            println!("{}", path.display());
            Ok(())
        }

        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }
            save_config_to(&starter_config(), &path)?;
            eprintln!("✓ Wrote starter config to {}", path.display());
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = config::load_config(global)?;
            let (profile, _) = config::selected_profile(global, &cfg)?;
            let env = config::environment(global, &cfg)?;
            let format = config::output_format(global, &cfg);

            let shown = ShownConfig {
                path: path.display().to_string(),
                profile,
                registry: &env.registry,
                registry_token: match env.registry_token {
                    Some(ref token) if !token.expose_secret().is_empty() => "(set)",
                    _ => "(none)",
                },
                rest: location_text(&env.rest),
                broker: location_text(&env.broker),
                topic: &env.alarms.topic,
                device_type: &env.alarms.device_type,
                producer: &env.alarms.producer,
                alarm_timeout_secs: env.alarms.timeout.as_secs(),
                http_timeout_secs: env.http_timeout.as_secs(),
                max_messages: env.alarms.subscribe.max_messages,
                lookback: env.alarms.subscribe.lookback,
                partitions: &env.alarms.subscribe.partitions,
                on_malformed: env.alarms.on_malformed.to_string(),
                strict_schema: env.alarms.strict_schema,
                cleanup: env.cleanup,
            };

            let text_format = if format == OutputFormat::Text {
                OutputFormat::Yaml
            } else {
                format
            };
            let out = output::render(text_format, &shown, |_| String::new())?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Set { key, value } => {
            let mut cfg = config::load_config(global)?;
            let profile_name = config::active_profile_name(global, &cfg);
            let profile = cfg.profiles.entry(profile_name.clone()).or_default();
            set_key(profile, &key, value)?;
            save_config_to(&cfg, &path)?;
            eprintln!("✓ Set {key} on profile '{profile_name}'");
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config(global)?;
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: alarmprobe config init");
            } else {
                let mut names: Vec<&String> = cfg.profiles.keys().collect();
                names.sort();
                for name in names {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config(global)?;
            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    available: config::available_profiles(&cfg),
                    name,
                });
            }
            cfg.default_profile = Some(name.clone());
            save_config_to(&cfg, &path)?;
            eprintln!("✓ Default profile set to '{name}'");
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn set_key_accepts_dashes_and_parses_values() {
        let mut profile = Profile::default();
        set_key(&mut profile, "rest-url", "http://gw:8881".into()).unwrap();
        set_key(&mut profile, "partitions", "0, 2".into()).unwrap();
        set_key(&mut profile, "cleanup", "true".into()).unwrap();
        assert_eq!(profile.rest_url.as_deref(), Some("http://gw:8881"));
        assert_eq!(profile.partitions, Some(vec![0, 2]));
        assert_eq!(profile.cleanup, Some(true));
    }

    #[test]
    fn set_key_rejects_unknown_and_bad_values() {
        let mut profile = Profile::default();
        assert!(set_key(&mut profile, "controller", "x".into()).is_err());
        assert!(set_key(&mut profile, "lookback", "many".into()).is_err());
        assert!(set_key(&mut profile, "on_malformed", "ignore".into()).is_err());
    }
}
