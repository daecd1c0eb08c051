// ── Runtime scenario configuration ──
//
// These types describe *where* the system under test lives and *what* the
// alarm check expects. They never touch disk: the CLI builds an
// `EnvironmentConfig` from its profile, and `resolve()` turns registry
// lookups into concrete endpoints once, at setup.

use std::time::Duration;

use alarmprobe_api::{ConsulResolver, SubscribeOptions, TlsMode, TransportConfig};
use secrecy::SecretString;
use tracing::{debug, info};
use url::Url;

use crate::error::CoreError;
use crate::observer::MalformedPolicy;

pub const DEFAULT_REGISTRY: &str = "localhost:8500";
pub const DEFAULT_REST_SERVICE: &str = "chameleon-rest";
pub const DEFAULT_BROKER_SERVICE: &str = "kafka";
pub const DEFAULT_TOPIC: &str = "voltha.alarms";
pub const DEFAULT_DEVICE_TYPE: &str = "simulated_olt";

/// What the alarm half of the scenario expects and how long it may wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmCheck {
    pub topic: String,
    /// Expected producer segment of the alarm id.
    pub producer: String,
    /// Type of the device the scenario creates.
    pub device_type: String,
    /// Budget for observing the alarm.
    pub timeout: Duration,
    pub subscribe: SubscribeOptions,
    pub on_malformed: MalformedPolicy,
    /// Require `id` and `resource_id` in the alarm schema.
    pub strict_schema: bool,
}

impl Default for AlarmCheck {
    fn default() -> Self {
        Self {
            topic: DEFAULT_TOPIC.into(),
            producer: DEFAULT_DEVICE_TYPE.into(),
            device_type: DEFAULT_DEVICE_TYPE.into(),
            timeout: Duration::from_secs(20),
            subscribe: SubscribeOptions::default(),
            on_malformed: MalformedPolicy::Skip,
            strict_schema: false,
        }
    }
}

/// Fully resolved scenario inputs. Endpoints here are final; nothing is
/// looked up again while the scenario runs.
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    pub rest_base_url: Url,
    /// Broker bootstrap address, `host:port`.
    pub broker_endpoint: String,
    pub alarms: AlarmCheck,
    pub http_timeout: Duration,
    pub tls: TlsMode,
    /// Disable and delete the created device once the scenario ends.
    pub cleanup: bool,
}

impl ScenarioConfig {
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: self.tls.clone(),
            timeout: self.http_timeout,
        }
    }
}

/// Where to find one service: by name in the registry, or at a fixed address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceLocation {
    Registry(String),
    Fixed(String),
}

/// Unresolved scenario inputs, as read from configuration.
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    /// Registry agent, `host:port`.
    pub registry: String,
    pub registry_token: Option<SecretString>,
    /// REST gateway. A fixed value is a base URL.
    pub rest: ServiceLocation,
    /// Message broker. A fixed value is `host:port`.
    pub broker: ServiceLocation,
    pub alarms: AlarmCheck,
    pub http_timeout: Duration,
    pub tls: TlsMode,
    pub cleanup: bool,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            registry: DEFAULT_REGISTRY.into(),
            registry_token: None,
            rest: ServiceLocation::Registry(DEFAULT_REST_SERVICE.into()),
            broker: ServiceLocation::Registry(DEFAULT_BROKER_SERVICE.into()),
            alarms: AlarmCheck::default(),
            http_timeout: Duration::from_secs(30),
            tls: TlsMode::System,
            cleanup: false,
        }
    }
}

impl EnvironmentConfig {
    fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: self.tls.clone(),
            timeout: self.http_timeout,
        }
    }

    /// Build a resolver only when some service is located by name.
    fn resolver(&self) -> Result<Option<ConsulResolver>, CoreError> {
        let needs_registry = [&self.rest, &self.broker]
            .iter()
            .any(|location| matches!(location, ServiceLocation::Registry(_)));
        if !needs_registry {
            return Ok(None);
        }
        let resolver = ConsulResolver::new(
            &self.registry,
            &self.transport(),
            self.registry_token.as_ref(),
        )?;
        Ok(Some(resolver))
    }

    /// Look up every registry-located service and produce the final config.
    pub async fn resolve(&self) -> Result<ScenarioConfig, CoreError> {
        let resolver = self.resolver()?;

        let rest_base_url = match &self.rest {
            ServiceLocation::Fixed(raw) => parse_base_url(raw)?,
            ServiceLocation::Registry(service) => {
                let endpoint = lookup(resolver.as_ref(), service).await?;
                parse_base_url(&format!("http://{endpoint}"))?
            }
        };

        let broker_endpoint = match &self.broker {
            ServiceLocation::Fixed(endpoint) => endpoint.clone(),
            ServiceLocation::Registry(service) => {
                lookup(resolver.as_ref(), service).await?.to_string()
            }
        };

        info!(rest = %rest_base_url, broker = %broker_endpoint, "environment resolved");

        Ok(ScenarioConfig {
            rest_base_url,
            broker_endpoint,
            alarms: self.alarms.clone(),
            http_timeout: self.http_timeout,
            tls: self.tls.clone(),
            cleanup: self.cleanup,
        })
    }

    /// Broker `host:port` only, without touching the REST location.
    pub async fn resolve_broker(&self) -> Result<String, CoreError> {
        match &self.broker {
            ServiceLocation::Fixed(endpoint) => Ok(endpoint.clone()),
            ServiceLocation::Registry(service) => {
                Ok(self.resolve_service(service).await?.to_string())
            }
        }
    }

    /// Resolve a single service by name, regardless of the configured
    /// locations.
    pub async fn resolve_service(&self, service: &str) -> Result<alarmprobe_api::Endpoint, CoreError> {
        let resolver = ConsulResolver::new(
            &self.registry,
            &self.transport(),
            self.registry_token.as_ref(),
        )?;
        lookup(Some(&resolver), service).await
    }
}

async fn lookup(
    resolver: Option<&ConsulResolver>,
    service: &str,
) -> Result<alarmprobe_api::Endpoint, CoreError> {
    let resolver = resolver.ok_or_else(|| CoreError::Internal("registry resolver missing".into()))?;
    let endpoint = resolver.resolve(service).await?;
    debug!(service, %endpoint, "service resolved");
    Ok(endpoint)
}

/// Parse a base URL, ensuring a trailing slash so relative joins keep the
/// full path.
pub fn parse_base_url(raw: &str) -> Result<Url, CoreError> {
    let mut url = Url::parse(raw).map_err(|e| CoreError::Config {
        message: format!("invalid REST URL '{raw}': {e}"),
    })?;
    // `gw:8881` parses as scheme `gw` with an opaque path.
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(CoreError::Config {
            message: format!("invalid REST URL '{raw}': expected http(s)://host[:port]"),
        });
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
