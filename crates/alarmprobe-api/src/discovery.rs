//! Service-registry lookup.
//!
//! Resolves a service name to a `host:port` endpoint by asking a Consul
//! agent for the service's healthy instances. The first passing instance
//! wins; there are no retries at this layer.

use std::fmt;

use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// A resolved network endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

// ── Consul response shape ────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HealthEntry {
    node: NodeInfo,
    service: ServiceInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NodeInfo {
    #[serde(default)]
    address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceInfo {
    #[serde(default)]
    address: String,
    port: u16,
}

impl HealthEntry {
    /// Instances registered without a service address inherit the node's.
    fn endpoint(&self) -> Option<Endpoint> {
        let host = if self.service.address.is_empty() {
            &self.node.address
        } else {
            &self.service.address
        };
        (!host.is_empty()).then(|| Endpoint::new(host.clone(), self.service.port))
    }
}

// ── Resolver ─────────────────────────────────────────────────────────

/// Client for a Consul agent's health API.
pub struct ConsulResolver {
    http: reqwest::Client,
    registry: String,
    base_url: Url,
}

impl ConsulResolver {
    /// Build a resolver for the agent at `registry` (`host:port`, or a full
    /// `http(s)://` URL). When `token` is set it is sent as `X-Consul-Token`.
    pub fn new(
        registry: &str,
        transport: &TransportConfig,
        token: Option<&SecretString>,
    ) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(token.expose_secret())
                .map_err(|e| Error::Tls(format!("invalid registry token header value: {e}")))?;
            value.set_sensitive(true);
            headers.insert("X-Consul-Token", value);
        }
        let http = transport.build_client_with_headers(headers)?;
        Self::with_client(registry, http)
    }

    /// Wrap a pre-built `reqwest::Client`.
    pub fn with_client(registry: &str, http: reqwest::Client) -> Result<Self, Error> {
        let base_url = registry_url(registry)?;
        Ok(Self {
            http,
            registry: registry.to_owned(),
            base_url,
        })
    }

    /// Return one healthy endpoint for `service`.
    pub async fn resolve(&self, service: &str) -> Result<Endpoint, Error> {
        let mut url = self.base_url.join(&format!("v1/health/service/{service}"))?;
        url.query_pairs_mut().append_pair("passing", "true");
        debug!("GET {url}");

        let resp = self.http.get(url).send().await?.error_for_status()?;
        let body = resp.text().await?;
        let entries: Vec<HealthEntry> =
            serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body: body.clone(),
            })?;

        let endpoint = entries
            .iter()
            .find_map(HealthEntry::endpoint)
            .ok_or_else(|| Error::EndpointNotFound {
                service: service.to_owned(),
                registry: self.registry.clone(),
            })?;

        debug!(service, %endpoint, instances = entries.len(), "resolved endpoint");
        Ok(endpoint)
    }
}

/// Resolve `service` against the registry at `registry` with default
/// transport settings.
pub async fn resolve(registry: &str, service: &str) -> Result<Endpoint, Error> {
    ConsulResolver::new(registry, &TransportConfig::default(), None)?
        .resolve(service)
        .await
}

fn registry_url(registry: &str) -> Result<Url, Error> {
    let raw = if registry.contains("://") {
        registry.to_owned()
    } else {
        format!("http://{registry}")
    };
    let mut url = Url::parse(&raw)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
