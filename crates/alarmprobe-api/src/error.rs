use thiserror::Error;

/// Top-level error type for the `alarmprobe-api` crate.
///
/// Covers every failure mode across the three external surfaces:
/// the REST gateway, the service registry, and the message broker.
/// `alarmprobe-core` maps these into scenario-level diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── REST gateway ────────────────────────────────────────────────
    /// The response status differed from the one the caller asserted.
    #[error("{method} {url}: expected HTTP {expected}, got {actual}")]
    UnexpectedStatus {
        method: String,
        url: String,
        expected: u16,
        actual: u16,
        body: String,
    },

    /// A successful response carried something other than JSON.
    #[error("{url}: expected content type {expected}, got {actual}")]
    UnexpectedContentType {
        url: String,
        expected: &'static str,
        actual: String,
    },

    // ── Service registry ────────────────────────────────────────────
    /// The registry has no healthy instance of the requested service.
    #[error("no healthy instance of '{service}' registered at {registry}")]
    EndpointNotFound { service: String, registry: String },

    // ── Message broker ──────────────────────────────────────────────
    /// Broker connection, metadata, or fetch failure.
    #[error("Kafka error: {0}")]
    Kafka(#[from] rskafka::client::error::Error),

    /// The bootstrap handshake did not complete in time.
    #[error("broker {endpoint} did not respond within {timeout_secs}s")]
    BrokerTimeout { endpoint: String, timeout_secs: u64 },

    /// The broker endpoint string could not be used.
    #[error("Invalid broker endpoint '{endpoint}': {reason}")]
    InvalidBroker { endpoint: String, reason: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    ///
    /// Nothing in this crate retries on its own; callers decide.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Kafka(_) | Self::BrokerTimeout { .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if the error is a request timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout(),
            Self::BrokerTimeout { .. } => true,
            _ => false,
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::UnexpectedStatus { actual, .. } => Some(*actual),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
