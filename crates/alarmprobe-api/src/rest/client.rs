// REST gateway HTTP client
//
// Wraps `reqwest::Client` with base-URL joining, expected-status assertions
// and JSON body decoding. Every call states the status it expects; any other
// status is an error carrying the response body for diagnostics.

use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Raw JSON client for the platform's REST gateway.
///
/// All methods return the decoded body as a [`Value`]; endpoints with no body
/// (or an expected non-2xx status) yield [`Value::Null`].
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: Url,
}

impl RestClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// `base_url` is the gateway root, e.g. `http://10.0.0.5:8881`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self { http, base_url })
    }

    /// Wrap a pre-built `reqwest::Client`.
    pub fn from_reqwest(base_url: Url, http: reqwest::Client) -> Self {
        Self { http, base_url }
    }

    /// The gateway base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// Join `path` onto the base URL. Leading slashes on `path` are ignored,
    /// so `"/api/v1"` and `"api/v1"` address the same resource.
    pub fn url(&self, path: &str) -> Result<Url, Error> {
        let full = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Ok(Url::parse(&full)?)
    }

    // ── HTTP verbs ───────────────────────────────────────────────────

    pub async fn get(&self, path: &str, expected: StatusCode) -> Result<Value, Error> {
        self.send(Method::GET, path, None, expected).await
    }

    pub async fn post(
        &self,
        path: &str,
        body: Option<&Value>,
        expected: StatusCode,
    ) -> Result<Value, Error> {
        self.send(Method::POST, path, body, expected).await
    }

    pub async fn delete(&self, path: &str, expected: StatusCode) -> Result<Value, Error> {
        self.send(Method::DELETE, path, None, expected).await
    }

    /// Decode a JSON value returned by one of the verbs into a typed model.
    pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T, Error> {
        let body = value.to_string();
        serde_json::from_value(value).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }

    // ── Request / response handling ──────────────────────────────────

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        expected: StatusCode,
    ) -> Result<Value, Error> {
        let url = self.url(path)?;
        debug!("{method} {url}");

        let mut request = self.http.request(method.clone(), url.clone());
        if let Some(body) = body {
            request = request.json(body);
        }
        let resp = request.send().await?;

        Self::handle_response(&method, &url, resp, expected).await
    }

    async fn handle_response(
        method: &Method,
        url: &Url,
        resp: reqwest::Response,
        expected: StatusCode,
    ) -> Result<Value, Error> {
        let status = resp.status();
        if status != expected {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::UnexpectedStatus {
                method: method.to_string(),
                url: url.to_string(),
                expected: expected.as_u16(),
                actual: status.as_u16(),
                body,
            });
        }

        // An asserted error status is a successful outcome with nothing to decode.
        if !status.is_success() {
            return Ok(Value::Null);
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        let body = resp.text().await?;

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        if !content_type.starts_with(JSON_CONTENT_TYPE) {
            return Err(Error::UnexpectedContentType {
                url: url.to_string(),
                expected: JSON_CONTENT_TYPE,
                actual: content_type,
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.chars().take(200).collect();
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body,
            }
        })
    }
}
