use crate::error::{GovmError, Result};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;

pub const DEFAULT_ENDPOINT: &str = "https://ipinfo.io/country";
pub const DEFAULT_FALLBACK_ENDPOINT: &str = "https://ipapi.co/json";
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy)]
enum ResponseFormat {
    /// Body is the bare country code.
    PlainText,
    /// Body is a JSON document with a `country_code` field.
    Json,
}

#[derive(Deserialize)]
struct CountryPayload {
    #[serde(default)]
    country_code: String,
}

/// Probes the caller's country code once per instance.
///
/// A successful probe is cached for the lifetime of the detector; failures are
/// never cached so a later call probes again.
pub struct RegionDetector {
    http: reqwest::Client,
    endpoint: String,
    fallback_endpoint: Option<String>,
    timeout: Duration,
    cache: Mutex<Option<String>>,
}

impl RegionDetector {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            fallback_endpoint: Some(DEFAULT_FALLBACK_ENDPOINT.to_string()),
            timeout: DEFAULT_PROBE_TIMEOUT,
            cache: Mutex::new(None),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        if !endpoint.is_empty() {
            self.endpoint = endpoint;
        }
        self
    }

    /// `None` disables the fallback probe.
    pub fn with_fallback_endpoint(mut self, endpoint: Option<String>) -> Self {
        self.fallback_endpoint = endpoint.filter(|e| !e.is_empty());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        if !timeout.is_zero() {
            self.timeout = timeout;
        }
        self
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// ISO country code in upper case, e.g. `CN` or `US`.
    pub async fn country_code(&self) -> Result<String> {
        // Held across the probe so concurrent callers wait for one result.
        let mut cache = self.cache.lock().await;
        if let Some(code) = cache.as_ref() {
            tracing::debug!("Using cached country code {}", code);
            return Ok(code.clone());
        }

        let code = self.lookup().await?;
        tracing::debug!("Detected country code {}", code);
        *cache = Some(code.clone());
        Ok(code)
    }

    async fn lookup(&self) -> Result<String> {
        let primary = match self.probe(&self.endpoint, ResponseFormat::PlainText).await {
            Ok(code) => return Ok(code),
            Err(e) => e,
        };

        let Some(fallback) = &self.fallback_endpoint else {
            return Err(GovmError::RegionProbe(primary));
        };

        tracing::debug!("Primary region probe failed ({}), trying fallback", primary);
        self.probe(fallback, ResponseFormat::Json)
            .await
            .map_err(|fallback_err| {
                GovmError::RegionProbe(format!("{} (fallback: {})", primary, fallback_err))
            })
    }

    async fn probe(&self, endpoint: &str, format: ResponseFormat) -> std::result::Result<String, String> {
        let response = self
            .http
            .get(endpoint)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| format!("request to {} failed: {}", endpoint, e))?;

        if !response.status().is_success() {
            return Err(format!("{} returned {}", endpoint, response.status()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| format!("reading {} failed: {}", endpoint, e))?;

        match format {
            ResponseFormat::PlainText => parse_plain_country(&body),
            ResponseFormat::Json => parse_json_country(&body),
        }
    }
}

impl Default for RegionDetector {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_plain_country(body: &str) -> std::result::Result<String, String> {
    let code = body.trim().to_ascii_uppercase();
    if code.is_empty() {
        return Err("empty country code".to_string());
    }
    if !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(format!("unparsable country code '{}'", code));
    }
    Ok(code)
}

fn parse_json_country(body: &str) -> std::result::Result<String, String> {
    let payload: CountryPayload =
        serde_json::from_str(body).map_err(|e| format!("decode response: {}", e))?;
    parse_plain_country(&payload.country_code)
}
