//! Remote release catalog: fetch, filter, order and cache.

pub mod order;

use crate::error::{GovmError, Result};
use crate::region::MirrorConfig;
use crate::types::{Release, Version};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub use order::{compare_release_names, ReleaseName};

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Source of installable remote versions.
#[async_trait]
pub trait RemoteCatalog: Send + Sync {
    /// Installable versions, highest precedence first.
    async fn fetch_versions(&self) -> Result<Vec<Version>>;
}

struct CachedCatalog {
    versions: Vec<Version>,
    fetched_at: Instant,
}

/// HTTP catalog client bound to one mirror, with an in-memory TTL cache.
pub struct CatalogClient {
    http: reqwest::Client,
    mirror: MirrorConfig,
    cache_ttl: Duration,
    request_timeout: Duration,
    cache: Mutex<Option<CachedCatalog>>,
}

impl CatalogClient {
    pub fn new(mirror: MirrorConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            mirror,
            cache_ttl: DEFAULT_CACHE_TTL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            cache: Mutex::new(None),
        }
    }

    /// Zero is ignored and keeps the current TTL.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        if !ttl.is_zero() {
            self.cache_ttl = ttl;
        }
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        if !timeout.is_zero() {
            self.request_timeout = timeout;
        }
        self
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn mirror(&self) -> &MirrorConfig {
        &self.mirror
    }

    async fn fetch_remote(&self) -> Result<Vec<Version>> {
        tracing::debug!("Fetching release catalog from {}", self.mirror.api_base);

        let response = self
            .http
            .get(&self.mirror.api_base)
            .header("User-Agent", concat!("govm/", env!("CARGO_PKG_VERSION")))
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| {
                GovmError::RemoteUnavailable(format!(
                    "request to {} failed: {}",
                    self.mirror.api_base, e
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GovmError::RemoteUnavailable(format!(
                "{} returned {}",
                self.mirror.api_base, status
            )));
        }

        let body = response.bytes().await.map_err(|e| {
            GovmError::RemoteUnavailable(format!("reading catalog body failed: {}", e))
        })?;

        parse_catalog(&body, &self.mirror)
    }
}

#[async_trait]
impl RemoteCatalog for CatalogClient {
    async fn fetch_versions(&self) -> Result<Vec<Version>> {
        // Held across the fetch so concurrent callers share one request.
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if !cached.versions.is_empty() && cached.fetched_at.elapsed() <= self.cache_ttl {
                tracing::debug!("Catalog cache hit ({} versions)", cached.versions.len());
                return Ok(cached.versions.clone());
            }
            tracing::debug!("Catalog cache expired");
        }

        let versions = self.fetch_remote().await?;
        *cache = Some(CachedCatalog {
            versions: versions.clone(),
            fetched_at: Instant::now(),
        });
        Ok(versions)
    }
}

/// Parse a catalog body into installable versions, highest precedence first.
///
/// Entries sharing a release name are ordered by architecture, ascending.
pub fn parse_catalog(body: &[u8], mirror: &MirrorConfig) -> Result<Vec<Version>> {
    let releases: Vec<Release> =
        serde_json::from_slice(body).map_err(|e| GovmError::CatalogParse(e.to_string()))?;

    let mut versions: Vec<Version> = releases
        .iter()
        .flat_map(|release| {
            release
                .files
                .iter()
                .filter(|file| file.is_installable())
                .map(move |file| Version {
                    number: release
                        .version
                        .strip_prefix("go")
                        .unwrap_or(&release.version)
                        .to_string(),
                    full_name: release.version.clone(),
                    download_url: mirror.download_url(&file.filename),
                    file_name: file.filename.clone(),
                    checksum: file.checksum.clone(),
                    os: file.os.clone(),
                    arch: file.arch.clone(),
                    ..Default::default()
                })
        })
        .collect();

    versions.sort_by(|a, b| {
        compare_release_names(&b.full_name, &a.full_name).then_with(|| a.arch.cmp(&b.arch))
    });

    Ok(versions)
}
