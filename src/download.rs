use crate::error::{GovmError, Result, StorageContext};
use crate::types::Version;
use async_trait::async_trait;
use futures_util::StreamExt;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Progress callback: bytes written so far and the total size when the server
/// reported one.
pub type ProgressCallback = Arc<dyn Fn(u64, Option<u64>) + Send + Sync>;

/// Fetches a release artifact and returns the path of the verified file.
#[async_trait]
pub trait ArtifactDownloader: Send + Sync {
    async fn download(&self, version: &Version) -> Result<PathBuf>;
}

/// Streams artifacts over HTTP into a downloads directory.
///
/// The body lands in a temporary file that is promoted to `<file_name>` only
/// after its SHA-256 matches the catalog checksum.
pub struct HttpDownloader {
    http: reqwest::Client,
    downloads_dir: PathBuf,
    timeout: Option<Duration>,
    progress: Option<ProgressCallback>,
}

impl HttpDownloader {
    pub fn new(downloads_dir: impl Into<PathBuf>) -> Self {
        Self {
            http: reqwest::Client::new(),
            downloads_dir: downloads_dir.into(),
            timeout: None,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn downloads_dir(&self) -> &Path {
        &self.downloads_dir
    }
}

#[async_trait]
impl ArtifactDownloader for HttpDownloader {
    async fn download(&self, version: &Version) -> Result<PathBuf> {
        tracing::info!("Downloading {}...", version.file_name);

        fs::create_dir_all(&self.downloads_dir)
            .storage_context(|| format!("create {}", self.downloads_dir.display()))?;

        let mut request = self.http.get(&version.download_url);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }
        let response = request.send().await.map_err(|e| {
            GovmError::RemoteUnavailable(format!("download {} failed: {}", version.download_url, e))
        })?;

        if !response.status().is_success() {
            return Err(GovmError::RemoteUnavailable(format!(
                "download {} returned {}",
                version.download_url,
                response.status()
            )));
        }

        let total = response.content_length();

        // Removed on drop unless persisted below.
        let mut temp = tempfile::Builder::new()
            .prefix("download-")
            .suffix(".tmp")
            .tempfile_in(&self.downloads_dir)
            .storage_context(|| format!("create temp file in {}", self.downloads_dir.display()))?;

        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                GovmError::RemoteUnavailable(format!("reading {} failed: {}", version.download_url, e))
            })?;
            temp.write_all(&chunk)
                .storage_context(|| format!("write {}", temp.path().display()))?;
            written += chunk.len() as u64;
            if let Some(progress) = &self.progress {
                progress(written, total);
            }
        }

        temp.as_file()
            .sync_all()
            .storage_context(|| format!("sync {}", temp.path().display()))?;

        tracing::debug!("Downloaded {} bytes, verifying checksum", written);
        verify_checksum(temp.path(), &version.checksum, &version.file_name)?;

        let final_path = self.downloads_dir.join(&version.file_name);
        match fs::remove_file(&final_path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(GovmError::storage(
                    format!("remove stale {}", final_path.display()),
                    e,
                ))
            }
        }
        temp.persist(&final_path)
            .map_err(|e| e.error)
            .storage_context(|| format!("move download to {}", final_path.display()))?;

        Ok(final_path)
    }
}

/// SHA-256 of a file as lowercase hex.
pub fn compute_sha256(path: &Path) -> io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Whether a computed digest matches the expected one. An empty expectation
/// never matches.
pub fn checksum_matches(actual: &str, expected: &str) -> bool {
    let expected = expected.trim();
    !expected.is_empty() && actual.trim().eq_ignore_ascii_case(expected)
}

/// Verify `path` against `expected`, naming `file_name` in the error.
pub fn verify_checksum(path: &Path, expected: &str, file_name: &str) -> Result<()> {
    if expected.trim().is_empty() {
        return Err(GovmError::ChecksumMismatch {
            file: file_name.to_string(),
            reason: "no expected checksum published".to_string(),
        });
    }

    let actual =
        compute_sha256(path).storage_context(|| format!("hash {}", path.display()))?;
    if !checksum_matches(&actual, expected) {
        return Err(GovmError::ChecksumMismatch {
            file: file_name.to_string(),
            reason: format!("expected {}, got {}", expected, actual),
        });
    }
    Ok(())
}
