//! Error types shared by every part of the version lifecycle engine.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, GovmError>;

#[derive(Debug, Error)]
pub enum GovmError {
    /// Transport failure or non-success status from a remote endpoint.
    #[error("remote source unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("could not parse release catalog: {0}")]
    CatalogParse(String),

    #[error("checksum verification failed for {file}: {reason}")]
    ChecksumMismatch { file: String, reason: String },

    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("go{0} is not installed")]
    NotInstalled(String),

    #[error("go{0} is the active version, pass --force to remove it")]
    ActiveVersionProtected(String),

    #[error("unsupported shell '{0}' (supported: bash, zsh)")]
    UnsupportedShell(String),

    #[error("go executable missing at {}", .0.display())]
    ExecutableMissing(PathBuf),

    #[error("{context}: {source}")]
    Storage {
        context: String,
        #[source]
        source: io::Error,
    },

    /// Region probing failed; callers degrade to the default mirror.
    #[error("region detection failed: {0}")]
    RegionProbe(String),

    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("invalid version '{0}'")]
    InvalidVersion(String),

    #[error("version {0} not found in remote list")]
    VersionNotFound(String),
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("archive entry '{}' escapes the extraction root", .0.display())]
    PathTraversal(PathBuf),

    #[error("unsupported archive entry '{}' ({kind})", .path.display())]
    UnsupportedEntry { path: PathBuf, kind: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl GovmError {
    pub fn storage(context: impl Into<String>, source: io::Error) -> Self {
        GovmError::Storage {
            context: context.into(),
            source,
        }
    }

    pub fn is_path_traversal(&self) -> bool {
        matches!(
            self,
            GovmError::Extraction(ExtractionError::PathTraversal(_))
        )
    }
}

/// Attach a storage context to an I/O result, in the spirit of `anyhow::Context`.
pub trait StorageContext<T> {
    fn storage_context<C, F>(self, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T> StorageContext<T> for std::result::Result<T, io::Error> {
    fn storage_context<C, F>(self, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|source| GovmError::storage(f(), source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_context_wraps_io_error() {
        let result: std::result::Result<(), io::Error> =
            Err(io::Error::new(io::ErrorKind::NotFound, "gone"));
        let err = result
            .storage_context(|| "read metadata")
            .expect_err("should fail");
        assert_eq!(err.to_string(), "read metadata: gone");
        assert!(matches!(err, GovmError::Storage { .. }));
    }

    #[test]
    fn test_path_traversal_detection() {
        let err: GovmError = ExtractionError::PathTraversal(PathBuf::from("../evil")).into();
        assert!(err.is_path_traversal());
        assert!(!GovmError::NotInstalled("1.21.0".into()).is_path_traversal());
    }
}
