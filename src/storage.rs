//! Durable record of installed versions and the active-version marker.
//!
//! One [`FileStore`] serializes its own reads and writes behind a mutex. Two
//! processes sharing the same root are not coordinated: the last writer to
//! `metadata.json` or `current` wins.

use crate::error::{GovmError, Result, StorageContext};
use crate::types::Version;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

pub const METADATA_FILE_NAME: &str = "metadata.json";
pub const MARKER_FILE_NAME: &str = "current";
pub const VERSIONS_DIR_NAME: &str = "versions";

/// Persistence of installed-version metadata.
pub trait MetadataStore: Send + Sync {
    /// Insert or replace the record keyed by `version.number`.
    fn save_metadata(&self, version: &Version) -> Result<()>;
    /// Every stored record; empty when nothing has been stored yet.
    fn load_metadata(&self) -> Result<Vec<Version>>;
    /// Remove the record for `number`. Absence is not an error.
    fn delete_metadata(&self, number: &str) -> Result<()>;
    /// Canonical install directory for `number`. Performs no I/O.
    fn install_path(&self, number: &str) -> PathBuf;
    /// Active version number, `None` when no version is active.
    fn current_version_marker(&self) -> Result<Option<String>>;
    /// Persist the active version; `None` or a blank value clears it.
    fn set_current_version_marker(&self, number: Option<&str>) -> Result<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct MetadataFile {
    #[serde(default)]
    versions: Vec<Version>,
}

/// [`MetadataStore`] backed by JSON and plain-text files under a root directory.
pub struct FileStore {
    root_dir: PathBuf,
    versions_dir: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        let root_dir = root_dir.into();
        let versions_dir = root_dir.join(VERSIONS_DIR_NAME);
        Self::with_versions_dir(root_dir, versions_dir)
    }

    pub fn with_versions_dir(root_dir: impl Into<PathBuf>, versions_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            versions_dir: versions_dir.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.root_dir.join(METADATA_FILE_NAME)
    }

    pub fn marker_path(&self) -> PathBuf {
        self.root_dir.join(MARKER_FILE_NAME)
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        // The guarded data is (), so a poisoned lock carries no broken state.
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root_dir)
            .storage_context(|| format!("create {}", self.root_dir.display()))
    }

    fn read_metadata_locked(&self) -> Result<Vec<Version>> {
        let path = self.metadata_path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(GovmError::storage(format!("read {}", path.display()), e)),
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let metadata: MetadataFile = serde_json::from_str(&content)
            .map_err(io::Error::from)
            .storage_context(|| format!("parse {}", path.display()))?;
        Ok(metadata.versions)
    }

    fn write_metadata_locked(&self, versions: Vec<Version>) -> Result<()> {
        self.ensure_root()?;
        let path = self.metadata_path();
        let content = serde_json::to_string_pretty(&MetadataFile { versions })
            .map_err(io::Error::from)
            .storage_context(|| "serialize metadata")?;
        write_atomic(&path, content.as_bytes())
            .storage_context(|| format!("write {}", path.display()))
    }
}

impl MetadataStore for FileStore {
    fn save_metadata(&self, version: &Version) -> Result<()> {
        let _guard = self.guard();
        let mut versions = self.read_metadata_locked()?;

        match versions.iter_mut().find(|v| v.number == version.number) {
            Some(existing) => *existing = version.clone(),
            None => versions.push(version.clone()),
        }

        tracing::debug!("Saving metadata for go{}", version.number);
        self.write_metadata_locked(versions)
    }

    fn load_metadata(&self) -> Result<Vec<Version>> {
        let _guard = self.guard();
        self.read_metadata_locked()
    }

    fn delete_metadata(&self, number: &str) -> Result<()> {
        let _guard = self.guard();
        let mut versions = self.read_metadata_locked()?;
        let before = versions.len();
        versions.retain(|v| v.number != number);
        if versions.len() == before {
            return Ok(());
        }
        self.write_metadata_locked(versions)
    }

    fn install_path(&self, number: &str) -> PathBuf {
        self.versions_dir.join(format!("go{}", number))
    }

    fn current_version_marker(&self) -> Result<Option<String>> {
        let _guard = self.guard();
        let path = self.marker_path();
        match fs::read_to_string(&path) {
            Ok(content) => {
                let marker = content.trim();
                Ok((!marker.is_empty()).then(|| marker.to_string()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(GovmError::storage(format!("read {}", path.display()), e)),
        }
    }

    fn set_current_version_marker(&self, number: Option<&str>) -> Result<()> {
        let _guard = self.guard();
        self.ensure_root()?;
        let path = self.marker_path();
        let value = number.map(str::trim).unwrap_or_default();
        write_atomic(&path, value.as_bytes())
            .storage_context(|| format!("write {}", path.display()))
    }
}

/// Replace `path` with `content` through a temporary sibling and a rename, so
/// readers see either the old or the new file, never a partial one.
pub fn write_atomic(path: &Path, content: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut temp = tempfile::Builder::new()
        .prefix(".govm-")
        .suffix(".tmp")
        .tempfile_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn sample(number: &str) -> Version {
        Version {
            number: number.to_string(),
            full_name: format!("go{}", number),
            download_url: format!("https://go.dev/dl/go{}.linux-amd64.tar.gz", number),
            file_name: format!("go{}.linux-amd64.tar.gz", number),
            checksum: "abc123".to_string(),
            os: "linux".to_string(),
            arch: "amd64".to_string(),
            install_path: Some(PathBuf::from(format!("/tmp/versions/go{}", number))),
            is_current: false,
            installed_at: Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap()),
        }
    }

    #[test]
    fn test_load_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        assert!(store.load_metadata().unwrap().is_empty());
        assert_eq!(store.current_version_marker().unwrap(), None);
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        let version = sample("1.21.0");

        store.save_metadata(&version).unwrap();
        assert_eq!(store.load_metadata().unwrap(), vec![version]);
    }

    #[test]
    fn test_save_upserts_by_number() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        store.save_metadata(&sample("1.21.0")).unwrap();
        store.save_metadata(&sample("1.20.1")).unwrap();

        let mut updated = sample("1.21.0");
        updated.is_current = true;
        store.save_metadata(&updated).unwrap();

        let versions = store.load_metadata().unwrap();
        assert_eq!(versions.len(), 2);
        let stored = versions.iter().find(|v| v.number == "1.21.0").unwrap();
        assert!(stored.is_current);
    }

    #[test]
    fn test_delete_metadata() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        store.save_metadata(&sample("1.21.0")).unwrap();
        store.save_metadata(&sample("1.20.1")).unwrap();

        store.delete_metadata("1.21.0").unwrap();
        store.delete_metadata("1.99.0").unwrap();

        let numbers: Vec<String> = store
            .load_metadata()
            .unwrap()
            .into_iter()
            .map(|v| v.number)
            .collect();
        assert_eq!(numbers, vec!["1.20.1".to_string()]);
    }

    #[test]
    fn test_delete_on_empty_store_is_ok() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        store.delete_metadata("1.21.0").unwrap();
        assert!(!store.metadata_path().exists());
    }

    #[test]
    fn test_marker_is_trimmed_and_clearable() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());

        store.set_current_version_marker(Some(" 1.21.0\n")).unwrap();
        assert_eq!(store.current_version_marker().unwrap().as_deref(), Some("1.21.0"));

        fs::write(store.marker_path(), "\n  1.20.1  \n").unwrap();
        assert_eq!(store.current_version_marker().unwrap().as_deref(), Some("1.20.1"));

        store.set_current_version_marker(None).unwrap();
        assert_eq!(store.current_version_marker().unwrap(), None);
    }

    #[test]
    fn test_install_path_is_pure() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("not-created"));
        assert_eq!(
            store.install_path("1.21.0"),
            dir.path().join("not-created").join("versions").join("go1.21.0")
        );
        assert!(!dir.path().join("not-created").exists());
    }

    #[test]
    fn test_corrupt_metadata_is_storage_error() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        fs::write(store.metadata_path(), "{not json").unwrap();
        assert!(matches!(
            store.load_metadata().unwrap_err(),
            GovmError::Storage { .. }
        ));
    }

    #[test]
    fn test_write_atomic_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("file.txt");
        write_atomic(&target, b"one").unwrap();
        write_atomic(&target, b"two").unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "two");
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
