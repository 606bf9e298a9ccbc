use crate::archive::extract_tar_gz;
use crate::download::ArtifactDownloader;
use crate::error::{GovmError, Result, StorageContext};
use crate::storage::MetadataStore;
use crate::types::Version;
use chrono::Utc;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Result of a successful [`Installer::install`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed(PathBuf),
    /// The version was already present; nothing was downloaded.
    AlreadyInstalled(PathBuf),
}

impl InstallOutcome {
    pub fn install_path(&self) -> &Path {
        match self {
            InstallOutcome::Installed(path) | InstallOutcome::AlreadyInstalled(path) => path,
        }
    }

    pub fn was_installed(&self) -> bool {
        matches!(self, InstallOutcome::Installed(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InstallStage {
    Downloading,
    Extracting,
    Finalizing,
    Installed,
}

impl fmt::Display for InstallStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InstallStage::Downloading => "downloading",
            InstallStage::Extracting => "extracting",
            InstallStage::Finalizing => "finalizing",
            InstallStage::Installed => "installed",
        };
        f.write_str(name)
    }
}

/// Drives download, verification, extraction and finalization of one version.
///
/// A failed call leaves no temporary files, staging directories or metadata
/// behind. An existing install of the same version is only replaced once the
/// new tree has been fully extracted.
pub struct Installer {
    store: Arc<dyn MetadataStore>,
    downloader: Arc<dyn ArtifactDownloader>,
}

impl Installer {
    pub fn new(store: Arc<dyn MetadataStore>, downloader: Arc<dyn ArtifactDownloader>) -> Self {
        Self { store, downloader }
    }

    pub async fn install(&self, version: &Version) -> Result<InstallOutcome> {
        if version.number.trim().is_empty() {
            return Err(GovmError::InvalidVersion(version.number.clone()));
        }

        if let Some(existing) = self.existing_install(&version.number)? {
            tracing::info!(
                "{} is already installed at {}",
                version.display_name(),
                existing.display()
            );
            return Ok(InstallOutcome::AlreadyInstalled(existing));
        }

        let install_path = self.store.install_path(&version.number);
        let parent = install_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&parent).storage_context(|| format!("create {}", parent.display()))?;

        self.enter(version, InstallStage::Downloading);
        let archive = self.downloader.download(version).await?;

        self.enter(version, InstallStage::Extracting);
        // Removed on drop; once renamed into place there is nothing left to remove.
        let staging = tempfile::Builder::new()
            .prefix(".install-")
            .tempdir_in(&parent)
            .storage_context(|| format!("create staging directory in {}", parent.display()));
        let staging = match staging {
            Ok(staging) => staging,
            Err(e) => {
                remove_file_quietly(&archive);
                return Err(e);
            }
        };

        if let Err(e) = extract_tar_gz(&archive, staging.path()) {
            tracing::warn!("Extraction of {} failed, cleaning up", version.file_name);
            remove_file_quietly(&archive);
            return Err(e.into());
        }

        self.enter(version, InstallStage::Finalizing);
        let previous = match set_aside(&install_path, &parent) {
            Ok(previous) => previous,
            Err(e) => {
                remove_file_quietly(&archive);
                return Err(e);
            }
        };
        if let Err(e) = fs::rename(staging.path(), &install_path)
            .storage_context(|| format!("move install into {}", install_path.display()))
        {
            restore(previous.as_ref(), &install_path);
            remove_file_quietly(&archive);
            return Err(e);
        }

        let record = Version {
            install_path: Some(install_path.clone()),
            installed_at: Some(Utc::now()),
            is_current: false,
            ..version.clone()
        };
        if let Err(e) = self.store.save_metadata(&record) {
            tracing::warn!(
                "Saving metadata for {} failed, removing {}",
                version.display_name(),
                install_path.display()
            );
            remove_dir_quietly(&install_path);
            restore(previous.as_ref(), &install_path);
            return Err(e);
        }

        self.enter(version, InstallStage::Installed);
        Ok(InstallOutcome::Installed(install_path))
    }

    fn existing_install(&self, number: &str) -> Result<Option<PathBuf>> {
        let installed = self
            .store
            .load_metadata()?
            .into_iter()
            .find(|v| v.number == number)
            .and_then(|v| v.installed_path().map(Path::to_path_buf))
            .filter(|path| path.is_dir());
        Ok(installed)
    }

    fn enter(&self, version: &Version, stage: InstallStage) {
        tracing::debug!("{}: {}", version.display_name(), stage);
    }
}

const PREVIOUS_TREE: &str = "tree";

/// Move an existing install into a temporary sibling. The sibling is removed
/// on drop unless [`restore`] moves the tree back first.
fn set_aside(install_path: &Path, parent: &Path) -> Result<Option<TempDir>> {
    match fs::symlink_metadata(install_path) {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(GovmError::storage(
                format!("inspect {}", install_path.display()),
                e,
            ))
        }
    }
    let backup = tempfile::Builder::new()
        .prefix(".previous-")
        .tempdir_in(parent)
        .storage_context(|| format!("create backup directory in {}", parent.display()))?;
    fs::rename(install_path, backup.path().join(PREVIOUS_TREE))
        .storage_context(|| format!("move aside {}", install_path.display()))?;
    tracing::debug!("Moved previous install at {} aside", install_path.display());
    Ok(Some(backup))
}

fn restore(previous: Option<&TempDir>, install_path: &Path) {
    let Some(backup) = previous else {
        return;
    };
    if let Err(e) = fs::rename(backup.path().join(PREVIOUS_TREE), install_path) {
        tracing::warn!(
            "Could not restore previous install at {}: {}",
            install_path.display(),
            e
        );
    }
}

fn remove_dir_quietly(path: &Path) {
    if let Err(e) = fs::remove_dir_all(path) {
        if e.kind() != io::ErrorKind::NotFound {
            tracing::warn!("Could not remove {}: {}", path.display(), e);
        }
    }
}

fn remove_file_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            tracing::warn!("Could not remove {}: {}", path.display(), e);
        }
    }
}
