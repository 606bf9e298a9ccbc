use crate::error::{GovmError, Result};
use crate::storage::MetadataStore;
use crate::types::Version;
use std::fs;
use std::io;
use std::sync::Arc;

/// Removes installed versions, refusing to remove the active one unless forced.
pub struct Uninstaller {
    store: Arc<dyn MetadataStore>,
}

impl Uninstaller {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self { store }
    }

    /// Remove `number` and return the versions still installed.
    pub fn uninstall(&self, number: &str, force: bool) -> Result<Vec<Version>> {
        let record = self
            .store
            .load_metadata()?
            .into_iter()
            .find(|v| v.number == number)
            .ok_or_else(|| GovmError::NotInstalled(number.to_string()))?;

        let is_active = self.store.current_version_marker()?.as_deref() == Some(number);
        if is_active && !force {
            return Err(GovmError::ActiveVersionProtected(number.to_string()));
        }

        let install_path = record
            .installed_path()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| self.store.install_path(number));
        match fs::remove_dir_all(&install_path) {
            Ok(()) => tracing::info!("Removed {}", install_path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("{} was already gone", install_path.display());
            }
            Err(e) => {
                return Err(GovmError::storage(
                    format!("remove {}", install_path.display()),
                    e,
                ))
            }
        }

        self.store.delete_metadata(number)?;
        if is_active {
            tracing::info!("Cleared active version {}", record.display_name());
            self.store.set_current_version_marker(None)?;
        }

        self.store.load_metadata()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FileStore;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Arc<FileStore>, Uninstaller) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FileStore::new(dir.path()));
        for number in ["1.20.1", "1.21.0"] {
            let path = store.install_path(number);
            fs::create_dir_all(path.join("bin")).unwrap();
            store
                .save_metadata(&Version {
                    number: number.into(),
                    install_path: Some(path),
                    ..Default::default()
                })
                .unwrap();
        }
        let uninstaller = Uninstaller::new(store.clone());
        (dir, store, uninstaller)
    }

    #[test]
    fn test_uninstall_removes_files_and_record() {
        let (_dir, store, uninstaller) = setup();

        let remaining = uninstaller.uninstall("1.20.1", false).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].number, "1.21.0");
        assert!(!store.install_path("1.20.1").exists());
        assert!(store.install_path("1.21.0").exists());
    }

    #[test]
    fn test_uninstall_unknown_version() {
        let (_dir, _store, uninstaller) = setup();
        assert!(matches!(
            uninstaller.uninstall("1.99.0", false).unwrap_err(),
            GovmError::NotInstalled(_)
        ));
    }

    #[test]
    fn test_uninstall_active_requires_force() {
        let (_dir, store, uninstaller) = setup();
        store.set_current_version_marker(Some("1.21.0")).unwrap();

        let err = uninstaller.uninstall("1.21.0", false).unwrap_err();
        assert!(matches!(err, GovmError::ActiveVersionProtected(_)));
        assert!(store.install_path("1.21.0").exists());
        assert_eq!(store.load_metadata().unwrap().len(), 2);

        let remaining = uninstaller.uninstall("1.21.0", true).unwrap();
        assert!(remaining.iter().all(|v| v.number != "1.21.0"));
        assert_eq!(store.current_version_marker().unwrap(), None);
    }

    #[test]
    fn test_uninstall_tolerates_missing_directory() {
        let (_dir, store, uninstaller) = setup();
        fs::remove_dir_all(store.install_path("1.20.1")).unwrap();

        let remaining = uninstaller.uninstall("1.20.1", false).unwrap();
        assert_eq!(remaining.len(), 1);
    }

    #[test]
    fn test_uninstall_inactive_keeps_marker() {
        let (_dir, store, uninstaller) = setup();
        store.set_current_version_marker(Some("1.21.0")).unwrap();

        uninstaller.uninstall("1.20.1", false).unwrap();
        assert_eq!(store.current_version_marker().unwrap().as_deref(), Some("1.21.0"));
    }
}
