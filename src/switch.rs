use crate::error::{GovmError, Result};
use crate::shell::{EnvChange, EnvManager};
use crate::storage::MetadataStore;
use crate::types::Version;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Activates installed versions.
pub struct Switcher {
    store: Arc<dyn MetadataStore>,
    env: Arc<dyn EnvManager>,
}

/// What a successful switch changed.
#[derive(Debug, Clone)]
pub struct SwitchReport {
    pub version: Version,
    pub env: EnvChange,
}

impl Switcher {
    pub fn new(store: Arc<dyn MetadataStore>, env: Arc<dyn EnvManager>) -> Self {
        Self { store, env }
    }

    /// Make `number` the active version.
    ///
    /// The shell profile is rewritten first, then the marker, then the
    /// per-record flags. If a later step fails the earlier ones are undone
    /// before the error is returned.
    pub fn use_version(&self, number: &str) -> Result<SwitchReport> {
        let records = self.store.load_metadata()?;
        let target = records
            .iter()
            .find(|v| v.number == number && v.is_installed())
            .cloned()
            .ok_or_else(|| GovmError::NotInstalled(number.to_string()))?;

        let install_path = target
            .installed_path()
            .ok_or_else(|| GovmError::NotInstalled(number.to_string()))?;
        if let Some(executable) = target.executable_path() {
            ensure_executable(&executable)?;
        }

        let previous_marker = self.store.current_version_marker()?;
        let change = self.env.configure(install_path)?;

        if let Err(e) = self.store.set_current_version_marker(Some(number)) {
            self.rollback(&change, previous_marker.as_deref(), &[]);
            return Err(e);
        }

        let mut touched: Vec<Version> = Vec::new();
        for record in &records {
            let wanted = record.number == number;
            if record.is_current == wanted {
                continue;
            }
            let updated = Version {
                is_current: wanted,
                ..record.clone()
            };
            if let Err(e) = self.store.save_metadata(&updated) {
                self.rollback(&change, previous_marker.as_deref(), &touched);
                return Err(e);
            }
            touched.push(record.clone());
        }

        tracing::info!("Switched to {}", target.display_name());
        Ok(SwitchReport {
            version: Version {
                is_current: true,
                ..target
            },
            env: change,
        })
    }

    fn rollback(&self, change: &EnvChange, previous_marker: Option<&str>, touched: &[Version]) {
        tracing::warn!("Switch failed, restoring previous state");
        if let Err(e) = self.env.revert(change) {
            tracing::warn!("Could not restore {}: {}", change.config_file.display(), e);
        }
        if let Err(e) = self.store.set_current_version_marker(previous_marker) {
            tracing::warn!("Could not restore the active-version marker: {}", e);
        }
        for original in touched {
            if let Err(e) = self.store.save_metadata(original) {
                tracing::warn!("Could not restore metadata for {}: {}", original.display_name(), e);
            }
        }
    }
}

fn ensure_executable(path: &Path) -> Result<()> {
    match fs::metadata(path) {
        Ok(meta) if !meta.is_dir() => Ok(()),
        _ => Err(GovmError::ExecutableMissing(path.to_path_buf())),
    }
}
