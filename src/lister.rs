use crate::catalog::{compare_release_names, RemoteCatalog};
use crate::error::{GovmError, Result};
use crate::storage::MetadataStore;
use crate::types::Version;
use std::fs;
use std::sync::Arc;

/// Read-only views over the remote catalog and the local installs.
pub struct Lister {
    catalog: Arc<dyn RemoteCatalog>,
    store: Arc<dyn MetadataStore>,
}

impl Lister {
    pub fn new(catalog: Arc<dyn RemoteCatalog>, store: Arc<dyn MetadataStore>) -> Self {
        Self { catalog, store }
    }

    pub async fn remote_versions(&self) -> Result<Vec<Version>> {
        self.catalog.fetch_versions().await
    }

    /// Installed versions, highest precedence first. The active flag is taken
    /// from the marker, not from the stored records.
    pub fn local_versions(&self) -> Result<Vec<Version>> {
        let marker = self.store.current_version_marker()?;
        let mut versions: Vec<Version> = self
            .store
            .load_metadata()?
            .into_iter()
            .map(|mut v| {
                v.is_current = marker.as_deref() == Some(v.number.as_str());
                v
            })
            .collect();

        versions.sort_by(|a, b| {
            compare_release_names(&b.display_name(), &a.display_name())
                .then_with(|| a.number.cmp(&b.number))
        });
        Ok(versions)
    }

    /// The active version, if any.
    ///
    /// Fails with [`GovmError::ExecutableMissing`] when the active install has
    /// lost its `go` binary.
    pub fn current_version(&self) -> Result<Option<Version>> {
        let Some(current) = self.local_versions()?.into_iter().find(|v| v.is_current) else {
            return Ok(None);
        };

        if let Some(executable) = current.executable_path() {
            match fs::metadata(&executable) {
                Ok(meta) if !meta.is_dir() => {}
                _ => return Err(GovmError::ExecutableMissing(executable)),
            }
        }
        Ok(Some(current))
    }
}
