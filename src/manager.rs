//! Facade the command-line layer talks to.

use crate::catalog::{CatalogClient, RemoteCatalog};
use crate::config::{GovmConfig, MirrorPreference, Settings};
use crate::download::{ArtifactDownloader, HttpDownloader, ProgressCallback};
use crate::error::{GovmError, Result};
use crate::install::{InstallOutcome, Installer};
use crate::lister::Lister;
use crate::platform;
use crate::region::{resolve_mirror, MirrorConfig, RegionDetector};
use crate::shell::{EnvManager, Shell, ShellEnv};
use crate::storage::{FileStore, MetadataStore};
use crate::switch::{SwitchReport, Switcher};
use crate::types::{normalize_version_input, Version};
use crate::uninstall::Uninstaller;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub struct VersionManager {
    env: Arc<dyn EnvManager>,
    lister: Lister,
    installer: Installer,
    switcher: Switcher,
    uninstaller: Uninstaller,
}

impl VersionManager {
    /// Production wiring for `config`, reading from `mirror`.
    pub fn new(
        config: &GovmConfig,
        mirror: MirrorConfig,
        progress: Option<ProgressCallback>,
    ) -> Result<Self> {
        let settings = &config.settings;
        let catalog = CatalogClient::new(mirror)
            .with_cache_ttl(Duration::from_secs(settings.cache_ttl_secs))
            .with_request_timeout(Duration::from_secs(settings.request_timeout_secs));

        let mut downloader = HttpDownloader::new(config.downloads_dir());
        if let Some(progress) = progress {
            downloader = downloader.with_progress(progress);
        }

        let store = FileStore::with_versions_dir(&config.root_dir, config.versions_dir());
        let env = ShellEnv::from_env(settings.gopath.clone())?;

        Ok(Self::from_parts(
            Arc::new(catalog),
            Arc::new(store),
            Arc::new(downloader),
            Arc::new(env),
        ))
    }

    pub fn from_parts(
        catalog: Arc<dyn RemoteCatalog>,
        store: Arc<dyn MetadataStore>,
        downloader: Arc<dyn ArtifactDownloader>,
        env: Arc<dyn EnvManager>,
    ) -> Self {
        Self {
            lister: Lister::new(catalog, store.clone()),
            installer: Installer::new(store.clone(), downloader),
            switcher: Switcher::new(store.clone(), env.clone()),
            uninstaller: Uninstaller::new(store),
            env,
        }
    }

    pub async fn remote_versions(&self) -> Result<Vec<Version>> {
        self.lister.remote_versions().await
    }

    pub fn local_versions(&self) -> Result<Vec<Version>> {
        self.lister.local_versions()
    }

    pub fn current_version(&self) -> Result<Option<Version>> {
        self.lister.current_version()
    }

    /// Catalog entry for `input` (`1.21.0` or `go1.21.0`) built for the host
    /// architecture, or the first entry for that number when none matches.
    pub async fn find_remote(&self, input: &str) -> Result<Version> {
        let number = parse_number(input)?;
        let host = platform::system_info();
        pick_for_arch(self.remote_versions().await?, &number, &host.arch)
            .ok_or(GovmError::VersionNotFound(number))
    }

    pub async fn install(&self, version: &Version) -> Result<InstallOutcome> {
        self.installer.install(version).await
    }

    /// Resolve `input` in the catalog and install it.
    pub async fn install_version(&self, input: &str) -> Result<(Version, InstallOutcome)> {
        let version = self.find_remote(input).await?;
        let outcome = self.install(&version).await?;
        Ok((version, outcome))
    }

    pub fn use_version(&self, input: &str) -> Result<SwitchReport> {
        self.switcher.use_version(&parse_number(input)?)
    }

    pub fn uninstall(&self, input: &str, force: bool) -> Result<Vec<Version>> {
        self.uninstaller.uninstall(&parse_number(input)?, force)
    }

    /// Shell and profile that activation would rewrite.
    pub fn shell_config(&self) -> Result<(Shell, PathBuf)> {
        self.env.config_file()
    }
}

fn pick_for_arch(versions: Vec<Version>, number: &str, arch: &str) -> Option<Version> {
    let mut candidates = versions.into_iter().filter(|v| v.number == number);
    let first = candidates.next()?;
    if first.arch == arch {
        return Some(first);
    }
    Some(candidates.find(|v| v.arch == arch).unwrap_or(first))
}

fn parse_number(input: &str) -> Result<String> {
    let number = normalize_version_input(input);
    if number.is_empty() {
        return Err(GovmError::InvalidVersion(input.to_string()));
    }
    Ok(number)
}

/// Mirror for the configured preference. `auto` probes the region and falls
/// back to the default mirror when the probe fails.
pub async fn select_source(settings: &Settings) -> MirrorConfig {
    match settings.mirror {
        MirrorPreference::Official => MirrorConfig::official(),
        MirrorPreference::Regional => MirrorConfig::regional(),
        MirrorPreference::Auto => {
            let detector = RegionDetector::new()
                .with_timeout(Duration::from_secs(settings.probe_timeout_secs.max(1)));
            resolve_mirror(&detector).await
        }
    }
}
