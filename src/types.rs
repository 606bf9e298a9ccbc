use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the toolchain executable inside `<install path>/bin`.
pub const TOOLCHAIN_EXECUTABLE: &str = "go";

/// The only operating system the catalog is filtered to.
pub const SUPPORTED_OS: &str = "linux";

/// Architectures the catalog is filtered to, in Go naming.
pub const SUPPORTED_ARCHES: [&str; 3] = ["amd64", "arm64", "386"];

/// Catalog file kind accepted for installation.
pub const ARCHIVE_KIND: &str = "archive";

/// A release/file combination of the Go toolchain, remote or installed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Version {
    /// Bare version number, e.g. `1.21.0`.
    pub number: String,
    /// Release name as published, e.g. `go1.21.0`.
    pub full_name: String,
    pub download_url: String,
    pub file_name: String,
    /// Expected SHA-256 of the artifact, hex encoded.
    pub checksum: String,
    pub os: String,
    pub arch: String,
    /// Set once the version is installed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_path: Option<PathBuf>,
    #[serde(default)]
    pub is_current: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_at: Option<DateTime<Utc>>,
}

impl Version {
    /// Install path, ignoring an empty value left behind by older metadata.
    pub fn installed_path(&self) -> Option<&Path> {
        self.install_path
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty())
    }

    pub fn is_installed(&self) -> bool {
        self.installed_path().is_some()
    }

    /// Path of the `go` binary for an installed version.
    pub fn executable_path(&self) -> Option<PathBuf> {
        self.installed_path()
            .map(|root| root.join("bin").join(TOOLCHAIN_EXECUTABLE))
    }

    pub fn display_name(&self) -> String {
        if self.full_name.is_empty() {
            format!("go{}", self.number)
        } else {
            self.full_name.clone()
        }
    }
}

/// Release entry as served by the catalog endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Release {
    pub version: String,
    #[serde(default)]
    pub files: Vec<ReleaseFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReleaseFile {
    pub filename: String,
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub arch: String,
    #[serde(rename = "sha256", default)]
    pub checksum: String,
    #[serde(default)]
    pub kind: String,
}

impl ReleaseFile {
    pub fn is_installable(&self) -> bool {
        self.os == SUPPORTED_OS
            && self.kind == ARCHIVE_KIND
            && SUPPORTED_ARCHES.contains(&self.arch.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlatformInfo {
    pub os: String,
    pub arch: String,
}

/// Strip surrounding whitespace and an optional `go` prefix from user input.
pub fn normalize_version_input(input: &str) -> String {
    let trimmed = input.trim();
    trimmed.strip_prefix("go").unwrap_or(trimmed).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_installed_path_ignores_empty() {
        let mut version = Version {
            number: "1.21.0".into(),
            ..Default::default()
        };
        assert!(!version.is_installed());

        version.install_path = Some(PathBuf::new());
        assert!(!version.is_installed());

        version.install_path = Some(PathBuf::from("/opt/go1.21.0"));
        assert_eq!(
            version.executable_path(),
            Some(PathBuf::from("/opt/go1.21.0/bin/go"))
        );
    }

    #[test]
    fn test_release_file_filter() {
        let file = |os: &str, arch: &str, kind: &str| ReleaseFile {
            filename: "f".into(),
            os: os.into(),
            arch: arch.into(),
            checksum: String::new(),
            kind: kind.into(),
        };
        assert!(file("linux", "amd64", "archive").is_installable());
        assert!(file("linux", "386", "archive").is_installable());
        assert!(!file("linux", "armv6l", "archive").is_installable());
        assert!(!file("linux", "amd64", "source").is_installable());
        assert!(!file("darwin", "amd64", "archive").is_installable());
    }

    #[test]
    fn test_normalize_version_input() {
        assert_eq!(normalize_version_input(" go1.21.0 "), "1.21.0");
        assert_eq!(normalize_version_input("1.20.1"), "1.20.1");
    }
}
