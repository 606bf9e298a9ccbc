use crate::error::{GovmError, Result, StorageContext};
use crate::types::{PlatformInfo, SUPPORTED_ARCHES, SUPPORTED_OS};
use std::fs;
use std::path::Path;

/// Host OS and architecture in Go's naming.
pub fn system_info() -> PlatformInfo {
    normalize(std::env::consts::OS, std::env::consts::ARCH)
}

fn normalize(os: &str, arch: &str) -> PlatformInfo {
    let arch = match arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        other => other,
    };
    PlatformInfo {
        os: os.to_string(),
        arch: arch.to_string(),
    }
}

/// Fail unless the host is in the supported allow-list, then make sure the
/// root directory exists.
pub fn validate(root_dir: &Path) -> Result<PlatformInfo> {
    let info = system_info();
    check_supported(&info)?;
    fs::create_dir_all(root_dir).storage_context(|| format!("create {}", root_dir.display()))?;
    tracing::debug!("Platform {}/{}, root {}", info.os, info.arch, root_dir.display());
    Ok(info)
}

fn check_supported(info: &PlatformInfo) -> Result<()> {
    if info.os != SUPPORTED_OS {
        return Err(GovmError::UnsupportedPlatform(format!(
            "operating system '{}' (only {} is supported)",
            info.os, SUPPORTED_OS
        )));
    }
    if !SUPPORTED_ARCHES.contains(&info.arch.as_str()) {
        return Err(GovmError::UnsupportedPlatform(format!(
            "architecture '{}' (supported: {})",
            info.arch,
            SUPPORTED_ARCHES.join(", ")
        )));
    }
    Ok(())
}
