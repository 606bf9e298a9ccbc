//! Extraction of Go release tarballs.
//!
//! Release archives wrap everything in a single `go/` directory. That leading
//! component is stripped so the archive's `go/bin/go` lands at `<dest>/bin/go`.

use crate::error::ExtractionError;
use flate2::read::GzDecoder;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tar::{Archive, EntryType};

type Result<T> = std::result::Result<T, ExtractionError>;

fn io_err(context: impl Into<String>) -> impl FnOnce(io::Error) -> ExtractionError {
    let context = context.into();
    move |source| ExtractionError::Io { context, source }
}

/// Extract `archive_path` into `dest`, stripping one leading path component.
///
/// Stops at the first entry that would land outside `dest` or whose type is
/// not a directory, regular file or symlink; nothing from that entry or any
/// later one is written. Containment is checked against what is on disk, so
/// symlinks created by earlier entries cannot redirect later ones.
pub fn extract_tar_gz(archive_path: &Path, dest: &Path) -> Result<()> {
    tracing::info!(
        "Extracting {}...",
        archive_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    );

    fs::create_dir_all(dest).map_err(io_err(format!("create {}", dest.display())))?;
    let root = fs::canonicalize(dest).map_err(io_err(format!("resolve {}", dest.display())))?;

    let file = fs::File::open(archive_path)
        .map_err(io_err(format!("open {}", archive_path.display())))?;
    let mut archive = Archive::new(GzDecoder::new(file));

    let entries = archive
        .entries()
        .map_err(io_err(format!("read {}", archive_path.display())))?;

    for entry in entries {
        let mut entry = entry.map_err(io_err("read archive entry"))?;
        let raw_path = entry
            .path()
            .map_err(io_err("decode entry path"))?
            .into_owned();
        let entry_type = entry.header().entry_type();

        if matches!(entry_type, EntryType::XGlobalHeader | EntryType::XHeader) {
            continue;
        }

        let Some(relative) = strip_leading_component(&raw_path) else {
            continue;
        };
        let normalized = normalize_within_root(&relative)
            .ok_or_else(|| ExtractionError::PathTraversal(raw_path.clone()))?;
        if normalized.as_os_str().is_empty() {
            continue;
        }
        if !resolves_within_root(&root, &normalized)? {
            return Err(ExtractionError::PathTraversal(raw_path));
        }
        let target = root.join(&normalized);

        match entry_type {
            EntryType::Directory => {
                fs::create_dir_all(&target)
                    .map_err(io_err(format!("create {}", target.display())))?;
            }
            EntryType::Regular | EntryType::Continuous => {
                ensure_parent(&target)?;
                entry
                    .unpack(&target)
                    .map_err(io_err(format!("write {}", target.display())))?;
            }
            EntryType::Symlink => {
                let link = entry
                    .link_name()
                    .map_err(io_err("decode link target"))?
                    .ok_or_else(|| ExtractionError::UnsupportedEntry {
                        path: raw_path.clone(),
                        kind: "symlink without target".to_string(),
                    })?
                    .into_owned();
                ensure_parent(&target)?;
                let parent = target.parent().unwrap_or(root.as_path());
                let real_parent = fs::canonicalize(parent)
                    .map_err(io_err(format!("resolve {}", parent.display())))?;
                if !link_stays_within_root(&root, &real_parent, &link) {
                    return Err(ExtractionError::PathTraversal(raw_path));
                }
                create_symlink(&link, &target)
                    .map_err(io_err(format!("link {}", target.display())))?;
            }
            other => {
                return Err(ExtractionError::UnsupportedEntry {
                    path: raw_path,
                    kind: format!("{:?}", other),
                });
            }
        }
    }

    Ok(())
}

fn ensure_parent(target: &Path) -> Result<()> {
    match target.parent() {
        Some(parent) => fs::create_dir_all(parent)
            .map_err(io_err(format!("create {}", parent.display()))),
        None => Ok(()),
    }
}

/// Drop the archive's top-level directory. `None` for the directory itself.
fn strip_leading_component(path: &Path) -> Option<PathBuf> {
    let mut components = path
        .components()
        .skip_while(|c| matches!(c, Component::CurDir));
    match components.next()? {
        Component::Normal(_) => {}
        // An absolute or parent-relative first component is kept so the
        // containment check rejects it.
        _ => return Some(path.to_path_buf()),
    }
    let rest: PathBuf = components.collect();
    (!rest.as_os_str().is_empty()).then_some(rest)
}

/// Lexically resolve `.` and `..`. `None` when the path is absolute or climbs
/// above the root.
fn normalize_within_root(path: &Path) -> Option<PathBuf> {
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(parts.iter().collect())
}

/// Walk `relative` below `root` on disk. Every component that already exists
/// as a symlink must resolve to somewhere inside `root`.
fn resolves_within_root(root: &Path, relative: &Path) -> Result<bool> {
    let mut current = root.to_path_buf();
    for component in relative.components() {
        current.push(component);
        let meta = match fs::symlink_metadata(&current) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
            Err(e) => return Err(io_err(format!("inspect {}", current.display()))(e)),
        };
        if meta.file_type().is_symlink() {
            match fs::canonicalize(&current) {
                Ok(real) if real.starts_with(root) => current = real,
                _ => return Ok(false),
            }
        }
    }
    Ok(true)
}

/// Resolve `link_target` from the link's real parent directory, following
/// links already on disk. Absolute targets never stay within the root.
fn link_stays_within_root(root: &Path, real_parent: &Path, link_target: &Path) -> bool {
    let mut resolved = real_parent.to_path_buf();
    for component in link_target.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !resolved.pop() {
                    return false;
                }
            }
            Component::Normal(part) => {
                resolved.push(part);
                let is_link = fs::symlink_metadata(&resolved)
                    .map(|m| m.file_type().is_symlink())
                    .unwrap_or(false);
                if is_link {
                    match fs::canonicalize(&resolved) {
                        Ok(real) => resolved = real,
                        Err(_) => return false,
                    }
                }
            }
            Component::RootDir | Component::Prefix(_) => return false,
        }
        if !resolved.starts_with(root) {
            return false;
        }
    }
    true
}

#[cfg(unix)]
fn create_symlink(original: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(original, link)
}

#[cfg(not(unix))]
fn create_symlink(_original: &Path, link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("symlinks are not supported here: {}", link.display()),
    ))
}
