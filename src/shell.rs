//! Shell configuration for the active toolchain.
//!
//! The activated version is exported from a block that govm owns inside the
//! user's shell profile:
//!
//! ```bash
//! # >>> govm initialize >>>
//! export GOROOT="/home/me/.govm/versions/go1.21.0"
//! export GOPATH="${GOPATH:-/home/me/go}"
//! export PATH="$GOROOT/bin:$PATH"
//! # <<< govm initialize <<<
//! ```
//!
//! Rewriting the profile strips every existing block and appends one fresh
//! block, leaving the rest of the file untouched.

use crate::error::{GovmError, Result, StorageContext};
use crate::storage::write_atomic;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const BLOCK_START: &str = "# >>> govm initialize >>>";
pub const BLOCK_END: &str = "# <<< govm initialize <<<";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
    Bash,
    Zsh,
}

impl Shell {
    /// Parse the value of `$SHELL` (e.g. `/usr/bin/zsh`). An empty value is
    /// treated as bash.
    pub fn from_shell_var(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(Self::Bash);
        }
        let name = Path::new(value)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(value);
        match name {
            "bash" => Ok(Self::Bash),
            "zsh" => Ok(Self::Zsh),
            _ => Err(GovmError::UnsupportedShell(value.to_string())),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Bash => "bash",
            Self::Zsh => "zsh",
        }
    }

    /// Profile to rewrite: `~/.bashrc` when present, otherwise
    /// `~/.bash_profile`, for bash; always `~/.zshrc` for zsh.
    pub fn config_file(self, home_dir: &Path) -> PathBuf {
        match self {
            Self::Bash => {
                let bashrc = home_dir.join(".bashrc");
                if bashrc.exists() {
                    bashrc
                } else {
                    home_dir.join(".bash_profile")
                }
            }
            Self::Zsh => home_dir.join(".zshrc"),
        }
    }

    pub fn source_command(self, profile_path: &Path) -> String {
        format!("source {}", profile_path.display())
    }
}

/// A profile rewrite, with what is needed to undo it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvChange {
    pub shell: Shell,
    pub config_file: PathBuf,
    /// Profile contents before the rewrite; `None` if the file did not exist.
    pub previous: Option<String>,
}

/// Environment mutation performed when a version is activated.
pub trait EnvManager: Send + Sync {
    /// Point the user's environment at `install_path`.
    fn configure(&self, install_path: &Path) -> Result<EnvChange>;
    /// Put the profile back the way it was before `change`.
    fn revert(&self, change: &EnvChange) -> Result<()>;
    /// Profile that `configure` would rewrite, without touching it.
    fn config_file(&self) -> Result<(Shell, PathBuf)>;
}

/// [`EnvManager`] that edits bash and zsh profiles under a home directory.
pub struct ShellEnv {
    home_dir: PathBuf,
    shell_var: Option<String>,
    gopath: String,
}

impl ShellEnv {
    pub fn new(home_dir: impl Into<PathBuf>, shell_var: Option<String>, gopath: impl Into<String>) -> Self {
        Self {
            home_dir: home_dir.into(),
            shell_var,
            gopath: gopath.into(),
        }
    }

    /// Home directory and shell taken from the running process.
    pub fn from_env(gopath: impl Into<String>) -> Result<Self> {
        let home_dir = dirs::home_dir().ok_or_else(|| {
            GovmError::storage(
                "locate home directory",
                io::Error::new(io::ErrorKind::NotFound, "HOME is not set"),
            )
        })?;
        Ok(Self::new(home_dir, std::env::var("SHELL").ok(), gopath))
    }

    fn shell(&self) -> Result<Shell> {
        Shell::from_shell_var(self.shell_var.as_deref().unwrap_or_default())
    }
}

impl EnvManager for ShellEnv {
    fn config_file(&self) -> Result<(Shell, PathBuf)> {
        let shell = self.shell()?;
        Ok((shell, shell.config_file(&self.home_dir)))
    }

    fn configure(&self, install_path: &Path) -> Result<EnvChange> {
        let (shell, profile) = self.config_file()?;
        // Dotfile managers often symlink profiles; edit the file behind the link.
        let target = fs::canonicalize(&profile).unwrap_or_else(|_| profile.clone());
        tracing::info!("Updating {} profile {}", shell.name(), target.display());

        let previous = match fs::read_to_string(&target) {
            Ok(content) => Some(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(GovmError::storage(format!("read {}", target.display()), e)),
        };

        let block = managed_block(install_path, &self.gopath);
        let updated = merge_config(previous.as_deref().unwrap_or_default(), &block);
        write_atomic(&target, updated.as_bytes())
            .storage_context(|| format!("write {}", target.display()))?;

        Ok(EnvChange {
            shell,
            config_file: target,
            previous,
        })
    }

    fn revert(&self, change: &EnvChange) -> Result<()> {
        tracing::info!("Restoring {}", change.config_file.display());
        match &change.previous {
            Some(content) => write_atomic(&change.config_file, content.as_bytes())
                .storage_context(|| format!("restore {}", change.config_file.display())),
            None => match fs::remove_file(&change.config_file) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(GovmError::storage(
                    format!("remove {}", change.config_file.display()),
                    e,
                )),
            },
        }
    }
}

/// Lines of the managed block for `install_path`, sentinels included.
pub fn managed_block(install_path: &Path, gopath: &str) -> Vec<String> {
    vec![
        BLOCK_START.to_string(),
        format!(
            "export GOROOT=\"{}\"",
            escape_double_quoted(&install_path.display().to_string())
        ),
        format!("export GOPATH=\"${{GOPATH:-{}}}\"", escape_double_quoted(gopath)),
        "export PATH=\"$GOROOT/bin:$PATH\"".to_string(),
        BLOCK_END.to_string(),
    ]
}

fn escape_double_quoted(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('$', "\\$")
        .replace('`', "\\`")
        .replace('"', "\\\"")
}

/// Remove every complete managed block from `content`. A start sentinel with
/// no matching end is left alone.
pub fn strip_managed_blocks(content: &str) -> String {
    let lines: Vec<&str> = content.split_inclusive('\n').collect();
    let mut kept = String::with_capacity(content.len());
    let mut i = 0;
    while i < lines.len() {
        if lines[i].trim() == BLOCK_START {
            if let Some(end) = lines[i + 1..].iter().position(|l| l.trim() == BLOCK_END) {
                i += end + 2;
                continue;
            }
        }
        kept.push_str(lines[i]);
        i += 1;
    }
    kept
}

/// Replace any managed blocks in `existing` with a single `block` at the end.
///
/// Content outside the blocks is preserved; trailing blank lines are collapsed
/// so exactly one blank line separates it from the block. CRLF files get CRLF
/// block lines.
pub fn merge_config(existing: &str, block: &[String]) -> String {
    let eol = if existing.contains("\r\n") { "\r\n" } else { "\n" };
    let cleaned = strip_managed_blocks(existing);
    let cleaned = cleaned.trim_end_matches(|c: char| c == '\n' || c == '\r' || c == ' ' || c == '\t');
    let block = block.join(eol);

    if cleaned.is_empty() {
        format!("{block}{eol}")
    } else {
        format!("{cleaned}{eol}{eol}{block}{eol}")
    }
}
