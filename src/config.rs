use crate::storage::{write_atomic, VERSIONS_DIR_NAME};
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

pub const APP_NAME: &str = "govm";
pub const ROOT_DIR_NAME: &str = ".govm";
pub const DOWNLOADS_DIR_NAME: &str = "downloads";
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const ROOT_ENV_VAR: &str = "GOVM_ROOT";

/// Settings keys accepted by `config set` / `config unset`.
pub const SETTING_KEYS: [&str; 5] = [
    "gopath",
    "mirror",
    "cache_ttl_secs",
    "probe_timeout_secs",
    "request_timeout_secs",
];

/// Which source the catalog and downloads come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MirrorPreference {
    /// Probe the region and pick accordingly.
    #[default]
    Auto,
    Official,
    Regional,
}

impl FromStr for MirrorPreference {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "official" => Ok(Self::Official),
            "regional" => Ok(Self::Regional),
            other => Err(anyhow!(
                "Invalid mirror '{}'. Valid values: auto, official, regional",
                other
            )),
        }
    }
}

impl fmt::Display for MirrorPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Auto => "auto",
            Self::Official => "official",
            Self::Regional => "regional",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Workspace written into the shell block when `GOPATH` is not already set.
    pub gopath: String,
    pub mirror: MirrorPreference,
    pub cache_ttl_secs: u64,
    pub probe_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        let gopath = dirs::home_dir()
            .map(|home| home.join("go").to_string_lossy().to_string())
            .unwrap_or_else(|| "$HOME/go".to_string());
        Self {
            gopath,
            mirror: MirrorPreference::Auto,
            cache_ttl_secs: 300,
            probe_timeout_secs: 3,
            request_timeout_secs: 30,
        }
    }
}

impl Settings {
    /// Set one setting from its string form. `key` must already be normalized.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "gopath" => {
                if value.is_empty() {
                    bail!("gopath cannot be empty");
                }
                self.gopath = value.to_string();
            }
            "mirror" => self.mirror = value.parse()?,
            "cache_ttl_secs" => self.cache_ttl_secs = parse_secs(key, value)?,
            "probe_timeout_secs" => self.probe_timeout_secs = parse_secs(key, value)?,
            "request_timeout_secs" => self.request_timeout_secs = parse_secs(key, value)?,
            _ => bail!(
                "'{}' is not a valid configuration setting. Valid settings: {}",
                key,
                SETTING_KEYS.join(", ")
            ),
        }
        Ok(())
    }

    /// Reset one setting to its default. `key` must already be normalized.
    pub fn unset(&mut self, key: &str) -> Result<()> {
        let defaults = Settings::default();
        match key {
            "gopath" => self.gopath = defaults.gopath,
            "mirror" => self.mirror = defaults.mirror,
            "cache_ttl_secs" => self.cache_ttl_secs = defaults.cache_ttl_secs,
            "probe_timeout_secs" => self.probe_timeout_secs = defaults.probe_timeout_secs,
            "request_timeout_secs" => self.request_timeout_secs = defaults.request_timeout_secs,
            _ => bail!(
                "'{}' is not a valid configuration setting. Valid settings: {}",
                key,
                SETTING_KEYS.join(", ")
            ),
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "gopath" => Some(self.gopath.clone()),
            "mirror" => Some(self.mirror.to_string()),
            "cache_ttl_secs" => Some(self.cache_ttl_secs.to_string()),
            "probe_timeout_secs" => Some(self.probe_timeout_secs.to_string()),
            "request_timeout_secs" => Some(self.request_timeout_secs.to_string()),
            _ => None,
        }
    }

    /// Apply `GOVM_*` overrides; `lookup` returns the variable's value if set.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(gopath) = lookup("GOVM_GOPATH").filter(|v| !v.trim().is_empty()) {
            self.gopath = gopath;
        }

        if let Some(mirror) = lookup("GOVM_MIRROR") {
            match mirror.parse() {
                Ok(mirror) => self.mirror = mirror,
                Err(e) => tracing::warn!("Ignoring GOVM_MIRROR: {}", e),
            }
        }

        if let Some(ttl) = lookup("GOVM_CACHE_TTL_SECS") {
            match ttl.trim().parse::<u64>() {
                Ok(ttl) => self.cache_ttl_secs = ttl,
                Err(_) => tracing::warn!("Ignoring GOVM_CACHE_TTL_SECS: '{}' is not a number", ttl),
            }
        }
    }
}

fn parse_secs(key: &str, value: &str) -> Result<u64> {
    value
        .parse::<u64>()
        .map_err(|_| anyhow!("Invalid value for '{}': expected whole seconds, got '{}'", key, value))
}

/// Root directory plus the settings persisted inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GovmConfig {
    pub root_dir: PathBuf,
    pub settings: Settings,
}

impl GovmConfig {
    /// Load from `$GOVM_ROOT` (or `~/.govm`) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_root(get_root_dir()?)?;
        config
            .settings
            .apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load the settings file under `root_dir`, without environment overrides.
    pub fn load_from_root(root_dir: impl Into<PathBuf>) -> Result<Self> {
        let root_dir = root_dir.into();
        let config_path = root_dir.join(CONFIG_FILE_NAME);
        tracing::debug!("Config file path: {}", config_path.display());

        let settings = if config_path.exists() {
            let content = fs::read_to_string(&config_path).with_context(|| {
                format!("Could not read config file at {}", config_path.display())
            })?;
            if content.trim().is_empty() {
                Settings::default()
            } else {
                serde_json::from_str(&content)
                    .with_context(|| "Could not parse config file as JSON")?
            }
        } else {
            Settings::default()
        };

        Ok(Self { root_dir, settings })
    }

    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.root_dir)
            .with_context(|| format!("Could not create {}", self.root_dir.display()))?;
        let content = serde_json::to_string_pretty(&self.settings)?;
        let path = self.config_file_path();
        write_atomic(&path, content.as_bytes())
            .with_context(|| format!("Could not write config file at {}", path.display()))
    }

    pub fn config_file_path(&self) -> PathBuf {
        self.root_dir.join(CONFIG_FILE_NAME)
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.root_dir.join(VERSIONS_DIR_NAME)
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.root_dir.join(DOWNLOADS_DIR_NAME)
    }
}

/// `$GOVM_ROOT` when set, otherwise `~/.govm`. Nothing is created.
pub fn get_root_dir() -> Result<PathBuf> {
    if let Some(root) = std::env::var_os(ROOT_ENV_VAR).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(root));
    }
    let path = dirs::home_dir()
        .ok_or_else(|| anyhow!("Could not determine home directory"))?
        .join(ROOT_DIR_NAME);
    tracing::debug!("Root directory: {}", path.display());
    Ok(path)
}

/// `cache-ttl-secs` and `cacheTtlSecs` both become `cache_ttl_secs`.
pub fn normalize_key(key: &str) -> String {
    key.trim()
        .replace('-', "_")
        .chars()
        .map(|c| {
            if c.is_ascii_uppercase() {
                format!("_{}", c.to_ascii_lowercase())
            } else {
                c.to_string()
            }
        })
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("cache-ttl-secs"), "cache_ttl_secs");
        assert_eq!(normalize_key("cacheTtlSecs"), "cache_ttl_secs");
        assert_eq!(normalize_key("gopath"), "gopath");
        assert_eq!(normalize_key(" mirror "), "mirror");
    }

    #[test]
    fn test_mirror_preference_parse() {
        assert_eq!("auto".parse::<MirrorPreference>().unwrap(), MirrorPreference::Auto);
        assert_eq!(
            " Regional ".parse::<MirrorPreference>().unwrap(),
            MirrorPreference::Regional
        );
        assert!("elsewhere".parse::<MirrorPreference>().is_err());
    }

    #[test]
    fn test_set_and_unset() {
        let mut settings = Settings::default();
        settings.set("cache_ttl_secs", "60").unwrap();
        settings.set("mirror", "official").unwrap();
        settings.set("gopath", "/work/go").unwrap();
        assert_eq!(settings.cache_ttl_secs, 60);
        assert_eq!(settings.mirror, MirrorPreference::Official);
        assert_eq!(settings.get("gopath").as_deref(), Some("/work/go"));

        assert!(settings.set("cache_ttl_secs", "soon").is_err());
        assert!(settings.set("shim_dir", "/tmp").is_err());
        assert!(settings.set("gopath", " ").is_err());

        settings.unset("cache_ttl_secs").unwrap();
        settings.unset("mirror").unwrap();
        assert_eq!(settings.cache_ttl_secs, 300);
        assert_eq!(settings.mirror, MirrorPreference::Auto);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("GOVM_GOPATH", "/env/go"),
            ("GOVM_MIRROR", "regional"),
            ("GOVM_CACHE_TTL_SECS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        settings.apply_env_overrides(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(settings.gopath, "/env/go");
        assert_eq!(settings.mirror, MirrorPreference::Regional);
        assert_eq!(settings.cache_ttl_secs, 300);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut config = GovmConfig::load_from_root(dir.path().join("root")).unwrap();
        assert_eq!(config.settings, Settings::default());

        config.settings.set("request_timeout_secs", "10").unwrap();
        config.save().unwrap();

        let reloaded = GovmConfig::load_from_root(dir.path().join("root")).unwrap();
        assert_eq!(reloaded.settings.request_timeout_secs, 10);
        assert_eq!(reloaded.downloads_dir(), dir.path().join("root").join("downloads"));
    }

    #[test]
    fn test_partial_config_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), r#"{"mirror": "official"}"#).unwrap();

        let config = GovmConfig::load_from_root(dir.path()).unwrap();
        assert_eq!(config.settings.mirror, MirrorPreference::Official);
        assert_eq!(config.settings.probe_timeout_secs, 3);
    }
}
