use clap::{Parser, Subcommand};

fn get_version() -> &'static str {
    const BASE_VERSION: &str = env!("CARGO_PKG_VERSION");

    // Release builds are tagged; report the tag alone.
    if let Some(tag) = option_env!("GOVM_GIT_TAG") {
        return tag;
    }

    let commit = option_env!("GOVM_GIT_COMMIT").unwrap_or("unknown");
    let branch = option_env!("GOVM_GIT_BRANCH").unwrap_or("unknown");

    // Leaked once at startup so clap can hold a 'static str.
    let version = format!("v{}-{} ({})", BASE_VERSION, commit, branch);
    Box::leak(version.into_boxed_str())
}

#[derive(Parser)]
#[command(name = "govm")]
#[command(about = "A version manager for the Go toolchain")]
#[command(version = get_version(), propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (use multiple times for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Reduce output to errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List Go versions available for download
    Remote,

    /// List installed Go versions
    #[command(alias = "ls")]
    List,

    /// Download and install a Go version
    #[command(
        disable_version_flag = true,
        after_help = "Examples:\n  govm install 1.21.0\n  govm install go1.22rc1"
    )]
    Install {
        /// Version to install (e.g., '1.21.0' or 'go1.21.0')
        version: String,
    },

    /// Activate an installed Go version in your shell profile
    #[command(disable_version_flag = true)]
    Use {
        /// Installed version to activate
        version: String,
    },

    /// Show the active Go version
    Current,

    /// Remove an installed Go version
    #[command(alias = "rm", disable_version_flag = true)]
    Uninstall {
        /// Installed version to remove
        version: String,
        /// Remove the version even if it is the active one
        #[arg(short, long)]
        force: bool,
    },

    /// Manage govm's configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show the current version
    Version,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a configuration setting
    Get {
        /// Key to get (if omitted, shows all settings)
        key: Option<String>,
    },
    /// Set a configuration setting
    Set {
        /// Key and value (e.g., 'mirror=official' or 'cache-ttl-secs 60')
        #[arg(trailing_var_arg = true, required = true)]
        args: Vec<String>,
    },
    /// Reset a configuration setting to its default
    Unset {
        /// Key to unset (e.g., 'gopath')
        key: String,
    },
    /// Show full configuration
    Show {
        /// Output format (json, yaml, plain)
        #[arg(long, default_value = "json")]
        format: String,
    },
}
