//! Go toolchain version manager.
//!
//! The library holds the version lifecycle engine: catalog resolution with
//! region-based mirror selection, verified installs, activation through the
//! user's shell profile, and safe removal. The `govm` binary is a thin CLI
//! over [`manager::VersionManager`].

pub mod archive;
pub mod catalog;
pub mod config;
pub mod download;
pub mod error;
pub mod install;
pub mod lister;
pub mod manager;
pub mod platform;
pub mod region;
pub mod shell;
pub mod storage;
pub mod switch;
pub mod types;
pub mod uninstall;

pub use error::{ExtractionError, GovmError, Result};
pub use install::InstallOutcome;
pub use manager::VersionManager;
pub use types::Version;
