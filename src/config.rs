// src/config.rs

//! Run configuration
//!
//! Defaults mirror the container layout the tool is normally deployed in:
//! artifacts under `/makepkg`, local recipes under `/makepkg/local_src`,
//! scratch working trees under `/tmp/build`. A TOML file can override any
//! field; command-line flags override the file.

use crate::error::{Error, Result};
use crate::kitchen::BuildIdentity;
use crate::resolver::RebuildMode;
use crate::source::FetchMethod;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

/// Default AUR endpoint
pub const DEFAULT_AUR_URL: &str = "https://aur.archlinux.org";

/// Configuration for one orchestration run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Artifact output directory
    pub root_dir: PathBuf,
    /// Local recipe root: one subdirectory per package name
    pub local_source_dir: PathBuf,
    /// Scratch location for recipe working trees
    pub build_dir: PathBuf,
    /// Base URL of the remote recipe repository
    pub aur_url: String,
    /// How remote recipes are fetched
    pub fetch_method: FetchMethod,
    /// User the build tool runs as
    pub uid: u32,
    /// Group the build tool runs as
    pub gid: u32,
    /// Rebuild decision mode (0, 1 or 2)
    pub rebuild: RebuildMode,
    /// Keep every dependency installed instead of removing make-only ones
    pub install_all_dependencies: bool,
    /// Keep downloaded build sources between runs
    pub keep_source: bool,
    /// Keep older artifacts of a package after a newer one is built
    pub keep_old_versions: bool,
    /// Additional keyrings to populate before building
    pub keyrings: Vec<String>,
    /// Upgrade all installed packages before resolving
    pub refresh_system: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        let root_dir = PathBuf::from("/makepkg");
        Self {
            local_source_dir: root_dir.join("local_src"),
            root_dir,
            build_dir: PathBuf::from("/tmp/build"),
            aur_url: DEFAULT_AUR_URL.to_string(),
            fetch_method: FetchMethod::Archive,
            uid: 1000,
            gid: 1000,
            rebuild: RebuildMode::Newer,
            install_all_dependencies: false,
            keep_source: true,
            keep_old_versions: false,
            keyrings: Vec::new(),
            refresh_system: false,
        }
    }
}

impl BuildConfig {
    /// Load a configuration file; missing fields take their defaults
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Parse a configuration from a TOML string
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigError(format!("Invalid config: {}", e)))
    }

    /// Check the configuration for values that cannot work
    pub fn validate(&self) -> Result<()> {
        for (field, path) in [
            ("root_dir", &self.root_dir),
            ("local_source_dir", &self.local_source_dir),
            ("build_dir", &self.build_dir),
        ] {
            if path.as_os_str().is_empty() {
                return Err(Error::ConfigError(format!("{} must not be empty", field)));
            }
        }

        let url = Url::parse(&self.aur_url)
            .map_err(|e| Error::ConfigError(format!("Invalid aur_url '{}': {}", self.aur_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::ConfigError(format!(
                "aur_url must be http(s), got '{}'",
                url.scheme()
            )));
        }

        if self.keyrings.iter().any(|k| k.trim().is_empty()) {
            return Err(Error::ConfigError("keyring names must not be empty".to_string()));
        }

        Ok(())
    }

    /// Identity the build tool runs as
    pub fn identity(&self) -> BuildIdentity {
        BuildIdentity {
            uid: self.uid,
            gid: self.gid,
        }
    }
}
