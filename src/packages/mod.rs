// src/packages/mod.rs

//! System package manager and the artifact store

mod artifact;
mod pacman;

pub use artifact::{ArtifactRecord, ArtifactStore, is_package_file};
pub use pacman::Pacman;

use crate::error::Result;
use crate::recipe::Dependency;
use crate::version::PkgVersion;
use std::path::PathBuf;

/// Operations the orchestrator needs from the system package manager
///
/// Implemented by [`Pacman`]; tests substitute an in-memory fake.
pub trait PackageManager: Send + Sync {
    /// Installed version of a package, `None` when not installed
    fn installed_version(&self, name: &str) -> Result<Option<String>>;

    /// Whether an installed package already satisfies a dependency
    fn satisfies(&self, dependency: &Dependency) -> Result<bool> {
        Ok(self
            .installed_version(&dependency.name)?
            .is_some_and(|v| dependency.constraint.satisfies(&PkgVersion::parse(&v))))
    }

    /// Whether a configured binary repository can provide a dependency
    fn available_in_repos(&self, dependency: &Dependency) -> Result<bool>;

    /// Upgrade all installed packages
    fn refresh_system(&self) -> Result<()>;

    /// Initialize the package signing keyring and populate the named keyrings
    fn init_keyrings(&self, keyrings: &[String]) -> Result<()>;

    /// Install package files, optionally marked as dependencies
    fn install_files(&self, paths: &[PathBuf], as_dependencies: bool) -> Result<()>;

    /// Remove installed packages
    fn remove(&self, names: &[String]) -> Result<()>;
}
