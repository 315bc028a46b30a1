// src/error.rs

//! Error types for build orchestration
//!
//! Resolution errors (`PackageNotFound`, `UnresolvedDependency`,
//! `DependencyCycle`) abort a run before any build starts. A failed build of
//! a single package is not an error: it is recorded as a per-entry outcome
//! in the build report.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the library
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A requested name has neither a local nor a remote recipe
    #[error("Package not found: {0}")]
    PackageNotFound(String),

    /// A dependency can be located nowhere and is not satisfied on the system
    #[error("Unresolved dependency '{name}' required by '{required_by}'")]
    UnresolvedDependency { name: String, required_by: String },

    /// The dependency graph contains a cycle; members are listed in cycle order
    #[error("Dependency cycle detected: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    /// Remote lookup or recipe download failed
    #[error("Failed to fetch '{name}': {reason}")]
    FetchFailed { name: String, reason: String },

    #[error("Invalid recipe at {path}: {reason}")]
    InvalidRecipe { path: PathBuf, reason: String },

    #[error("Initialization error: {0}")]
    InitError(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Download error: {0}")]
    DownloadError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Package manager error: {0}")]
    PackageManagerError(String),

    #[error("Build tool error: {0}")]
    BuildToolError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl Error {
    /// Whether this error aborts resolution before any build starts
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            Error::PackageNotFound(_)
                | Error::UnresolvedDependency { .. }
                | Error::DependencyCycle(_)
                | Error::FetchFailed { .. }
        )
    }
}
