// src/resolver/plan.rs

//! Build plan data structures
//!
//! Contains the result types for dependency resolution.

use crate::error::{Error, Result};
use crate::source::RecipeSource;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rebuild decision mode
///
/// Serialized as the integers `0`, `1` and `2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum RebuildMode {
    /// 0: build only when the recipe version is newer than what is known
    Newer,
    /// 1: always build explicitly requested packages
    Explicit,
    /// 2: build everything in the build set
    All,
}

impl TryFrom<u8> for RebuildMode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(RebuildMode::Newer),
            1 => Ok(RebuildMode::Explicit),
            2 => Ok(RebuildMode::All),
            other => Err(Error::ConfigError(format!(
                "rebuild mode must be 0, 1 or 2, got {}",
                other
            ))),
        }
    }
}

impl From<RebuildMode> for u8 {
    fn from(mode: RebuildMode) -> u8 {
        match mode {
            RebuildMode::Newer => 0,
            RebuildMode::Explicit => 1,
            RebuildMode::All => 2,
        }
    }
}

impl fmt::Display for RebuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

/// Why a package is in the build set
///
/// Ordered by precedence: a package reached several ways keeps the
/// strongest role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Role {
    /// Needed only to build another entry; optionally removed afterwards
    MakeDependency,
    /// Runtime dependency of another entry
    Dependency,
    /// Named in the request
    Explicit,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::MakeDependency => write!(f, "make dependency"),
            Role::Dependency => write!(f, "dependency"),
            Role::Explicit => write!(f, "explicit"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Build,
    /// Already up to date; carries the version considered current
    Skip { known_version: String },
}

/// One package in the build set
#[derive(Debug, Clone)]
pub struct BuildSetEntry {
    pub name: String,
    pub source: RecipeSource,
    /// Position in the build order
    pub position: usize,
    pub decision: Decision,
    pub role: Role,
    /// Version currently installed or stored, if any
    pub known_version: Option<String>,
    /// Names of build-set entries this one depends on
    pub dependencies: Vec<String>,
    /// Names of build-set entries that depend on this one
    pub dependents: Vec<String>,
}

impl BuildSetEntry {
    pub fn is_build(&self) -> bool {
        self.decision == Decision::Build
    }

    /// Version the recipe produces
    pub fn version(&self) -> String {
        self.source.version()
    }
}

/// Result of resolution: what to build, in which order
#[derive(Debug, Clone, Default)]
pub struct BuildPlan {
    /// Entries in build order (dependencies first)
    pub entries: Vec<BuildSetEntry>,
    /// Dependencies already satisfied by installed packages
    pub presatisfied: Vec<String>,
    /// Dependencies left to the binary repositories
    pub repo_provided: Vec<String>,
}

impl BuildPlan {
    pub fn get(&self, name: &str) -> Option<&BuildSetEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Entries that will be built
    pub fn builds(&self) -> impl Iterator<Item = &BuildSetEntry> {
        self.entries.iter().filter(|e| e.is_build())
    }

    /// Entry names in build order
    pub fn order(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
