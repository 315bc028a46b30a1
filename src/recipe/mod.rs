// src/recipe/mod.rs

//! Build recipes and their declared dependencies
//!
//! A recipe directory holds a `PKGBUILD` and, for AUR snapshots, a generated
//! `.SRCINFO`. Both describe the same package; `.SRCINFO` is a flat
//! key/value rendering and is preferred when present because it needs no
//! shell evaluation.
//!
//! Dependency extraction never resolves anything transitively: it reports
//! the names a single recipe declares, tagged by whether they are only
//! needed while building.

mod pkgbuild;
mod srcinfo;

pub use pkgbuild::parse_pkgbuild;
pub use srcinfo::parse_srcinfo;

use crate::error::{Error, Result};
use crate::version::{PkgVersion, VersionConstraint};
use std::fs;
use std::path::Path;
use tracing::debug;

/// File name of the shell recipe every recipe directory must contain
pub const PKGBUILD_FILE: &str = "PKGBUILD";

/// File name of the generated metadata shipped with AUR snapshots
pub const SRCINFO_FILE: &str = ".SRCINFO";

/// Whether a dependency is needed at runtime or only while building
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DependencyKind {
    /// Needed only during the build step (`makedepends`, `checkdepends`)
    MakeOnly,
    /// Needed when the produced package runs (`depends`)
    Runtime,
}

/// One declared dependency of a recipe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// Package name with any version constraint stripped
    pub name: String,
    /// Version constraint as declared (`Any` when none)
    pub constraint: VersionConstraint,
    /// The dependency exactly as written in the recipe
    pub raw: String,
    pub kind: DependencyKind,
}

impl Dependency {
    /// Parse a dependency entry such as `python>=3.11`
    pub fn parse(raw: &str, kind: DependencyKind) -> Self {
        let (name, constraint) = VersionConstraint::split_dependency(raw);
        Self {
            name,
            constraint,
            raw: raw.trim().to_string(),
            kind,
        }
    }
}

/// Directed relation `package -> depends-on`, tagged make-only or runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEdge {
    pub from: String,
    pub to: Dependency,
}

/// Package metadata parsed from a recipe descriptor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recipe {
    /// Base name (equals the single package name for non-split recipes)
    pub pkgbase: String,
    /// Package names the recipe produces
    pub pkgnames: Vec<String>,
    pub epoch: Option<String>,
    pub pkgver: String,
    pub pkgrel: String,
    pub arch: Vec<String>,
    pub depends: Vec<String>,
    pub makedepends: Vec<String>,
    pub checkdepends: Vec<String>,
}

impl Recipe {
    /// Full version string: `[epoch:]pkgver-pkgrel`
    pub fn full_version(&self) -> String {
        match &self.epoch {
            Some(epoch) if !epoch.is_empty() && epoch != "0" => {
                format!("{}:{}-{}", epoch, self.pkgver, self.pkgrel)
            }
            _ => format!("{}-{}", self.pkgver, self.pkgrel),
        }
    }

    /// Parsed version for comparisons
    pub fn version(&self) -> PkgVersion {
        PkgVersion::parse(&self.full_version())
    }

    /// Whether this recipe produces a package with the given name
    pub fn provides_name(&self, name: &str) -> bool {
        self.pkgbase == name || self.pkgnames.iter().any(|n| n == name)
    }

    /// All declared dependencies, runtime first, with duplicates removed
    ///
    /// A name declared both as runtime and make-only dependency is reported
    /// once, as runtime.
    pub fn dependencies(&self) -> Vec<Dependency> {
        let mut deps: Vec<Dependency> = Vec::new();

        let declared = self
            .depends
            .iter()
            .map(|d| Dependency::parse(d, DependencyKind::Runtime))
            .chain(
                self.makedepends
                    .iter()
                    .chain(self.checkdepends.iter())
                    .map(|d| Dependency::parse(d, DependencyKind::MakeOnly)),
            );

        for dep in declared {
            if dep.name.is_empty() || self.provides_name(&dep.name) {
                continue;
            }
            if !deps.iter().any(|d| d.name == dep.name) {
                deps.push(dep);
            }
        }

        deps
    }

    /// Dependency edges from the named package
    pub fn dependency_edges(&self, from: &str) -> Vec<DependencyEdge> {
        self.dependencies()
            .into_iter()
            .map(|to| DependencyEdge {
                from: from.to_string(),
                to,
            })
            .collect()
    }

    pub(crate) fn check_required(&self, path: &Path) -> Result<()> {
        let missing = if self.pkgnames.is_empty() {
            Some("pkgname")
        } else if self.pkgver.is_empty() {
            Some("pkgver")
        } else if self.pkgrel.is_empty() {
            Some("pkgrel")
        } else {
            None
        };

        match missing {
            Some(field) => Err(Error::InvalidRecipe {
                path: path.to_path_buf(),
                reason: format!("missing required variable '{}'", field),
            }),
            None => Ok(()),
        }
    }
}

/// Whether a directory contains a recognized recipe descriptor
pub fn has_recipe(dir: &Path) -> bool {
    dir.join(PKGBUILD_FILE).is_file()
}

/// Load the recipe stored in a directory
///
/// Prefers `.SRCINFO`, falling back to `PKGBUILD`.
pub fn load_recipe(dir: &Path) -> Result<Recipe> {
    let srcinfo = dir.join(SRCINFO_FILE);
    if srcinfo.is_file() {
        debug!("Reading {}", srcinfo.display());
        let content = fs::read_to_string(&srcinfo)?;
        return parse_srcinfo(&content, &srcinfo);
    }

    let pkgbuild = dir.join(PKGBUILD_FILE);
    if !pkgbuild.is_file() {
        return Err(Error::InvalidRecipe {
            path: dir.to_path_buf(),
            reason: format!("directory does not contain a '{}' file", PKGBUILD_FILE),
        });
    }

    debug!("Reading {}", pkgbuild.display());
    let content = fs::read_to_string(&pkgbuild)?;
    parse_pkgbuild(&content, &pkgbuild)
}
