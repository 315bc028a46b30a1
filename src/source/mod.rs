// src/source/mod.rs

//! Source Locator
//!
//! Finds the recipe for a package name. A local recipe directory
//! (`<local_source_dir>/<name>` containing a `PKGBUILD`) always wins; only
//! when none exists is the remote repository consulted. Either way the
//! recipe ends up in a working copy under the build directory, which is
//! where the build tool later runs:
//!
//! - local recipes: `<build_dir>/local/<name>`
//! - remote recipes: `<build_dir>/remote/<pkgbase>`
//!
//! What happens to a working copy after its entry is processed depends on
//! its [`RetentionPolicy`].

mod aur;
mod fetch;

pub use aur::{AurClient, RemotePackage};
pub use fetch::{ArchiveFetcher, Fetcher, GitFetcher};

use crate::error::{Error, Result};
use crate::recipe::{DependencyEdge, Recipe, has_recipe, load_recipe};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use walkdir::WalkDir;

/// How remote recipes are retrieved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMethod {
    /// Snapshot tarball of the recipe repository
    Archive,
    /// Shallow clone of the recipe repository
    Git,
}

impl fmt::Display for FetchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchMethod::Archive => write!(f, "archive"),
            FetchMethod::Git => write!(f, "git"),
        }
    }
}

/// Where a recipe came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Local,
    Remote,
}

/// What happens to a working copy once its entry has been processed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Delete the working copy
    AlwaysPurge,
    /// Keep it; the next run reuses it only if the remote version is unchanged
    PurgeUnlessSameVersion,
    /// Keep it; the next run overlays fresh recipe files on top
    Keep,
}

impl RetentionPolicy {
    /// Retention for a recipe of the given origin
    pub fn select(origin: Origin, fetch_method: FetchMethod, keep_source: bool) -> Self {
        match (origin, fetch_method, keep_source) {
            (_, _, false) => RetentionPolicy::AlwaysPurge,
            (Origin::Local, _, true) => RetentionPolicy::Keep,
            (Origin::Remote, FetchMethod::Archive, true) => RetentionPolicy::PurgeUnlessSameVersion,
            (Origin::Remote, FetchMethod::Git, true) => RetentionPolicy::AlwaysPurge,
        }
    }
}

/// A located recipe, ready to be built
#[derive(Debug, Clone)]
pub struct RecipeSource {
    /// The package name this recipe was located for
    pub name: String,
    pub origin: Origin,
    /// Working copy the build tool runs in
    pub path: PathBuf,
    /// Fetch method used (remote recipes only)
    pub fetch_method: Option<FetchMethod>,
    pub recipe: Recipe,
    pub retention: RetentionPolicy,
}

impl RecipeSource {
    /// Version the recipe would produce
    pub fn version(&self) -> String {
        self.recipe.full_version()
    }

    /// Dependency Extractor: declared dependencies of this recipe
    ///
    /// Edges start at the name the recipe was located for. A recipe that
    /// declares nothing yields no edges.
    pub fn dependency_edges(&self) -> Vec<DependencyEdge> {
        self.recipe.dependency_edges(&self.name)
    }

    /// Apply the retention policy once the entry has been processed
    pub fn release(&self) -> Result<()> {
        if self.retention == RetentionPolicy::AlwaysPurge && self.path.exists() {
            debug!("Removing working copy {}", self.path.display());
            fs::remove_dir_all(&self.path).map_err(|e| {
                Error::IoError(format!("Failed to remove {}: {}", self.path.display(), e))
            })?;
        }
        Ok(())
    }
}

/// Remote recipe repository
///
/// Implemented by [`AurClient`]; tests substitute an in-memory fake.
pub trait RemoteRepository: Send + Sync {
    /// Look up a package by exact name; `None` when it does not exist
    fn lookup(&self, name: &str) -> Result<Option<RemotePackage>>;

    /// Download the recipe files of a package into `dest`
    ///
    /// `dest` does not exist when this is called.
    fn fetch(&self, package: &RemotePackage, method: FetchMethod, dest: &Path) -> Result<()>;
}

/// Result of the lookup phase, before remote recipes are downloaded
enum Found {
    Source(RecipeSource),
    Remote(RemotePackage),
    Missing,
}

/// Finds and materializes recipes by package name
pub struct SourceLocator {
    local_source_dir: PathBuf,
    build_dir: PathBuf,
    remote: Arc<dyn RemoteRepository>,
    fetch_method: FetchMethod,
    keep_source: bool,
}

impl SourceLocator {
    pub fn new(
        local_source_dir: impl Into<PathBuf>,
        build_dir: impl Into<PathBuf>,
        remote: Arc<dyn RemoteRepository>,
        fetch_method: FetchMethod,
        keep_source: bool,
    ) -> Self {
        Self {
            local_source_dir: local_source_dir.into(),
            build_dir: build_dir.into(),
            remote,
            fetch_method,
            keep_source,
        }
    }

    /// Locate the recipe for one package name
    ///
    /// Returns `PackageNotFound` when neither a local nor a remote recipe
    /// exists.
    pub fn locate(&self, name: &str) -> Result<RecipeSource> {
        let names = [name.to_string()];
        match self.locate_all(&names).pop() {
            Some(Ok(Some(source))) => Ok(source),
            Some(Ok(None)) | None => Err(Error::PackageNotFound(name.to_string())),
            Some(Err(e)) => Err(e),
        }
    }

    /// Locate several names at once
    ///
    /// Lookups run in parallel. Remote recipes are then downloaded in
    /// parallel, once per package base, so split packages that share a base
    /// never race on the same working copy. Results are returned in the
    /// order of `names`; `Ok(None)` means the name was found nowhere.
    pub fn locate_all(&self, names: &[String]) -> Vec<Result<Option<RecipeSource>>> {
        let found: Vec<Result<Found>> = names.par_iter().map(|name| self.find(name)).collect();

        let mut bases: Vec<&RemotePackage> = Vec::new();
        for result in &found {
            if let Ok(Found::Remote(package)) = result
                && !bases.iter().any(|b| b.package_base == package.package_base)
            {
                bases.push(package);
            }
        }

        let materialized: HashMap<String, std::result::Result<(PathBuf, Recipe), String>> = bases
            .par_iter()
            .map(|package| {
                let outcome = self.materialize_remote(package).map_err(|e| e.to_string());
                (package.package_base.clone(), outcome)
            })
            .collect();

        names
            .iter()
            .zip(found)
            .map(|(name, result)| match result? {
                Found::Source(source) => Ok(Some(source)),
                Found::Missing => Ok(None),
                Found::Remote(package) => match materialized.get(&package.package_base) {
                    Some(Ok((path, recipe))) => Ok(Some(RecipeSource {
                        name: name.clone(),
                        origin: Origin::Remote,
                        path: path.clone(),
                        fetch_method: Some(self.fetch_method),
                        recipe: recipe.clone(),
                        retention: RetentionPolicy::select(
                            Origin::Remote,
                            self.fetch_method,
                            self.keep_source,
                        ),
                    })),
                    Some(Err(reason)) => Err(Error::FetchFailed {
                        name: name.clone(),
                        reason: reason.clone(),
                    }),
                    None => Err(Error::FetchFailed {
                        name: name.clone(),
                        reason: "recipe was not downloaded".to_string(),
                    }),
                },
            })
            .collect()
    }

    /// Lookup phase: local recipe first, then the remote index
    fn find(&self, name: &str) -> Result<Found> {
        let local = self.local_source_dir.join(name);
        if has_recipe(&local) {
            info!("Using local recipe for {}", name);
            return self.prepare_local(name, &local).map(Found::Source);
        }

        debug!("No local recipe for {}, querying remote", name);
        match self.remote.lookup(name) {
            Ok(Some(package)) => Ok(Found::Remote(package)),
            Ok(None) => Ok(Found::Missing),
            Err(e) => Err(Error::FetchFailed {
                name: name.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Copy a local recipe into its working copy
    fn prepare_local(&self, name: &str, local: &Path) -> Result<RecipeSource> {
        let retention = RetentionPolicy::select(Origin::Local, self.fetch_method, self.keep_source);
        let work = self.build_dir.join("local").join(name);

        if retention != RetentionPolicy::Keep && work.exists() {
            fs::remove_dir_all(&work)?;
        }
        copy_tree(local, &work)?;

        let recipe = load_recipe(&work)?;
        Ok(RecipeSource {
            name: name.to_string(),
            origin: Origin::Local,
            path: work,
            fetch_method: None,
            recipe,
            retention,
        })
    }

    /// Download a remote recipe, reusing an existing working copy when allowed
    fn materialize_remote(&self, package: &RemotePackage) -> Result<(PathBuf, Recipe)> {
        let retention = RetentionPolicy::select(Origin::Remote, self.fetch_method, self.keep_source);
        let work = self.build_dir.join("remote").join(&package.package_base);

        if retention == RetentionPolicy::PurgeUnlessSameVersion
            && has_recipe(&work)
            && let Ok(existing) = load_recipe(&work)
            && existing.full_version() == package.version
        {
            info!(
                "Reusing downloaded recipe for {} {}",
                package.package_base, package.version
            );
            return Ok((work, existing));
        }

        if work.exists() {
            fs::remove_dir_all(&work)?;
        }
        if let Some(parent) = work.parent() {
            fs::create_dir_all(parent)?;
        }

        info!(
            "Fetching {} {} ({})",
            package.package_base, package.version, self.fetch_method
        );
        self.remote.fetch(package, self.fetch_method, &work)?;

        let recipe = load_recipe(&work)?;
        Ok((work, recipe))
    }
}

/// Copy a directory tree, overwriting files that already exist in `dest`
fn copy_tree(src: &Path, dest: &Path) -> Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| Error::IoError(format!("Failed to walk {}: {}", src.display(), e)))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| Error::IoError(e.to_string()))?;
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
