// src/orchestrator.rs

//! Orchestration of a whole run
//!
//! One run prepares the system, resolves the build plan, then walks the
//! plan in order. Builds are strictly sequential: the build tool installs
//! into the shared package database, so two builds must never overlap.
//!
//! A failed entry does not stop the run. Every entry that depends on it,
//! directly or through another skipped entry, is skipped instead.

use crate::config::BuildConfig;
use crate::error::Result;
use crate::kitchen::{BuildTool, CookResult, Kitchen, KitchenConfig, Makepkg};
use crate::packages::{ArtifactRecord, ArtifactStore, PackageManager, Pacman};
use crate::resolver::{BuildPlan, BuildSetEntry, Decision, ResolveOptions, Resolver, Role};
use crate::source::{AurClient, RemoteRepository, SourceLocator};
use crate::version::vercmp;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// What happened to one build-set entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Built(Vec<ArtifactRecord>),
    UpToDate,
    Failed(String),
    /// Not attempted because the named dependency failed or was skipped
    SkippedDueToDependencyFailure(String),
}

impl BuildOutcome {
    /// Whether this outcome makes the run unsuccessful
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            BuildOutcome::Failed(_) | BuildOutcome::SkippedDueToDependencyFailure(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryReport {
    pub name: String,
    /// Version the recipe declares
    pub version: String,
    pub role: Role,
    pub outcome: BuildOutcome,
}

/// Result of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Entries in build order
    pub entries: Vec<EntryReport>,
    pub presatisfied: Vec<String>,
    pub repo_provided: Vec<String>,
}

impl BuildReport {
    /// False when any entry failed or was skipped for a failed dependency
    pub fn success(&self) -> bool {
        !self.entries.iter().any(|e| e.outcome.is_failure())
    }

    pub fn get(&self, name: &str) -> Option<&EntryReport> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn built(&self) -> Vec<&str> {
        self.names(|o| matches!(o, BuildOutcome::Built(_)))
    }

    pub fn up_to_date(&self) -> Vec<&str> {
        self.names(|o| matches!(o, BuildOutcome::UpToDate))
    }

    pub fn failed(&self) -> Vec<&str> {
        self.names(|o| matches!(o, BuildOutcome::Failed(_)))
    }

    pub fn skipped(&self) -> Vec<&str> {
        self.names(|o| matches!(o, BuildOutcome::SkippedDueToDependencyFailure(_)))
    }

    fn names(&self, filter: impl Fn(&BuildOutcome) -> bool) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| filter(&e.outcome))
            .map(|e| e.name.as_str())
            .collect()
    }
}

/// Drives resolution and the build loop
pub struct Orchestrator {
    config: BuildConfig,
    locator: SourceLocator,
    packages: Arc<dyn PackageManager>,
    kitchen: Kitchen,
}

impl Orchestrator {
    /// Create an orchestrator with explicit collaborators
    pub fn new(
        config: BuildConfig,
        remote: Arc<dyn RemoteRepository>,
        packages: Arc<dyn PackageManager>,
        tool: Arc<dyn BuildTool>,
    ) -> Result<Self> {
        config.validate()?;

        let locator = SourceLocator::new(
            &config.local_source_dir,
            &config.build_dir,
            remote,
            config.fetch_method,
            config.keep_source,
        );
        let kitchen = Kitchen::new(
            tool,
            ArtifactStore::new(&config.root_dir),
            KitchenConfig {
                identity: config.identity(),
                remove_make_deps: !config.install_all_dependencies,
                keep_old_versions: config.keep_old_versions,
            },
        );

        Ok(Self {
            config,
            locator,
            packages,
            kitchen,
        })
    }

    /// Create an orchestrator backed by the AUR, pacman and makepkg
    pub fn from_config(config: BuildConfig) -> Result<Self> {
        let remote = Arc::new(AurClient::new(&config.aur_url)?);
        Self::new(config, remote, Arc::new(Pacman::new()), Arc::new(Makepkg::new()))
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Refresh the system and initialize keyrings, as configured
    pub fn prepare_system(&self) -> Result<()> {
        if self.config.refresh_system {
            self.packages.refresh_system()?;
        }
        if !self.config.keyrings.is_empty() {
            self.packages.init_keyrings(&self.config.keyrings)?;
        }
        Ok(())
    }

    /// Resolve the requested names into a build plan
    pub fn plan(&self, requests: &[String]) -> Result<BuildPlan> {
        for dir in [&self.config.root_dir, &self.config.build_dir] {
            fs::create_dir_all(dir)?;
        }

        let resolver = Resolver::new(&self.locator, self.packages.as_ref(), self.kitchen.store());
        resolver.resolve(
            requests,
            &ResolveOptions {
                rebuild: self.config.rebuild,
                install_all_dependencies: self.config.install_all_dependencies,
            },
        )
    }

    /// Prepare, resolve and build
    pub fn run(&self, requests: &[String]) -> Result<BuildReport> {
        self.prepare_system()?;
        let plan = self.plan(requests)?;
        Ok(self.execute(&plan))
    }

    /// Walk the plan in order
    pub fn execute(&self, plan: &BuildPlan) -> BuildReport {
        let mut report = BuildReport {
            entries: Vec::with_capacity(plan.entries.len()),
            presatisfied: plan.presatisfied.clone(),
            repo_provided: plan.repo_provided.clone(),
        };
        let mut broken: HashSet<&str> = HashSet::new();
        let mut installed_make_deps: Vec<String> = Vec::new();

        for entry in &plan.entries {
            let blocked_by = entry
                .dependencies
                .iter()
                .find(|d| broken.contains(d.as_str()));

            let outcome = match blocked_by {
                Some(dependency) => {
                    warn!("Skipping {}: dependency {} did not build", entry.name, dependency);
                    BuildOutcome::SkippedDueToDependencyFailure(dependency.clone())
                }
                None => self.process(entry, &mut installed_make_deps),
            };

            if outcome.is_failure() {
                broken.insert(entry.name.as_str());
            }

            if let Err(e) = entry.source.release() {
                warn!("Failed to clean up working copy of {}: {}", entry.name, e);
            }

            report.entries.push(EntryReport {
                name: entry.name.clone(),
                version: built_version(entry, &outcome),
                role: entry.role,
                outcome,
            });

            self.remove_finished_make_deps(plan, entry.position, &mut installed_make_deps);
        }

        report
    }

    fn process(&self, entry: &BuildSetEntry, installed_make_deps: &mut Vec<String>) -> BuildOutcome {
        match &entry.decision {
            Decision::Skip { known_version } => {
                info!("{} is up to date ({})", entry.name, known_version);
                match self.install_current(entry, known_version) {
                    Ok(true) => {
                        self.track_make_dep(entry, installed_make_deps);
                        BuildOutcome::UpToDate
                    }
                    Ok(false) => BuildOutcome::UpToDate,
                    Err(e) => BuildOutcome::Failed(format!("failed to install stored package: {}", e)),
                }
            }
            Decision::Build => match self.kitchen.cook(entry) {
                CookResult::Built(records) => {
                    if entry.dependents.is_empty() {
                        return BuildOutcome::Built(records);
                    }
                    let paths: Vec<PathBuf> = records.iter().map(|r| r.path.clone()).collect();
                    match self.packages.install_files(&paths, entry.role != Role::Explicit) {
                        Ok(()) => {
                            self.track_make_dep(entry, installed_make_deps);
                            BuildOutcome::Built(records)
                        }
                        Err(e) => BuildOutcome::Failed(format!("built but could not be installed: {}", e)),
                    }
                }
                CookResult::Failed(reason) => BuildOutcome::Failed(reason),
            },
        }
    }

    /// Make sure an up-to-date dependency is installed for its dependents
    ///
    /// Installs the newest stored artifact when the package is missing or
    /// older than what the store holds. Returns whether anything was installed.
    fn install_current(&self, entry: &BuildSetEntry, known_version: &str) -> Result<bool> {
        if entry.dependents.is_empty() {
            return Ok(false);
        }

        let installed = self.packages.installed_version(&entry.name)?;
        if installed
            .as_deref()
            .is_some_and(|v| vercmp(v, known_version) != Ordering::Less)
        {
            return Ok(false);
        }

        match self.kitchen.store().newest(&entry.name)? {
            Some(record) => {
                info!("Installing stored {} {}", record.name, record.version);
                self.packages
                    .install_files(&[record.path], entry.role != Role::Explicit)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn track_make_dep(&self, entry: &BuildSetEntry, installed_make_deps: &mut Vec<String>) {
        if entry.role == Role::MakeDependency && !self.config.install_all_dependencies {
            installed_make_deps.push(entry.name.clone());
        }
    }

    /// Uninstall make dependencies that nothing installed needs any more
    ///
    /// A make dependency goes once all its dependents have been processed
    /// and none of them is an installed make dependency that has to stay.
    /// Make dependencies of make dependencies therefore leave together with
    /// the package that pulled them in.
    fn remove_finished_make_deps(
        &self,
        plan: &BuildPlan,
        processed: usize,
        installed_make_deps: &mut Vec<String>,
    ) {
        let finished = finished_make_deps(plan, processed, installed_make_deps);

        if finished.is_empty() {
            return;
        }

        info!("Removing make dependencies: {}", finished.join(", "));
        if let Err(e) = self.packages.remove(&finished) {
            // Leaving them installed does not affect the built packages
            warn!("Failed to remove make dependencies: {}", e);
        }
        installed_make_deps.retain(|n| !finished.contains(n));
    }
}

/// Installed make dependencies that can be removed after `processed`
fn finished_make_deps(plan: &BuildPlan, processed: usize, installed: &[String]) -> Vec<String> {
    let mut finished: Vec<String> = installed
        .iter()
        .filter(|name| {
            plan.get(name).is_some_and(|entry| {
                entry
                    .dependents
                    .iter()
                    .all(|d| plan.get(d).is_some_and(|e| e.position <= processed))
            })
        })
        .cloned()
        .collect();

    // Drop candidates still required by an installed make dependency that stays
    loop {
        let staying: Vec<String> = finished
            .iter()
            .filter(|name| {
                plan.get(name).is_some_and(|entry| {
                    entry
                        .dependents
                        .iter()
                        .any(|d| installed.contains(d) && !finished.contains(d))
                })
            })
            .cloned()
            .collect();
        if staying.is_empty() {
            return finished;
        }
        finished.retain(|n| !staying.contains(n));
    }
}

/// Version the entry was built as, or the declared one
fn built_version(entry: &BuildSetEntry, outcome: &BuildOutcome) -> String {
    match outcome {
        BuildOutcome::Built(records) => records
            .iter()
            .find(|r| r.name == entry.name)
            .map(|r| r.version.clone())
            .unwrap_or_else(|| entry.version()),
        _ => entry.version(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, outcome: BuildOutcome) -> EntryReport {
        EntryReport {
            name: name.to_string(),
            version: "1.0-1".to_string(),
            role: Role::Explicit,
            outcome,
        }
    }

    #[test]
    fn test_report_success() {
        let report = BuildReport {
            entries: vec![
                entry("a", BuildOutcome::Built(vec![])),
                entry("b", BuildOutcome::UpToDate),
            ],
            ..Default::default()
        };
        assert!(report.success());
        assert_eq!(report.built(), vec!["a"]);
        assert_eq!(report.up_to_date(), vec!["b"]);
    }

    #[test]
    fn test_report_failure() {
        let report = BuildReport {
            entries: vec![
                entry("x", BuildOutcome::Failed("exit 1".to_string())),
                entry("z", BuildOutcome::SkippedDueToDependencyFailure("x".to_string())),
            ],
            ..Default::default()
        };
        assert!(!report.success());
        assert_eq!(report.failed(), vec!["x"]);
        assert_eq!(report.skipped(), vec!["z"]);
    }

    #[test]
    fn test_skipped_alone_is_failure() {
        let report = BuildReport {
            entries: vec![entry(
                "z",
                BuildOutcome::SkippedDueToDependencyFailure("x".to_string()),
            )],
            ..Default::default()
        };
        assert!(!report.success());
    }
}
