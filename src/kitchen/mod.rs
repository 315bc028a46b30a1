// src/kitchen/mod.rs

//! Build executor
//!
//! The Kitchen turns one build-set entry into package files:
//!
//! 1. Hand the working copy to the build user
//! 2. Run the build tool in it, with package output in the same directory
//! 3. Copy the produced packages into the artifact store
//! 4. Prune older stored versions of the same packages
//!
//! A failed build is an outcome, not an error: it is reported back so the
//! orchestrator can skip the entries that depend on it.

mod tool;

pub use tool::{BuildIdentity, BuildInvocation, BuildTool, Makepkg, ToolOutcome};

use crate::error::Result;
use crate::packages::{ArtifactRecord, ArtifactStore, is_package_file};
use crate::resolver::BuildSetEntry;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Result of executing one entry
#[derive(Debug, Clone)]
pub enum CookResult {
    /// Packages stored in the artifact store
    Built(Vec<ArtifactRecord>),
    /// The build did not produce usable packages
    Failed(String),
}

/// Kitchen configuration
#[derive(Debug, Clone, Copy)]
pub struct KitchenConfig {
    pub identity: BuildIdentity,
    /// Ask the build tool to remove the make dependencies it installed
    pub remove_make_deps: bool,
    /// Keep older stored versions after a newer build
    pub keep_old_versions: bool,
}

/// Runs builds and files their output
pub struct Kitchen {
    tool: Arc<dyn BuildTool>,
    store: ArtifactStore,
    config: KitchenConfig,
}

impl Kitchen {
    pub fn new(tool: Arc<dyn BuildTool>, store: ArtifactStore, config: KitchenConfig) -> Self {
        Self {
            tool,
            store: store.with_owner(config.identity),
            config,
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Build one entry
    pub fn cook(&self, entry: &BuildSetEntry) -> CookResult {
        match self.try_cook(entry) {
            Ok(result) => result,
            Err(e) => {
                error!("Build of {} failed: {}", entry.name, e);
                CookResult::Failed(e.to_string())
            }
        }
    }

    fn try_cook(&self, entry: &BuildSetEntry) -> Result<CookResult> {
        let dir = &entry.source.path;
        info!("Building {} {} in {}", entry.name, entry.version(), dir.display());

        clear_stale_packages(dir)?;
        self.config.identity.apply_recursive(dir)?;

        let invocation = BuildInvocation {
            dir: dir.clone(),
            identity: self.config.identity,
            remove_make_deps: self.config.remove_make_deps,
            package_dest: dir.clone(),
        };
        let outcome = self.tool.run(&invocation)?;
        if !outcome.success() {
            let reason = outcome.failure_reason();
            error!("Build of {} failed: {}", entry.name, reason);
            return Ok(CookResult::Failed(reason));
        }

        let produced = self.collect(entry)?;
        if produced.is_empty() {
            return Ok(CookResult::Failed(format!(
                "build tool produced no package files in {}",
                dir.display()
            )));
        }

        let mut stored = Vec::with_capacity(produced.len());
        for record in produced {
            let record = self.store.store(&record.path)?;
            if !self.config.keep_old_versions {
                for removed in self.store.prune_older(&record.name, &record.version)? {
                    info!("Removed old artifact {}", removed.display());
                }
            }
            stored.push(record);
        }

        info!("Built {} ({} package file(s))", entry.name, stored.len());
        Ok(CookResult::Built(stored))
    }

    /// Package files in the working copy that belong to the entry's recipe
    ///
    /// The version is whatever the build produced: `pkgver()` may replace
    /// the declared one, as VCS recipes do.
    fn collect(&self, entry: &BuildSetEntry) -> Result<Vec<ArtifactRecord>> {
        let mut records = Vec::new();

        for dir_entry in fs::read_dir(&entry.source.path)? {
            let path = dir_entry?.path();
            let is_package = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(is_package_file);
            if !is_package || !path.is_file() {
                continue;
            }

            match ArtifactRecord::from_path(&path) {
                Ok(record) if entry.source.recipe.provides_name(&record.name) => {
                    if record.version != entry.version() {
                        info!(
                            "{} built as {} (recipe declares {})",
                            record.name,
                            record.version,
                            entry.version()
                        );
                    }
                    records.push(record)
                }
                Ok(record) => {
                    info!("Ignoring {} {} in working copy", record.name, record.version)
                }
                Err(e) => warn!("Ignoring {}: {}", path.display(), e),
            }
        }

        records.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(records)
    }
}

/// Remove package files left in a working copy by earlier builds
///
/// A kept working copy still holds the previous output; after the build
/// every package file in it must come from this run.
fn clear_stale_packages(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }

    for dir_entry in fs::read_dir(dir)? {
        let path = dir_entry?.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let stale = is_package_file(file_name)
            || file_name
                .strip_suffix(".sig")
                .is_some_and(is_package_file);
        if stale && path.is_file() {
            debug!("Removing stale package {}", path.display());
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::recipe::Recipe;
    use crate::resolver::{Decision, Role};
    use crate::source::{Origin, RecipeSource, RetentionPolicy};
    use std::sync::Mutex;

    /// Writes one package file, or fails
    struct ScriptedTool {
        exit_code: i32,
        /// Version the produced file carries
        version: &'static str,
        calls: Mutex<Vec<BuildInvocation>>,
    }

    impl ScriptedTool {
        fn new(exit_code: i32) -> Self {
            Self::producing(exit_code, "1.0-1")
        }

        fn producing(exit_code: i32, version: &'static str) -> Self {
            Self {
                exit_code,
                version,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl BuildTool for ScriptedTool {
        fn run(&self, invocation: &BuildInvocation) -> Result<ToolOutcome> {
            self.calls.lock().unwrap().push(invocation.clone());
            if self.exit_code == 0 {
                let file = format!("foo-{}-any.pkg.tar.lz4", self.version);
                fs::write(invocation.package_dest.join(&file), "pkg")?;
                fs::write(invocation.package_dest.join(format!("{}.sig", file)), "sig")?;
            }
            Ok(ToolOutcome {
                exit_code: Some(self.exit_code),
                stderr: "==> ERROR: A failure occurred in build().".to_string(),
            })
        }
    }

    struct BrokenTool;

    impl BuildTool for BrokenTool {
        fn run(&self, _: &BuildInvocation) -> Result<ToolOutcome> {
            Err(Error::BuildToolError("spawn failed".to_string()))
        }
    }

    fn entry(dir: &Path) -> BuildSetEntry {
        BuildSetEntry {
            name: "foo".to_string(),
            source: RecipeSource {
                name: "foo".to_string(),
                origin: Origin::Local,
                path: dir.to_path_buf(),
                fetch_method: None,
                recipe: Recipe {
                    pkgbase: "foo".to_string(),
                    pkgnames: vec!["foo".to_string()],
                    pkgver: "1.0".to_string(),
                    pkgrel: "1".to_string(),
                    ..Default::default()
                },
                retention: RetentionPolicy::Keep,
            },
            position: 0,
            decision: Decision::Build,
            role: Role::Explicit,
            known_version: None,
            dependencies: vec![],
            dependents: vec![],
        }
    }

    fn kitchen(tool: Arc<dyn BuildTool>, out: &Path, keep_old_versions: bool) -> Kitchen {
        Kitchen::new(
            tool,
            ArtifactStore::new(out),
            KitchenConfig {
                identity: BuildIdentity::current(),
                remove_make_deps: true,
                keep_old_versions,
            },
        )
    }

    #[test]
    fn test_cook_stores_and_prunes() {
        let work = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        fs::write(out.path().join("foo-0.5-1-any.pkg.tar.lz4"), "older").unwrap();
        // Left over in the working copy from an earlier build
        fs::write(work.path().join("foo-0.9-1-any.pkg.tar.lz4"), "old").unwrap();
        fs::write(work.path().join("foo-0.9-1-any.pkg.tar.lz4.sig"), "old").unwrap();

        let tool = Arc::new(ScriptedTool::new(0));
        let kitchen = kitchen(tool.clone(), out.path(), false);

        let CookResult::Built(records) = kitchen.cook(&entry(work.path())) else {
            panic!("expected a successful build");
        };
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].version, "1.0-1");
        assert!(out.path().join("foo-1.0-1-any.pkg.tar.lz4").is_file());
        assert!(!out.path().join("foo-0.5-1-any.pkg.tar.lz4").exists());
        assert!(!out.path().join("foo-0.9-1-any.pkg.tar.lz4").exists());
        assert!(!work.path().join("foo-0.9-1-any.pkg.tar.lz4").exists());
        assert!(!work.path().join("foo-0.9-1-any.pkg.tar.lz4.sig").exists());

        let calls = tool.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].remove_make_deps);
        assert_eq!(calls[0].package_dest, work.path());
    }

    #[test]
    fn test_keep_old_versions() {
        let work = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        fs::write(out.path().join("foo-0.5-1-any.pkg.tar.lz4"), "older").unwrap();

        let tool = Arc::new(ScriptedTool::new(0));
        let kitchen = kitchen(tool, out.path(), true);
        assert!(matches!(kitchen.cook(&entry(work.path())), CookResult::Built(_)));
        assert!(out.path().join("foo-0.5-1-any.pkg.tar.lz4").exists());
    }

    #[test]
    fn test_non_zero_exit_is_failed() {
        let work = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let tool = Arc::new(ScriptedTool::new(2));

        match kitchen(tool, out.path(), false).cook(&entry(work.path())) {
            CookResult::Failed(reason) => {
                assert!(reason.contains("status 2"));
                assert!(reason.contains("A failure occurred"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(ArtifactStore::new(out.path()).scan().unwrap().is_empty());
    }

    #[test]
    fn test_version_set_by_build_is_accepted() {
        let work = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        fs::write(out.path().join("foo-1.0.r3.g1234567-1-any.pkg.tar.lz4"), "older").unwrap();

        let tool = Arc::new(ScriptedTool::producing(0, "1.0.r5.gabc-1"));
        let CookResult::Built(records) = kitchen(tool, out.path(), false).cook(&entry(work.path())) else {
            panic!("expected a successful build");
        };

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].version, "1.0.r5.gabc-1");
        assert!(out.path().join("foo-1.0.r5.gabc-1-any.pkg.tar.lz4").is_file());
        assert!(!out.path().join("foo-1.0.r3.g1234567-1-any.pkg.tar.lz4").exists());
    }

    #[test]
    fn test_other_packages_in_working_copy_ignored() {
        let work = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();

        struct NeighbourTool;
        impl BuildTool for NeighbourTool {
            fn run(&self, invocation: &BuildInvocation) -> Result<ToolOutcome> {
                fs::write(invocation.package_dest.join("foo-1.0-1-any.pkg.tar.lz4"), "pkg")?;
                fs::write(invocation.package_dest.join("bar-2.0-1-any.pkg.tar.lz4"), "pkg")?;
                Ok(ToolOutcome {
                    exit_code: Some(0),
                    stderr: String::new(),
                })
            }
        }

        let CookResult::Built(records) =
            kitchen(Arc::new(NeighbourTool), out.path(), false).cook(&entry(work.path()))
        else {
            panic!("expected a successful build");
        };
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "foo");
        assert!(!out.path().join("bar-2.0-1-any.pkg.tar.lz4").exists());
    }

    #[test]
    fn test_tool_error_is_failed() {
        let work = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        assert!(matches!(
            kitchen(Arc::new(BrokenTool), out.path(), false).cook(&entry(work.path())),
            CookResult::Failed(_)
        ));
    }
}
