// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.
//!
//! The system collaborators are replaced by in-memory fakes: a remote
//! repository that writes PKGBUILDs on fetch, a package manager backed by a
//! map, and a build tool that drops empty package files.

#![allow(dead_code)]

use aur_makepkg::recipe::load_recipe;
use aur_makepkg::{
    ArtifactRecord, BuildConfig, BuildIdentity, BuildInvocation, BuildTool, Dependency, Error,
    FetchMethod, Orchestrator, PackageManager, RemotePackage, RemoteRepository, Result,
    ToolOutcome,
};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Render a minimal PKGBUILD
///
/// `version` is `pkgver-pkgrel`.
pub fn pkgbuild(name: &str, version: &str, depends: &[&str], makedepends: &[&str]) -> String {
    split_pkgbuild(name, &[name], version, depends, makedepends)
}

/// Render a PKGBUILD producing several packages from one base
pub fn split_pkgbuild(
    base: &str,
    names: &[&str],
    version: &str,
    depends: &[&str],
    makedepends: &[&str],
) -> String {
    let (pkgver, pkgrel) = version.split_once('-').unwrap_or((version, "1"));
    let quote = |items: &[&str]| {
        items
            .iter()
            .map(|i| format!("'{}'", i))
            .collect::<Vec<_>>()
            .join(" ")
    };

    let mut content = format!("pkgbase={}\n", base);
    if names.len() == 1 {
        content.push_str(&format!("pkgname={}\n", names[0]));
    } else {
        content.push_str(&format!("pkgname=({})\n", quote(names)));
    }
    content.push_str(&format!("pkgver={}\npkgrel={}\narch=('any')\n", pkgver, pkgrel));
    if !depends.is_empty() {
        content.push_str(&format!("depends=({})\n", quote(depends)));
    }
    if !makedepends.is_empty() {
        content.push_str(&format!("makedepends=({})\n", quote(makedepends)));
    }
    content.push_str("\npackage() {\n    true\n}\n");
    content
}

/// A package known to the fake remote
struct RemoteEntry {
    package: RemotePackage,
    pkgbuild: String,
}

/// In-memory remote repository
#[derive(Default)]
pub struct FakeRemote {
    packages: Mutex<HashMap<String, RemoteEntry>>,
    pub lookups: Mutex<Vec<String>>,
    pub fetches: Mutex<Vec<String>>,
}

impl FakeRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add(&self, name: &str, version: &str, depends: &[&str], makedepends: &[&str]) {
        self.add_split(name, &[name], version, depends, makedepends);
    }

    /// Register every name of a split recipe
    pub fn add_split(
        &self,
        base: &str,
        names: &[&str],
        version: &str,
        depends: &[&str],
        makedepends: &[&str],
    ) {
        let content = split_pkgbuild(base, names, version, depends, makedepends);
        let mut packages = self.packages.lock().unwrap();
        for name in names {
            packages.insert(
                name.to_string(),
                RemoteEntry {
                    package: RemotePackage {
                        name: name.to_string(),
                        package_base: base.to_string(),
                        version: version.to_string(),
                        url_path: None,
                    },
                    pkgbuild: content.clone(),
                },
            );
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }
}

impl RemoteRepository for FakeRemote {
    fn lookup(&self, name: &str) -> Result<Option<RemotePackage>> {
        self.lookups.lock().unwrap().push(name.to_string());
        Ok(self
            .packages
            .lock()
            .unwrap()
            .get(name)
            .map(|e| e.package.clone()))
    }

    fn fetch(&self, package: &RemotePackage, _method: FetchMethod, dest: &Path) -> Result<()> {
        self.fetches.lock().unwrap().push(package.package_base.clone());
        let content = self
            .packages
            .lock()
            .unwrap()
            .get(&package.name)
            .map(|e| e.pkgbuild.clone())
            .ok_or_else(|| Error::DownloadError(package.name.clone()))?;

        fs::create_dir_all(dest)?;
        fs::write(dest.join("PKGBUILD"), content)?;
        Ok(())
    }
}

/// Package manager backed by a map of installed versions
#[derive(Default)]
pub struct FakePackageManager {
    pub installed: Mutex<HashMap<String, String>>,
    /// Names the binary repositories provide
    pub repository: Mutex<HashSet<String>>,
    /// Every install call: (package names, as dependencies)
    pub installs: Mutex<Vec<(Vec<String>, bool)>>,
    pub removals: Mutex<Vec<Vec<String>>>,
    pub refreshed: Mutex<bool>,
    pub keyrings: Mutex<Vec<String>>,
}

impl FakePackageManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn install(&self, name: &str, version: &str) {
        self.installed
            .lock()
            .unwrap()
            .insert(name.to_string(), version.to_string());
    }

    pub fn provide_from_repository(&self, name: &str) {
        self.repository.lock().unwrap().insert(name.to_string());
    }

    pub fn is_installed(&self, name: &str) -> bool {
        self.installed.lock().unwrap().contains_key(name)
    }

    pub fn installed_names(&self) -> Vec<String> {
        self.installs
            .lock()
            .unwrap()
            .iter()
            .flat_map(|(names, _)| names.clone())
            .collect()
    }
}

impl PackageManager for FakePackageManager {
    fn installed_version(&self, name: &str) -> Result<Option<String>> {
        Ok(self.installed.lock().unwrap().get(name).cloned())
    }

    fn available_in_repos(&self, dependency: &Dependency) -> Result<bool> {
        Ok(self.repository.lock().unwrap().contains(&dependency.name))
    }

    fn refresh_system(&self) -> Result<()> {
        *self.refreshed.lock().unwrap() = true;
        Ok(())
    }

    fn init_keyrings(&self, keyrings: &[String]) -> Result<()> {
        self.keyrings.lock().unwrap().extend(keyrings.iter().cloned());
        Ok(())
    }

    fn install_files(&self, paths: &[PathBuf], as_dependencies: bool) -> Result<()> {
        let mut names = Vec::new();
        for path in paths {
            let record = ArtifactRecord::from_path(path)?;
            self.install(&record.name, &record.version);
            names.push(record.name);
        }
        self.installs.lock().unwrap().push((names, as_dependencies));
        Ok(())
    }

    fn remove(&self, names: &[String]) -> Result<()> {
        let mut installed = self.installed.lock().unwrap();
        for name in names {
            installed.remove(name);
        }
        self.removals.lock().unwrap().push(names.to_vec());
        Ok(())
    }
}

/// Build tool that writes one empty package file per recipe package
#[derive(Default)]
pub struct FakeBuildTool {
    /// Package bases whose build fails
    failing: Mutex<HashSet<String>>,
    /// Package bases built at a version other than the declared one
    versions: Mutex<HashMap<String, String>>,
    pub invocations: Mutex<Vec<BuildInvocation>>,
}

impl FakeBuildTool {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail(&self, base: &str) {
        self.failing.lock().unwrap().insert(base.to_string());
    }

    /// Produce `version` for `base`, as a `pkgver()` function would
    pub fn produce_version(&self, base: &str, version: &str) {
        self.versions
            .lock()
            .unwrap()
            .insert(base.to_string(), version.to_string());
    }

    pub fn built_dirs(&self) -> Vec<PathBuf> {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .map(|i| i.dir.clone())
            .collect()
    }
}

impl BuildTool for FakeBuildTool {
    fn run(&self, invocation: &BuildInvocation) -> Result<ToolOutcome> {
        self.invocations.lock().unwrap().push(invocation.clone());
        let recipe = load_recipe(&invocation.dir)?;

        if self.failing.lock().unwrap().contains(&recipe.pkgbase) {
            return Ok(ToolOutcome {
                exit_code: Some(4),
                stderr: "==> ERROR: A failure occurred in build().\n    Aborting...".to_string(),
            });
        }

        let version = self
            .versions
            .lock()
            .unwrap()
            .get(&recipe.pkgbase)
            .cloned()
            .unwrap_or_else(|| recipe.full_version());
        for name in &recipe.pkgnames {
            let file = format!("{}-{}-any.pkg.tar.lz4", name, version);
            fs::write(invocation.package_dest.join(file), name)?;
        }
        Ok(ToolOutcome {
            exit_code: Some(0),
            stderr: String::new(),
        })
    }
}

/// Temporary directory layout plus fakes for one run
pub struct TestEnv {
    _dir: TempDir,
    pub config: BuildConfig,
    pub remote: Arc<FakeRemote>,
    pub packages: Arc<FakePackageManager>,
    pub tool: Arc<FakeBuildTool>,
}

impl TestEnv {
    /// Create an environment with empty local recipes, remote and system
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let identity = BuildIdentity::current();
        let config = BuildConfig {
            root_dir: dir.path().join("makepkg"),
            local_source_dir: dir.path().join("makepkg/local_src"),
            build_dir: dir.path().join("build"),
            uid: identity.uid,
            gid: identity.gid,
            ..Default::default()
        };

        Self {
            _dir: dir,
            config,
            remote: FakeRemote::new(),
            packages: FakePackageManager::new(),
            tool: FakeBuildTool::new(),
        }
    }

    /// Write a local recipe directory
    pub fn local_recipe(&self, name: &str, version: &str, depends: &[&str], makedepends: &[&str]) {
        let dir = self.config.local_source_dir.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("PKGBUILD"), pkgbuild(name, version, depends, makedepends)).unwrap();
    }

    /// Place an already built package file in the artifact store
    pub fn stored_artifact(&self, name: &str, version: &str) -> PathBuf {
        fs::create_dir_all(&self.config.root_dir).unwrap();
        let path = self
            .config
            .root_dir
            .join(format!("{}-{}-any.pkg.tar.lz4", name, version));
        fs::write(&path, name).unwrap();
        path
    }

    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(
            self.config.clone(),
            self.remote.clone(),
            self.packages.clone(),
            self.tool.clone(),
        )
        .unwrap()
    }
}

/// Owned request list
pub fn names(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
