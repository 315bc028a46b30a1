// src/packages/pacman.rs

//! pacman-backed package manager
//!
//! Every operation shells out to `pacman` or `pacman-key`; nothing reads
//! the package database directly.

use super::PackageManager;
use crate::error::{Error, Result};
use crate::recipe::Dependency;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::{debug, info};

/// Exit status of `pacman -T` when a dependency is not satisfied
const DEPTEST_UNSATISFIED: i32 = 127;

/// System package manager driven through the pacman CLI
#[derive(Debug, Clone)]
pub struct Pacman {
    pacman: PathBuf,
    pacman_key: PathBuf,
}

impl Default for Pacman {
    fn default() -> Self {
        Self {
            pacman: PathBuf::from("pacman"),
            pacman_key: PathBuf::from("pacman-key"),
        }
    }
}

impl Pacman {
    pub fn new() -> Self {
        Self::default()
    }

    fn run(&self, program: &Path, args: &[&str]) -> Result<Output> {
        debug!("Running {} {}", program.display(), args.join(" "));
        Command::new(program).args(args).output().map_err(|e| {
            Error::PackageManagerError(format!(
                "Failed to run {}: {}. Is pacman installed?",
                program.display(),
                e
            ))
        })
    }

    /// Run a command whose failure is an error
    fn run_checked(&self, program: &Path, args: &[&str]) -> Result<Output> {
        let output = self.run(program, args)?;
        if !output.status.success() {
            return Err(Error::PackageManagerError(format!(
                "{} {} failed: {}",
                program.display(),
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(output)
    }
}

impl PackageManager for Pacman {
    fn installed_version(&self, name: &str) -> Result<Option<String>> {
        let output = self.run(&self.pacman, &["-Q", "--", name])?;
        if !output.status.success() {
            return Ok(None);
        }
        Ok(parse_query_version(&String::from_utf8_lossy(&output.stdout), name))
    }

    fn satisfies(&self, dependency: &Dependency) -> Result<bool> {
        let output = self.run(&self.pacman, &["-T", "--", dependency.raw.as_str()])?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(DEPTEST_UNSATISFIED) => Ok(false),
            _ => Err(Error::PackageManagerError(format!(
                "pacman -T {} failed: {}",
                dependency.raw,
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
        }
    }

    fn available_in_repos(&self, dependency: &Dependency) -> Result<bool> {
        let output = self.run(
            &self.pacman,
            &["-Sp", "--print-format", "%n", "--", dependency.raw.as_str()],
        )?;
        Ok(output.status.success())
    }

    fn refresh_system(&self) -> Result<()> {
        info!("Upgrading system packages");
        self.run_checked(&self.pacman, &["-Syu", "--noconfirm"])?;
        Ok(())
    }

    fn init_keyrings(&self, keyrings: &[String]) -> Result<()> {
        info!("Initializing pacman keyring");
        self.run_checked(&self.pacman_key, &["--init"])?;

        if !keyrings.is_empty() {
            let mut args = vec!["--populate"];
            args.extend(keyrings.iter().map(String::as_str));
            self.run_checked(&self.pacman_key, &args)?;
        }
        Ok(())
    }

    fn install_files(&self, paths: &[PathBuf], as_dependencies: bool) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }

        let paths: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
        let mut args = vec!["-U", "--noconfirm", "--needed"];
        if as_dependencies {
            args.push("--asdeps");
        }
        args.extend(paths.iter().map(String::as_str));

        info!("Installing {}", paths.join(", "));
        self.run_checked(&self.pacman, &args)?;
        Ok(())
    }

    fn remove(&self, names: &[String]) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }

        let mut args = vec!["-Rns", "--noconfirm", "--"];
        args.extend(names.iter().map(String::as_str));

        info!("Removing {}", names.join(", "));
        self.run_checked(&self.pacman, &args)?;
        Ok(())
    }
}

/// Parse `pacman -Q` output (`name version`)
fn parse_query_version(stdout: &str, name: &str) -> Option<String> {
    stdout.lines().find_map(|line| {
        let (pkg, version) = line.trim().split_once(' ')?;
        (pkg == name).then(|| version.trim().to_string())
    })
}
