// src/kitchen/tool.rs

//! The external build tool
//!
//! [`Makepkg`] runs `makepkg` in a recipe working copy as an unprivileged
//! user. The [`BuildTool`] trait keeps the executor independent of the
//! real tool so builds can be simulated.

use crate::error::{Error, Result};
use nix::unistd::{Gid, Uid, chown};
use serde::{Deserialize, Serialize};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;
use walkdir::WalkDir;

/// Number of trailing stderr lines kept in a failure reason
const STDERR_TAIL_LINES: usize = 20;

/// User and group a build runs as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildIdentity {
    pub uid: u32,
    pub gid: u32,
}

impl BuildIdentity {
    /// The identity of the current process
    pub fn current() -> Self {
        Self {
            uid: Uid::current().as_raw(),
            gid: Gid::current().as_raw(),
        }
    }

    /// Hand one path to this identity
    pub fn apply(&self, path: &Path) -> Result<()> {
        chown(
            path,
            Some(Uid::from_raw(self.uid)),
            Some(Gid::from_raw(self.gid)),
        )
        .map_err(|e| {
            Error::IoError(format!(
                "Failed to change owner of {} to {}:{}: {}",
                path.display(),
                self.uid,
                self.gid,
                e
            ))
        })
    }

    /// Hand a directory tree to this identity; symlinks are left alone
    pub fn apply_recursive(&self, dir: &Path) -> Result<()> {
        for entry in WalkDir::new(dir) {
            let entry = entry
                .map_err(|e| Error::IoError(format!("Failed to walk {}: {}", dir.display(), e)))?;
            if entry.path_is_symlink() {
                continue;
            }
            self.apply(entry.path())?;
        }
        Ok(())
    }
}

/// One invocation of the build tool
#[derive(Debug, Clone)]
pub struct BuildInvocation {
    /// Recipe working copy; the tool runs here
    pub dir: PathBuf,
    pub identity: BuildIdentity,
    /// Ask the tool to uninstall the make dependencies it installed
    pub remove_make_deps: bool,
    /// Where the tool writes package files
    pub package_dest: PathBuf,
}

/// What the build tool reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutcome {
    /// Exit code; `None` when terminated by a signal
    pub exit_code: Option<i32>,
    pub stderr: String,
}

impl ToolOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Short failure description with the tail of stderr
    pub fn failure_reason(&self) -> String {
        let status = match self.exit_code {
            Some(code) => format!("build tool exited with status {}", code),
            None => "build tool was terminated by a signal".to_string(),
        };

        let lines: Vec<&str> = self.stderr.lines().filter(|l| !l.trim().is_empty()).collect();
        if lines.is_empty() {
            return status;
        }
        let tail = &lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..];
        format!("{}:\n{}", status, tail.join("\n"))
    }
}

/// Runs a build in a recipe directory
pub trait BuildTool: Send + Sync {
    /// Run to completion; a non-zero exit is reported, not returned as error
    fn run(&self, invocation: &BuildInvocation) -> Result<ToolOutcome>;
}

/// `makepkg --force --syncdeps --noconfirm`
#[derive(Debug, Clone)]
pub struct Makepkg {
    program: PathBuf,
}

impl Default for Makepkg {
    fn default() -> Self {
        Self {
            program: PathBuf::from("makepkg"),
        }
    }
}

impl Makepkg {
    pub fn new() -> Self {
        Self::default()
    }

    fn arguments(invocation: &BuildInvocation) -> Vec<&'static str> {
        let mut args = vec!["--force", "--syncdeps", "--noconfirm"];
        if invocation.remove_make_deps {
            args.push("--rmdeps");
        }
        args
    }
}

impl BuildTool for Makepkg {
    fn run(&self, invocation: &BuildInvocation) -> Result<ToolOutcome> {
        let args = Self::arguments(invocation);
        debug!(
            "Running {} {} in {} as {}:{}",
            self.program.display(),
            args.join(" "),
            invocation.dir.display(),
            invocation.identity.uid,
            invocation.identity.gid
        );

        let output = Command::new(&self.program)
            .args(&args)
            .current_dir(&invocation.dir)
            .env("PKGDEST", &invocation.package_dest)
            .uid(invocation.identity.uid)
            .gid(invocation.identity.gid)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                Error::BuildToolError(format!(
                    "Failed to run {}: {}",
                    self.program.display(),
                    e
                ))
            })?;

        Ok(ToolOutcome {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
