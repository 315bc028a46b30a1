// src/source/fetch.rs

//! Recipe download strategies

use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use reqwest::blocking::Client;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Command;
use tar::Archive;
use tracing::debug;

/// Downloads the recipe files at a URL into a directory
pub trait Fetcher: Send + Sync {
    /// `dest` must not exist yet; on success it holds the recipe files
    fn fetch(&self, url: &str, dest: &Path) -> Result<()>;
}

/// Fetches gzip-compressed snapshot tarballs
pub struct ArchiveFetcher {
    client: Client,
}

impl ArchiveFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl Fetcher for ArchiveFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        debug!("Downloading snapshot {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| Error::DownloadError(format!("Failed to download {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::DownloadError(format!(
                "Failed to download {}: HTTP {}",
                url,
                response.status()
            )));
        }

        unpack_snapshot(response, dest)
    }
}

/// Unpack a snapshot tarball into `dest`
///
/// Snapshots wrap the recipe in a single top-level directory named after
/// the package base; its contents become `dest`.
pub(crate) fn unpack_snapshot(reader: impl Read, dest: &Path) -> Result<()> {
    let parent = dest
        .parent()
        .ok_or_else(|| Error::IoError(format!("{} has no parent directory", dest.display())))?;
    fs::create_dir_all(parent)?;

    let staging = tempfile::Builder::new()
        .prefix(".snapshot-")
        .tempdir_in(parent)?;

    Archive::new(GzDecoder::new(reader))
        .unpack(staging.path())
        .map_err(|e| Error::DownloadError(format!("Failed to unpack snapshot: {}", e)))?;

    let entries: Vec<PathBuf> = fs::read_dir(staging.path())?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();

    let root = match entries.as_slice() {
        [single] if single.is_dir() => single.clone(),
        _ => staging.path().to_path_buf(),
    };

    fs::rename(&root, dest).map_err(|e| {
        Error::IoError(format!("Failed to move snapshot to {}: {}", dest.display(), e))
    })?;

    Ok(())
}

/// Fetches recipes with a shallow `git clone`
#[derive(Debug, Default)]
pub struct GitFetcher {
    program: Option<PathBuf>,
}

impl GitFetcher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Fetcher for GitFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        debug!("Cloning {}", url);

        let program = self.program.as_deref().unwrap_or(Path::new("git"));
        let output = Command::new(program)
            .args(["clone", "--depth", "1", "--quiet", url])
            .arg(dest)
            .output()
            .map_err(|e| Error::DownloadError(format!("Failed to run git: {}", e)))?;

        if !output.status.success() {
            return Err(Error::DownloadError(format!(
                "git clone {} failed: {}",
                url,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(())
    }
}
