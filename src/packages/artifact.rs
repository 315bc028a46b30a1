// src/packages/artifact.rs

//! Artifact store
//!
//! Built packages are collected in a single output directory. Each file is
//! identified by the `pkgname`/`pkgver` in its `.PKGINFO`; when that cannot
//! be read, by its file name (`<name>-<pkgver>-<pkgrel>-<arch>.pkg.tar.<ext>`).
//! Detached signatures (`.sig`) are never treated as packages.

use crate::error::{Error, Result};
use crate::kitchen::BuildIdentity;
use crate::version::vercmp;
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use std::cmp::Ordering;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use tar::Archive;
use tracing::{debug, info, warn};
use xz2::read::XzDecoder;

/// Compression suffixes makepkg may produce (`PKGEXT`)
const PACKAGE_EXTENSIONS: &[&str] = &[
    ".pkg.tar",
    ".pkg.tar.xz",
    ".pkg.tar.zst",
    ".pkg.tar.gz",
    ".pkg.tar.bz2",
    ".pkg.tar.lz4",
    ".pkg.tar.lzo",
    ".pkg.tar.Z",
];

/// Whether a file name looks like a built package
pub fn is_package_file(file_name: &str) -> bool {
    PACKAGE_EXTENSIONS.iter().any(|ext| file_name.ends_with(ext))
}

/// A package file in the artifact store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRecord {
    pub name: String,
    /// Full version `[epoch:]pkgver-pkgrel`
    pub version: String,
    pub path: PathBuf,
    pub created: DateTime<Utc>,
}

impl ArtifactRecord {
    /// Identify a package file
    pub fn from_path(path: &Path) -> Result<Self> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::ParseError(format!("Invalid file name: {}", path.display())))?;

        let (name, version) = match read_pkginfo(path) {
            Some(found) => found,
            None => parse_file_name(file_name).ok_or_else(|| {
                Error::ParseError(format!("Cannot identify package file {}", file_name))
            })?,
        };

        let created = fs::metadata(path)
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        Ok(Self {
            name,
            version,
            path: path.to_path_buf(),
            created,
        })
    }
}

/// Split `<name>-<pkgver>-<pkgrel>-<arch>.pkg.tar.<ext>` into name and version
fn parse_file_name(file_name: &str) -> Option<(String, String)> {
    let stem = &file_name[..file_name.find(".pkg.tar")?];
    let mut parts = stem.rsplitn(4, '-');
    let _arch = parts.next()?;
    let pkgrel = parts.next()?;
    let pkgver = parts.next()?;
    let name = parts.next()?;

    if name.is_empty() || pkgver.is_empty() || pkgrel.is_empty() {
        return None;
    }
    Some((name.to_string(), format!("{}-{}", pkgver, pkgrel)))
}

/// Read `pkgname` and `pkgver` from the `.PKGINFO` member of a package
fn read_pkginfo(path: &Path) -> Option<(String, String)> {
    let file_name = path.file_name()?.to_str()?;
    let file = File::open(path).ok()?;

    let reader: Box<dyn Read> = if file_name.ends_with(".zst") {
        Box::new(zstd::Decoder::new(file).ok()?)
    } else if file_name.ends_with(".xz") {
        Box::new(XzDecoder::new(file))
    } else if file_name.ends_with(".gz") {
        Box::new(GzDecoder::new(file))
    } else if file_name.ends_with(".pkg.tar") {
        Box::new(file)
    } else {
        return None;
    };

    let mut archive = Archive::new(reader);
    for entry in archive.entries().ok()? {
        let mut entry = entry.ok()?;
        if entry.path().ok()?.as_os_str() != ".PKGINFO" {
            continue;
        }

        let mut content = String::new();
        entry.read_to_string(&mut content).ok()?;
        return parse_pkginfo(&content);
    }

    None
}

fn parse_pkginfo(content: &str) -> Option<(String, String)> {
    let mut name = None;
    let mut version = None;

    for line in content.lines() {
        let line = line.trim();
        if line.starts_with('#') {
            continue;
        }
        match line.split_once('=') {
            Some((key, value)) if key.trim() == "pkgname" => name = Some(value.trim().to_string()),
            Some((key, value)) if key.trim() == "pkgver" => version = Some(value.trim().to_string()),
            _ => {}
        }
    }

    Some((name?, version?))
}

/// Output directory for built packages
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
    owner: Option<BuildIdentity>,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            owner: None,
        }
    }

    /// Hand stored files to the given user and group
    pub fn with_owner(mut self, owner: BuildIdentity) -> Self {
        self.owner = Some(owner);
        self
    }

    /// All package files currently in the store
    pub fn scan(&self) -> Result<Vec<ArtifactRecord>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_package = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(is_package_file);
            if !is_package || !path.is_file() {
                continue;
            }

            match ArtifactRecord::from_path(&path) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping {}: {}", path.display(), e),
            }
        }

        records.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(records)
    }

    /// Stored files of one package
    pub fn records_for(&self, name: &str) -> Result<Vec<ArtifactRecord>> {
        Ok(self.scan()?.into_iter().filter(|r| r.name == name).collect())
    }

    /// Newest stored file of one package
    pub fn newest(&self, name: &str) -> Result<Option<ArtifactRecord>> {
        Ok(self
            .records_for(name)?
            .into_iter()
            .max_by(|a, b| vercmp(&a.version, &b.version)))
    }

    /// Newest stored version of one package
    pub fn newest_version(&self, name: &str) -> Result<Option<String>> {
        Ok(self.newest(name)?.map(|r| r.version))
    }

    /// Copy a package file into the store
    pub fn store(&self, src: &Path) -> Result<ArtifactRecord> {
        let file_name = src
            .file_name()
            .ok_or_else(|| Error::IoError(format!("Invalid package path: {}", src.display())))?;

        fs::create_dir_all(&self.dir)?;
        let dest = self.dir.join(file_name);
        fs::copy(src, &dest).map_err(|e| {
            Error::IoError(format!(
                "Failed to copy {} to {}: {}",
                src.display(),
                dest.display(),
                e
            ))
        })?;

        if let Some(owner) = self.owner {
            owner.apply(&dest)?;
        }

        let mut record = ArtifactRecord::from_path(&dest)?;
        record.created = Utc::now();
        info!("Stored {}", dest.display());
        Ok(record)
    }

    /// Delete stored files of `name` strictly older than `version`
    ///
    /// Returns the removed paths.
    pub fn prune_older(&self, name: &str, version: &str) -> Result<Vec<PathBuf>> {
        let mut removed = Vec::new();

        for record in self.records_for(name)? {
            if vercmp(&record.version, version) != Ordering::Less {
                continue;
            }

            debug!("Removing old artifact {}", record.path.display());
            fs::remove_file(&record.path)?;

            let mut sig = record.path.clone().into_os_string();
            sig.push(".sig");
            let sig = PathBuf::from(sig);
            if sig.exists() {
                fs::remove_file(&sig)?;
            }

            removed.push(record.path);
        }

        Ok(removed)
    }
}
