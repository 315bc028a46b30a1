// src/source/aur.rs

//! AUR client
//!
//! Package lookups use the RPC `info` endpoint (version 5):
//!
//! ```text
//! GET {aur_url}/rpc/v5/info?arg[]=yay
//! {"resultcount":1,"results":[{"Name":"yay","PackageBase":"yay",
//!   "Version":"12.4.2-1","URLPath":"/cgit/aur.git/snapshot/yay.tar.gz",...}],
//!  "type":"multiinfo","version":5}
//! ```
//!
//! Recipes are then fetched either as the snapshot tarball at `URLPath` or
//! by cloning `{aur_url}/{PackageBase}.git`.

use super::fetch::{ArchiveFetcher, Fetcher, GitFetcher};
use super::{FetchMethod, RemoteRepository};
use crate::error::{Error, Result};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Default timeout for RPC requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// A package known to the remote repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePackage {
    pub name: String,
    /// Recipe repository the package is built from
    pub package_base: String,
    pub version: String,
    /// Snapshot path relative to the repository URL
    pub url_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    results: Vec<RpcPackage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RpcPackage {
    name: String,
    package_base: String,
    version: String,
    #[serde(rename = "URLPath")]
    url_path: Option<String>,
}

impl From<RpcPackage> for RemotePackage {
    fn from(p: RpcPackage) -> Self {
        Self {
            name: p.name,
            package_base: p.package_base,
            version: p.version,
            url_path: p.url_path,
        }
    }
}

/// Remote repository backed by the AUR web interface
pub struct AurClient {
    base: Url,
    client: Client,
    archive: Arc<dyn Fetcher>,
    git: Arc<dyn Fetcher>,
}

impl AurClient {
    /// Create a client for the repository at `base_url`
    pub fn new(base_url: &str) -> Result<Self> {
        // Relative joins need the base path to end in a slash
        let base = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))
            .map_err(|e| Error::InitError(format!("Invalid repository URL '{}': {}", base_url, e)))?;

        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("aur-makepkg/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::InitError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base,
            archive: Arc::new(ArchiveFetcher::new(client.clone())),
            git: Arc::new(GitFetcher::new()),
            client,
        })
    }

    fn info_url(&self) -> Result<Url> {
        self.base
            .join("rpc/v5/info")
            .map_err(|e| Error::InitError(format!("Invalid RPC URL: {}", e)))
    }

    fn snapshot_url(&self, package: &RemotePackage) -> Result<Url> {
        let path = match &package.url_path {
            Some(path) => path.clone(),
            None => format!("/cgit/aur.git/snapshot/{}.tar.gz", package.package_base),
        };
        self.base
            .join(&path)
            .map_err(|e| Error::DownloadError(format!("Invalid snapshot path '{}': {}", path, e)))
    }

    fn clone_url(&self, package: &RemotePackage) -> Result<Url> {
        self.base
            .join(&format!("{}.git", package.package_base))
            .map_err(|e| Error::DownloadError(format!("Invalid clone URL: {}", e)))
    }
}

impl RemoteRepository for AurClient {
    fn lookup(&self, name: &str) -> Result<Option<RemotePackage>> {
        let url = self.info_url()?;
        debug!("Querying {} for {}", url, name);

        let response = self
            .client
            .get(url)
            .query(&[("arg[]", name)])
            .send()
            .map_err(|e| Error::DownloadError(format!("RPC request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::DownloadError(format!(
                "RPC request failed with HTTP {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .map_err(|e| Error::DownloadError(format!("Failed to read RPC response: {}", e)))?;
        parse_info_response(&body, name)
    }

    fn fetch(&self, package: &RemotePackage, method: FetchMethod, dest: &Path) -> Result<()> {
        match method {
            FetchMethod::Archive => self.archive.fetch(self.snapshot_url(package)?.as_str(), dest),
            FetchMethod::Git => self.git.fetch(self.clone_url(package)?.as_str(), dest),
        }
    }
}

/// Pick the exact-name match out of an `info` response
fn parse_info_response(body: &str, name: &str) -> Result<Option<RemotePackage>> {
    let response: RpcResponse = serde_json::from_str(body)
        .map_err(|e| Error::ParseError(format!("Invalid RPC response: {}", e)))?;

    if response.kind == "error" {
        return Err(Error::DownloadError(format!(
            "RPC error: {}",
            response.error.unwrap_or_default()
        )));
    }

    Ok(response
        .results
        .into_iter()
        .find(|p| p.name == name)
        .map(RemotePackage::from))
}
