// src/cli.rs
//! CLI definitions for aur-makepkg
//!
//! Options left unset fall back to the configuration file, then to the
//! built-in defaults. The command implementation is in the `commands`
//! module.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FetchMethodArg {
    /// Download the snapshot tarball
    Archive,
    /// Shallow clone of the recipe repository
    Git,
}

#[derive(Debug, Parser)]
#[command(name = "aur-makepkg")]
#[command(version)]
#[command(about = "Build pacman packages from local recipes and the AUR", long_about = None)]
pub struct Cli {
    /// Packages to build
    #[arg(required = true, value_name = "PACKAGE")]
    pub packages: Vec<String>,

    /// User ID the build tool runs as
    #[arg(long)]
    pub uid: Option<u32>,

    /// Group ID the build tool runs as
    #[arg(long)]
    pub gid: Option<u32>,

    /// Keep make dependencies installed after building
    #[arg(long)]
    pub install_all_dependencies: bool,

    /// Comma-separated keyrings to populate before building
    #[arg(long, value_delimiter = ',', value_name = "KEYRING")]
    pub keyrings: Vec<String>,

    /// Upgrade all installed packages before building
    #[arg(long)]
    pub pacman_update: bool,

    /// Rebuild mode: 0 = only newer versions, 1 = always rebuild requested
    /// packages, 2 = rebuild everything
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=2))]
    pub rebuild: Option<u8>,

    /// Delete downloaded sources after building
    #[arg(long)]
    pub remove_downloaded_source: bool,

    /// Keep older versions of built packages in the output directory
    #[arg(long)]
    pub keep_old_versions: bool,

    /// How remote recipes are fetched
    #[arg(long, value_enum)]
    pub fetch_method: Option<FetchMethodArg>,

    /// Configuration file (TOML)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output directory for built packages
    #[arg(long, value_name = "DIR")]
    pub root_dir: Option<PathBuf>,

    /// Directory holding local recipes, one subdirectory per package
    #[arg(long, value_name = "DIR")]
    pub local_source_dir: Option<PathBuf>,

    /// Scratch directory for recipe working copies
    #[arg(long, value_name = "DIR")]
    pub build_dir: Option<PathBuf>,

    /// Base URL of the AUR
    #[arg(long, value_name = "URL")]
    pub aur_url: Option<String>,

    /// Resolve and print the build plan without building
    #[arg(long)]
    pub dry_run: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from([
            "aur-makepkg",
            "--uid",
            "2000",
            "--keyrings",
            "archlinux,archlinuxarm",
            "--rebuild",
            "1",
            "--fetch-method",
            "git",
            "--remove-downloaded-source",
            "yay",
            "paru",
        ])
        .unwrap();

        assert_eq!(cli.packages, vec!["yay", "paru"]);
        assert_eq!(cli.uid, Some(2000));
        assert_eq!(cli.gid, None);
        assert_eq!(cli.keyrings, vec!["archlinux", "archlinuxarm"]);
        assert_eq!(cli.rebuild, Some(1));
        assert_eq!(cli.fetch_method, Some(FetchMethodArg::Git));
        assert!(cli.remove_downloaded_source);
        assert!(!cli.install_all_dependencies);
    }

    #[test]
    fn test_rebuild_out_of_range() {
        assert!(Cli::try_parse_from(["aur-makepkg", "--rebuild", "3", "yay"]).is_err());
    }

    #[test]
    fn test_packages_required() {
        assert!(Cli::try_parse_from(["aur-makepkg"]).is_err());
    }
}
