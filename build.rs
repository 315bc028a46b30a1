// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Flag without a value
fn flag(id: &'static str, help: &'static str) -> Arg {
    Arg::new(id)
        .long(id)
        .action(ArgAction::SetTrue)
        .help(help)
}

/// Option taking one value
fn option(id: &'static str, value_name: &'static str, help: &'static str) -> Arg {
    Arg::new(id).long(id).value_name(value_name).help(help)
}

fn build_cli() -> Command {
    Command::new("aur-makepkg")
        .version(env!("CARGO_PKG_VERSION"))
        .author("aur-makepkg Contributors")
        .about("Build pacman packages from local recipes and the AUR")
        .arg(
            Arg::new("packages")
                .value_name("PACKAGE")
                .required(true)
                .num_args(1..)
                .help("Packages to build"),
        )
        .arg(option("uid", "UID", "User ID the build tool runs as (default: 1000)"))
        .arg(option("gid", "GID", "Group ID the build tool runs as (default: 1000)"))
        .arg(flag(
            "install-all-dependencies",
            "Keep make dependencies installed after building",
        ))
        .arg(option(
            "keyrings",
            "KEYRING,...",
            "Comma-separated keyrings to populate before building",
        ))
        .arg(flag("pacman-update", "Upgrade all installed packages before building"))
        .arg(option(
            "rebuild",
            "MODE",
            "0 = only newer versions, 1 = always rebuild requested packages, 2 = rebuild everything",
        ))
        .arg(flag(
            "remove-downloaded-source",
            "Delete downloaded sources after building",
        ))
        .arg(flag(
            "keep-old-versions",
            "Keep older versions of built packages in the output directory",
        ))
        .arg(option(
            "fetch-method",
            "archive|git",
            "How remote recipes are fetched (default: archive)",
        ))
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .help("Configuration file (TOML)"),
        )
        .arg(option(
            "root-dir",
            "DIR",
            "Output directory for built packages (default: /makepkg)",
        ))
        .arg(option(
            "local-source-dir",
            "DIR",
            "Directory holding local recipes (default: /makepkg/local_src)",
        ))
        .arg(option(
            "build-dir",
            "DIR",
            "Scratch directory for recipe working copies (default: /tmp/build)",
        ))
        .arg(option(
            "aur-url",
            "URL",
            "Base URL of the AUR (default: https://aur.archlinux.org)",
        ))
        .arg(flag("dry-run", "Resolve and print the build plan without building"))
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Enable debug logging"),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory - use CARGO_MANIFEST_DIR which is always set by cargo
    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("aur-makepkg.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
