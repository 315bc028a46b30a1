// src/lib.rs

//! aur-makepkg build orchestration
//!
//! Builds pacman packages with makepkg, from local recipes or the AUR.
//!
//! # Architecture
//!
//! - Source locator: local recipe directories win over the AUR
//! - Resolver: breadth-first discovery, arena graph, stable topological order
//! - Kitchen: runs the build tool as an unprivileged user and files artifacts
//! - Orchestrator: sequential build loop with dependency-failure propagation
//!
//! System collaborators (remote repository, package manager, build tool)
//! sit behind traits so the engine can run against fakes.

pub mod config;
mod error;
pub mod kitchen;
pub mod orchestrator;
pub mod packages;
pub mod recipe;
pub mod resolver;
pub mod source;
pub mod version;

pub use config::BuildConfig;
pub use error::{Error, Result};
pub use kitchen::{
    BuildIdentity, BuildInvocation, BuildTool, CookResult, Kitchen, KitchenConfig, Makepkg,
    ToolOutcome,
};
pub use orchestrator::{BuildOutcome, BuildReport, EntryReport, Orchestrator};
pub use packages::{ArtifactRecord, ArtifactStore, PackageManager, Pacman};
pub use recipe::{Dependency, DependencyEdge, DependencyKind, Recipe};
pub use resolver::{
    BuildPlan, BuildSetEntry, Decision, RebuildMode, ResolveOptions, Resolver, Role,
};
pub use source::{
    AurClient, FetchMethod, Origin, RecipeSource, RemotePackage, RemoteRepository,
    RetentionPolicy, SourceLocator,
};
pub use version::{PkgVersion, VersionConstraint, vercmp};
