// src/commands/build.rs

//! Build command - resolve and build the requested packages

use crate::cli::{Cli, FetchMethodArg};
use anyhow::{Context, Result};
use aur_makepkg::{
    BuildConfig, BuildOutcome, BuildPlan, BuildReport, Decision, FetchMethod, Orchestrator,
    RebuildMode,
};
use std::process::ExitCode;
use tracing::info;

/// Build the packages named on the command line
///
/// Resolution errors abort before anything is built and are returned as
/// errors. Build failures are reported in the summary and turn into a
/// non-zero exit code.
pub fn cmd_build(cli: &Cli) -> Result<ExitCode> {
    let config = load_config(cli)?;
    info!(
        "Building {} (rebuild mode {})",
        cli.packages.join(", "),
        config.rebuild
    );

    let orchestrator =
        Orchestrator::from_config(config).context("Failed to set up the build environment")?;

    if cli.dry_run {
        return Ok(match resolve(&orchestrator, &cli.packages)? {
            Some(_) => ExitCode::SUCCESS,
            None => ExitCode::FAILURE,
        });
    }

    orchestrator
        .prepare_system()
        .context("Failed to prepare the system")?;
    let Some(plan) = resolve(&orchestrator, &cli.packages)? else {
        return Ok(ExitCode::FAILURE);
    };

    let report = orchestrator.execute(&plan);
    print_summary(&report);

    if report.success() {
        println!("\n[COMPLETE] All packages processed");
        Ok(ExitCode::SUCCESS)
    } else {
        let failed = report.failed();
        let skipped = report.skipped();
        if !failed.is_empty() {
            eprintln!("Failed: {}", failed.join(", "));
        }
        if !skipped.is_empty() {
            eprintln!("Skipped: {}", skipped.join(", "));
        }
        Ok(ExitCode::FAILURE)
    }
}

/// Defaults, then the configuration file, then command-line flags
fn load_config(cli: &Cli) -> Result<BuildConfig> {
    let mut config = match &cli.config {
        Some(path) => BuildConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => BuildConfig::default(),
    };

    if let Some(uid) = cli.uid {
        config.uid = uid;
    }
    if let Some(gid) = cli.gid {
        config.gid = gid;
    }
    if cli.install_all_dependencies {
        config.install_all_dependencies = true;
    }
    if !cli.keyrings.is_empty() {
        config.keyrings = cli.keyrings.clone();
    }
    if cli.pacman_update {
        config.refresh_system = true;
    }
    if let Some(rebuild) = cli.rebuild {
        config.rebuild = RebuildMode::try_from(rebuild)?;
    }
    if cli.remove_downloaded_source {
        config.keep_source = false;
    }
    if cli.keep_old_versions {
        config.keep_old_versions = true;
    }
    if let Some(method) = cli.fetch_method {
        config.fetch_method = match method {
            FetchMethodArg::Archive => FetchMethod::Archive,
            FetchMethodArg::Git => FetchMethod::Git,
        };
    }
    if let Some(dir) = &cli.root_dir {
        config.root_dir = dir.clone();
    }
    if let Some(dir) = &cli.local_source_dir {
        config.local_source_dir = dir.clone();
    }
    if let Some(dir) = &cli.build_dir {
        config.build_dir = dir.clone();
    }
    if let Some(url) = &cli.aur_url {
        config.aur_url = url.clone();
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Resolve and print the plan
///
/// Resolution errors are reported here and yield `None`; nothing has been
/// built at that point.
fn resolve(orchestrator: &Orchestrator, packages: &[String]) -> Result<Option<BuildPlan>> {
    match orchestrator.plan(packages) {
        Ok(plan) => {
            print_plan(&plan, orchestrator.config().rebuild);
            Ok(Some(plan))
        }
        Err(e) if e.is_resolution_error() => {
            eprintln!("[FAILED] {}", e);
            eprintln!("Nothing was built");
            Ok(None)
        }
        Err(e) => Err(e).context("Failed to resolve the build set"),
    }
}

fn print_plan(plan: &BuildPlan, rebuild: RebuildMode) {
    if plan.is_empty() {
        println!("Nothing to do");
        return;
    }

    println!(
        "Build plan: {} of {} package(s) to build (rebuild mode {})",
        plan.builds().count(),
        plan.entries.len(),
        rebuild
    );
    for entry in &plan.entries {
        let decision = match &entry.decision {
            Decision::Build => "build".to_string(),
            Decision::Skip { known_version } => format!("skip, {} is current", known_version),
        };
        println!(
            "  {:>2}. {} {} [{}] {}",
            entry.position + 1,
            entry.name,
            entry.version(),
            entry.role,
            decision
        );
    }

    if !plan.presatisfied.is_empty() {
        println!("Already installed: {}", plan.presatisfied.join(", "));
    }
    if !plan.repo_provided.is_empty() {
        println!("From repositories: {}", plan.repo_provided.join(", "));
    }
}

fn print_summary(report: &BuildReport) {
    println!("\nSummary:");
    for entry in &report.entries {
        match &entry.outcome {
            BuildOutcome::Built(records) => {
                println!("  [OK] {} {} built", entry.name, entry.version);
                for record in records {
                    println!("       - {}", record.path.display());
                }
            }
            BuildOutcome::UpToDate => println!("  [OK] {} is up to date", entry.name),
            BuildOutcome::Failed(reason) => {
                let first = reason.lines().next().unwrap_or_default();
                println!("  [FAILED] {} {}: {}", entry.name, entry.version, first);
            }
            BuildOutcome::SkippedDueToDependencyFailure(dependency) => {
                println!("  [SKIPPED] {}: dependency {} failed", entry.name, dependency)
            }
        }
    }
}
