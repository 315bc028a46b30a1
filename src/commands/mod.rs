// src/commands/mod.rs
//! Command handlers for the aur-makepkg CLI

mod build;

pub use build::cmd_build;
