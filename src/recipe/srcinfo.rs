// src/recipe/srcinfo.rs

//! `.SRCINFO` parsing
//!
//! `.SRCINFO` is the flat rendering of a PKGBUILD that `makepkg
//! --printsrcinfo` generates and the AUR stores beside every PKGBUILD:
//!
//! ```text
//! pkgbase = foo
//! 	pkgver = 1.0
//! 	pkgrel = 1
//! 	makedepends = cmake
//! 	depends = glibc
//!
//! pkgname = foo
//! ```
//!
//! Keys in the `pkgbase` section apply to every package of the recipe;
//! `pkgname` sections may add their own `depends`.

use super::Recipe;
use crate::error::Result;
use std::path::Path;

/// Parse the metadata of a `.SRCINFO` file
pub fn parse_srcinfo(content: &str, path: &Path) -> Result<Recipe> {
    let mut recipe = Recipe::default();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim().to_string();

        match key {
            "pkgbase" => recipe.pkgbase = value,
            "pkgname" => recipe.pkgnames.push(value),
            "epoch" => recipe.epoch = Some(value),
            "pkgver" => recipe.pkgver = value,
            "pkgrel" => recipe.pkgrel = value,
            "arch" => push_unique(&mut recipe.arch, value),
            "depends" => push_unique(&mut recipe.depends, value),
            "makedepends" => push_unique(&mut recipe.makedepends, value),
            "checkdepends" => push_unique(&mut recipe.checkdepends, value),
            _ => {} // Architecture-specific and descriptive keys are not needed
        }
    }

    if recipe.pkgbase.is_empty()
        && let Some(first) = recipe.pkgnames.first()
    {
        recipe.pkgbase = first.clone();
    }

    recipe.check_required(path)?;
    Ok(recipe)
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}
