// src/recipe/pkgbuild.rs

//! PKGBUILD metadata extraction
//!
//! PKGBUILDs are Bash scripts with specific variables and functions:
//!
//! ```bash
//! pkgname=nano
//! pkgver=8.5
//! pkgrel=2
//! depends=('ncurses' 'file')
//! makedepends=('gcc')
//!
//! build() {
//!     cd "$pkgname-$pkgver"
//!     make
//! }
//! ```
//!
//! # Limitations
//!
//! - Only top-level assignments are read; nothing is executed
//! - `$var` / `${var}` references to other top-level variables are expanded,
//!   parameter expansions with operators (`${v%.*}`) are left as written
//! - Architecture-specific arrays (`depends_x86_64`) are ignored

use super::Recipe;
use crate::error::{Error, Result};
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;

/// Parse the metadata of a PKGBUILD
pub fn parse_pkgbuild(content: &str, path: &Path) -> Result<Recipe> {
    let vars = extract_variables(content)?;
    let expand = |s: &str| expand_variables(s, &vars);

    let pkgnames = match extract_array(content, "pkgname")? {
        Some(names) => names.iter().map(|n| expand(n.as_str())).collect(),
        None => vars
            .get("pkgname")
            .map(|n| vec![expand(n.as_str())])
            .unwrap_or_default(),
    };

    let pkgbase = vars
        .get("pkgbase")
        .map(|b| expand(b.as_str()))
        .or_else(|| pkgnames.first().cloned())
        .unwrap_or_default();

    let array = |name: &str| -> Result<Vec<String>> {
        Ok(extract_array(content, name)?
            .unwrap_or_default()
            .iter()
            .map(|v| expand(v.as_str()))
            .collect())
    };

    let recipe = Recipe {
        pkgbase,
        pkgnames,
        epoch: vars.get("epoch").map(|e| expand(e.as_str())),
        pkgver: vars.get("pkgver").map(|v| expand(v.as_str())).unwrap_or_default(),
        pkgrel: vars.get("pkgrel").map(|v| expand(v.as_str())).unwrap_or_default(),
        arch: array("arch")?,
        depends: array("depends")?,
        makedepends: array("makedepends")?,
        checkdepends: array("checkdepends")?,
    };

    recipe.check_required(path)?;
    Ok(recipe)
}

/// Extract simple variable assignments from PKGBUILD
fn extract_variables(content: &str) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();

    // Match: varname=value or varname="value" or varname='value'
    let re = Regex::new(r#"^([a-zA-Z_][a-zA-Z0-9_]*)=["']?([^"'\n(#]*)["']?\s*(#.*)?$"#)
        .map_err(|e| Error::ParseError(e.to_string()))?;

    let mut depth = 0usize;
    for line in content.lines() {
        let line = line.trim();

        // Skip function bodies
        if depth == 0
            && let Some(caps) = re.captures(line)
            && let (Some(name), Some(value)) = (caps.get(1), caps.get(2))
        {
            vars.insert(name.as_str().to_string(), value.as_str().trim().to_string());
        }
        depth += line.matches('{').count();
        depth = depth.saturating_sub(line.matches('}').count());
    }

    Ok(vars)
}

/// Extract array values from PKGBUILD
///
/// Handles arrays spanning several lines, comments, and mixed quoting:
/// `depends=(glibc 'python>=3.11' # runtime
///           "zlib")`
fn extract_array(content: &str, name: &str) -> Result<Option<Vec<String>>> {
    let pattern = format!(r#"(?m)^\s*{}=\(([^)]*)\)"#, regex::escape(name));
    let re = Regex::new(&pattern).map_err(|e| Error::ParseError(e.to_string()))?;

    let Some(body) = re.captures(content).and_then(|caps| caps.get(1)) else {
        return Ok(None);
    };

    let mut values = Vec::new();
    for line in body.as_str().lines() {
        values.extend(split_words(line));
    }

    Ok(Some(values))
}

/// Split one line of an array body into words, honoring quotes and comments
fn split_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_word = false;

    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    in_word = true;
                }
                '#' if !in_word => break,
                c if c.is_whitespace() => {
                    if in_word {
                        words.push(std::mem::take(&mut current));
                        in_word = false;
                    }
                }
                c => {
                    current.push(c);
                    in_word = true;
                }
            },
        }
    }

    if in_word {
        words.push(current);
    }

    words
}

/// Replace `$var` and `${var}` with values of known top-level variables
fn expand_variables(value: &str, vars: &HashMap<String, String>) -> String {
    let Ok(re) = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)") else {
        return value.to_string();
    };

    re.replace_all(value, |caps: &regex::Captures| {
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();
        match vars.get(name) {
            // One level only; self-referencing values stay as written
            Some(v) if !v.contains('$') => v.clone(),
            _ => caps
                .get(0)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
        }
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATH: &str = "/tmp/PKGBUILD";

    #[test]
    fn test_extract_variables() {
        let content = r#"
pkgname=nano
pkgver=8.5
pkgrel=2
pkgdesc="A small text editor"
url='https://nano-editor.org'
"#;
        let vars = extract_variables(content).unwrap();
        assert_eq!(vars.get("pkgname"), Some(&"nano".to_string()));
        assert_eq!(vars.get("pkgver"), Some(&"8.5".to_string()));
        assert_eq!(vars.get("pkgrel"), Some(&"2".to_string()));
    }

    #[test]
    fn test_variables_inside_functions_ignored() {
        let content = r#"
pkgname=foo
pkgver=1.0
pkgrel=1

pkgver() {
  pkgver=9.9
}
"#;
        let vars = extract_variables(content).unwrap();
        assert_eq!(vars.get("pkgver"), Some(&"1.0".to_string()));
    }

    #[test]
    fn test_extract_array() {
        let content = r#"
depends=('ncurses' 'file')
makedepends=("gcc")
"#;
        let depends = extract_array(content, "depends").unwrap().unwrap();
        assert_eq!(depends, vec!["ncurses", "file"]);

        let makedepends = extract_array(content, "makedepends").unwrap().unwrap();
        assert_eq!(makedepends, vec!["gcc"]);

        assert!(extract_array(content, "checkdepends").unwrap().is_none());
    }

    #[test]
    fn test_extract_multiline_mixed_array() {
        let content = r#"
depends=(glibc 'python>=3.11' # interpreter
         "zlib")
"#;
        let depends = extract_array(content, "depends").unwrap().unwrap();
        assert_eq!(depends, vec!["glibc", "python>=3.11", "zlib"]);
    }

    #[test]
    fn test_makedepends_not_confused_with_depends() {
        let content = "makedepends=('cmake')\n";
        assert!(extract_array(content, "depends").unwrap().is_none());
    }

    #[test]
    fn test_parse_simple_pkgbuild() {
        let pkgbuild = r#"
pkgname=hello
pkgver=1.0
pkgrel=1
pkgdesc="Hello World"
arch=('x86_64')
depends=('glibc')
makedepends=('meson')
source=("https://example.com/${pkgname}-${pkgver}.tar.gz")

build() {
    cd "$pkgname-$pkgver"
    make
}
"#;
        let recipe = parse_pkgbuild(pkgbuild, Path::new(PATH)).unwrap();
        assert_eq!(recipe.pkgbase, "hello");
        assert_eq!(recipe.pkgnames, vec!["hello"]);
        assert_eq!(recipe.full_version(), "1.0-1");
        assert_eq!(recipe.arch, vec!["x86_64"]);
        assert_eq!(recipe.depends, vec!["glibc"]);
        assert_eq!(recipe.makedepends, vec!["meson"]);
    }

    #[test]
    fn test_parse_split_package() {
        let pkgbuild = r#"
pkgbase=foo
pkgname=('foo' 'foo-docs')
pkgver=2.1
pkgrel=3
epoch=1
"#;
        let recipe = parse_pkgbuild(pkgbuild, Path::new(PATH)).unwrap();
        assert_eq!(recipe.pkgbase, "foo");
        assert_eq!(recipe.pkgnames, vec!["foo", "foo-docs"]);
        assert_eq!(recipe.full_version(), "1:2.1-3");
    }

    #[test]
    fn test_variable_expansion() {
        let pkgbuild = r#"
_name=bar
pkgname=${_name}-git
pkgver=1
pkgrel=1
depends=("$_name-libs")
"#;
        let recipe = parse_pkgbuild(pkgbuild, Path::new(PATH)).unwrap();
        assert_eq!(recipe.pkgnames, vec!["bar-git"]);
        assert_eq!(recipe.depends, vec!["bar-libs"]);
    }

    #[test]
    fn test_missing_pkgrel_is_invalid() {
        let err = parse_pkgbuild("pkgname=foo\npkgver=1\n", Path::new(PATH)).unwrap_err();
        assert!(matches!(err, Error::InvalidRecipe { .. }));
        assert!(err.to_string().contains("pkgrel"));
    }
}
