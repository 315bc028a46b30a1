// src/version/mod.rs

//! Package version comparison following pacman's `vercmp` ordering
//!
//! Versions have the form `[epoch:]pkgver[-pkgrel]`. Each component is
//! compared segment by segment: numeric runs compare numerically, alphabetic
//! runs compare lexicographically, and a numeric run always beats an
//! alphabetic one. Arbitrary strings are accepted; anything that does not
//! look like a version still gets a deterministic ordering.

use std::cmp::Ordering;
use std::fmt;

/// A parsed package version with epoch, pkgver and pkgrel components
///
/// Equality follows [`PkgVersion::compare`]: `1.0` and `1_0` are equal.
#[derive(Debug, Clone)]
pub struct PkgVersion {
    pub epoch: u64,
    pub version: String,
    pub release: Option<String>,
}

impl PkgVersion {
    /// Parse a version string
    ///
    /// Format: [epoch:]version[-release]
    /// Examples:
    /// - "1.2.3" → epoch=0, version="1.2.3", release=None
    /// - "2:1.2.3" → epoch=2, version="1.2.3", release=None
    /// - "1.2.3-4" → epoch=0, version="1.2.3", release=Some("4")
    ///
    /// Never fails. A prefix before ':' is only an epoch if it is all digits;
    /// the release is whatever follows the last '-'.
    pub fn parse(s: &str) -> Self {
        let (epoch, rest) = match s.split_once(':') {
            Some((e, r)) if e.bytes().all(|b| b.is_ascii_digit()) => {
                // Empty epoch (":1.0") and overflowing epochs both degrade to 0
                (e.parse::<u64>().unwrap_or(0), r)
            }
            _ => (0, s),
        };

        let (version, release) = match rest.rsplit_once('-') {
            Some((v, r)) => (v.to_string(), Some(r.to_string())),
            None => (rest.to_string(), None),
        };

        Self {
            epoch,
            version,
            release,
        }
    }

    /// Compare two versions
    pub fn compare(&self, other: &PkgVersion) -> Ordering {
        match self.epoch.cmp(&other.epoch) {
            Ordering::Equal => {}
            ord => return ord,
        }

        match segment_cmp(&self.version, &other.version) {
            Ordering::Equal => {}
            ord => return ord,
        }

        // A missing release sorts before a present one
        match (&self.release, &other.release) {
            (Some(a), Some(b)) => segment_cmp(a, b),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

impl fmt::Display for PkgVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch > 0 {
            write!(f, "{}:", self.epoch)?;
        }
        write!(f, "{}", self.version)?;
        if let Some(ref release) = self.release {
            write!(f, "-{}", release)?;
        }
        Ok(())
    }
}

impl PartialEq for PkgVersion {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Eq for PkgVersion {}

impl Ord for PkgVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl PartialOrd for PkgVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Compare two full version strings
pub fn vercmp(a: &str, b: &str) -> Ordering {
    PkgVersion::parse(a).compare(&PkgVersion::parse(b))
}

/// Compare a single version component (pkgver or pkgrel)
///
/// Same algorithm as pacman's `rpmvercmp`.
fn segment_cmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let a = a.as_bytes();
    let b = b.as_bytes();
    let (mut i, mut j) = (0usize, 0usize);

    while i < a.len() && j < b.len() {
        let (sep_a, sep_b) = (i, j);
        while i < a.len() && !a[i].is_ascii_alphanumeric() {
            i += 1;
        }
        while j < b.len() && !b[j].is_ascii_alphanumeric() {
            j += 1;
        }

        if i >= a.len() || j >= b.len() {
            break;
        }

        // Differing separator lengths decide immediately
        let (len_a, len_b) = (i - sep_a, j - sep_b);
        if len_a != len_b {
            return len_a.cmp(&len_b);
        }

        let is_num = a[i].is_ascii_digit();
        let (start_a, start_b) = (i, j);
        if is_num {
            while i < a.len() && a[i].is_ascii_digit() {
                i += 1;
            }
            while j < b.len() && b[j].is_ascii_digit() {
                j += 1;
            }
        } else {
            while i < a.len() && a[i].is_ascii_alphabetic() {
                i += 1;
            }
            while j < b.len() && b[j].is_ascii_alphabetic() {
                j += 1;
            }
        }

        let mut seg_a = &a[start_a..i];
        let mut seg_b = &b[start_b..j];

        // Segment types differ: numeric is newer than alpha
        if seg_b.is_empty() {
            return if is_num {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }

        if is_num {
            while let [b'0', rest @ ..] = seg_a {
                seg_a = rest;
            }
            while let [b'0', rest @ ..] = seg_b {
                seg_b = rest;
            }
            match seg_a.len().cmp(&seg_b.len()) {
                Ordering::Equal => {}
                ord => return ord,
            }
        }

        match seg_a.cmp(seg_b) {
            Ordering::Equal => {}
            ord => return ord,
        }
    }

    let rest_a = &a[i.min(a.len())..];
    let rest_b = &b[j.min(b.len())..];

    if rest_a.is_empty() && rest_b.is_empty() {
        return Ordering::Equal;
    }

    // A trailing alpha segment never beats an empty one: "1.0a" < "1.0"
    let first_alpha = |s: &[u8]| s.first().is_some_and(|c| c.is_ascii_alphabetic());
    if (rest_a.is_empty() && !first_alpha(rest_b)) || first_alpha(rest_a) {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

/// Version constraint attached to a dependency (`foo>=1.2`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionConstraint {
    /// Any version is acceptable
    Any,
    Exact(PkgVersion),
    GreaterThan(PkgVersion),
    GreaterOrEqual(PkgVersion),
    LessThan(PkgVersion),
    LessOrEqual(PkgVersion),
}

impl VersionConstraint {
    /// Split a dependency string into its name and constraint
    ///
    /// Examples:
    /// - "glibc" → ("glibc", Any)
    /// - "python>=3.11" → ("python", GreaterOrEqual(3.11))
    /// - "libfoo.so=2-64" → ("libfoo.so", Exact(2-64))
    pub fn split_dependency(dep: &str) -> (String, VersionConstraint) {
        let dep = dep.trim();
        let Some(pos) = dep.find(['<', '>', '=']) else {
            return (dep.to_string(), VersionConstraint::Any);
        };

        let name = dep[..pos].to_string();
        let rest = &dep[pos..];

        let constraint = if let Some(v) = rest.strip_prefix(">=") {
            VersionConstraint::GreaterOrEqual(PkgVersion::parse(v.trim()))
        } else if let Some(v) = rest.strip_prefix("<=") {
            VersionConstraint::LessOrEqual(PkgVersion::parse(v.trim()))
        } else if let Some(v) = rest.strip_prefix('>') {
            VersionConstraint::GreaterThan(PkgVersion::parse(v.trim()))
        } else if let Some(v) = rest.strip_prefix('<') {
            VersionConstraint::LessThan(PkgVersion::parse(v.trim()))
        } else if let Some(v) = rest.strip_prefix('=') {
            VersionConstraint::Exact(PkgVersion::parse(v.trim()))
        } else {
            VersionConstraint::Any
        };

        (name, constraint)
    }

    /// Check if a version satisfies this constraint
    ///
    /// Like pacman, a constraint without a release matches any release of
    /// that version.
    pub fn satisfies(&self, version: &PkgVersion) -> bool {
        let cmp = |bound: &PkgVersion| {
            if bound.release.is_none() {
                let trimmed = PkgVersion {
                    release: None,
                    ..version.clone()
                };
                trimmed.compare(bound)
            } else {
                version.compare(bound)
            }
        };

        match self {
            VersionConstraint::Any => true,
            VersionConstraint::Exact(v) => cmp(v) == Ordering::Equal,
            VersionConstraint::GreaterThan(v) => cmp(v) == Ordering::Greater,
            VersionConstraint::GreaterOrEqual(v) => cmp(v) != Ordering::Less,
            VersionConstraint::LessThan(v) => cmp(v) == Ordering::Less,
            VersionConstraint::LessOrEqual(v) => cmp(v) != Ordering::Greater,
        }
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionConstraint::Any => Ok(()),
            VersionConstraint::Exact(v) => write!(f, "={}", v),
            VersionConstraint::GreaterThan(v) => write!(f, ">{}", v),
            VersionConstraint::GreaterOrEqual(v) => write!(f, ">={}", v),
            VersionConstraint::LessThan(v) => write!(f, "<{}", v),
            VersionConstraint::LessOrEqual(v) => write!(f, "<={}", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let v = PkgVersion::parse("1.2.3");
        assert_eq!(v.epoch, 0);
        assert_eq!(v.version, "1.2.3");
        assert_eq!(v.release, None);
    }

    #[test]
    fn test_parse_full() {
        let v = PkgVersion::parse("1:2.3.4-5");
        assert_eq!(v.epoch, 1);
        assert_eq!(v.version, "2.3.4");
        assert_eq!(v.release, Some("5".to_string()));
    }

    #[test]
    fn test_parse_non_numeric_epoch_is_version() {
        let v = PkgVersion::parse("abc:1.0-1");
        assert_eq!(v.epoch, 0);
        assert_eq!(v.version, "abc:1.0");
    }

    #[test]
    fn test_parse_release_after_last_dash() {
        let v = PkgVersion::parse("1.0-rc1-2");
        assert_eq!(v.version, "1.0-rc1");
        assert_eq!(v.release, Some("2".to_string()));
    }

    #[test]
    fn test_display_roundtrip() {
        assert_eq!(PkgVersion::parse("2:1.2.3-4").to_string(), "2:1.2.3-4");
        assert_eq!(PkgVersion::parse("0:1.0").to_string(), "1.0");
    }

    #[test]
    fn test_vercmp_reference_pairs() {
        // Orderings as reported by pacman's vercmp
        let less = [
            ("1.0", "1.1"),
            ("1.1", "1.1.1"),
            ("1.0a", "1.0"),
            ("1.0alpha", "1.0b"),
            ("1.0b", "1.0beta"),
            ("1.0beta", "1.0p"),
            ("1.0p", "1.0pre"),
            ("1.0pre", "1.0rc"),
            ("1.0rc", "1.0"),
            ("1.0", "1.0.a"),
            ("1.0.a", "1.0.1"),
            ("1a", "1"),
            ("2.0a", "2.0"),
            ("1.5", "1.5.a"),
            ("1.0-1", "1.0-2"),
            ("1.0-1", "1.1-1"),
            ("1:1.0", "2:1.0"),
            ("1.1-1", "1:1.0-1"),
            ("1.0.2", "1.0.2_pre"),
        ];
        for (a, b) in less {
            assert_eq!(vercmp(a, b), Ordering::Less, "{} < {}", a, b);
            assert_eq!(vercmp(b, a), Ordering::Greater, "{} > {}", b, a);
        }
    }

    #[test]
    fn test_vercmp_equal() {
        assert_eq!(vercmp("1.0", "1.0"), Ordering::Equal);
        assert_eq!(vercmp("1.0", "1_0"), Ordering::Equal);
        assert_eq!(vercmp("001", "1"), Ordering::Equal);
        assert_eq!(vercmp("0:1.0-1", "1.0-1"), Ordering::Equal);
    }

    #[test]
    fn test_equality_agrees_with_ordering() {
        let a = PkgVersion::parse("1.0-1");
        let b = PkgVersion::parse("1_0-1");
        assert_eq!(a.cmp(&b), Ordering::Equal);
        assert_eq!(a, b);
        assert_eq!(PkgVersion::parse("001"), PkgVersion::parse("1"));
        assert_ne!(PkgVersion::parse("1.0"), PkgVersion::parse("1.0-1"));
    }

    #[test]
    fn test_separator_length_decides() {
        assert_eq!(vercmp("1.0", "1..0"), Ordering::Less);
    }

    #[test]
    fn test_missing_release_sorts_first() {
        assert_eq!(vercmp("1.0", "1.0-1"), Ordering::Less);
        assert_eq!(vercmp("1.0-1", "1.0"), Ordering::Greater);
    }

    #[test]
    fn test_malformed_input_is_deterministic() {
        assert_eq!(vercmp("", ""), Ordering::Equal);
        assert_eq!(vercmp("", "1"), Ordering::Less);
        assert_eq!(vercmp("!!!", "!!!"), Ordering::Equal);
        assert_eq!(vercmp("abc", "abd"), Ordering::Less);
    }

    #[test]
    fn test_ordering_laws_over_sample() {
        let sample = [
            "", "0", "1", "1.0", "1.0-1", "1.0-2", "1:0.1", "1.0a", "1.0rc1", "1.0.1", "1_0",
            "2.0", "10", "9", "1.0+git20240101", "r123.abcdef", "1.0..1", "a", "b1",
        ];
        for a in sample {
            assert_eq!(vercmp(a, a), Ordering::Equal, "reflexive: {}", a);
            for b in sample {
                assert_eq!(vercmp(a, b), vercmp(b, a).reverse(), "antisymmetric: {} {}", a, b);
                for c in sample {
                    if vercmp(a, b) != Ordering::Greater && vercmp(b, c) != Ordering::Greater {
                        assert_ne!(
                            vercmp(a, c),
                            Ordering::Greater,
                            "transitive: {} <= {} <= {}",
                            a,
                            b,
                            c
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_split_dependency() {
        let (name, c) = VersionConstraint::split_dependency("python>=3.11");
        assert_eq!(name, "python");
        assert_eq!(c, VersionConstraint::GreaterOrEqual(PkgVersion::parse("3.11")));

        let (name, c) = VersionConstraint::split_dependency("glibc");
        assert_eq!(name, "glibc");
        assert_eq!(c, VersionConstraint::Any);

        let (name, c) = VersionConstraint::split_dependency("foo<2");
        assert_eq!(name, "foo");
        assert_eq!(c, VersionConstraint::LessThan(PkgVersion::parse("2")));
    }

    #[test]
    fn test_constraint_ignores_release_when_unspecified() {
        let (_, c) = VersionConstraint::split_dependency("foo=1.2");
        assert!(c.satisfies(&PkgVersion::parse("1.2-3")));

        let (_, c) = VersionConstraint::split_dependency("foo>=1.2-2");
        assert!(!c.satisfies(&PkgVersion::parse("1.2-1")));
        assert!(c.satisfies(&PkgVersion::parse("1.2-2")));
    }

    #[test]
    fn test_constraint_display() {
        let (_, c) = VersionConstraint::split_dependency("foo>=1:2.0-1");
        assert_eq!(c.to_string(), ">=1:2.0-1");
    }
}
