//! `eiko.toml` project manifest.
//!
//! Every Eikobot project carries an `eiko.toml` at its root:
//!
//! ```toml
//! [eiko]
//! version = "0.7"
//!
//! [eiko.project]
//! dry_run = false
//! requires = ["GH://eikobot-dev/std", "corelib@1.2.0"]
//! ssh_timeout = 30
//! ```
//!
//! `version` is the *minimum* engine version the project needs; the CLI
//! refuses to build against an older binary. `requires` lists package
//! specs resolved against the module cache before compilation.

use std::fmt;
use std::path::{Path, PathBuf};

use eiko_base::{EikoError, ErrorKind, ImportError, Span};
use serde::{Deserialize, Serialize};

/// Root structure of `eiko.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub eiko: EikoSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EikoSection {
    /// Required minimum engine version.
    pub version: String,
    #[serde(default)]
    pub project: ProjectSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectSection {
    /// Force dry-run deploys for this project.
    #[serde(default)]
    pub dry_run: bool,
    /// Package specs this project depends on.
    #[serde(default)]
    pub requires: Vec<String>,
    /// Per-step handler timeout in seconds for remote execution.
    #[serde(default)]
    pub ssh_timeout: Option<u64>,
}

#[derive(Debug)]
pub enum ManifestError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    BadSpec(String),
}

impl fmt::Display for ManifestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestError::Io(path, err) => {
                write!(f, "cannot read {}: {err}", path.display())
            }
            ManifestError::Parse(path, err) => {
                write!(f, "invalid manifest {}: {err}", path.display())
            }
            ManifestError::BadSpec(spec) => {
                write!(f, "invalid package spec `{spec}` (use GH://owner/name or name@version)")
            }
        }
    }
}

impl std::error::Error for ManifestError {}

impl Manifest {
    pub fn load(path: &Path) -> Result<Manifest, ManifestError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ManifestError::Io(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ManifestError::Parse(path.to_path_buf(), e))
    }

    /// Checks the version floor against this binary's version. A failure is
    /// the compiler's own `VersionMismatch` import error; the caller spans
    /// it with [`version_span`] and renders it against the manifest source
    /// like any other diagnostic.
    pub fn check_version(&self, actual: &str) -> Result<(), EikoError> {
        if version_at_least(actual, &self.eiko.version) {
            Ok(())
        } else {
            Err(EikoError::new(
                ErrorKind::Import(ImportError::VersionMismatch {
                    required: self.eiko.version.clone(),
                    actual: actual.to_string(),
                }),
                Span::default(),
            ))
        }
    }

    /// Parsed `requires` entries.
    pub fn requires(&self) -> Result<Vec<PackageSpec>, ManifestError> {
        self.eiko.project.requires.iter().map(|s| PackageSpec::parse(s)).collect()
    }
}

/// A dependency specification from `requires` or the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageSpec {
    /// `GH://owner/name` — a GitHub repository's default branch.
    GitHub { owner: String, name: String },
    /// `name@version` — a released package by exact version.
    Versioned { name: String, version: String },
}

impl PackageSpec {
    pub fn parse(spec: &str) -> Result<PackageSpec, ManifestError> {
        if let Some(rest) = spec.strip_prefix("GH://") {
            let mut parts = rest.splitn(2, '/');
            let owner = parts.next().unwrap_or_default();
            let name = parts.next().unwrap_or_default();
            if owner.is_empty() || name.is_empty() || name.contains('/') {
                return Err(ManifestError::BadSpec(spec.to_string()));
            }
            return Ok(PackageSpec::GitHub { owner: owner.to_string(), name: name.to_string() });
        }
        if let Some((name, version)) = spec.split_once('@') {
            if name.is_empty() || version.is_empty() {
                return Err(ManifestError::BadSpec(spec.to_string()));
            }
            return Ok(PackageSpec::Versioned {
                name: name.to_string(),
                version: version.to_string(),
            });
        }
        Err(ManifestError::BadSpec(spec.to_string()))
    }

    /// Directory name the package occupies in a module root.
    pub fn module_name(&self) -> &str {
        match self {
            PackageSpec::GitHub { name, .. } => name,
            PackageSpec::Versioned { name, .. } => name,
        }
    }
}

/// Byte range of the required version's value inside the manifest text, so
/// a version-floor diagnostic underlines the offending line.
pub fn version_span(text: &str, version: &str) -> Span {
    text.find(version)
        .map(|start| Span::new(start, start + version.len()))
        .unwrap_or_default()
}

/// Numeric, segment-wise version comparison: is `actual >= required`?
fn version_at_least(actual: &str, required: &str) -> bool {
    let parse = |v: &str| -> Vec<u64> {
        v.split('.').map(|s| s.trim().parse().unwrap_or(0)).collect()
    };
    let (a, r) = (parse(actual), parse(required));
    for i in 0..a.len().max(r.len()) {
        let (x, y) = (a.get(i).copied().unwrap_or(0), r.get(i).copied().unwrap_or(0));
        if x != y {
            return x > y;
        }
    }
    true
}

/// Walks up from `start` to the directory holding `eiko.toml`.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start.to_path_buf());
    while let Some(current) = dir {
        if current.join("eiko.toml").is_file() {
            return Some(current);
        }
        dir = current.parent().map(Path::to_path_buf);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_manifest() {
        let text = "\
[eiko]
version = \"0.5\"

[eiko.project]
dry_run = true
requires = [\"GH://eikobot-dev/std\", \"corelib@1.2.0\"]
ssh_timeout = 30
";
        let manifest: Manifest = toml::from_str(text).unwrap();
        assert_eq!(manifest.eiko.version, "0.5");
        assert!(manifest.eiko.project.dry_run);
        assert_eq!(manifest.eiko.project.ssh_timeout, Some(30));
        assert_eq!(manifest.requires().unwrap().len(), 2);
    }

    #[test]
    fn project_section_is_optional() {
        let manifest: Manifest = toml::from_str("[eiko]\nversion = \"0.1\"\n").unwrap();
        assert!(!manifest.eiko.project.dry_run);
        assert!(manifest.eiko.project.requires.is_empty());
    }

    #[test]
    fn version_floor_is_enforced() {
        let manifest: Manifest = toml::from_str("[eiko]\nversion = \"0.9\"\n").unwrap();
        assert!(manifest.check_version("1.0.0").is_ok());
        assert!(manifest.check_version("0.9").is_ok());
        let err = manifest.check_version("0.8.5").unwrap_err();
        assert!(matches!(
            err.kind,
            ErrorKind::Import(ImportError::VersionMismatch { ref required, ref actual })
                if required == "0.9" && actual == "0.8.5"
        ));
    }

    #[test]
    fn version_span_underlines_the_value() {
        let text = "[eiko]\nversion = \"0.9\"\n";
        let span = version_span(text, "0.9");
        assert_eq!(&text[span.start..span.end], "0.9");
    }

    #[test]
    fn github_spec_round_trip() {
        let spec = PackageSpec::parse("GH://eikobot-dev/std").unwrap();
        assert_eq!(
            spec,
            PackageSpec::GitHub { owner: "eikobot-dev".into(), name: "std".into() }
        );
        assert_eq!(spec.module_name(), "std");
    }

    #[test]
    fn versioned_spec_round_trip() {
        let spec = PackageSpec::parse("corelib@1.2.0").unwrap();
        assert_eq!(
            spec,
            PackageSpec::Versioned { name: "corelib".into(), version: "1.2.0".into() }
        );
    }

    #[test]
    fn malformed_specs_are_rejected() {
        for bad in ["GH://", "GH://owner", "plainname", "@1.0", "name@"] {
            assert!(PackageSpec::parse(bad).is_err(), "{bad} should be rejected");
        }
    }
}
