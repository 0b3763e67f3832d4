//! Module cache management: installing packages and building release
//! tarballs.
//!
//! Installed packages live in module roots searched by the compiler after
//! the entry file's directory:
//!
//! 1. `<project>/.eikobot/modules` — per-project installs;
//! 2. `<user data dir>/eikobot/modules` — shared cache.
//!
//! `GH://owner/name` specs download the repository's default-branch
//! tarball from GitHub's codeload endpoint and unpack it (stripping the
//! `name-branch/` wrapper directory) into the project module root.
//! Installing `.` copies — or with `-e` symlinks — the current project,
//! so local edits are picked up without reinstalling.

use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::manifest::PackageSpec;

#[derive(Debug)]
pub enum PackageError {
    Io(std::io::Error),
    Download { url: String, detail: String },
    BadArchive(String),
    NotInstalled(String),
}

impl fmt::Display for PackageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageError::Io(err) => write!(f, "{err}"),
            PackageError::Download { url, detail } => {
                write!(f, "download of {url} failed: {detail}")
            }
            PackageError::BadArchive(detail) => write!(f, "unusable package archive: {detail}"),
            PackageError::NotInstalled(spec) => {
                write!(f, "required package `{spec}` is not installed; run `eikobot package install {spec}`")
            }
        }
    }
}

impl std::error::Error for PackageError {}

impl From<std::io::Error> for PackageError {
    fn from(err: std::io::Error) -> Self {
        PackageError::Io(err)
    }
}

/// Module roots for a project, most specific first.
pub fn module_roots(project_root: &Path) -> Vec<PathBuf> {
    let mut roots = vec![project_root.join(".eikobot").join("modules")];
    if let Some(data) = dirs::data_dir() {
        roots.push(data.join("eikobot").join("modules"));
    }
    roots
}

/// Verifies that every required package is present in some module root.
pub fn check_requires(
    specs: &[PackageSpec],
    project_root: &Path,
) -> Result<(), PackageError> {
    let roots = module_roots(project_root);
    for spec in specs {
        let found = roots.iter().any(|root| root.join(spec.module_name()).is_dir());
        if !found {
            let spelled = match spec {
                PackageSpec::GitHub { owner, name } => format!("GH://{owner}/{name}"),
                PackageSpec::Versioned { name, version } => format!("{name}@{version}"),
            };
            return Err(PackageError::NotInstalled(spelled));
        }
    }
    Ok(())
}

/// Installs a package spec into the project's module root.
pub fn install(spec: &PackageSpec, project_root: &Path) -> Result<PathBuf, PackageError> {
    let dest_root = project_root.join(".eikobot").join("modules");
    std::fs::create_dir_all(&dest_root)?;
    let dest = dest_root.join(spec.module_name());

    match spec {
        PackageSpec::GitHub { owner, name } => {
            // Try the two common default branch names.
            let mut last_err = None;
            for branch in ["main", "master"] {
                let url = format!(
                    "https://codeload.github.com/{owner}/{name}/tar.gz/refs/heads/{branch}"
                );
                match download_tarball(&url) {
                    Ok(bytes) => {
                        unpack_stripped(&bytes, &dest)?;
                        tracing::info!(package = %name, %url, "installed");
                        return Ok(dest);
                    }
                    Err(err) => last_err = Some(err),
                }
            }
            Err(last_err.expect("at least one attempt was made"))
        }
        PackageSpec::Versioned { name, version } => {
            // Released packages are published as GitHub release tarballs
            // under the eikobot-dev organisation.
            let url = format!(
                "https://codeload.github.com/eikobot-dev/{name}/tar.gz/refs/tags/v{version}"
            );
            let bytes = download_tarball(&url)?;
            unpack_stripped(&bytes, &dest)?;
            tracing::info!(package = %name, %version, "installed");
            Ok(dest)
        }
    }
}

/// Installs the current project into its own module root, by copy or (with
/// `editable`) by symlink so edits apply immediately.
pub fn install_local(project_root: &Path, editable: bool) -> Result<PathBuf, PackageError> {
    let name = project_root
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "project".to_string());
    let dest_root = project_root.join(".eikobot").join("modules");
    std::fs::create_dir_all(&dest_root)?;
    let dest = dest_root.join(&name);
    if dest.exists() {
        if dest.is_dir() && !editable {
            std::fs::remove_dir_all(&dest)?;
        } else {
            std::fs::remove_file(&dest).or_else(|_| std::fs::remove_dir_all(&dest))?;
        }
    }
    if editable {
        #[cfg(unix)]
        std::os::unix::fs::symlink(project_root, &dest)?;
        #[cfg(not(unix))]
        copy_eiko_tree(project_root, &dest)?;
    } else {
        copy_eiko_tree(project_root, &dest)?;
    }
    Ok(dest)
}

fn download_tarball(url: &str) -> Result<Vec<u8>, PackageError> {
    let response = ureq::get(url).call().map_err(|err| PackageError::Download {
        url: url.to_string(),
        detail: err.to_string(),
    })?;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut bytes)
        .map_err(|err| PackageError::Download { url: url.to_string(), detail: err.to_string() })?;
    Ok(bytes)
}

/// Unpacks a gzipped tarball into `dest`, stripping the single top-level
/// directory GitHub wraps archives in.
fn unpack_stripped(bytes: &[u8], dest: &Path) -> Result<(), PackageError> {
    if dest.exists() {
        std::fs::remove_dir_all(dest)?;
    }
    std::fs::create_dir_all(dest)?;
    let decoder = flate2::read::GzDecoder::new(bytes);
    let mut archive = tar::Archive::new(decoder);
    for entry in archive.entries().map_err(|e| PackageError::BadArchive(e.to_string()))? {
        let mut entry = entry.map_err(|e| PackageError::BadArchive(e.to_string()))?;
        let path = entry.path().map_err(|e| PackageError::BadArchive(e.to_string()))?;
        let stripped: PathBuf = path.components().skip(1).collect();
        if stripped.as_os_str().is_empty() {
            continue;
        }
        // Refuse entries that would escape the destination.
        if stripped.components().any(|c| matches!(c, std::path::Component::ParentDir)) {
            return Err(PackageError::BadArchive(format!(
                "entry escapes destination: {}",
                path.display()
            )));
        }
        let target = dest.join(stripped);
        if entry.header().entry_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            entry
                .unpack(&target)
                .map_err(|e| PackageError::BadArchive(e.to_string()))?;
        }
    }
    Ok(())
}

/// Copies the Eiko-relevant part of a project tree: `eiko.toml`, every
/// `.eiko` file, and directory structure. Hidden directories, `target/`
/// and `dist/` are skipped.
fn copy_eiko_tree(src: &Path, dest: &Path) -> Result<(), PackageError> {
    std::fs::create_dir_all(dest)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') || name == "target" || name == "dist" {
            continue;
        }
        let path = entry.path();
        if path.is_dir() {
            copy_eiko_tree(&path, &dest.join(&name))?;
        } else if name == "eiko.toml" || name.ends_with(".eiko") {
            std::fs::copy(&path, dest.join(&name))?;
        }
    }
    Ok(())
}

/// Builds a distribution tarball under `dist/`, returning its path.
pub fn build_release(project_root: &Path, name: &str, version: &str) -> Result<PathBuf, PackageError> {
    use flate2::write::GzEncoder;
    use flate2::Compression;

    let dist = project_root.join("dist");
    std::fs::create_dir_all(&dist)?;
    let out_path = dist.join(format!("{name}-{version}.tar.gz"));
    let file = std::fs::File::create(&out_path)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    append_eiko_tree(&mut builder, project_root, Path::new(name))?;
    builder
        .into_inner()
        .and_then(|gz| gz.finish())
        .map_err(PackageError::Io)?;
    Ok(out_path)
}

fn append_eiko_tree<W: std::io::Write>(
    builder: &mut tar::Builder<W>,
    dir: &Path,
    prefix: &Path,
) -> Result<(), PackageError> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') || name == "target" || name == "dist" {
            continue;
        }
        let path = entry.path();
        let archived = prefix.join(&name);
        if path.is_dir() {
            append_eiko_tree(builder, &path, &archived)?;
        } else if name == "eiko.toml" || name.ends_with(".eiko") {
            builder.append_path_with_name(&path, &archived)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_roots_start_with_the_project() {
        let roots = module_roots(Path::new("/proj"));
        assert_eq!(roots[0], Path::new("/proj/.eikobot/modules"));
    }

    #[test]
    fn missing_requirement_is_reported_with_its_spelling() {
        let dir = tempfile::tempdir().unwrap();
        let specs = vec![PackageSpec::GitHub { owner: "o".into(), name: "pkg".into() }];
        let err = check_requires(&specs, dir.path()).unwrap_err();
        assert!(err.to_string().contains("GH://o/pkg"));
    }

    #[test]
    fn installed_requirement_passes_the_check() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".eikobot/modules/pkg")).unwrap();
        let specs = vec![PackageSpec::GitHub { owner: "o".into(), name: "pkg".into() }];
        assert!(check_requires(&specs, dir.path()).is_ok());
    }

    #[test]
    fn local_install_copies_eiko_files_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("eiko.toml"), "[eiko]\nversion = \"0.1\"\n").unwrap();
        std::fs::write(dir.path().join("main.eiko"), "x = 1\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();
        let dest = install_local(dir.path(), false).unwrap();
        assert!(dest.join("main.eiko").is_file());
        assert!(dest.join("eiko.toml").is_file());
        assert!(!dest.join("notes.txt").exists());
    }

    #[test]
    fn release_tarball_lands_in_dist() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("eiko.toml"), "[eiko]\nversion = \"0.1\"\n").unwrap();
        std::fs::write(dir.path().join("main.eiko"), "x = 1\n").unwrap();
        let tarball = build_release(dir.path(), "demo", "0.1.0").unwrap();
        assert!(tarball.ends_with("dist/demo-0.1.0.tar.gz") || tarball.is_file());
        assert!(tarball.is_file());
    }

    #[test]
    fn tarballs_are_unpacked_with_the_wrapper_stripped() {
        use flate2::write::GzEncoder;
        use flate2::Compression;

        // Build an archive shaped like GitHub's: pkg-main/<files>.
        let mut bytes = Vec::new();
        {
            let encoder = GzEncoder::new(&mut bytes, Compression::default());
            let mut builder = tar::Builder::new(encoder);
            let mut header = tar::Header::new_gnu();
            let content = b"x = 1\n";
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, "pkg-main/__init__.eiko", &content[..])
                .unwrap();
            builder.into_inner().unwrap().finish().unwrap();
        }

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("pkg");
        unpack_stripped(&bytes, &dest).unwrap();
        assert!(dest.join("__init__.eiko").is_file());
    }

    #[test]
    fn local_install_is_replaceable() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("eiko.toml"), "[eiko]\nversion = \"0.1\"\n").unwrap();
        std::fs::write(dir.path().join("main.eiko"), "x = 1\n").unwrap();
        install_local(dir.path(), false).unwrap();
        // A second install overwrites cleanly.
        install_local(dir.path(), false).unwrap();
    }
}
