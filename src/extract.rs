//! Tarball extraction into a private scratch workspace.

use std::fs::File;
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Normalize a raw archive entry path to a repository-relative path.
///
/// Drops a leading `/`, then the first segment (the synthetic
/// `<repo>-<rev>/` root every hosted tarball wraps its content in). Returns
/// `None` for the root entry itself and for `..`, root or prefix components.
/// Escapes through symlinks planted by earlier entries are caught during
/// unpacking, not here.
pub fn strip_root(raw: &Path) -> Option<PathBuf> {
    let mut components = raw
        .components()
        .filter(|c| !matches!(c, Component::RootDir | Component::CurDir));
    components.next()?;

    let mut stripped = PathBuf::new();
    for component in components {
        match component {
            Component::Normal(part) => stripped.push(part),
            _ => return None,
        }
    }

    if stripped.as_os_str().is_empty() {
        None
    } else {
        Some(stripped)
    }
}

/// Create a uniquely named scratch directory for one extraction under `scratch_root`.
pub(crate) fn create_workspace(scratch_root: &Path) -> Result<TempDir> {
    tempfile::Builder::new()
        .prefix("vlurp-extract-")
        .rand_bytes(16)
        .tempdir_in(scratch_root)
        .map_err(Error::fs(scratch_root))
}

/// Unpack `tarball` into a fresh workspace under `scratch_root`, stripping the root segment.
///
/// No filtering happens here; every regular file, directory and symlink lands
/// in the workspace. An entry that would be written outside the workspace
/// fails the extraction. The workspace is removed when the returned handle drops.
pub async fn extract_tarball(tarball: &Path, scratch_root: &Path) -> Result<TempDir> {
    let tarball = tarball.to_path_buf();
    let scratch_root = scratch_root.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let workspace = create_workspace(&scratch_root)?;
        unpack_into(&tarball, workspace.path())?;
        Ok(workspace)
    })
    .await
    .map_err(Error::extraction)?
}

fn unpack_into(tarball: &Path, dest: &Path) -> Result<()> {
    let file = File::open(tarball).map_err(Error::fs(tarball))?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    archive.set_preserve_permissions(true);
    let root = dest.canonicalize().map_err(Error::fs(dest))?;

    let mut unpacked = 0usize;
    for entry in archive.entries().map_err(Error::extraction)? {
        let mut entry = entry.map_err(Error::extraction)?;
        let raw = entry.path().map_err(Error::extraction)?.into_owned();

        let Some(stripped) = strip_root(&raw) else {
            if raw.components().count() > 1 {
                warn!(path = %raw.display(), "skipping archive entry outside the workspace");
            }
            continue;
        };
        let outpath = dest.join(&stripped);
        ensure_contained(&root, &outpath, &raw)?;

        let header = entry.header();
        match header.entry_type() {
            tar::EntryType::Directory => {
                std::fs::create_dir_all(&outpath).map_err(Error::fs(&outpath))?;
            }
            tar::EntryType::Symlink => {
                let link = header.link_name().map_err(Error::extraction)?;
                if let Some(link) = link {
                    make_parent(&outpath)?;
                    symlink(&link, &outpath)?;
                    unpacked += 1;
                }
            }
            tar::EntryType::Regular | tar::EntryType::Continuous => {
                make_parent(&outpath)?;
                entry.unpack(&outpath).map_err(Error::extraction)?;
                unpacked += 1;
            }
            other => {
                debug!(path = %raw.display(), kind = ?other, "skipping special archive entry");
            }
        }
    }

    debug!(entries = unpacked, dest = %dest.display(), "tarball extracted");
    Ok(())
}

/// Fail unless writing `outpath` stays under the canonical `root`.
///
/// The nearest existing ancestor is resolved on disk so that a symlink planted
/// by an earlier entry cannot redirect a later one. A symlink already sitting
/// at `outpath` is removed, never written through.
fn ensure_contained(root: &Path, outpath: &Path, raw: &Path) -> Result<()> {
    let escaped = || Error::extraction(format!("entry {} resolves outside the workspace", raw.display()));

    if std::fs::symlink_metadata(outpath).is_ok_and(|m| m.file_type().is_symlink()) {
        std::fs::remove_file(outpath).map_err(Error::fs(outpath))?;
    }

    let existing = outpath
        .parent()
        .into_iter()
        .flat_map(Path::ancestors)
        .find(|p| std::fs::symlink_metadata(p).is_ok())
        .ok_or_else(escaped)?;
    let resolved = existing.canonicalize().map_err(|_| escaped())?;
    if resolved.starts_with(root) {
        Ok(())
    } else {
        Err(escaped())
    }
}

fn make_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) => std::fs::create_dir_all(parent).map_err(Error::fs(parent)),
        None => Ok(()),
    }
}

#[cfg(unix)]
fn symlink(link: &Path, at: &Path) -> Result<()> {
    std::os::unix::fs::symlink(link, at).map_err(Error::fs(at))
}

#[cfg(not(unix))]
fn symlink(link: &Path, at: &Path) -> Result<()> {
    warn!(path = %at.display(), target = %link.display(), "symlinks are not supported here, skipping");
    Ok(())
}
