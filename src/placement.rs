//! Target directory inspection and placement of the filtered file set.
//!
//! Files are copied into a staging directory beside the target and swapped in
//! with a rename, so a failure part way through never leaves a half-populated
//! target behind.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::TempDir;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// What currently occupies a target path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TargetState {
    /// Nothing at the path.
    Absent,
    /// An existing directory with no entries.
    Empty,
    /// A non-empty directory, or a non-directory at the path.
    Occupied { entries: usize },
}

impl TargetState {
    pub fn exists(&self) -> bool {
        !matches!(self, Self::Absent)
    }

    /// Recursive entry count (files and directories) at the target.
    pub fn entries(&self) -> usize {
        match self {
            Self::Absent | Self::Empty => 0,
            Self::Occupied { entries } => *entries,
        }
    }

    /// Whether placing into this target needs the caller's explicit overwrite consent.
    pub fn is_collision(&self) -> bool {
        matches!(self, Self::Occupied { .. })
    }
}

/// Inspect `path` without following a trailing symlink.
///
/// A directory that cannot be fully walked is an error, never `Empty`.
pub fn check_target(path: &Path) -> Result<TargetState> {
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(TargetState::Absent),
        Err(e) => return Err(Error::fs(path)(e)),
    };

    if !metadata.is_dir() {
        return Ok(TargetState::Occupied { entries: 1 });
    }

    match walk_entries(path)? {
        0 => Ok(TargetState::Empty),
        entries => Ok(TargetState::Occupied { entries }),
    }
}

/// Recursive count of all files and directories under `path`; `0` if absent.
pub fn count_entries(path: &Path) -> usize {
    WalkDir::new(path)
        .follow_links(false)
        .min_depth(1)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .count()
}

fn walk_entries(path: &Path) -> Result<usize> {
    WalkDir::new(path)
        .follow_links(false)
        .min_depth(1)
        .into_iter()
        .try_fold(0, |count, entry| match entry {
            Ok(_) => Ok(count + 1),
            Err(e) => {
                let at = e.path().unwrap_or(path).to_path_buf();
                Err(Error::Filesystem {
                    path: at,
                    source: e.into(),
                })
            }
        })
}

/// Directories between `dir` and its nearest existing ancestor, deepest first.
fn missing_ancestors(dir: &Path) -> Vec<PathBuf> {
    dir.ancestors()
        .take_while(|p| !p.as_os_str().is_empty() && std::fs::symlink_metadata(p).is_err())
        .map(Path::to_path_buf)
        .collect()
}

/// Remove directories this placement created, stopping at the first one in use.
fn prune_created(created: &[PathBuf]) {
    for dir in created {
        if let Err(e) = std::fs::remove_dir(dir) {
            warn!(path = %dir.display(), error = %e, "failed to remove directory created for placement");
            break;
        }
    }
}

/// Copy `selected` (paths relative to `workspace`) into `target`.
///
/// An occupied target fails with [`Error::TargetCollision`] unless
/// `force_overwrite` is set, in which case its previous contents are replaced
/// entirely. Returns the number of files placed. Parent directories created
/// here are removed again when placement fails.
pub fn place(
    workspace: &Path,
    selected: &[PathBuf],
    target: &Path,
    force_overwrite: bool,
) -> Result<usize> {
    let parent = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let created = missing_ancestors(&parent);

    let result = std::fs::create_dir_all(&parent)
        .map_err(Error::fs(&parent))
        .and_then(|()| stage(workspace, selected, &parent))
        .and_then(|staging| swap_into_place(staging, target, &parent, force_overwrite));
    if result.is_err() {
        prune_created(&created);
    }
    result.map(|()| selected.len())
}

fn stage(workspace: &Path, selected: &[PathBuf], parent: &Path) -> Result<TempDir> {
    let staging = tempfile::Builder::new()
        .prefix(".vlurp-staging-")
        .rand_bytes(12)
        .tempdir_in(parent)
        .map_err(Error::fs(parent))?;
    open_permissions(staging.path())?;

    for relative in selected {
        copy_entry(&workspace.join(relative), &staging.path().join(relative))?;
    }
    debug!(files = selected.len(), staging = %staging.path().display(), "staged selection");
    Ok(staging)
}

fn swap_into_place(
    staging: TempDir,
    target: &Path,
    parent: &Path,
    force_overwrite: bool,
) -> Result<()> {
    let state = check_target(target)?;

    let backup = match state {
        TargetState::Absent => None,
        TargetState::Empty => {
            std::fs::remove_dir(target).map_err(Error::fs(target))?;
            None
        }
        TargetState::Occupied { entries } if !force_overwrite => {
            return Err(Error::TargetCollision {
                path: target.to_path_buf(),
                entries,
            });
        }
        TargetState::Occupied { entries } => {
            debug!(target = %target.display(), entries, "replacing existing target");
            let holder = tempfile::Builder::new()
                .prefix(".vlurp-backup-")
                .rand_bytes(12)
                .tempdir_in(parent)
                .map_err(Error::fs(parent))?;
            let backup_path = holder.path().join("previous");
            std::fs::rename(target, &backup_path).map_err(Error::fs(target))?;
            Some((holder, backup_path))
        }
    };

    let staging_path = staging.keep();
    if let Err(e) = std::fs::rename(&staging_path, target) {
        if let Some((holder, backup_path)) = backup {
            if let Err(restore) = std::fs::rename(&backup_path, target) {
                let kept = holder.keep();
                warn!(backup = %kept.display(), error = %restore, "could not restore previous target");
            }
        }
        if let Err(cleanup) = std::fs::remove_dir_all(&staging_path) {
            warn!(path = %staging_path.display(), error = %cleanup, "failed to remove staging directory");
        }
        return Err(Error::fs(target)(e));
    }

    if let Some((holder, _)) = backup {
        let path = holder.path().to_path_buf();
        if let Err(e) = holder.close() {
            warn!(path = %path.display(), error = %e, "failed to remove previous target contents");
        }
    }
    Ok(())
}

/// Copy one file or symlink, creating parent directories as needed.
fn copy_entry(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        // create_dir_all tolerates directories that already exist
        std::fs::create_dir_all(parent).map_err(Error::fs(parent))?;
    }

    let metadata = std::fs::symlink_metadata(src).map_err(Error::fs(src))?;
    if metadata.file_type().is_symlink() {
        let link = std::fs::read_link(src).map_err(Error::fs(src))?;
        return copy_symlink(&link, dst);
    }

    std::fs::copy(src, dst).map_err(Error::fs(dst))?;
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(link: &Path, dst: &Path) -> Result<()> {
    std::os::unix::fs::symlink(link, dst).map_err(Error::fs(dst))
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, dst: &Path) -> Result<()> {
    warn!(path = %dst.display(), target = %link.display(), "symlinks are not supported here, skipping");
    Ok(())
}

/// Temp directories are created owner-only; the placed target should not be.
#[cfg(unix)]
fn open_permissions(dir: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o755)).map_err(Error::fs(dir))
}

#[cfg(not(unix))]
fn open_permissions(_dir: &Path) -> Result<()> {
    Ok(())
}
