//! The fetch pipeline: acquire, extract, filter, place, clean up.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::{NamedTempFile, TempDir};
use tracing::{debug, info, warn};
use url::Url;

use crate::downloader::Downloader;
use crate::error::{Error, Result};
use crate::extract::extract_tarball;
use crate::filter::{collect_files, FilterSpec, PatternFilter};
use crate::placement::{check_target, count_entries, place};

/// Everything a fetch needs besides the source itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchConfig {
    /// Directory under which `<owner>/<name>` is created. Defaults to the current directory.
    pub root_dir: Option<PathBuf>,
    pub filters: FilterSpec,
    /// Replace an existing non-empty target instead of failing.
    pub force_overwrite: bool,
    /// Directory for the temporary tarball and extraction workspace. Defaults
    /// to the system temporary directory.
    pub scratch_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOptions {
    pub force_overwrite: bool,
    /// See [`FetchConfig::scratch_dir`].
    pub scratch_dir: Option<PathBuf>,
}

/// Result of a successful fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchOutcome {
    pub target: PathBuf,
    /// Selected files placed in the target.
    pub file_count: usize,
    /// Files plus directories now under the target.
    pub entry_count: usize,
}

/// `<root>/<owner>/<name>`, with `root` resolved against the current directory.
pub fn resolve_target_path(owner: &str, name: &str, root: Option<&Path>) -> Result<PathBuf> {
    let cwd = std::env::current_dir().map_err(Error::fs("."))?;
    let base = match root {
        Some(root) if root.is_absolute() => root.to_path_buf(),
        Some(root) => cwd.join(root),
        None => cwd,
    };
    Ok(base.join(owner).join(name))
}

/// Temporary artifacts owned by one fetch.
#[derive(Default)]
struct Scratch {
    tarball: Option<NamedTempFile>,
    workspace: Option<TempDir>,
}

impl Scratch {
    /// Remove whatever was created. Failures are logged, never returned.
    fn cleanup(self) {
        if let Some(tarball) = self.tarball {
            let path = tarball.path().to_path_buf();
            if let Err(e) = tarball.close() {
                warn!(path = %path.display(), error = %e, "failed to remove temporary tarball");
            }
        }
        if let Some(workspace) = self.workspace {
            let path = workspace.path().to_path_buf();
            if let Err(e) = workspace.close() {
                warn!(path = %path.display(), error = %e, "failed to remove extraction workspace");
            }
        }
    }
}

/// Download `tarball_url`, keep what `filters` selects, and place it at `target`.
///
/// An occupied target fails with [`Error::TargetCollision`] before any network
/// access unless `options.force_overwrite` is set. Temporary artifacts are
/// removed on every path out of this function.
pub async fn fetch(
    downloader: &Downloader,
    tarball_url: &Url,
    target: &Path,
    filters: &FilterSpec,
    options: FetchOptions,
) -> Result<FetchOutcome> {
    let state = check_target(target)?;
    if state.is_collision() && !options.force_overwrite {
        return Err(Error::TargetCollision {
            path: target.to_path_buf(),
            entries: state.entries(),
        });
    }
    let filter = PatternFilter::new(filters)?;

    let mut scratch = Scratch::default();
    let result = run(downloader, tarball_url, target, filter, options, &mut scratch).await;
    scratch.cleanup();

    let file_count = result?;
    let entry_count = count_entries(target);
    info!(files = file_count, target = %target.display(), "fetch complete");
    Ok(FetchOutcome {
        target: target.to_path_buf(),
        file_count,
        entry_count,
    })
}

async fn run(
    downloader: &Downloader,
    tarball_url: &Url,
    target: &Path,
    filter: PatternFilter,
    options: FetchOptions,
    scratch: &mut Scratch,
) -> Result<usize> {
    let scratch_root = options.scratch_dir.unwrap_or_else(std::env::temp_dir);
    let tarball = scratch
        .tarball
        .insert(downloader.download_tarball(tarball_url, &scratch_root).await?);
    let workspace = scratch
        .workspace
        .insert(extract_tarball(tarball.path(), &scratch_root).await?);
    let force_overwrite = options.force_overwrite;

    let workspace = workspace.path().to_path_buf();
    let target = target.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let candidates = collect_files(&workspace)?;
        let selected = filter.select(&candidates);
        debug!(candidates = candidates.len(), selected = selected.len(), "filter applied");
        if selected.is_empty() {
            warn!("no files matched the filter patterns");
        }
        place(&workspace, &selected, &target, force_overwrite)
    })
    .await
    .map_err(|e| Error::Filesystem {
        path: PathBuf::new(),
        source: std::io::Error::other(e),
    })?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_defaults_to_current_directory() {
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(
            resolve_target_path("user", "repo", None).unwrap(),
            cwd.join("user").join("repo")
        );
    }

    #[test]
    fn target_under_absolute_root() {
        let root = std::env::temp_dir();
        assert_eq!(
            resolve_target_path("user", "repo", Some(&root)).unwrap(),
            root.join("user").join("repo")
        );
    }

    #[test]
    fn relative_root_resolves_against_current_directory() {
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(
            resolve_target_path("user", "repo", Some(Path::new("./repos"))).unwrap(),
            cwd.join("./repos").join("user").join("repo")
        );
    }

    #[tokio::test]
    async fn collision_fails_before_any_download() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("existing"), "x").unwrap();

        // Port 9 (discard) is never contacted because the collision check comes first.
        let url = Url::parse("http://127.0.0.1:9/never").unwrap();
        let err = fetch(
            &Downloader::new(),
            &url,
            root.path(),
            &FilterSpec::default(),
            FetchOptions::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::TargetCollision { entries: 1, .. }), "{err}");
        assert!(root.path().join("existing").exists());
    }

    #[tokio::test]
    async fn invalid_pattern_fails_before_any_download() {
        let root = tempfile::tempdir().unwrap();
        let url = Url::parse("http://127.0.0.1:9/never").unwrap();
        let err = fetch(
            &Downloader::new(),
            &url,
            &root.path().join("repo"),
            &FilterSpec::new(["[z-"]),
            FetchOptions::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::InvalidPattern { .. }), "{err}");
        assert!(!root.path().join("repo").exists());
    }
}
