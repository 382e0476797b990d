use std::io;
use std::path::{Path, PathBuf};

/// Errors returned by every stage of the fetch pipeline.
///
/// Each variant is terminal for the operation that produced it.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid input format. Use \"user/repo\" or a GitHub/Gist URL (got {input:?})")]
    InvalidSourceFormat { input: String },

    #[error("{reason}: {url}")]
    UnsupportedHost { url: String, reason: String },

    #[error("Failed to download tarball: HTTP {status}")]
    DownloadFailed { status: u16 },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Directory already exists: {} ({entries} entries)", path.display())]
    TargetCollision { path: PathBuf, entries: usize },

    #[error("failed to extract tarball: {reason}")]
    ExtractionFailed { reason: String },

    #[error("invalid filter pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub(crate) fn fs(path: impl AsRef<Path>) -> impl FnOnce(io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        move |source| Self::Filesystem { path, source }
    }

    pub(crate) fn extraction(reason: impl ToString) -> Self {
        Self::ExtractionFailed {
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
