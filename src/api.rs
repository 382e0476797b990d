use std::path::{Path, PathBuf};

use crate::downloader::{Downloader, DEFAULT_USER_AGENT};
use crate::error::Result;
use crate::fetcher::{self, resolve_target_path, FetchConfig, FetchOptions, FetchOutcome};
use crate::filter::FilterSpec;
use crate::placement::{self, TargetState};
use crate::progress::ProgressFn;
use crate::source::{self, SourceDescriptor, SourceOrigin};
use crate::validator;

// ──────────────────────────────────────────────────────────────────────────────
// Api
// ──────────────────────────────────────────────────────────────────────────────

/// Top-level entry-point with a chainable builder API.
///
/// # Example
/// ```rust,no_run
/// use vlurp::Api;
///
/// #[tokio::main]
/// async fn main() -> vlurp::Result<()> {
///     let outcome = Api::new()
///         .set_root_dir("./vendor")
///         .set_filters(["src/**", "!*.test.js"])
///         .source("owner/repo")?
///         .fetch()
///         .await?;
///     println!("{} files", outcome.file_count);
///     Ok(())
/// }
/// ```
pub struct Api {
    config: FetchConfig,
    user_agent: String,
    proxy: Option<String>,
    progress: Option<ProgressFn>,
}

impl Api {
    /// Create a new `Api` with the default filters and no progress reporting.
    ///
    /// Proxy is read from `HTTP_PROXY` / `HTTPS_PROXY` environment variables.
    pub fn new() -> Self {
        Self::from_config(FetchConfig::default())
    }

    /// Create an `Api` from an explicit configuration.
    pub fn from_config(config: FetchConfig) -> Self {
        let proxy = std::env::var("HTTP_PROXY")
            .ok()
            .filter(|s| !s.is_empty())
            .or_else(|| std::env::var("HTTPS_PROXY").ok().filter(|s| !s.is_empty()));

        Self {
            config,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            proxy,
            progress: None,
        }
    }

    /// Set the root directory that `<owner>/<name>` is created under (builder).
    pub fn set_root_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.config.root_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Replace the filter patterns (builder). An empty list selects everything.
    pub fn set_filters<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.filters = FilterSpec::new(patterns);
        self
    }

    /// Allow replacing an existing non-empty target (builder).
    pub fn force_overwrite(mut self, force: bool) -> Self {
        self.config.force_overwrite = force;
        self
    }

    /// Keep temporary artifacts under `dir` instead of the system temp directory (builder).
    pub fn set_scratch_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.config.scratch_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Override the `User-Agent` header (builder).
    pub fn set_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_owned();
        self
    }

    /// Set an explicit HTTP/HTTPS proxy URL (builder).
    pub fn set_proxy(mut self, proxy: &str) -> Self {
        self.proxy = Some(proxy.to_owned());
        self
    }

    /// Set the progress callback (builder).
    pub fn set_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Disable progress output (builder).
    pub fn no_progress(mut self) -> Self {
        self.progress = None;
        self
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Resolve `source` and return a [`SourceApi`].
    ///
    /// Sources written as URLs must also pass the host allow-list.
    pub fn source(self, source: &str) -> Result<SourceApi> {
        let descriptor = source::resolve(source)?;
        if descriptor.origin() == SourceOrigin::Url {
            validator::validate(descriptor.input()).into_result(descriptor.input())?;
        }
        Ok(SourceApi {
            api: self,
            descriptor,
        })
    }

    fn downloader(&self) -> Downloader {
        Downloader::with_config(&self.user_agent, self.proxy.clone(), self.progress.clone())
    }
}

impl Default for Api {
    fn default() -> Self {
        Self::new()
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// SourceApi
// ──────────────────────────────────────────────────────────────────────────────

/// Intermediate builder after a source has been resolved.
pub struct SourceApi {
    api: Api,
    descriptor: SourceDescriptor,
}

impl SourceApi {
    pub fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    /// Where this source will be placed.
    pub fn target_path(&self) -> Result<PathBuf> {
        resolve_target_path(
            self.descriptor.owner(),
            self.descriptor.name(),
            self.api.config.root_dir.as_deref(),
        )
    }

    /// Inspect the target so a caller can ask before overwriting.
    pub fn check_target(&self) -> Result<TargetState> {
        placement::check_target(&self.target_path()?)
    }

    /// Allow replacing an existing non-empty target (builder).
    pub fn force_overwrite(mut self, force: bool) -> Self {
        self.api.config.force_overwrite = force;
        self
    }

    /// Set the progress callback (builder).
    pub fn set_progress(mut self, progress: ProgressFn) -> Self {
        self.api.progress = Some(progress);
        self
    }

    /// Download, filter and place the source.
    pub async fn fetch(self) -> Result<FetchOutcome> {
        let target = self.target_path()?;
        fetcher::fetch(
            &self.api.downloader(),
            self.descriptor.tarball_url(),
            &target,
            &self.api.config.filters,
            FetchOptions {
                force_overwrite: self.api.config.force_overwrite,
                scratch_dir: self.api.config.scratch_dir.clone(),
            },
        )
        .await
    }
}
