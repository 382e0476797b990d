use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use reqwest::{Client, Proxy, StatusCode};
use tempfile::NamedTempFile;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};
use crate::progress::{mib_per_sec, ProgressFn};

pub const DEFAULT_USER_AGENT: &str = "vlurp-cli";

/// Downloads hosted tarballs into private temporary files.
#[derive(Clone)]
pub struct Downloader {
    /// Value of the `User-Agent` header sent with every request.
    pub user_agent: String,
    /// Optional HTTP proxy URL.
    pub proxy: Option<String>,
    /// Optional progress callback.
    pub progress: Option<ProgressFn>,
}

impl Default for Downloader {
    fn default() -> Self {
        Self::new()
    }
}

impl Downloader {
    /// Create a downloader with default settings and no progress reporting.
    pub fn new() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            proxy: None,
            progress: None,
        }
    }

    /// Create a downloader with explicit configuration.
    pub fn with_config(
        user_agent: &str,
        proxy: Option<String>,
        progress: Option<ProgressFn>,
    ) -> Self {
        Self {
            user_agent: user_agent.to_owned(),
            proxy,
            progress,
        }
    }

    /// Build an HTTP client that uses exactly the configured proxy, if any.
    ///
    /// Only connecting is bounded; the transfer itself may take as long as it takes.
    fn build_client(&self) -> std::result::Result<Client, reqwest::Error> {
        let builder = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .user_agent(self.user_agent.as_str());
        let builder = match &self.proxy {
            Some(proxy_url) => builder.proxy(Proxy::all(proxy_url)?),
            None => builder.no_proxy(),
        };
        builder.build()
    }

    /// Stream the tarball at `url` into a fresh temporary file under `scratch_root`.
    ///
    /// Issues exactly one GET. Anything but `200 OK` fails with
    /// [`Error::DownloadFailed`] before a temporary file is created. The file is
    /// named `vlurp-<random>.tar.gz` and is deleted when the returned handle drops.
    pub async fn download_tarball(&self, url: &Url, scratch_root: &Path) -> Result<NamedTempFile> {
        let client = self.build_client()?;
        debug!(%url, "requesting tarball");
        let resp = client.get(url.as_str()).send().await?;

        if resp.status() != StatusCode::OK {
            return Err(Error::DownloadFailed {
                status: resp.status().as_u16(),
            });
        }

        let mut file = create_temp_tarball(scratch_root)?;
        let path = file.path().to_path_buf();

        let total = resp.content_length().unwrap_or(0);
        let mut downloaded: u64 = 0;
        let mut stream = resp.bytes_stream();

        let src = url.to_string();
        let start = Instant::now();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            downloaded += chunk.len() as u64;
            file.write_all(&chunk).map_err(Error::fs(&path))?;

            if let Some(progress) = &self.progress {
                progress(&src, downloaded, total, mib_per_sec(downloaded, start), false);
            }
        }
        file.flush().map_err(Error::fs(&path))?;

        if let Some(progress) = &self.progress {
            progress(&src, downloaded, total, mib_per_sec(downloaded, start), true);
        }

        debug!(bytes = downloaded, path = %path.display(), "tarball downloaded");
        Ok(file)
    }
}

/// Create the uniquely named temporary file a download streams into.
pub(crate) fn create_temp_tarball(scratch_root: &Path) -> Result<NamedTempFile> {
    tempfile::Builder::new()
        .prefix("vlurp-")
        .suffix(".tar.gz")
        .rand_bytes(16)
        .tempfile_in(scratch_root)
        .map_err(Error::fs(scratch_root))
}
