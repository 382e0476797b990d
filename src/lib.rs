//! # vlurp
//!
//! Fetch a GitHub repository or gist tarball, keep only the files matching a
//! set of glob patterns, and place them under `<root>/<owner>/<name>`.
//!
//! The pipeline runs source resolution, host validation, tarball download,
//! extraction (stripping the tarball's root directory), filtering, and
//! placement, then removes every temporary artifact it created.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vlurp::Api;
//!
//! #[tokio::main]
//! async fn main() {
//!     let outcome = Api::new()
//!         .set_root_dir("./vendor")
//!         .source("eyaltoledano/claude-task-master")
//!         .unwrap()
//!         .fetch()
//!         .await
//!         .unwrap();
//!     println!("vlurped {} files", outcome.file_count);
//! }
//! ```

pub mod api;
pub mod downloader;
pub mod error;
pub mod extract;
pub mod fetcher;
pub mod filter;
pub mod placement;
pub mod progress;
pub mod source;
pub mod tree;
pub mod validator;

pub use api::{Api, SourceApi};
pub use downloader::Downloader;
pub use error::{Error, Result};
pub use fetcher::{fetch, resolve_target_path, FetchConfig, FetchOptions, FetchOutcome};
pub use filter::{FilterSpec, PatternFilter, DEFAULT_FILTERS};
pub use placement::{check_target, count_entries, TargetState};
pub use progress::ProgressFn;
pub use source::{resolve, SourceDescriptor, SourceKind, SourceOrigin};
pub use tree::render_tree;
pub use validator::{validate, Validation};
