//! Glob-based include/exclude selection over extracted paths.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::Serialize;
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Patterns applied when the caller supplies none.
pub const DEFAULT_FILTERS: &[&str] = &[".claude/**", "CLAUDE.md"];

/// Marks a pattern as an exclusion.
pub const NEGATION_SIGIL: char = '!';

/// Ordered list of include and `!`-prefixed exclude patterns.
///
/// Order is kept for display only; exclusions win over inclusions regardless
/// of position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FilterSpec {
    patterns: Vec<String>,
}

impl FilterSpec {
    /// Build a spec from raw patterns. An empty list selects every file.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Patterns without the negation sigil.
    pub fn includes(&self) -> impl Iterator<Item = &str> {
        self.patterns
            .iter()
            .map(String::as_str)
            .filter(|p| !p.starts_with(NEGATION_SIGIL))
    }

    /// Negated patterns, sigil stripped.
    pub fn excludes(&self) -> impl Iterator<Item = &str> {
        self.patterns
            .iter()
            .filter_map(|p| p.strip_prefix(NEGATION_SIGIL))
    }
}

impl Default for FilterSpec {
    fn default() -> Self {
        Self::new(DEFAULT_FILTERS.iter().copied())
    }
}

/// One side (include or exclude) of a compiled filter.
///
/// Patterns containing `/` are anchored to the full relative path; patterns
/// without one match the final path segment anywhere in the tree.
#[derive(Debug, Clone)]
struct PatternSet {
    anchored: GlobSet,
    basename: GlobSet,
}

impl PatternSet {
    fn compile<'a>(patterns: impl Iterator<Item = &'a str>) -> Result<Self> {
        let mut anchored = GlobSetBuilder::new();
        let mut basename = GlobSetBuilder::new();

        for pattern in patterns {
            let normalized = pattern.trim_start_matches("./").trim_start_matches('/');
            let glob = GlobBuilder::new(normalized)
                .literal_separator(true)
                .build()
                .map_err(|source| Error::InvalidPattern {
                    pattern: pattern.to_owned(),
                    source,
                })?;
            if pattern.contains('/') {
                anchored.add(glob);
            } else {
                basename.add(glob);
            }
        }

        let build = |builder: GlobSetBuilder| {
            builder.build().map_err(|source| Error::InvalidPattern {
                pattern: String::new(),
                source,
            })
        };
        Ok(Self {
            anchored: build(anchored)?,
            basename: build(basename)?,
        })
    }

    fn is_empty(&self) -> bool {
        self.anchored.is_empty() && self.basename.is_empty()
    }

    fn is_match(&self, path: &Path) -> bool {
        if self.anchored.is_match(path) {
            return true;
        }
        path.file_name()
            .is_some_and(|name| self.basename.is_match(Path::new(name)))
    }
}

/// A compiled [`FilterSpec`].
#[derive(Debug, Clone)]
pub struct PatternFilter {
    include: PatternSet,
    exclude: PatternSet,
}

impl PatternFilter {
    /// Compile `spec`. Fails with [`Error::InvalidPattern`] on malformed globs.
    pub fn new(spec: &FilterSpec) -> Result<Self> {
        Ok(Self {
            include: PatternSet::compile(spec.includes())?,
            exclude: PatternSet::compile(spec.excludes())?,
        })
    }

    /// `true` iff `path` matches some include (or there are none) and no exclude.
    ///
    /// Matching is case-sensitive and dot-prefixed names are ordinary names.
    pub fn is_selected(&self, path: &Path) -> bool {
        let included = self.include.is_empty() || self.include.is_match(path);
        included && !self.exclude.is_match(path)
    }

    /// Select from `paths`, returning a sorted, de-duplicated list.
    pub fn select<I, P>(&self, paths: I) -> Vec<PathBuf>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        paths
            .into_iter()
            .filter(|p| self.is_selected(p.as_ref()))
            .map(|p| p.as_ref().to_path_buf())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// List every non-directory entry under `root`, relative to `root`.
///
/// Directories are not candidates themselves; they come along only as parents
/// of selected files. Symlinks are listed but never followed.
pub fn collect_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false).min_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            Error::Filesystem {
                path,
                source: e.into(),
            }
        })?;
        if entry.file_type().is_dir() {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(root) {
            files.push(relative.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}
