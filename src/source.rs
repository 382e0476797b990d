//! Source resolution.
//!
//! Turns the string a user typed (`owner/name`, a GitHub URL, a gist URL, an
//! scp-style remote) into a [`SourceDescriptor`] naming the tarball to fetch.
//! Resolution is purely lexical; nothing here touches the network.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use url::Url;

use crate::error::{Error, Result};

const CODELOAD_BASE: &str = "https://codeload.github.com/";
const DEFAULT_REFERENCE: &str = "HEAD";

static OWNER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9-]*$").expect("owner pattern compiles"));
static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("name pattern compiles"));
static SCP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Za-z0-9._-]+@)?((?:www\.)?github\.com|gist\.github\.com):(.+)$")
        .expect("scp pattern compiles")
});

const URL_SCHEMES: &[&str] = &["https", "http", "git", "git+https", "git+ssh", "ssh"];

/// Which kind of hosted artifact a source points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Github,
    Gist,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Github => f.write_str("github"),
            Self::Gist => f.write_str("gist"),
        }
    }
}

/// How the source string was written.
///
/// Only [`SourceOrigin::Url`] sources go through the host allow-list in
/// [`crate::validator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceOrigin {
    Url,
    Shorthand,
}

/// A fully resolved, immutable description of what to download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceDescriptor {
    kind: SourceKind,
    owner: String,
    name: String,
    reference: Option<String>,
    tarball_url: Url,
    origin: SourceOrigin,
    input: String,
}

impl SourceDescriptor {
    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The explicit revision requested, if any. `None` means `HEAD`.
    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    pub fn tarball_url(&self) -> &Url {
        &self.tarball_url
    }

    pub fn origin(&self) -> SourceOrigin {
        self.origin
    }

    /// The string this descriptor was resolved from.
    pub fn input(&self) -> &str {
        &self.input
    }
}

/// Identity extracted from a recognized hosted-git URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Recognized {
    pub kind: SourceKind,
    pub owner: String,
    pub name: String,
    pub reference: Option<String>,
}

/// Resolve a user-supplied source string.
///
/// Accepts a recognized GitHub/gist URL, or `owner/name` shorthand when the
/// input carries no scheme. Anything else fails with
/// [`Error::InvalidSourceFormat`].
pub fn resolve(source: &str) -> Result<SourceDescriptor> {
    let input = source.trim();
    let invalid = || Error::InvalidSourceFormat {
        input: source.to_owned(),
    };

    if let Some(found) = recognize(input) {
        return describe(found, SourceOrigin::Url, input).ok_or_else(invalid);
    }

    if !input.contains("://") && input.contains('/') {
        let found = parse_shorthand(input).ok_or_else(invalid)?;
        return describe(found, SourceOrigin::Shorthand, input).ok_or_else(invalid);
    }

    Err(invalid())
}

/// Match `input` against the known GitHub host patterns.
pub(crate) fn recognize(input: &str) -> Option<Recognized> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Some(rest) = input.strip_prefix("github:") {
        return parse_shorthand(rest);
    }

    if !input.contains("://") {
        let caps = SCP_RE.captures(input)?;
        let host = caps.get(1)?.as_str();
        let (path, fragment) = split_fragment(caps.get(2)?.as_str());
        return from_parts(host, path, fragment);
    }

    let url = Url::parse(input).ok()?;
    if !URL_SCHEMES.contains(&url.scheme()) {
        return None;
    }
    let host = url.host_str()?.to_ascii_lowercase();
    from_parts(&host, url.path(), url.fragment())
}

fn parse_shorthand(input: &str) -> Option<Recognized> {
    let (path, fragment) = split_fragment(input);
    let segments: Vec<&str> = path.split('/').collect();
    let [owner, name] = segments.as_slice() else {
        return None;
    };
    identity(SourceKind::Github, owner, name, fragment)
}

fn from_parts(host: &str, path: &str, fragment: Option<&str>) -> Option<Recognized> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    match host {
        "github.com" | "www.github.com" => match segments.as_slice() {
            [owner, name] => identity(SourceKind::Github, owner, name, fragment),
            [owner, name, "tree", rest @ ..] if !rest.is_empty() => {
                let tree_ref = rest.join("/");
                identity(
                    SourceKind::Github,
                    owner,
                    name,
                    fragment.or(Some(tree_ref.as_str())),
                )
            }
            [owner, name, "commit", sha] => {
                identity(SourceKind::Github, owner, name, fragment.or(Some(*sha)))
            }
            _ => None,
        },
        "gist.github.com" => match segments.as_slice() {
            [owner, id] => identity(SourceKind::Gist, owner, id, fragment),
            [owner, id, aux] if *aux != "raw" => identity(SourceKind::Gist, owner, id, fragment),
            _ => None,
        },
        _ => None,
    }
}

fn identity(
    kind: SourceKind,
    owner: &str,
    name: &str,
    reference: Option<&str>,
) -> Option<Recognized> {
    let name = name.strip_suffix(".git").unwrap_or(name);
    if !OWNER_RE.is_match(owner) || !NAME_RE.is_match(name) || name == "." || name == ".." {
        return None;
    }

    let reference = match reference.map(str::trim) {
        None | Some("") => None,
        Some(r) if r.split('/').any(|s| s.is_empty() || s == "." || s == "..") => return None,
        Some(r) if r.chars().any(|c| c.is_whitespace() || c.is_control()) => return None,
        Some(r) => Some(r.to_owned()),
    };

    Some(Recognized {
        kind,
        owner: owner.to_owned(),
        name: name.to_owned(),
        reference,
    })
}

fn split_fragment(input: &str) -> (&str, Option<&str>) {
    match input.split_once('#') {
        Some((path, fragment)) => (path, Some(fragment)),
        None => (input, None),
    }
}

fn describe(found: Recognized, origin: SourceOrigin, input: &str) -> Option<SourceDescriptor> {
    let tarball_url = tarball_url(&found).ok()?;
    Some(SourceDescriptor {
        kind: found.kind,
        owner: found.owner,
        name: found.name,
        reference: found.reference,
        tarball_url,
        origin,
        input: input.to_owned(),
    })
}

/// Build the codeload tarball URL for a recognized source.
fn tarball_url(found: &Recognized) -> std::result::Result<Url, url::ParseError> {
    let mut url = Url::parse(CODELOAD_BASE)?;
    let reference = found.reference.as_deref().unwrap_or(DEFAULT_REFERENCE);
    {
        let Ok(mut segments) = url.path_segments_mut() else {
            return Err(url::ParseError::RelativeUrlWithCannotBeABaseBase);
        };
        segments.pop_if_empty();
        match found.kind {
            SourceKind::Github => segments.extend([found.owner.as_str(), found.name.as_str()]),
            SourceKind::Gist => segments.extend(["gist", found.name.as_str()]),
        };
        segments.push("tar.gz").extend(reference.split('/'));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shorthand_resolves_owner_and_name() {
        let d = resolve("facebook/react").unwrap();
        assert_eq!(d.kind(), SourceKind::Github);
        assert_eq!(d.owner(), "facebook");
        assert_eq!(d.name(), "react");
        assert_eq!(d.origin(), SourceOrigin::Shorthand);
        assert_eq!(
            d.tarball_url().as_str(),
            "https://codeload.github.com/facebook/react/tar.gz/HEAD"
        );
    }

    #[test]
    fn shorthand_property_holds_for_varied_identifiers() {
        for (owner, name) in [
            ("a", "b"),
            ("eyaltoledano", "claude-task-master"),
            ("rust-lang", "rust.vim"),
            ("A1", "x_y.z"),
        ] {
            let d = resolve(&format!("{owner}/{name}")).unwrap();
            assert_eq!(d.owner(), owner);
            assert_eq!(d.name(), name);
        }
    }

    #[test]
    fn github_url_variants() {
        for input in [
            "https://github.com/nodejs/node",
            "https://github.com/nodejs/node.git",
            "https://www.github.com/nodejs/node/",
            "git+https://github.com/nodejs/node.git",
            "git://github.com/nodejs/node.git",
            "git@github.com:nodejs/node.git",
            "github:nodejs/node",
        ] {
            let d = resolve(input).unwrap_or_else(|e| panic!("{input}: {e}"));
            assert_eq!(d.kind(), SourceKind::Github, "{input}");
            assert_eq!(d.owner(), "nodejs", "{input}");
            assert_eq!(d.name(), "node", "{input}");
            assert_eq!(d.origin(), SourceOrigin::Url, "{input}");
        }
    }

    #[test]
    fn revision_from_tree_path_or_fragment() {
        let d = resolve("https://github.com/owner/repo/tree/feature/x").unwrap();
        assert_eq!(d.reference(), Some("feature/x"));
        assert_eq!(
            d.tarball_url().as_str(),
            "https://codeload.github.com/owner/repo/tar.gz/feature/x"
        );

        let d = resolve("owner/repo#v1.2.3").unwrap();
        assert_eq!(d.reference(), Some("v1.2.3"));
        assert!(d.tarball_url().as_str().ends_with("/tar.gz/v1.2.3"));

        let d = resolve("https://github.com/owner/repo/commit/abc123").unwrap();
        assert_eq!(d.name(), "repo");
        assert_eq!(d.reference(), Some("abc123"));
        assert_eq!(
            d.tarball_url().as_str(),
            "https://codeload.github.com/owner/repo/tar.gz/abc123"
        );

        let d = resolve("https://github.com/owner/repo/commit/abc123#v2").unwrap();
        assert_eq!(d.reference(), Some("v2"));

        assert!(resolve("https://github.com/owner/repo/commit").is_err());
        assert!(resolve("https://github.com/owner/repo/commit/abc/extra").is_err());
    }

    #[test]
    fn gist_urls_resolve_to_gist_tarballs() {
        let d = resolve("https://gist.github.com/octocat/6cad326836d38bd3a7ae").unwrap();
        assert_eq!(d.kind(), SourceKind::Gist);
        assert_eq!(d.owner(), "octocat");
        assert_eq!(d.name(), "6cad326836d38bd3a7ae");
        assert_eq!(
            d.tarball_url().as_str(),
            "https://codeload.github.com/gist/6cad326836d38bd3a7ae/tar.gz/HEAD"
        );
    }

    #[test]
    fn gist_without_owner_is_rejected() {
        let err = resolve("https://gist.github.com/6cad326836d38bd3a7ae").unwrap_err();
        assert!(matches!(err, Error::InvalidSourceFormat { .. }));
    }

    #[test]
    fn no_slash_and_no_scheme_is_invalid() {
        for input in ["invalid-format", "", "react", "github.com"] {
            let err = resolve(input).unwrap_err();
            assert!(matches!(err, Error::InvalidSourceFormat { .. }), "{input}");
        }
    }

    #[test]
    fn foreign_hosts_and_malformed_shorthand_are_invalid() {
        for input in [
            "https://gitlab.com/user/repo",
            "https://github.com/user",
            "https://github.com/user/repo/issues",
            "ftp://github.com/user/repo",
            "user/repo/extra",
            "/repo",
            "user/",
            "user/..",
            "-user/repo",
        ] {
            let err = resolve(input).unwrap_err();
            assert!(matches!(err, Error::InvalidSourceFormat { .. }), "{input}");
        }
    }
}
