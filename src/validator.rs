//! Host allow-list check for explicit URLs.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::source::{recognize, SourceKind};

pub const REASON_INVALID_INPUT: &str = "Invalid URL provided";
pub const REASON_UNSUPPORTED_HOST: &str = "URL must be from github.com or gist.github.com";

/// Result of checking a URL against the GitHub host allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Validation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<SourceKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Validation {
    fn rejected(reason: &str) -> Self {
        Self {
            valid: false,
            kind: None,
            owner: None,
            name: None,
            reason: Some(reason.to_owned()),
        }
    }

    /// Convert a rejection into [`Error::UnsupportedHost`].
    pub fn into_result(self, url: &str) -> Result<Self> {
        if self.valid {
            return Ok(self);
        }
        Err(Error::UnsupportedHost {
            url: url.to_owned(),
            reason: self
                .reason
                .unwrap_or_else(|| REASON_UNSUPPORTED_HOST.to_owned()),
        })
    }
}

/// Check that `url` points at github.com or gist.github.com.
///
/// Only hosts on the allow-list pass; there is no deny-list.
pub fn validate(url: &str) -> Validation {
    if url.trim().is_empty() {
        return Validation::rejected(REASON_INVALID_INPUT);
    }

    match recognize(url) {
        Some(found) => Validation {
            valid: true,
            kind: Some(found.kind),
            owner: Some(found.owner),
            name: Some(found.name),
            reason: None,
        },
        None => Validation::rejected(REASON_UNSUPPORTED_HOST),
    }
}
