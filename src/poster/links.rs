//! Deep links accepted by the app

use super::defaults::{BUNDLE_EXTENSION, DEEP_LINK_APP_HASH, DEEP_LINK_DOWNLOAD, POSTER_APP_LABEL};
use crate::exceptions::{Result, TendiesError};
use std::path::PathBuf;

/// A parsed deep link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeepLink {
    /// Download a bundle from a URL
    Download(String),
    /// Set the poster app's hash
    AppHash(String),
    /// Import a local bundle file
    Import(PathBuf),
}

impl DeepLink {
    pub fn parse(link: &str) -> Result<Self> {
        let suffix = format!(".{BUNDLE_EXTENSION}");

        if let Some(url) = link.strip_prefix(DEEP_LINK_DOWNLOAD) {
            if !url.ends_with(&suffix) {
                return Err(TendiesError::InvalidBundle(format!(
                    "only {suffix} files can be downloaded"
                )));
            }
            return Ok(DeepLink::Download(url.to_string()));
        }

        if let Some(hash) = link.strip_prefix(DEEP_LINK_APP_HASH) {
            if hash.trim().is_empty() {
                return Err(TendiesError::MissingAppHash(POSTER_APP_LABEL.to_string()));
            }
            return Ok(DeepLink::AppHash(hash.trim().to_string()));
        }

        let path = link.strip_prefix("file://").unwrap_or(link);
        if path.ends_with(&suffix) {
            return Ok(DeepLink::Import(PathBuf::from(path)));
        }

        Err(TendiesError::Generic(format!("unrecognised link: {link}")))
    }
}
