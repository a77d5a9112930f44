use camino::{Utf8Path, Utf8PathBuf};
use reqwest::Url;

use crate::error::BatchError;

/// Maps a URL to its path component with a single leading `/` removed.
///
/// The path is taken as-is from the parsed URL (still percent-encoded, dot
/// segments already normalized by the parser). Distinct hosts that share a
/// path map to the same destination.
pub fn relative_path(url: &str) -> Result<Utf8PathBuf, BatchError> {
    let parsed =
        Url::parse(url.trim()).map_err(|err| BatchError::InvalidUrl(format!("{url}: {err}")))?;
    if parsed.cannot_be_a_base() {
        return Err(BatchError::InvalidUrl(format!("{url}: no path component")));
    }
    let path = parsed.path();
    let relative = path.strip_prefix('/').unwrap_or(path);
    if relative.is_empty() {
        return Err(BatchError::InvalidUrl(format!("{url}: empty path")));
    }
    Ok(Utf8PathBuf::from(relative))
}

#[derive(Debug, Clone)]
pub struct DestinationResolver {
    root: Utf8PathBuf,
}

impl DestinationResolver {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn resolve(&self, url: &str) -> Result<Utf8PathBuf, BatchError> {
        Ok(self.root.join(relative_path(url)?))
    }
}
