//! Traits implemented by discovery channels

#[cfg(test)]
use mockall::automock;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::version::error::SourceError;
use crate::version::types::{Channel, ListOptions, RepoId, Versions};

/// Trait for listing the versions of a repository through one upstream channel
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait VersionSource: Send + Sync {
    /// Returns the channel this implementation talks to
    fn channel(&self) -> Channel;

    /// Lists versions of a repository
    ///
    /// # Returns
    /// * `Ok(Versions)` - Versions ordered from newest to oldest, filtered and
    ///   limited according to `options`
    /// * `Err(SourceError)` - If the channel fails
    async fn list_versions(
        &self,
        repo: &RepoId,
        options: &ListOptions,
    ) -> Result<Versions, SourceError>;
}

/// Trait for looking up releases and their assets
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait ReleaseSource: Send + Sync {
    fn channel(&self) -> Channel;

    /// Lists releases in upstream publish order (newest first), drafts excluded
    async fn list_releases(&self, repo: &RepoId) -> Result<Vec<Release>, SourceError>;

    /// Fetches the release published under `tag`
    async fn release_by_tag(&self, repo: &RepoId, tag: &str) -> Result<Release, SourceError>;
}

/// A published release
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Release {
    pub tag: String,
    pub name: Option<String>,
    pub draft: bool,
    pub prerelease: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub commit: Option<String>,
    pub assets: Vec<ReleaseAsset>,
}

/// A downloadable file attached to a release
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub download_url: String,
    pub size: Option<u64>,
    pub content_type: Option<String>,
    /// Upstream-computed digest such as `sha256:<hex>`
    pub digest: Option<String>,
}

impl Release {
    pub fn asset_names(&self) -> Vec<String> {
        self.assets.iter().map(|a| a.name.clone()).collect()
    }
}

/// Pick the "latest" release: the first non-draft, non-prerelease release in
/// publish order, or the first non-draft release when every release is a prerelease.
pub fn select_latest(releases: &[Release]) -> Option<&Release> {
    releases
        .iter()
        .find(|r| !r.draft && !r.prerelease)
        .or_else(|| releases.iter().find(|r| !r.draft))
}
