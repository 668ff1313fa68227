//! Caching decorator for a discovery channel

use std::sync::Arc;

use tracing::debug;

use crate::version::cache::DiscoveryCache;
use crate::version::error::SourceError;
use crate::version::source::VersionSource;
use crate::version::types::{Channel, ListOptions, RepoId, Versions};

/// Serves repeated listings of a repository from a [`DiscoveryCache`].
///
/// The inner source is always asked for the raw, unlimited collection; each
/// caller's filter and limit are applied to a copy of the cached entry.
pub struct CachedSource {
    inner: Arc<dyn VersionSource>,
    cache: Arc<DiscoveryCache>,
}

impl CachedSource {
    pub fn new(inner: Arc<dyn VersionSource>, cache: Arc<DiscoveryCache>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait::async_trait]
impl VersionSource for CachedSource {
    fn channel(&self) -> Channel {
        self.inner.channel()
    }

    async fn list_versions(
        &self,
        repo: &RepoId,
        options: &ListOptions,
    ) -> Result<Versions, SourceError> {
        let key = repo.to_string();

        if let Some(versions) = self.cache.get(&key) {
            debug!("Cache hit for {} ({} versions)", key, versions.len());
            return Ok(versions.apply(options));
        }

        let versions = self.inner.list_versions(repo, &ListOptions::raw()).await?;
        self.cache.insert(&key, versions.clone());

        Ok(versions.apply(options))
    }
}
