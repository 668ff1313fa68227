//! Tag listing through the git smart-HTTP reference advertisement
//!
//! The advertisement is served by the git host directly and does not count
//! against the REST/GraphQL API quota.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::GIT_USER_AGENT;
use crate::version::error::SourceError;
use crate::version::source::VersionSource;
use crate::version::sources::client::{GitHubClient, check_response};
use crate::version::sources::pktline;
use crate::version::types::{Channel, ListOptions, RepoId, Version, Versions};

pub struct GitRefsSource {
    client: Arc<GitHubClient>,
}

impl GitRefsSource {
    pub fn new(client: Arc<GitHubClient>) -> Self {
        Self { client }
    }

    fn refs_url(&self, repo: &RepoId) -> String {
        format!(
            "{}/{}/{}.git/info/refs?service=git-upload-pack",
            self.client.web_url(),
            repo.owner,
            repo.name
        )
    }

    async fn fetch_advertisement(&self, repo: &RepoId) -> Result<Vec<u8>, SourceError> {
        let url = self.refs_url(repo);
        debug!("Fetching ref advertisement: {}", url);

        let response = self
            .client
            .http()
            .get(&url)
            .header("User-Agent", GIT_USER_AGENT)
            .send()
            .await?;
        let response = check_response(Channel::GitProtocol, response, &repo.to_string()).await?;

        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait::async_trait]
impl VersionSource for GitRefsSource {
    fn channel(&self) -> Channel {
        Channel::GitProtocol
    }

    async fn list_versions(
        &self,
        repo: &RepoId,
        options: &ListOptions,
    ) -> Result<Versions, SourceError> {
        let body = self.fetch_advertisement(repo).await?;

        let tags = pktline::parse_tags(&body).map_err(|e| {
            warn!("Malformed ref advertisement for {}: {}", repo, e);
            SourceError::decode(Channel::GitProtocol, e.to_string())
        })?;

        debug!("Found {} tags for {} via git protocol", tags.len(), repo);

        let versions = tags
            .into_iter()
            .map(|t| Version::from_tag(t.name, Channel::GitProtocol).with_commit(t.sha))
            .collect::<Vec<_>>();

        Ok(Versions::new(versions).apply(options))
    }
}
