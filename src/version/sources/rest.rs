//! GitHub REST API channel (paged release listing)

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::PAGE_SIZE;
use crate::version::error::SourceError;
use crate::version::source::{Release, ReleaseAsset, ReleaseSource, VersionSource};
use crate::version::sources::client::{GitHubClient, check_response};
use crate::version::types::{Channel, ListOptions, RepoId, Version, Versions};

/// Response item from the releases endpoints
#[derive(Debug, Deserialize)]
struct RestRelease {
    tag_name: String,
    name: Option<String>,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    prerelease: bool,
    published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    assets: Vec<RestAsset>,
}

#[derive(Debug, Deserialize)]
struct RestAsset {
    name: String,
    browser_download_url: String,
    size: Option<u64>,
    content_type: Option<String>,
    digest: Option<String>,
}

impl From<RestRelease> for Release {
    fn from(r: RestRelease) -> Self {
        Release {
            tag: r.tag_name,
            name: r.name,
            draft: r.draft,
            prerelease: r.prerelease,
            published_at: r.published_at,
            commit: None,
            assets: r
                .assets
                .into_iter()
                .map(|a| ReleaseAsset {
                    name: a.name,
                    download_url: a.browser_download_url,
                    size: a.size,
                    content_type: a.content_type,
                    digest: a.digest.filter(|d| !d.is_empty()),
                })
                .collect(),
        }
    }
}

pub struct RestSource {
    client: Arc<GitHubClient>,
}

impl RestSource {
    pub fn new(client: Arc<GitHubClient>) -> Self {
        Self { client }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &str) -> Result<T, SourceError> {
        let client = &self.client;
        client
            .retry()
            .run(client.sleeper(), move || async move {
                let response = client.rest_get(path).send().await?;
                let response = check_response(Channel::Rest, response, query).await?;
                response
                    .json::<T>()
                    .await
                    .map_err(|e| SourceError::decode(Channel::Rest, e.to_string()))
            })
            .await
    }

    async fn fetch_releases(&self, repo: &RepoId) -> Result<Vec<Release>, SourceError> {
        let path = format!(
            "/repos/{}/{}/releases?per_page={}",
            repo.owner, repo.name, PAGE_SIZE
        );
        let releases: Vec<RestRelease> = self.get_json(&path, &repo.to_string()).await?;

        let releases: Vec<Release> = releases
            .into_iter()
            .filter(|r| !r.draft)
            .map(Release::from)
            .collect();
        debug!("Fetched {} releases for {} via REST", releases.len(), repo);

        Ok(releases)
    }
}

#[async_trait::async_trait]
impl VersionSource for RestSource {
    fn channel(&self) -> Channel {
        Channel::Rest
    }

    async fn list_versions(
        &self,
        repo: &RepoId,
        options: &ListOptions,
    ) -> Result<Versions, SourceError> {
        let versions = self
            .fetch_releases(repo)
            .await?
            .into_iter()
            .map(|r| Version::from_tag(r.tag, Channel::Rest).with_published_at(r.published_at))
            .collect::<Vec<_>>();

        Ok(Versions::new(versions).apply(options))
    }
}

#[async_trait::async_trait]
impl ReleaseSource for RestSource {
    fn channel(&self) -> Channel {
        Channel::Rest
    }

    async fn list_releases(&self, repo: &RepoId) -> Result<Vec<Release>, SourceError> {
        self.fetch_releases(repo).await
    }

    async fn release_by_tag(&self, repo: &RepoId, tag: &str) -> Result<Release, SourceError> {
        let path = format!("/repos/{}/{}/releases/tags/{}", repo.owner, repo.name, tag);
        let release: RestRelease = self
            .get_json(&path, &format!("release {tag} of {repo}"))
            .await?;
        Ok(release.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::source::select_latest;
    use crate::version::sources::retry::RetryPolicy;
    use crate::version::sources::retry::tests::RecordingSleeper;
    use mockito::{Matcher, Server};
    use std::time::Duration;

    const RELEASES: &str = r#"[
        {"tag_name": "v2.1.0-rc1", "name": "2.1.0 RC", "draft": false, "prerelease": true,
         "published_at": "2024-03-01T00:00:00Z", "assets": []},
        {"tag_name": "v3.0.0", "draft": true, "prerelease": false, "published_at": null, "assets": []},
        {"tag_name": "v2.0.0", "name": "2.0.0", "draft": false, "prerelease": false,
         "published_at": "2024-02-01T00:00:00Z",
         "assets": [
            {"name": "tool-linux-amd64.tar.gz",
             "browser_download_url": "https://github.com/o/r/releases/download/v2.0.0/tool-linux-amd64.tar.gz",
             "size": 1024, "content_type": "application/gzip",
             "digest": "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"}
         ]},
        {"tag_name": "v1.9.0", "draft": false, "prerelease": false,
         "published_at": "2024-01-01T00:00:00Z", "assets": []}
    ]"#;

    fn source(server: &Server) -> RestSource {
        RestSource::new(Arc::new(GitHubClient::with_base_url(&server.url()).unwrap()))
    }

    fn repo() -> RepoId {
        RepoId::new("o", "r")
    }

    #[tokio::test]
    async fn list_versions_excludes_drafts_and_sorts() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/repos/o/r/releases")
            .match_query(Matcher::UrlEncoded("per_page".into(), "100".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(RELEASES)
            .create_async()
            .await;

        let result = source(&server)
            .list_versions(&repo(), &ListOptions::default())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(
            result.iter().map(|v| v.tag.as_str()).collect::<Vec<_>>(),
            vec!["v2.1.0-rc1", "v2.0.0", "v1.9.0"]
        );
        assert!(result.iter().all(|v| v.channel == Channel::Rest));
        assert!(result.iter().next().unwrap().published_at.is_some());
    }

    #[tokio::test]
    async fn list_releases_keeps_publish_order_for_latest_selection() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/repos/o/r/releases")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(RELEASES)
            .create_async()
            .await;

        let releases = source(&server).list_releases(&repo()).await.unwrap();

        assert_eq!(releases.len(), 3);
        assert_eq!(select_latest(&releases).map(|r| r.tag.as_str()), Some("v2.0.0"));
        assert_eq!(
            releases[1].assets[0].digest.as_deref(),
            Some("sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
        );
    }

    #[tokio::test]
    async fn release_by_tag_returns_not_found_for_missing_tag() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/repos/o/r/releases/tags/v9.9.9")
            .with_status(404)
            .with_body(r#"{"message": "Not Found"}"#)
            .create_async()
            .await;

        let result = source(&server).release_by_tag(&repo(), "v9.9.9").await;

        assert!(matches!(result, Err(SourceError::NotFound { query }) if query.contains("v9.9.9")));
    }

    #[tokio::test]
    async fn list_versions_returns_quota_error_for_exhausted_limit() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/repos/o/r/releases")
            .match_query(Matcher::Any)
            .with_status(403)
            .with_header("x-ratelimit-limit", "60")
            .with_header("x-ratelimit-remaining", "0")
            .with_body(r#"{"message": "API rate limit exceeded"}"#)
            .expect(1)
            .create_async()
            .await;

        let result = source(&server)
            .list_versions(&repo(), &ListOptions::default())
            .await;

        assert!(result.unwrap_err().is_quota());
    }

    #[tokio::test]
    async fn list_versions_retries_bad_gateway() {
        let mut server = Server::new_async().await;
        let failing = server
            .mock("GET", "/repos/o/r/releases")
            .match_query(Matcher::Any)
            .with_status(502)
            .expect(3)
            .create_async()
            .await;

        let sleeper = Arc::new(RecordingSleeper::default());
        let client = GitHubClient::with_base_url(&server.url())
            .unwrap()
            .with_retry(
                RetryPolicy {
                    max_attempts: 3,
                    base_delay: Duration::from_millis(500),
                    jitter: 0.0,
                },
                sleeper.clone(),
            );
        let result = RestSource::new(Arc::new(client))
            .list_versions(&repo(), &ListOptions::default())
            .await;

        failing.assert_async().await;
        assert!(matches!(result, Err(SourceError::Status { status: 502, .. })));
        assert_eq!(sleeper.delays.lock().unwrap().len(), 2);
    }
}
