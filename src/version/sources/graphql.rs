//! GitHub GraphQL channel (structured tag and release queries)

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::config::{GRAPHQL_MAX_PAGES, PAGE_SIZE};
use crate::version::error::{QuotaExceeded, SourceError};
use crate::version::source::{Release, ReleaseAsset, ReleaseSource, VersionSource};
use crate::version::sources::client::{GitHubClient, check_response};
use crate::version::sources::rate_limit::{RateLimitStatus, looks_like_quota_message};
use crate::version::types::{Channel, ListOptions, RepoId, Version, Versions};

const TAGS_QUERY: &str = r#"
query($owner: String!, $name: String!, $first: Int!, $after: String) {
  repository(owner: $owner, name: $name) {
    refs(refPrefix: "refs/tags/", first: $first, after: $after,
         orderBy: {field: TAG_COMMIT_DATE, direction: DESC}) {
      nodes {
        name
        target {
          __typename
          ... on Commit { oid committedDate }
          ... on Tag { target { ... on Commit { oid committedDate } } }
        }
      }
      pageInfo { hasNextPage endCursor }
    }
  }
}"#;

const RELEASE_FIELDS: &str = r#"
  tagName name isDraft isPrerelease publishedAt
  tagCommit { oid }
  releaseAssets(first: 100) { nodes { name downloadUrl size contentType digest } }
"#;

fn releases_query() -> String {
    format!(
        r#"query($owner: String!, $name: String!, $first: Int!) {{
  repository(owner: $owner, name: $name) {{
    releases(first: $first, orderBy: {{field: CREATED_AT, direction: DESC}}) {{
      nodes {{ {RELEASE_FIELDS} }}
    }}
  }}
}}"#
    )
}

fn release_by_tag_query() -> String {
    format!(
        r#"query($owner: String!, $name: String!, $tag: String!) {{
  repository(owner: $owner, name: $name) {{
    release(tagName: $tag) {{ {RELEASE_FIELDS} }}
  }}
}}"#
    )
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    #[serde(rename = "type")]
    kind: Option<String>,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RepositoryData<T> {
    repository: Option<T>,
}

#[derive(Debug, Deserialize)]
struct RefsRepository {
    refs: Option<RefConnection>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefConnection {
    nodes: Vec<RefNode>,
    page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefNode {
    name: String,
    target: Option<RefTarget>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "__typename")]
enum RefTarget {
    Commit(CommitInfo),
    Tag {
        #[serde(default)]
        target: Option<CommitInfo>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CommitInfo {
    oid: Option<String>,
    committed_date: Option<DateTime<Utc>>,
}

impl RefTarget {
    fn commit(&self) -> Option<&CommitInfo> {
        match self {
            RefTarget::Commit(commit) => Some(commit),
            RefTarget::Tag { target } => target.as_ref(),
            RefTarget::Other => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReleasesRepository {
    releases: ReleaseConnection,
}

#[derive(Debug, Deserialize)]
struct ReleaseConnection {
    nodes: Vec<ReleaseNode>,
}

#[derive(Debug, Deserialize)]
struct ReleaseRepository {
    release: Option<ReleaseNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReleaseNode {
    tag_name: String,
    name: Option<String>,
    is_draft: bool,
    is_prerelease: bool,
    published_at: Option<DateTime<Utc>>,
    tag_commit: Option<CommitInfo>,
    release_assets: AssetConnection,
}

#[derive(Debug, Deserialize)]
struct AssetConnection {
    nodes: Vec<AssetNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetNode {
    name: String,
    download_url: String,
    size: Option<u64>,
    content_type: Option<String>,
    digest: Option<String>,
}

impl From<ReleaseNode> for Release {
    fn from(node: ReleaseNode) -> Self {
        Release {
            tag: node.tag_name,
            name: node.name,
            draft: node.is_draft,
            prerelease: node.is_prerelease,
            published_at: node.published_at,
            commit: node.tag_commit.and_then(|c| c.oid),
            assets: node
                .release_assets
                .nodes
                .into_iter()
                .map(|a| ReleaseAsset {
                    name: a.name,
                    download_url: a.download_url,
                    size: a.size,
                    content_type: a.content_type,
                    digest: a.digest.filter(|d| !d.is_empty()),
                })
                .collect(),
        }
    }
}

pub struct GraphqlSource {
    client: Arc<GitHubClient>,
}

impl GraphqlSource {
    pub fn new(client: Arc<GitHubClient>) -> Self {
        Self { client }
    }

    /// Execute a query, retrying transient failures, and unwrap `data`.
    async fn query<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
        subject: &str,
    ) -> Result<T, SourceError> {
        let client = &self.client;
        let body = json!({ "query": query, "variables": variables });
        let body = &body;

        client
            .retry()
            .run(client.sleeper(), move || async move {
                let response = client
                    .authorize(client.http().post(client.graphql_url()).json(body))
                    .send()
                    .await?;
                let response = check_response(Channel::Graphql, response, subject).await?;
                let rate = RateLimitStatus::from_headers(response.headers());

                let parsed: GraphqlResponse<T> = response
                    .json()
                    .await
                    .map_err(|e| SourceError::decode(Channel::Graphql, e.to_string()))?;

                if !parsed.errors.is_empty() {
                    return Err(classify_errors(parsed.errors, rate, subject));
                }

                parsed
                    .data
                    .ok_or_else(|| SourceError::decode(Channel::Graphql, "response has no data"))
            })
            .await
    }

    async fn fetch_tags(&self, repo: &RepoId, options: &ListOptions) -> Result<Vec<Version>, SourceError> {
        let subject = repo.to_string();
        let mut versions = Vec::new();
        let mut after: Option<String> = None;

        for page in 0..GRAPHQL_MAX_PAGES {
            let data: RepositoryData<RefsRepository> = self
                .query(
                    TAGS_QUERY,
                    json!({
                        "owner": repo.owner,
                        "name": repo.name,
                        "first": PAGE_SIZE,
                        "after": after,
                    }),
                    &subject,
                )
                .await?;

            let refs = data
                .repository
                .ok_or_else(|| SourceError::not_found(subject.clone()))?
                .refs
                .ok_or_else(|| SourceError::not_found(subject.clone()))?;

            for node in refs.nodes {
                let commit = node.target.as_ref().and_then(RefTarget::commit);
                let mut version = Version::from_tag(node.name, Channel::Graphql)
                    .with_published_at(commit.and_then(|c| c.committed_date));
                if let Some(oid) = commit.and_then(|c| c.oid.clone()) {
                    version = version.with_commit(oid);
                }
                versions.push(version);
            }

            let enough = options.limit > 0
                && versions.iter().filter(|v| options.raw || v.is_version_like()).count() >= options.limit;
            if enough || !refs.page_info.has_next_page {
                break;
            }

            debug!("Fetching tag page {} for {}", page + 2, repo);
            after = refs.page_info.end_cursor;
        }

        Ok(versions)
    }
}

/// Turn GraphQL `errors` into the closed error set; quota first, then not-found.
fn classify_errors(
    errors: Vec<GraphqlError>,
    rate: Option<RateLimitStatus>,
    subject: &str,
) -> SourceError {
    let rate_limited = errors.iter().any(|e| {
        e.kind.as_deref() == Some("RATE_LIMITED") || looks_like_quota_message(&e.message)
    });
    if rate_limited {
        warn!("GraphQL quota exhausted for {}", subject);
        return SourceError::QuotaExceeded(match rate {
            Some(rate) => rate.into_quota_error(Channel::Graphql),
            None => QuotaExceeded {
                channel: Channel::Graphql,
                remaining: None,
                total: None,
                reset_at: None,
            },
        });
    }

    if errors.iter().any(|e| e.kind.as_deref() == Some("NOT_FOUND")) {
        return SourceError::not_found(subject);
    }

    let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
    SourceError::decode(Channel::Graphql, messages.join("; "))
}

#[async_trait::async_trait]
impl VersionSource for GraphqlSource {
    fn channel(&self) -> Channel {
        Channel::Graphql
    }

    async fn list_versions(
        &self,
        repo: &RepoId,
        options: &ListOptions,
    ) -> Result<Versions, SourceError> {
        let versions = self.fetch_tags(repo, options).await?;
        debug!("Fetched {} tags for {} via GraphQL", versions.len(), repo);
        Ok(Versions::new(versions).apply(options))
    }
}

#[async_trait::async_trait]
impl ReleaseSource for GraphqlSource {
    fn channel(&self) -> Channel {
        Channel::Graphql
    }

    async fn list_releases(&self, repo: &RepoId) -> Result<Vec<Release>, SourceError> {
        let subject = repo.to_string();
        let data: RepositoryData<ReleasesRepository> = self
            .query(
                &releases_query(),
                json!({ "owner": repo.owner, "name": repo.name, "first": PAGE_SIZE }),
                &subject,
            )
            .await?;

        let repository = data
            .repository
            .ok_or_else(|| SourceError::not_found(subject))?;

        Ok(repository
            .releases
            .nodes
            .into_iter()
            .filter(|r| !r.is_draft)
            .map(Release::from)
            .collect())
    }

    async fn release_by_tag(&self, repo: &RepoId, tag: &str) -> Result<Release, SourceError> {
        let subject = format!("release {tag} of {repo}");
        let data: RepositoryData<ReleaseRepository> = self
            .query(
                &release_by_tag_query(),
                json!({ "owner": repo.owner, "name": repo.name, "tag": tag }),
                &subject,
            )
            .await?;

        data.repository
            .and_then(|r| r.release)
            .map(Release::from)
            .ok_or_else(|| SourceError::not_found(subject))
    }
}
