//! Test doubles shared by the integration tests

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use release_resolver::resolver::asset_index::AssetIndex;
use release_resolver::resolver::expr::{AssetContext, AssetDiscovery, ExprError, ExpressionEvaluator};
use release_resolver::version::error::{QuotaExceeded, SourceError};
use release_resolver::version::source::{Release, ReleaseAsset, ReleaseSource, VersionSource};
use release_resolver::version::types::{Channel, ListOptions, RepoId, Version, Versions};

/// Discovery channel serving fixed tags per repository
pub struct FakeSource {
    channel: Channel,
    tags: HashMap<String, Vec<String>>,
    failure: Option<fn(Channel) -> SourceError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl FakeSource {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            tags: HashMap::new(),
            failure: None,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_tags(mut self, repo: &str, tags: &[&str]) -> Self {
        self.tags
            .insert(repo.to_string(), tags.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn failing(mut self, failure: fn(Channel) -> SourceError) -> Self {
        self.failure = Some(failure);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VersionSource for FakeSource {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn list_versions(
        &self,
        repo: &RepoId,
        options: &ListOptions,
    ) -> Result<Versions, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(failure) = self.failure {
            return Err(failure(self.channel));
        }

        let tags = self
            .tags
            .get(&repo.to_string())
            .ok_or_else(|| SourceError::not_found(repo.to_string()))?;
        let versions = tags
            .iter()
            .map(|t| Version::from_tag(t.as_str(), self.channel))
            .collect();

        Ok(Versions::new(versions).apply(options))
    }
}

/// Release channel serving fixed releases per repository
pub struct FakeReleases {
    channel: Channel,
    releases: HashMap<String, Vec<Release>>,
    failure: Option<fn(Channel) -> SourceError>,
    calls: AtomicUsize,
}

impl FakeReleases {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            releases: HashMap::new(),
            failure: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_releases(mut self, repo: &str, releases: Vec<Release>) -> Self {
        self.releases.insert(repo.to_string(), releases);
        self
    }

    pub fn failing(mut self, failure: fn(Channel) -> SourceError) -> Self {
        self.failure = Some(failure);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn lookup(&self, repo: &RepoId) -> Result<&Vec<Release>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = self.failure {
            return Err(failure(self.channel));
        }
        self.releases
            .get(&repo.to_string())
            .ok_or_else(|| SourceError::not_found(repo.to_string()))
    }
}

#[async_trait]
impl ReleaseSource for FakeReleases {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn list_releases(&self, repo: &RepoId) -> Result<Vec<Release>, SourceError> {
        self.lookup(repo).cloned()
    }

    async fn release_by_tag(&self, repo: &RepoId, tag: &str) -> Result<Release, SourceError> {
        self.lookup(repo)?
            .iter()
            .find(|r| r.tag == tag)
            .cloned()
            .ok_or_else(|| SourceError::not_found(format!("release {tag} of {repo}")))
    }
}

/// Evaluator understanding a handful of fixed expressions
pub struct FakeEvaluator;

impl ExpressionEvaluator for FakeEvaluator {
    fn filter_versions(&self, versions: Vec<Version>, expr: &str) -> Result<Vec<Version>, ExprError> {
        match expr {
            "!prerelease" => Ok(versions.into_iter().filter(|v| !v.prerelease).collect()),
            "true" => Ok(versions),
            _ => Err(ExprError {
                expr: expr.to_string(),
                message: "unsupported expression".to_string(),
            }),
        }
    }

    fn extract_asset(&self, context: &AssetContext, expr: &str) -> Result<AssetDiscovery, ExprError> {
        if expr != "json[platform]" {
            return Err(ExprError {
                expr: expr.to_string(),
                message: "unsupported expression".to_string(),
            });
        }

        let entry = &context.json[&context.platform];
        Ok(AssetDiscovery {
            checksum: entry["sha256"].as_str().map(str::to_string),
            checksum_type: Some("sha256".to_string()),
            url: entry["url"].as_str().map(str::to_string),
        })
    }

    fn evaluate_field(&self, expr: &str, vars: &BTreeMap<String, String>) -> Result<String, ExprError> {
        match expr {
            "os == 'windows' ? 'tool.exe' : 'bin/tool'" => {
                let windows = vars.get("os").is_some_and(|os| os == "windows");
                Ok(if windows { "tool.exe" } else { "bin/tool" }.to_string())
            }
            _ => Err(ExprError {
                expr: expr.to_string(),
                message: "unsupported expression".to_string(),
            }),
        }
    }
}

/// Asset index returning the same document for every URL
pub struct StaticIndex(pub Option<Value>);

#[async_trait]
impl AssetIndex for StaticIndex {
    async fn fetch_json(&self, _url: &str) -> Option<Value> {
        self.0.clone()
    }
}

pub fn no_index() -> Arc<dyn AssetIndex> {
    Arc::new(StaticIndex(None))
}

pub fn quota(channel: Channel) -> SourceError {
    SourceError::QuotaExceeded(QuotaExceeded {
        channel,
        remaining: Some(0),
        total: Some(60),
        reset_at: None,
    })
}

pub fn server_error(channel: Channel) -> SourceError {
    SourceError::Status {
        channel,
        status: 500,
        url: "https://example.invalid".to_string(),
    }
}

pub fn release(repo: &str, tag: &str, prerelease: bool, assets: &[&str]) -> Release {
    Release {
        tag: tag.to_string(),
        name: None,
        draft: false,
        prerelease,
        published_at: None,
        commit: None,
        assets: assets
            .iter()
            .map(|name| ReleaseAsset {
                name: name.to_string(),
                download_url: format!("https://github.com/{repo}/releases/download/{tag}/{name}"),
                size: Some(1024),
                content_type: None,
                digest: None,
            })
            .collect(),
    }
}

/// Encode a git ref advertisement as served by `info/refs?service=git-upload-pack`
pub fn advertisement(refs: &[(&str, &str)]) -> Vec<u8> {
    fn pkt_line(payload: &str) -> String {
        format!("{:04x}{}", payload.len() + 4, payload)
    }

    let mut body = pkt_line("# service=git-upload-pack\n");
    body.push_str("0000");
    for (i, (sha, name)) in refs.iter().enumerate() {
        if i == 0 {
            body.push_str(&pkt_line(&format!("{sha} {name}\0multi_ack side-band-64k\n")));
        } else {
            body.push_str(&pkt_line(&format!("{sha} {name}\n")));
        }
    }
    body.push_str("0000");
    body.into_bytes()
}
