//! Fallback orchestration across discovery channels
//!
//! Discovery asks each channel in order (cached git protocol, REST releases,
//! GraphQL tags) and moves on only when a channel fails for transport,
//! decoding, or not-found reasons. A quota error stops the chain: `discover`
//! returns it, `resolve` switches to degraded resolution.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{GITHUB_URL, NOT_FOUND_DISCOVERY_LIMIT};
use crate::resolver::asset_index::{AssetIndex, HttpAssetIndex};
use crate::resolver::assets::{guess_binary_path, is_archive, match_asset};
use crate::resolver::checksum::normalize_checksum;
use crate::resolver::degraded::{DegradedRequest, resolve_degraded};
use crate::resolver::error::ResolveError;
use crate::resolver::expr::{AssetContext, ExpressionEvaluator, render_field};
use crate::resolver::package::{PackageDescriptor, Resolution, ResolveOptions};
use crate::resolver::platform::{DEFAULT_ASSET_PATTERN, Platform, resolve_asset_pattern};
use crate::resolver::template::{TemplateVars, expand, normalize_url_template};
use crate::version::cache::DiscoveryCache;
use crate::version::error::SourceError;
use crate::version::normalize::normalize;
use crate::version::semver::closest_version;
use crate::version::source::{Release, ReleaseSource, VersionSource, select_latest};
use crate::version::sources::rate_limit::describe_quota;
use crate::version::sources::{CachedSource, GitHubClient, GitRefsSource, GraphqlSource, RestSource};
use crate::version::types::{Channel, ListOptions, RepoId, Version, Versions};

const LATEST: &str = "latest";

/// A concrete download before checksum lookup
struct Target {
    tag: String,
    version: String,
    /// Template variables including `asset`
    vars: TemplateVars,
    download_url: String,
    digest: Option<String>,
}

struct Download {
    url: String,
    checksum: Option<String>,
    checksum_url: Option<String>,
}

pub struct Orchestrator {
    channels: Vec<Arc<dyn VersionSource>>,
    releases: Vec<Arc<dyn ReleaseSource>>,
    asset_index: Arc<dyn AssetIndex>,
    evaluator: Option<Arc<dyn ExpressionEvaluator>>,
    web_url: String,
    /// Where the API credential came from, for rate-limit hints
    credential_source: Option<String>,
}

impl Orchestrator {
    pub fn new(
        channels: Vec<Arc<dyn VersionSource>>,
        releases: Vec<Arc<dyn ReleaseSource>>,
        asset_index: Arc<dyn AssetIndex>,
    ) -> Self {
        Self {
            channels,
            releases,
            asset_index,
            evaluator: None,
            web_url: GITHUB_URL.to_string(),
            credential_source: None,
        }
    }

    /// Default GitHub chain: cached git protocol, REST, then GraphQL for
    /// discovery; REST then GraphQL for release lookups.
    pub fn github(client: Arc<GitHubClient>, cache: Arc<DiscoveryCache>) -> Self {
        let git: Arc<dyn VersionSource> = Arc::new(CachedSource::new(
            Arc::new(GitRefsSource::new(client.clone())),
            cache,
        ));
        let rest = Arc::new(RestSource::new(client.clone()));
        let graphql = Arc::new(GraphqlSource::new(client.clone()));

        let rest_versions: Arc<dyn VersionSource> = rest.clone();
        let graphql_versions: Arc<dyn VersionSource> = graphql.clone();
        let rest_releases: Arc<dyn ReleaseSource> = rest;
        let graphql_releases: Arc<dyn ReleaseSource> = graphql;

        Self::new(
            vec![git, rest_versions, graphql_versions],
            vec![rest_releases, graphql_releases],
            Arc::new(HttpAssetIndex::new(client.http().clone())),
        )
        .with_web_url(client.web_url())
        .with_credential_source(client.credential().map(|c| c.source.clone()))
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn with_web_url(mut self, web_url: &str) -> Self {
        self.web_url = web_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_credential_source(mut self, source: Option<String>) -> Self {
        self.credential_source = source;
        self
    }

    fn evaluator(&self) -> Option<&dyn ExpressionEvaluator> {
        self.evaluator.as_deref()
    }

    /// List versions of a package, newest first.
    ///
    /// With a `version_expr`, channels return their raw, unlimited listing; the
    /// expression runs first and results that are not version-like are dropped
    /// before `limit` (0 for all) applies.
    pub async fn discover(
        &self,
        package: &PackageDescriptor,
        limit: usize,
    ) -> Result<Versions, ResolveError> {
        let repo = package.repo_id()?;

        match package.version_expr.as_deref() {
            None => Ok(self
                .list_versions(&repo, &ListOptions::limited(limit))
                .await?),
            Some(expr) => {
                let raw = self.list_versions(&repo, &ListOptions::raw()).await?;
                let versions = self.apply_version_expr(raw, expr)?;
                Ok(versions.apply(&ListOptions::limited(limit)))
            }
        }
    }

    /// Resolve `requested` (a version, a tag, or `latest`) to a download for `platform`.
    pub async fn resolve(
        &self,
        package: &PackageDescriptor,
        requested: &str,
        platform: &Platform,
        options: &ResolveOptions,
    ) -> Result<Resolution, ResolveError> {
        let resolution = self.resolve_with_fallback(package, requested, platform, options);

        match options.deadline {
            Some(deadline) => tokio::time::timeout(deadline, resolution)
                .await
                .map_err(|_| ResolveError::DeadlineExceeded {
                    package: package.name.clone(),
                })?,
            None => resolution.await,
        }
    }

    async fn resolve_with_fallback(
        &self,
        package: &PackageDescriptor,
        requested: &str,
        platform: &Platform,
        options: &ResolveOptions,
    ) -> Result<Resolution, ResolveError> {
        let requested = match requested.trim() {
            "" => LATEST,
            trimmed => trimmed,
        };
        let repo = package.repo_id()?;

        match self.resolve_upstream(package, &repo, requested, platform).await {
            Err(ResolveError::Source(SourceError::QuotaExceeded(quota))) => {
                let hint = describe_quota(&quota, self.credential_source.as_deref(), Utc::now());
                let request = DegradedRequest {
                    package,
                    requested,
                    platform,
                    web_url: &self.web_url,
                    evaluator: self.evaluator(),
                };
                resolve_degraded(&request, options, quota, hint)
            }
            Err(ResolveError::VersionNotFound { .. }) => {
                Err(self.enhance_not_found(package, requested).await)
            }
            other => other,
        }
    }

    async fn resolve_upstream(
        &self,
        package: &PackageDescriptor,
        repo: &RepoId,
        requested: &str,
        platform: &Platform,
    ) -> Result<Resolution, ResolveError> {
        let target = match package.url_template.as_deref() {
            Some(template) => {
                self.template_target(package, repo, requested, platform, template)
                    .await?
            }
            None => self.release_target(package, repo, requested, platform).await?,
        };

        let download = self.lookup_checksum(package, platform, &target).await;
        let archive = is_archive(&download.url);
        info!(
            "Resolved {} {} for {} to {}",
            package.name, target.version, platform, download.url
        );

        Ok(Resolution {
            package: package.name.clone(),
            requested_version: requested.to_string(),
            version: target.version.clone(),
            tag: target.tag.clone(),
            platform: platform.to_string(),
            download_url: download.url,
            checksum_url: download.checksum_url,
            checksum: download.checksum,
            is_archive: archive,
            binary_path: archive
                .then(|| guess_binary_path(self.evaluator(), package, &target.vars, platform)),
            degraded: false,
        })
    }

    /// URL-template packages: the tag comes from discovery, the URL from the template.
    async fn template_target(
        &self,
        package: &PackageDescriptor,
        repo: &RepoId,
        requested: &str,
        platform: &Platform,
        template: &str,
    ) -> Result<Target, ResolveError> {
        let versions = self.list_versions(repo, &ListOptions::raw()).await?;

        let (tag, version) = if requested == LATEST {
            let newest = self.newest_stable(package, versions)?;
            (newest.tag, newest.version)
        } else {
            let found = self
                .lookup_tag(package, requested, &versions)
                .ok_or_else(|| version_not_found(package, requested))?;
            (found.tag.clone(), requested.to_string())
        };

        let vars = package.template_vars(&version, &tag, platform);
        let asset = expand(asset_pattern(package, platform), &vars)?;
        let vars = vars.with("asset", asset);
        let download_url = expand(&normalize_url_template(template), &vars)?;

        Ok(Target {
            tag,
            version,
            vars,
            download_url,
            digest: None,
        })
    }

    /// Release packages: the release's assets are matched against the pattern.
    async fn release_target(
        &self,
        package: &PackageDescriptor,
        repo: &RepoId,
        requested: &str,
        platform: &Platform,
    ) -> Result<Target, ResolveError> {
        let release = self.select_release(package, repo, requested).await?;
        let version = normalize(&release.tag);
        let vars = package.template_vars(&version, &release.tag, platform);
        let pattern = expand(asset_pattern(package, platform), &vars)?;

        let asset = match_asset(&release.assets, &pattern, platform).ok_or_else(|| {
            ResolveError::AssetNotFound {
                package: package.name.clone(),
                pattern: pattern.clone(),
                platform: platform.to_string(),
                available: release.asset_names(),
            }
        })?;
        debug!("Matched asset {} for pattern '{}'", asset.name, pattern);

        Ok(Target {
            tag: release.tag.clone(),
            version,
            vars: vars.with("asset", asset.name.as_str()),
            download_url: asset.download_url.clone(),
            digest: asset.digest.clone(),
        })
    }

    async fn select_release(
        &self,
        package: &PackageDescriptor,
        repo: &RepoId,
        requested: &str,
    ) -> Result<Release, ResolveError> {
        let (channel, releases) = self.list_releases(repo).await?;

        if requested == LATEST {
            if package.version_expr.is_none() {
                return select_latest(&releases)
                    .cloned()
                    .ok_or_else(|| version_not_found(package, requested));
            }
            let versions = self.list_versions(repo, &ListOptions::raw()).await?;
            let newest = self.newest_stable(package, versions)?;
            return self.release_for_tag(repo, &newest.tag, &releases).await;
        }

        let versions = Versions::new(
            releases
                .iter()
                .map(|r| Version::from_tag(r.tag.clone(), channel))
                .collect(),
        );
        if let Some(found) = self.lookup_tag(package, requested, &versions) {
            return self.release_for_tag(repo, &found.tag, &releases).await;
        }

        // Older releases fall outside the listed page.
        for candidate in tag_candidates(requested) {
            match self.release_by_tag(repo, &candidate).await {
                Ok(release) => return Ok(release),
                Err(SourceError::NotFound { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(version_not_found(package, requested))
    }

    async fn release_for_tag(
        &self,
        repo: &RepoId,
        tag: &str,
        releases: &[Release],
    ) -> Result<Release, ResolveError> {
        match releases.iter().find(|r| r.tag == tag) {
            Some(release) => Ok(release.clone()),
            None => Ok(self.release_by_tag(repo, tag).await?),
        }
    }

    /// Tag lookup: exact or `v`-prefixed tag, normalized equality, then the
    /// version expression applied to each tag on its own.
    fn lookup_tag<'a>(
        &self,
        package: &PackageDescriptor,
        requested: &str,
        versions: &'a Versions,
    ) -> Option<&'a Version> {
        if let Some(found) = versions.find_tag(requested) {
            return Some(found);
        }

        let expr = package.version_expr.as_deref()?;
        let evaluator = self.evaluator()?;
        let wanted = normalize(requested);

        versions.iter().find(|v| {
            let probe = Version::from_tag(v.tag.clone(), v.channel);
            match evaluator.filter_versions(vec![probe], expr) {
                Ok(transformed) => transformed.first().is_some_and(|t| {
                    t.version == requested || t.version == wanted || t.tag == requested
                }),
                Err(e) => {
                    debug!("version_expr failed for tag {}: {}", v.tag, e);
                    false
                }
            }
        })
    }

    fn newest_stable(
        &self,
        package: &PackageDescriptor,
        versions: Versions,
    ) -> Result<Version, ResolveError> {
        let mut candidates = match package.version_expr.as_deref() {
            Some(expr) => self.apply_version_expr(versions, expr)?,
            None => versions,
        };
        candidates.retain_version_like();

        candidates
            .latest()
            .cloned()
            .ok_or_else(|| version_not_found(package, LATEST))
    }

    fn apply_version_expr(&self, versions: Versions, expr: &str) -> Result<Versions, ResolveError> {
        let evaluator = self.evaluator().ok_or_else(|| ResolveError::MissingEvaluator {
            field: expr.to_string(),
        })?;

        let mut records = evaluator.filter_versions(versions.into_vec(), expr)?;
        for record in &mut records {
            let version = std::mem::take(&mut record.version);
            record.set_version(version);
        }

        Ok(Versions::new(records))
    }

    /// Checksum sources in order, stopping at the first hit: the asset digest, a
    /// JSON asset index at the download URL, then `checksum_file` (rendered with
    /// the normalized version) recorded as `checksum_url`.
    async fn lookup_checksum(
        &self,
        package: &PackageDescriptor,
        platform: &Platform,
        target: &Target,
    ) -> Download {
        let mut url = target.download_url.clone();
        let mut checksum = target
            .digest
            .as_deref()
            .and_then(|digest| normalize_checksum(digest, None));

        if checksum.is_none() {
            if let (Some(expr), Some(evaluator)) = (package.assets_expr.as_deref(), self.evaluator())
            {
                if let Some(json) = self.asset_index.fetch_json(&url).await {
                    let context = AssetContext {
                        json,
                        os: platform.os.clone(),
                        arch: platform.arch.clone(),
                        version: target.version.clone(),
                        package: package.name.clone(),
                        platform: platform.to_string(),
                    };
                    match evaluator.extract_asset(&context, expr) {
                        Ok(discovery) => {
                            if let Some(found) = discovery.url.filter(|u| !u.is_empty()) {
                                debug!("Asset index redirects {} to {}", url, found);
                                url = found;
                            }
                            checksum = discovery.checksum.as_deref().and_then(|value| {
                                normalize_checksum(value, discovery.checksum_type.as_deref())
                            });
                        }
                        Err(e) => warn!("Asset index lookup failed for {}: {}", package.name, e),
                    }
                }
            }
        }

        let checksum_url = match (&checksum, package.checksum_file.as_deref()) {
            (None, Some(file)) => {
                let vars = target.vars.clone().with("version", normalize(&target.version));
                self.checksum_url(file, &vars, &url)
            }
            _ => None,
        };

        Download {
            url,
            checksum,
            checksum_url,
        }
    }

    fn checksum_url(&self, file: &str, vars: &TemplateVars, download_url: &str) -> Option<String> {
        let rendered = render_field(self.evaluator(), file, vars)
            .inspect_err(|e| warn!("Failed to render checksum_file: {}", e))
            .ok()
            .filter(|rendered| !rendered.is_empty())?;

        Url::parse(download_url)
            .and_then(|base| base.join(&rendered))
            .map(|url| url.to_string())
            .inspect_err(|e| warn!("Invalid checksum URL '{}': {}", rendered, e))
            .ok()
    }

    /// Rebuild a not-found error with the newest discoverable versions and a suggestion.
    async fn enhance_not_found(&self, package: &PackageDescriptor, requested: &str) -> ResolveError {
        let versions = self
            .discover(package, NOT_FOUND_DISCOVERY_LIMIT)
            .await
            .inspect_err(|e| debug!("Could not list versions of {}: {}", package.name, e))
            .unwrap_or_default();

        let suggestion = closest_version(
            requested,
            versions
                .iter()
                .filter(|v| !v.prerelease)
                .map(|v| v.version.as_str()),
        )
        .map(str::to_string);

        let available = versions
            .iter()
            .map(|v| {
                if v.prerelease {
                    format!("{} (prerelease)", v.version)
                } else {
                    v.version.clone()
                }
            })
            .collect();

        ResolveError::VersionNotFound {
            package: package.name.clone(),
            requested: requested.to_string(),
            available,
            suggestion,
        }
    }

    async fn list_versions(
        &self,
        repo: &RepoId,
        options: &ListOptions,
    ) -> Result<Versions, SourceError> {
        let mut last_error = None;

        for source in &self.channels {
            match source.list_versions(repo, options).await {
                Ok(versions) => {
                    debug!(
                        "{} listed {} versions of {}",
                        source.channel(),
                        versions.len(),
                        repo
                    );
                    return Ok(versions);
                }
                Err(e) if falls_through(&e) => {
                    warn!("{} discovery failed for {}: {}", source.channel(), repo, e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| SourceError::not_found(format!("versions of {repo}"))))
    }

    async fn list_releases(&self, repo: &RepoId) -> Result<(Channel, Vec<Release>), SourceError> {
        let mut last_error = None;

        for source in &self.releases {
            match source.list_releases(repo).await {
                Ok(releases) => return Ok((source.channel(), releases)),
                Err(e) if falls_through(&e) => {
                    warn!("{} release listing failed for {}: {}", source.channel(), repo, e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| SourceError::not_found(format!("releases of {repo}"))))
    }

    async fn release_by_tag(&self, repo: &RepoId, tag: &str) -> Result<Release, SourceError> {
        let mut last_error = None;

        for source in &self.releases {
            match source.release_by_tag(repo, tag).await {
                Ok(release) => return Ok(release),
                Err(e) if falls_through(&e) => {
                    debug!("{} has no release {} for {}: {}", source.channel(), tag, repo, e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error
            .unwrap_or_else(|| SourceError::not_found(format!("release {tag} of {repo}"))))
    }
}

/// Errors that move the chain to the next channel
fn falls_through(error: &SourceError) -> bool {
    matches!(
        error,
        SourceError::Network(_)
            | SourceError::Status { .. }
            | SourceError::Decode { .. }
            | SourceError::NotFound { .. }
    )
}

fn asset_pattern<'a>(package: &'a PackageDescriptor, platform: &Platform) -> &'a str {
    resolve_asset_pattern(&package.asset_patterns, platform).unwrap_or(DEFAULT_ASSET_PATTERN)
}

fn tag_candidates(requested: &str) -> Vec<String> {
    if requested.starts_with('v') {
        vec![requested.to_string()]
    } else {
        vec![requested.to_string(), format!("v{requested}")]
    }
}

fn version_not_found(package: &PackageDescriptor, requested: &str) -> ResolveError {
    ResolveError::VersionNotFound {
        package: package.name.clone(),
        requested: requested.to_string(),
        available: vec![],
        suggestion: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::asset_index::MockAssetIndex;
    use crate::resolver::expr::{AssetDiscovery, MockExpressionEvaluator};
    use crate::version::error::QuotaExceeded;
    use crate::version::source::{MockReleaseSource, MockVersionSource, ReleaseAsset};
    use serde_json::json;

    const SHA256: &str = "9F86D081884C7D659A2FEAA0C55AD015A3BF4F1B2B0B822CD15D6C15B0F00A08";

    fn versions(tags: &[&str], channel: Channel) -> Versions {
        Versions::new(
            tags.iter()
                .map(|t| Version::from_tag(*t, channel))
                .collect(),
        )
    }

    fn quota(channel: Channel) -> SourceError {
        SourceError::QuotaExceeded(QuotaExceeded {
            channel,
            remaining: Some(0),
            total: Some(60),
            reset_at: None,
        })
    }

    fn channel<F>(channel: Channel, times: usize, response: F) -> Arc<dyn VersionSource>
    where
        F: Fn() -> Result<Versions, SourceError> + Send + 'static,
    {
        let mut mock = MockVersionSource::new();
        mock.expect_channel().return_const(channel);
        mock.expect_list_versions()
            .times(times)
            .returning(move |_, _| response());
        Arc::new(mock)
    }

    fn releases<F>(response: F) -> Arc<dyn ReleaseSource>
    where
        F: Fn() -> Result<Vec<Release>, SourceError> + Send + 'static,
    {
        let mut mock = MockReleaseSource::new();
        mock.expect_channel().return_const(Channel::Rest);
        mock.expect_list_releases().returning(move |_| response());
        mock.expect_release_by_tag()
            .returning(|_, tag| Err(SourceError::not_found(format!("release {tag}"))));
        Arc::new(mock)
    }

    fn no_index() -> Arc<dyn AssetIndex> {
        let mut mock = MockAssetIndex::new();
        mock.expect_fetch_json().returning(|_| None);
        Arc::new(mock)
    }

    fn asset(name: &str, digest: Option<&str>) -> ReleaseAsset {
        ReleaseAsset {
            name: name.to_string(),
            download_url: format!("https://github.com/owner/tool/releases/download/v2.1.0/{name}"),
            size: Some(1024),
            content_type: None,
            digest: digest.map(str::to_string),
        }
    }

    fn release(tag: &str, prerelease: bool, assets: Vec<ReleaseAsset>) -> Release {
        Release {
            tag: tag.to_string(),
            name: None,
            draft: false,
            prerelease,
            published_at: None,
            commit: None,
            assets,
        }
    }

    fn linux_amd64() -> Platform {
        Platform::new("linux", "amd64")
    }

    #[tokio::test]
    async fn discover_falls_through_on_status_error() {
        let orchestrator = Orchestrator::new(
            vec![
                channel(Channel::GitProtocol, 1, || {
                    Err(SourceError::Status {
                        channel: Channel::GitProtocol,
                        status: 500,
                        url: "https://github.com/owner/tool.git/info/refs".to_string(),
                    })
                }),
                channel(Channel::Rest, 1, || {
                    Ok(versions(&["v1.0.0", "v1.1.0"], Channel::Rest))
                }),
            ],
            vec![],
            no_index(),
        );

        let result = orchestrator
            .discover(&PackageDescriptor::new("tool", "owner/tool"), 0)
            .await
            .unwrap();

        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|v| v.channel == Channel::Rest));
    }

    #[tokio::test]
    async fn discover_stops_at_quota_error() {
        let orchestrator = Orchestrator::new(
            vec![
                channel(Channel::Rest, 1, || Err(quota(Channel::Rest))),
                channel(Channel::Graphql, 0, || Ok(Versions::default())),
            ],
            vec![],
            no_index(),
        );

        let result = orchestrator
            .discover(&PackageDescriptor::new("tool", "owner/tool"), 0)
            .await;

        assert!(result.unwrap_err().quota().is_some());
    }

    #[tokio::test]
    async fn discover_applies_version_expr_before_limit() {
        let mut source = MockVersionSource::new();
        source.expect_channel().return_const(Channel::GitProtocol);
        source
            .expect_list_versions()
            .withf(|_, options| options.raw && options.limit == 0)
            .returning(|_, _| {
                Ok(versions(
                    &[
                        "v1.0.0", "v1.1.0", "v1.2.0", "v1.3.0", "v1.4.0", "v1.5.0", "v1.6.0",
                        "v2.0.0-rc1", "v1.7.0-beta", "v1.5.1-alpha",
                    ],
                    Channel::GitProtocol,
                ))
            });
        let mut evaluator = MockExpressionEvaluator::new();
        evaluator
            .expect_filter_versions()
            .withf(|_, expr| expr == "!prerelease")
            .returning(|versions, _| Ok(versions.into_iter().filter(|v| !v.prerelease).collect()));

        let orchestrator = Orchestrator::new(vec![Arc::new(source)], vec![], no_index())
            .with_evaluator(Arc::new(evaluator));
        let mut package = PackageDescriptor::new("tool", "owner/tool");
        package.version_expr = Some("!prerelease".to_string());

        let result = orchestrator.discover(&package, 5).await.unwrap();

        assert_eq!(
            result.iter().map(|v| v.version.as_str()).collect::<Vec<_>>(),
            vec!["1.6.0", "1.5.0", "1.4.0", "1.3.0", "1.2.0"]
        );
    }

    #[tokio::test]
    async fn resolve_latest_release_matches_platform_asset() {
        let orchestrator = Orchestrator::new(
            vec![],
            vec![releases(|| {
                Ok(vec![
                    release("v2.2.0-rc1", true, vec![]),
                    release(
                        "v2.1.0",
                        false,
                        vec![
                            asset("tool-linux-amd64", Some(format!("sha256:{SHA256}").as_str())),
                            asset("tool-darwin-arm64", None),
                            asset("checksums.txt", None),
                        ],
                    ),
                ])
            })],
            no_index(),
        );

        let resolution = orchestrator
            .resolve(
                &PackageDescriptor::new("tool", "owner/tool"),
                "latest",
                &linux_amd64(),
                &ResolveOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(resolution.tag, "v2.1.0");
        assert_eq!(resolution.version, "2.1.0");
        assert_eq!(
            resolution.download_url,
            "https://github.com/owner/tool/releases/download/v2.1.0/tool-linux-amd64"
        );
        assert_eq!(
            resolution.checksum,
            Some(format!("sha256:{}", SHA256.to_lowercase()))
        );
        assert!(!resolution.is_archive);
        assert!(!resolution.degraded);
    }

    #[tokio::test]
    async fn resolve_reports_available_assets_when_nothing_matches() {
        let orchestrator = Orchestrator::new(
            vec![],
            vec![releases(|| {
                Ok(vec![release(
                    "v1.0.0",
                    false,
                    vec![
                        asset("tool-linux-amd64.tar.gz", None),
                        asset("tool-linux-amd64-musl.tar.gz", None),
                    ],
                )])
            })],
            no_index(),
        );

        let result = orchestrator
            .resolve(
                &PackageDescriptor::new("tool", "owner/tool"),
                "1.0.0",
                &linux_amd64(),
                &ResolveOptions::default(),
            )
            .await;

        match result {
            Err(ResolveError::AssetNotFound {
                pattern, available, ..
            }) => {
                assert_eq!(pattern, "tool-linux-amd64");
                assert_eq!(available.len(), 2);
            }
            other => panic!("expected AssetNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn resolve_degrades_on_quota() {
        let orchestrator = Orchestrator::new(
            vec![],
            vec![releases(|| Err(quota(Channel::Rest)))],
            no_index(),
        )
        .with_credential_source(Some("GITHUB_TOKEN".to_string()));
        let mut package = PackageDescriptor::new("tool", "owner/tool");
        package
            .asset_patterns
            .insert("linux-amd64".to_string(), "tool-{version}-{os}-{arch}.tar.gz".to_string());

        let resolution = orchestrator
            .resolve(&package, "1.4.0", &linux_amd64(), &ResolveOptions::default())
            .await
            .unwrap();

        assert!(resolution.degraded);
        assert!(resolution.checksum.is_none());
        assert_eq!(
            resolution.download_url,
            "https://github.com/owner/tool/releases/download/v1.4.0/tool-1.4.0-linux-amd64.tar.gz"
        );
    }

    #[tokio::test]
    async fn resolve_strict_checksum_reports_quota_hint() {
        let orchestrator = Orchestrator::new(
            vec![],
            vec![releases(|| Err(quota(Channel::Rest)))],
            no_index(),
        );
        let mut package = PackageDescriptor::new("tool", "owner/tool");
        package
            .asset_patterns
            .insert("*".to_string(), "tool-{os}-{arch}".to_string());
        let options = ResolveOptions {
            strict_checksum: true,
            ..ResolveOptions::default()
        };

        let error = orchestrator
            .resolve(&package, "latest", &linux_amd64(), &options)
            .await
            .unwrap_err();

        assert!(matches!(error, ResolveError::StrictChecksum { .. }));
        assert!(error.to_string().contains("Set GITHUB_TOKEN for 5000/hour limit"));
    }

    #[tokio::test]
    async fn resolve_unknown_version_lists_versions_and_suggestion() {
        let orchestrator = Orchestrator::new(
            vec![channel(Channel::GitProtocol, 1, || {
                Ok(versions(
                    &["v1.3.0", "v1.2.0", "v1.4.0-rc1", "v0.9.0"],
                    Channel::GitProtocol,
                ))
            })],
            vec![releases(|| {
                Ok(vec![
                    release("v1.3.0", false, vec![]),
                    release("v1.2.0", false, vec![]),
                ])
            })],
            no_index(),
        );

        let error = orchestrator
            .resolve(
                &PackageDescriptor::new("tool", "owner/tool"),
                "1.4.0",
                &linux_amd64(),
                &ResolveOptions::default(),
            )
            .await
            .unwrap_err();

        match error {
            ResolveError::VersionNotFound {
                available,
                suggestion,
                ..
            } => {
                assert_eq!(
                    available,
                    vec!["1.4.0-rc1 (prerelease)", "1.3.0", "1.2.0", "0.9.0"]
                );
                assert_eq!(suggestion.as_deref(), Some("1.3.0"));
            }
            other => panic!("expected VersionNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn resolve_template_uses_asset_index_and_checksum_file() {
        let mut index = MockAssetIndex::new();
        index
            .expect_fetch_json()
            .withf(|url| url == "https://dl.example.com/1.2.0/tool-linux-amd64")
            .returning(|_| Some(json!({"linux-amd64": {"sha256": "ABCD"}})));
        let mut evaluator = MockExpressionEvaluator::new();
        evaluator
            .expect_extract_asset()
            .withf(|context, expr| context.platform == "linux-amd64" && expr == "json[platform]")
            .returning(|_, _| {
                Ok(AssetDiscovery {
                    checksum: Some("ABCD".to_string()),
                    checksum_type: Some("sha256".to_string()),
                    url: None,
                })
            });

        let orchestrator = Orchestrator::new(
            vec![channel(Channel::GitProtocol, 1, || {
                Ok(versions(&["v1.2.0", "v1.1.0"], Channel::GitProtocol))
            })],
            vec![],
            Arc::new(index),
        )
        .with_evaluator(Arc::new(evaluator));

        let mut package = PackageDescriptor::new("tool", "owner/tool");
        package.url_template = Some("https://dl.example.com/{version}/".to_string());
        package.assets_expr = Some("json[platform]".to_string());
        package.checksum_file = Some("SHA256SUMS".to_string());

        let resolution = orchestrator
            .resolve(&package, "1.2.0", &linux_amd64(), &ResolveOptions::default())
            .await
            .unwrap();

        assert_eq!(resolution.tag, "v1.2.0");
        assert_eq!(
            resolution.download_url,
            "https://dl.example.com/1.2.0/tool-linux-amd64"
        );
        assert_eq!(resolution.checksum.as_deref(), Some("sha256:abcd"));
        assert_eq!(resolution.checksum_url, None);
    }

    #[tokio::test]
    async fn resolve_template_falls_back_to_checksum_file_with_normalized_version() {
        let orchestrator = Orchestrator::new(
            vec![channel(Channel::GitProtocol, 1, || {
                Ok(versions(&["v1.2.0", "v1.1.0"], Channel::GitProtocol))
            })],
            vec![],
            no_index(),
        );

        let mut package = PackageDescriptor::new("tool", "owner/tool");
        package.url_template = Some("https://dl.example.com/{version}/".to_string());
        package.checksum_file = Some("tool_{version}_checksums.txt".to_string());

        let resolution = orchestrator
            .resolve(&package, "v1.2.0", &linux_amd64(), &ResolveOptions::default())
            .await
            .unwrap();

        assert_eq!(
            resolution.download_url,
            "https://dl.example.com/v1.2.0/tool-linux-amd64"
        );
        assert_eq!(resolution.checksum, None);
        assert_eq!(
            resolution.checksum_url.as_deref(),
            Some("https://dl.example.com/v1.2.0/tool_1.2.0_checksums.txt")
        );
    }

    #[tokio::test]
    async fn resolve_template_matches_tag_through_version_expr() {
        let mut evaluator = MockExpressionEvaluator::new();
        evaluator.expect_filter_versions().returning(|versions, _| {
            Ok(versions
                .into_iter()
                .map(|mut v| {
                    v.version = v.tag.trim_start_matches("tool_").replace('_', ".");
                    v
                })
                .collect())
        });

        let orchestrator = Orchestrator::new(
            vec![channel(Channel::GitProtocol, 1, || {
                Ok(versions(&["tool_1_2_3", "tool_1_2_2"], Channel::GitProtocol))
            })],
            vec![],
            no_index(),
        )
        .with_evaluator(Arc::new(evaluator));

        let mut package = PackageDescriptor::new("tool", "owner/tool");
        package.url_template = Some("https://dl.example.com/{tag}/tool.tar.gz".to_string());
        package.version_expr = Some("tag.replace('_', '.')".to_string());

        let resolution = orchestrator
            .resolve(&package, "1.2.3", &linux_amd64(), &ResolveOptions::default())
            .await
            .unwrap();

        assert_eq!(resolution.tag, "tool_1_2_3");
        assert_eq!(
            resolution.download_url,
            "https://dl.example.com/tool_1_2_3/tool.tar.gz"
        );
        assert!(resolution.is_archive);
        assert_eq!(resolution.binary_path.as_deref(), Some("tool"));
    }

    #[test]
    fn tag_candidates_adds_v_prefix() {
        assert_eq!(tag_candidates("1.0.0"), vec!["1.0.0", "v1.0.0"]);
        assert_eq!(tag_candidates("v1.0.0"), vec!["v1.0.0"]);
    }
}
