//! Common types shared by discovery channels and the resolver

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::version::error::SourceError;
use crate::version::normalize::{is_prerelease, normalize};
use crate::version::semver::{compare_versions, is_version_like, parse_lenient};

/// Upstream channel a version record was discovered through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Channel {
    /// git-upload-pack reference advertisement
    GitProtocol,
    /// Paged REST listing
    Rest,
    /// Structured GraphQL query
    Graphql,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Channel::GitProtocol => "git-protocol",
            Channel::Rest => "rest",
            Channel::Graphql => "graphql",
        };
        f.write_str(name)
    }
}

/// GitHub repository identity (`owner/repo`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoId {
    pub owner: String,
    pub name: String,
}

impl RepoId {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoId {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_end_matches(".git");
        match trimmed.split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self::new(owner, name))
            }
            _ => Err(SourceError::InvalidRepo(s.to_string())),
        }
    }
}

/// A single discovered version
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Version {
    /// Tag exactly as published upstream
    pub tag: String,
    /// Normalized version string
    pub version: String,
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    /// Commit the tag points at, when the channel reports it
    pub commit: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub prerelease: bool,
    pub channel: Channel,
}

impl Version {
    /// Build a record from an upstream tag, deriving every computed field.
    pub fn from_tag(tag: impl Into<String>, channel: Channel) -> Self {
        let tag = tag.into();
        let version = normalize(&tag);
        let mut record = Self {
            tag,
            version: String::new(),
            major: 0,
            minor: 0,
            patch: 0,
            commit: None,
            published_at: None,
            prerelease: false,
            channel,
        };
        record.set_version(version);
        record
    }

    pub fn with_commit(mut self, commit: impl Into<String>) -> Self {
        self.commit = Some(commit.into());
        self
    }

    pub fn with_published_at(mut self, published_at: Option<DateTime<Utc>>) -> Self {
        self.published_at = published_at;
        self
    }

    /// Replace the normalized version, recomputing components and prerelease flag.
    pub fn set_version(&mut self, version: String) {
        let (major, minor, patch) = parse_lenient(&version)
            .map(|v| (v.major, v.minor, v.patch))
            .unwrap_or_default();
        self.major = major;
        self.minor = minor;
        self.patch = patch;
        self.prerelease = is_prerelease(&version);
        self.version = version;
    }

    /// Whether the normalized version is semver or has a numeric dotted core
    pub fn is_version_like(&self) -> bool {
        is_version_like(&self.version)
    }
}

/// Options understood by every discovery channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Maximum number of versions to return, 0 for all
    pub limit: usize,
    /// Keep tags that do not parse as semver
    pub raw: bool,
}

impl ListOptions {
    pub fn limited(limit: usize) -> Self {
        Self { limit, raw: false }
    }

    pub fn raw() -> Self {
        Self { limit: 0, raw: true }
    }
}

/// Versions of a repository, ordered from newest to oldest
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Versions {
    items: Vec<Version>,
}

impl Versions {
    /// Build a collection, sorting it newest first.
    pub fn new(items: Vec<Version>) -> Self {
        let mut versions = Self { items };
        versions.sort();
        versions
    }

    /// Stable sort, newest first.
    pub fn sort(&mut self) {
        self.items
            .sort_by(|a, b| compare_versions(&b.version, &a.version));
    }

    /// Keep at most `limit` entries; 0 keeps everything.
    pub fn truncate(&mut self, limit: usize) {
        if limit > 0 {
            self.items.truncate(limit);
        }
    }

    /// Drop entries whose normalized version is not version-like.
    pub fn retain_version_like(&mut self) {
        self.items.retain(Version::is_version_like);
    }

    /// Apply channel list options: version-like filtering unless raw, then the limit.
    pub fn apply(mut self, options: &ListOptions) -> Self {
        if !options.raw {
            self.retain_version_like();
        }
        self.truncate(options.limit);
        self
    }

    /// Newest stable version, falling back to the newest of any kind.
    pub fn latest(&self) -> Option<&Version> {
        self.latest_stable().or_else(|| self.items.first())
    }

    pub fn latest_stable(&self) -> Option<&Version> {
        self.items.iter().find(|v| !v.prerelease)
    }

    /// Find a record by tag: exact match, `v`-prefixed match, then normalized equality.
    pub fn find_tag(&self, requested: &str) -> Option<&Version> {
        let prefixed = format!("v{requested}");
        self.items
            .iter()
            .find(|v| v.tag == requested || v.tag == prefixed)
            .or_else(|| {
                let wanted = normalize(requested);
                self.items.iter().find(|v| v.version == wanted)
            })
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Version> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<Version> {
        self.items
    }
}

impl From<Vec<Version>> for Versions {
    fn from(items: Vec<Version>) -> Self {
        Self::new(items)
    }
}

impl IntoIterator for Versions {
    type Item = Version;
    type IntoIter = std::vec::IntoIter<Version>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
