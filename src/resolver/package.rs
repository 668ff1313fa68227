//! Package descriptors and resolution results

use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::resolver::platform::Platform;
use crate::resolver::template::TemplateVars;
use crate::version::error::SourceError;
use crate::version::normalize::normalize;
use crate::version::types::RepoId;

/// How to find a dependency's releases and assets
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct PackageDescriptor {
    pub name: String,
    /// `owner/repo`
    pub repo: String,
    /// Direct download URL; a trailing `/` means "append the asset name"
    pub url_template: Option<String>,
    /// Asset name patterns keyed by `os-arch`, globbed keys, or `*`
    pub asset_patterns: IndexMap<String, String>,
    /// Filter/transform applied to discovered versions
    pub version_expr: Option<String>,
    /// Extracts checksum and URL from a JSON asset index
    pub assets_expr: Option<String>,
    pub checksum_file: Option<String>,
    /// Version used when resolving without upstream access
    pub fallback_version: Option<String>,
    pub binary_name: Option<String>,
    pub binary_path: Option<String>,
}

impl PackageDescriptor {
    pub fn new(name: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            repo: repo.into(),
            ..Self::default()
        }
    }

    pub fn repo_id(&self) -> Result<RepoId, SourceError> {
        self.repo.parse()
    }

    /// Placeholder values for asset patterns and URL templates
    pub fn template_vars(&self, version: &str, tag: &str, platform: &Platform) -> TemplateVars {
        TemplateVars::new()
            .with("name", self.name.as_str())
            .with("version", version)
            .with("normalized_version", normalize(version))
            .with("tag", tag)
            .with("os", platform.os.as_str())
            .with("arch", platform.arch.as_str())
    }
}

/// Concrete download location for one package on one platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub package: String,
    pub requested_version: String,
    pub version: String,
    pub tag: String,
    /// `os-arch`
    pub platform: String,
    pub download_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum_url: Option<String>,
    /// `<algorithm>:<lowercase-hex>`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    pub is_archive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary_path: Option<String>,
    /// Built without upstream metadata after rate limiting
    pub degraded: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Refuse degraded resolutions, which carry no checksum
    pub strict_checksum: bool,
    /// Upper bound on the whole resolution
    pub deadline: Option<Duration>,
}
