//! Resolution without upstream metadata
//!
//! When every channel is out of quota, a package that configures a URL template
//! or a concrete (non-glob) asset pattern can still be resolved to a
//! deterministic download URL. The result carries no checksum.

use tracing::warn;

use crate::resolver::assets::{guess_binary_path, is_archive, is_glob};
use crate::resolver::error::ResolveError;
use crate::resolver::expr::ExpressionEvaluator;
use crate::resolver::package::{PackageDescriptor, Resolution, ResolveOptions};
use crate::resolver::platform::{DEFAULT_ASSET_PATTERN, Platform, resolve_asset_pattern};
use crate::resolver::template::{expand, normalize_url_template};
use crate::version::error::QuotaExceeded;
use crate::version::normalize::normalize;

const LATEST: &str = "latest";

pub struct DegradedRequest<'a> {
    pub package: &'a PackageDescriptor,
    pub requested: &'a str,
    pub platform: &'a Platform,
    /// Web origin for release download links
    pub web_url: &'a str,
    pub evaluator: Option<&'a dyn ExpressionEvaluator>,
}

/// Whether a download URL can be built for `platform` without upstream access
pub fn can_degrade(package: &PackageDescriptor, platform: &Platform) -> bool {
    package.url_template.is_some()
        || resolve_asset_pattern(&package.asset_patterns, platform)
            .is_some_and(|pattern| !is_glob(pattern))
}

/// Build a checksum-less resolution after `quota` stopped every channel.
///
/// `hint` describes the quota for error messages.
pub fn resolve_degraded(
    request: &DegradedRequest<'_>,
    options: &ResolveOptions,
    quota: QuotaExceeded,
    hint: String,
) -> Result<Resolution, ResolveError> {
    let package = request.package;
    let platform = request.platform;

    if options.strict_checksum {
        return Err(ResolveError::StrictChecksum { quota, hint });
    }
    if !can_degrade(package, platform) {
        return Err(ResolveError::DegradedUnavailable { quota, hint });
    }

    let version = if request.requested.is_empty() || request.requested == LATEST {
        package.fallback_version.as_deref().unwrap_or(LATEST)
    } else {
        request.requested
    };
    warn!(
        "{}; resolving {} {} without checksum verification",
        quota, package.name, version
    );

    let tag = if version == LATEST || version.starts_with('v') {
        version.to_string()
    } else {
        format!("v{version}")
    };

    let vars = package.template_vars(&normalize(version), &tag, platform);
    let pattern =
        resolve_asset_pattern(&package.asset_patterns, platform).unwrap_or(DEFAULT_ASSET_PATTERN);
    let asset = expand(pattern, &vars)?;

    let download_url = match &package.url_template {
        Some(template) => expand(
            &normalize_url_template(template),
            &vars.clone().with("asset", asset.as_str()),
        )?,
        None if version == LATEST => format!(
            "{}/{}/releases/latest/download/{}",
            request.web_url, package.repo, asset
        ),
        None => format!(
            "{}/{}/releases/download/{}/{}",
            request.web_url, package.repo, tag, asset
        ),
    };

    let archive = is_archive(&download_url);
    Ok(Resolution {
        package: package.name.clone(),
        requested_version: request.requested.to_string(),
        version: version.to_string(),
        tag,
        platform: platform.to_string(),
        checksum_url: None,
        checksum: None,
        is_archive: archive,
        binary_path: archive
            .then(|| guess_binary_path(request.evaluator, package, &vars, platform)),
        download_url,
        degraded: true,
    })
}
