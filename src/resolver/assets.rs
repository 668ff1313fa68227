//! Release asset matching and archive detection

use fast_glob::glob_match;
use tracing::debug;

use crate::resolver::expr::{ExpressionEvaluator, render_field};
use crate::resolver::package::PackageDescriptor;
use crate::resolver::platform::Platform;
use crate::resolver::template::TemplateVars;
use crate::version::source::ReleaseAsset;

const NON_BINARY_EXTENSIONS: &[&str] = &[
    ".asc", ".sig", ".gpg", ".pem", ".sha1", ".sha256", ".sha512", ".md5", ".checksum", ".txt",
    ".json", ".yaml",
];

const NON_BINARY_PREFIXES: &[&str] = &["CHANGELOG", "README", "LICENSE", "COPYING", "NOTICE", "AUTHORS"];

const ARCHIVE_EXTENSIONS: &[&str] = &[
    ".tar.gz", ".tgz", ".tar.bz2", ".tbz2", ".tar.xz", ".txz", ".zip", ".7z", ".rar",
];

/// Find the asset for an expanded `pattern`.
///
/// Tries an exact name match, then a glob match when the pattern contains glob
/// metacharacters, then narrows all assets by platform. The platform filter only
/// succeeds when exactly one asset survives.
pub fn match_asset<'a>(
    assets: &'a [ReleaseAsset],
    pattern: &str,
    platform: &Platform,
) -> Option<&'a ReleaseAsset> {
    if let Some(asset) = assets.iter().find(|a| a.name == pattern) {
        return Some(asset);
    }

    if is_glob(pattern) {
        if let Some(asset) = assets.iter().find(|a| glob_match(pattern, &a.name)) {
            return Some(asset);
        }
    }

    let candidates = filter_by_platform(assets.iter().collect(), platform);
    debug!(
        "Platform filter for '{}' on {} left {} candidate(s)",
        pattern,
        platform,
        candidates.len()
    );
    match candidates.as_slice() {
        [single] => Some(*single),
        _ => None,
    }
}

/// Narrow assets to the platform: drop non-binary files, then keep assets naming
/// the OS, then assets naming the architecture. A stage that matches nothing
/// keeps its input (universal binaries).
pub fn filter_by_platform<'a>(
    assets: Vec<&'a ReleaseAsset>,
    platform: &Platform,
) -> Vec<&'a ReleaseAsset> {
    let binaries: Vec<_> = assets.into_iter().filter(|a| !is_non_binary(&a.name)).collect();
    let by_os = keep_matching(binaries, &platform.os_aliases());
    keep_matching(by_os, &platform.arch_aliases())
}

fn keep_matching<'a>(assets: Vec<&'a ReleaseAsset>, aliases: &[&str]) -> Vec<&'a ReleaseAsset> {
    let matching: Vec<_> = assets
        .iter()
        .copied()
        .filter(|a| {
            let name = a.name.to_lowercase();
            aliases.iter().any(|alias| name.contains(alias))
        })
        .collect();

    if matching.is_empty() { assets } else { matching }
}

/// Signatures, checksum lists and documentation shipped next to binaries
pub fn is_non_binary(name: &str) -> bool {
    let lower = name.to_lowercase();
    let upper = name.to_uppercase();
    NON_BINARY_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
        || NON_BINARY_PREFIXES.iter().any(|prefix| upper.starts_with(prefix))
}

pub fn is_archive(name_or_url: &str) -> bool {
    let lower = name_or_url.to_lowercase();
    ARCHIVE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

pub fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

/// Path of the executable inside an archive.
///
/// `binary_path` is rendered as an expression or template and used literally
/// when rendering fails; otherwise `binary_name`, otherwise the package name.
pub fn guess_binary_path(
    evaluator: Option<&dyn ExpressionEvaluator>,
    package: &PackageDescriptor,
    vars: &TemplateVars,
    platform: &Platform,
) -> String {
    if let Some(path) = &package.binary_path {
        return render_field(evaluator, path, vars)
            .inspect_err(|e| debug!("Using binary_path literally: {}", e))
            .ok()
            .filter(|rendered| !rendered.is_empty())
            .unwrap_or_else(|| path.clone());
    }

    if let Some(name) = &package.binary_name {
        return name.clone();
    }

    platform.executable_name(&package.name)
}
