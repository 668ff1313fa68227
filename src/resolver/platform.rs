//! Target platform parsing and per-platform asset pattern selection

use std::fmt;
use std::str::FromStr;

use fast_glob::glob_match;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::resolver::error::ResolveError;

/// Pattern used when a package configures no asset pattern for the platform
pub const DEFAULT_ASSET_PATTERN: &str = "{name}-{os}-{arch}";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    /// Build a platform, normalizing OS and architecture aliases.
    pub fn new(os: &str, arch: &str) -> Self {
        Self {
            os: normalize_os(os),
            arch: normalize_arch(arch),
        }
    }

    /// Platform of the running process
    pub fn current() -> Self {
        Self::new(std::env::consts::OS, std::env::consts::ARCH)
    }

    pub fn is_windows(&self) -> bool {
        self.os == "windows"
    }

    /// Append `.exe` on Windows unless already present.
    pub fn executable_name(&self, name: &str) -> String {
        if self.is_windows() && !name.to_lowercase().ends_with(".exe") {
            format!("{name}.exe")
        } else {
            name.to_string()
        }
    }

    /// Substrings that identify this OS in asset file names
    pub fn os_aliases(&self) -> Vec<&str> {
        match self.os.as_str() {
            "darwin" => vec!["darwin", "mac", "macos", "osx"],
            "windows" => vec!["windows", "win", "win32", "win64"],
            other => vec![other],
        }
    }

    /// Substrings that identify this architecture in asset file names
    pub fn arch_aliases(&self) -> Vec<&str> {
        match self.arch.as_str() {
            "amd64" => vec!["amd64", "x86_64", "x64", "x86-64", "64bit", "64-bit"],
            "arm64" => vec!["arm64", "aarch64", "arm"],
            "arm" => vec!["arm", "armv7", "armv7l"],
            "386" => vec!["386", "i386", "i686", "x86"],
            other => vec![other],
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

impl FromStr for Platform {
    type Err = ResolveError;

    /// Parse `os-arch`, e.g. `linux-amd64` or `macos-aarch64`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once('-') {
            Some((os, arch)) if !os.is_empty() && !arch.is_empty() => Ok(Self::new(os, arch)),
            _ => Err(ResolveError::InvalidPlatform(s.to_string())),
        }
    }
}

fn normalize_os(os: &str) -> String {
    match os.to_lowercase().as_str() {
        "macos" | "osx" | "mac" => "darwin".to_string(),
        "win" | "win32" | "win64" => "windows".to_string(),
        other => other.to_string(),
    }
}

fn normalize_arch(arch: &str) -> String {
    match arch.to_lowercase().as_str() {
        "x86_64" | "x64" | "amd64" => "amd64".to_string(),
        "aarch64" | "arm64" => "arm64".to_string(),
        "i386" | "i686" | "x86" | "386" => "386".to_string(),
        "armv7" | "armv7l" | "arm" => "arm".to_string(),
        other => other.to_string(),
    }
}

/// Choose the asset pattern for `platform`.
///
/// Precedence: exact `os-arch` key, then glob or comma-separated keys in
/// configuration order (`darwin-*`, `linux-*,darwin-*`), then the `*` key.
pub fn resolve_asset_pattern<'a>(
    patterns: &'a IndexMap<String, String>,
    platform: &Platform,
) -> Option<&'a str> {
    let key = platform.to_string();

    if let Some(pattern) = patterns.get(&key) {
        return Some(pattern.as_str());
    }

    let glob_hit = patterns.iter().find(|(k, _)| {
        k.as_str() != "*" && (k.contains('*') || k.contains(',')) && matches_platform_key(k, &key)
    });
    if let Some((_, pattern)) = glob_hit {
        return Some(pattern.as_str());
    }

    patterns.get("*").map(String::as_str)
}

/// Whether `key` (possibly comma-separated globs) matches `platform_key`.
pub fn matches_platform_key(key: &str, platform_key: &str) -> bool {
    key.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .any(|p| glob_match(p, platform_key))
}
