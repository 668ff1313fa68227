//! Tag normalization and prerelease classification
//!
//! Upstream tags follow many conventions (`v1.2.3`, `release-1.2`, `jq-1.7`,
//! `1.0.0-release`). [`normalize`] maps them onto a plain version string that the
//! rest of the crate can compare.

/// Case-insensitive word prefixes stripped from tags (`version-1.2`, `Release-1.2`)
const WORD_PREFIXES: &[&str] = &["version-", "release-"];

/// Suffixes stripped from tags (`1.2.3-release`)
const SUFFIXES: &[&str] = &["-release", "-Release", "-RELEASE"];

/// Substrings that mark a version as a prerelease
const PRERELEASE_MARKERS: &[&str] = &[
    "alpha", "beta", "rc", "pre", "dev", "nightly", "snapshot", "-ea",
];

/// Normalize an upstream tag into a version string.
///
/// Strips `version-`/`release-` prefixes, a `v` directly followed by a digit, and
/// a `-release` suffix. If the remainder is valid semver it is returned as-is;
/// otherwise a leading `{word}-` or `{word}_` is removed when what follows looks
/// like a version (`jq-1.7` -> `1.7`). Date-like remainders are kept intact, so
/// `build-2024-02-07` is returned unchanged.
///
/// Applying `normalize` twice yields the same result as applying it once.
pub fn normalize(tag: &str) -> String {
    let mut current = tag.trim();

    loop {
        let stripped = strip_affixes(current).trim();
        if stripped == current {
            break;
        }
        current = stripped;
    }

    if semver::Version::parse(current).is_ok() {
        return current.to_string();
    }

    strip_name_prefix(current).unwrap_or(current).to_string()
}

/// Returns true when the version carries a prerelease marker.
pub fn is_prerelease(version: &str) -> bool {
    let lower = version.to_lowercase();
    PRERELEASE_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Strip one layer of known prefixes and suffixes.
fn strip_affixes(value: &str) -> &str {
    let mut current = value;

    for prefix in WORD_PREFIXES {
        let matches = current
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix));
        if matches {
            current = &current[prefix.len()..];
        }
    }

    current = strip_v_prefix(current);

    for suffix in SUFFIXES {
        if let Some(rest) = current.strip_suffix(suffix) {
            current = rest;
        }
    }

    current
}

/// Strip `v`/`V` only when a digit follows, so `vim-9.0` keeps its name.
fn strip_v_prefix(value: &str) -> &str {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some('v' | 'V'), Some(c)) if c.is_ascii_digit() => &value[1..],
        _ => value,
    }
}

/// Remove a leading `{word}-` or `{word}_` when the remainder is version-shaped.
fn strip_name_prefix(value: &str) -> Option<&str> {
    let separator = value.find(['-', '_'])?;
    let word = &value[..separator];
    if !word.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return None;
    }

    let remainder = strip_v_prefix(&value[separator + 1..]);
    looks_like_version(remainder).then_some(remainder)
}

/// A version-shaped string starts with a digit, has a dot followed by a digit,
/// and has no dash before its first dot (which rules out `YYYY-MM-DD`).
pub fn looks_like_version(value: &str) -> bool {
    if !value.starts_with(|c: char| c.is_ascii_digit()) {
        return false;
    }

    let Some(first_dot) = value.find('.') else {
        return false;
    };

    if value[..first_dot].contains('-') {
        return false;
    }

    value
        .as_bytes()
        .windows(2)
        .any(|pair| pair[0] == b'.' && pair[1].is_ascii_digit())
}
