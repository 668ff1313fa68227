use std::cmp::Ordering;

use semver::Version as SemVer;

/// Version core with build metadata removed
fn version_core(version: &str) -> &str {
    version.split('+').next().unwrap_or(version)
}

/// Numeric components of a version core, major first.
///
/// Strict semver yields exactly three; anything else splits on dots with
/// non-numeric parts read as zero.
fn numeric_components(version: &str) -> Vec<u64> {
    let core = version_core(version);
    match SemVer::parse(core) {
        Ok(v) => vec![v.major, v.minor, v.patch],
        Err(_) => core
            .split('.')
            .map(|part| part.parse::<u64>().unwrap_or(0))
            .collect(),
    }
}

/// Whether `version` looks like a release number.
///
/// True for strict semver and for any dotted core whose first component is
/// all digits, so `1`, `2024.01.15`, `1.2.3.4` and `1.7rc1` qualify while
/// `nightly` and `build-2024-02-07` do not.
pub fn is_version_like(version: &str) -> bool {
    let core = version_core(version);
    SemVer::parse(core).is_ok()
        || core
            .split('.')
            .next()
            .is_some_and(|first| !first.is_empty() && first.bytes().all(|b| b.is_ascii_digit()))
}

/// Read `version` as semver, filling missing components with zero.
///
/// Strict semver is returned untouched (prerelease included). Other
/// version-like strings keep their first three numeric components, so
/// `2024.01.15` reads as 2024.1.15 and `1.2.3.4` as 1.2.3.
pub fn parse_lenient(version: &str) -> Option<SemVer> {
    if let Ok(parsed) = SemVer::parse(version) {
        return Some(parsed);
    }
    if !is_version_like(version) {
        return None;
    }

    let components = numeric_components(version);
    let at = |i: usize| components.get(i).copied().unwrap_or(0);
    Some(SemVer::new(at(0), at(1), at(2)))
}

/// Ordering key for a normalized version string.
///
/// Comparing keys instead of strings keeps the ordering a total preorder, even
/// when semver and non-semver strings are mixed in one collection.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct SortKey<'a> {
    /// Versions with a dot rank above dot-less ones
    has_dot: bool,
    /// Numeric components with trailing zeros removed
    components: Vec<u64>,
    /// Only set when no numeric component exists
    lexical: Option<&'a str>,
}

impl<'a> SortKey<'a> {
    fn new(version: &'a str) -> Self {
        let mut components = numeric_components(version);
        while components.last() == Some(&0) {
            components.pop();
        }

        let lexical = components.is_empty().then_some(version);

        Self {
            has_dot: version.contains('.'),
            components,
            lexical,
        }
    }
}

/// Compare two normalized version strings. `Greater` means `a` is newer.
///
/// Ordering rules, applied in turn:
/// 1. a version containing a dot ranks above one without;
/// 2. three-component semantic versions compare by major, minor, patch;
/// 3. anything else compares dot-separated numeric components, non-numeric
///    components counting as zero and build metadata ignored;
/// 4. strings without any numeric component fall back to lexical order.
///
/// Never fails; unparseable input simply lands on rule 3 or 4.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    SortKey::new(a).cmp(&SortKey::new(b))
}

/// Suggest the closest stable version to `requested` from `available`.
///
/// Prefers the newest stable version sharing the requested major version, then
/// the newest stable version overall.
pub fn closest_version<'a, I>(requested: &str, available: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let stable: Vec<&str> = available
        .into_iter()
        .filter(|v| !crate::version::normalize::is_prerelease(v))
        .collect();

    let newest = |candidates: Vec<&'a str>| {
        candidates
            .into_iter()
            .max_by(|a, b| compare_versions(a, b))
    };

    let requested = parse_lenient(requested);
    if let Some(requested) = requested {
        let same_major: Vec<&str> = stable
            .iter()
            .copied()
            .filter(|v| parse_lenient(v).is_some_and(|p| p.major == requested.major))
            .collect();
        if let Some(found) = newest(same_major) {
            return Some(found);
        }
    }

    newest(stable)
}
