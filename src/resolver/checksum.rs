//! Checksum formatting as `<algorithm>:<hex>`

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashType {
    Md5,
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl HashType {
    /// Infer the algorithm from a hex digest length; unknown lengths mean sha256.
    pub fn from_hex_len(len: usize) -> Self {
        match len {
            32 => HashType::Md5,
            40 => HashType::Sha1,
            96 => HashType::Sha384,
            128 => HashType::Sha512,
            _ => HashType::Sha256,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HashType::Md5 => "md5",
            HashType::Sha1 => "sha1",
            HashType::Sha256 => "sha256",
            HashType::Sha384 => "sha384",
            HashType::Sha512 => "sha512",
        }
    }
}

impl fmt::Display for HashType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "").as_str() {
            "md5" => Ok(HashType::Md5),
            "sha1" => Ok(HashType::Sha1),
            "sha256" => Ok(HashType::Sha256),
            "sha384" => Ok(HashType::Sha384),
            "sha512" => Ok(HashType::Sha512),
            other => Err(format!("unsupported hash type '{other}'")),
        }
    }
}

/// Normalize a checksum to `<algorithm>:<lowercase-hex>`.
///
/// Accepts a bare hex digest or one prefixed with `algo:`. `hint` names the
/// algorithm when the value carries no prefix. Algorithms outside [`HashType`]
/// are kept lowercased; the digest length decides only when neither is given.
/// Returns None for empty input or a value that is not hex.
pub fn normalize_checksum(value: &str, hint: Option<&str>) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let (prefix, digest) = match value.split_once(':') {
        Some((algo, digest)) => (Some(algo), digest.trim()),
        None => (None, value),
    };

    if digest.is_empty() || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }

    let algorithm = match prefix.or(hint).map(str::trim).filter(|a| !a.is_empty()) {
        Some(algo) => algo
            .parse::<HashType>()
            .map(|t| t.to_string())
            .unwrap_or_else(|_| algo.to_lowercase()),
        None => HashType::from_hex_len(digest.len()).to_string(),
    };

    Some(format!("{}:{}", algorithm, digest.to_lowercase()))
}
