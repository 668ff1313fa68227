//! Decoder for the git smart-HTTP reference advertisement
//!
//! The stream is a sequence of PKT-LINEs: four hex digits giving the line length
//! (including the four digits themselves) followed by the payload. `0000` is a
//! flush packet. The first reference line carries a NUL-separated capability
//! list after the ref name.

use thiserror::Error;

const TAG_PREFIX: &str = "refs/tags/";
const PEELED_SUFFIX: &str = "^{}";
const SERVICE_PREFIX: &str = "# service=";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PktLineError {
    #[error("invalid pkt-line length header {header:?} at offset {offset}")]
    InvalidLength { header: String, offset: usize },

    #[error("truncated pkt-line at offset {offset}: expected {expected} bytes, found {found}")]
    Truncated {
        offset: usize,
        expected: usize,
        found: usize,
    },
}

/// A reference from the advertisement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitRef {
    pub sha: String,
    pub name: String,
}

/// Split the stream into payload lines, skipping flush and empty packets.
pub fn decode_lines(data: &[u8]) -> Result<Vec<&[u8]>, PktLineError> {
    let mut lines = Vec::new();
    let mut offset = 0;

    while offset < data.len() {
        let remaining = data.len() - offset;
        if remaining < 4 {
            return Err(PktLineError::Truncated {
                offset,
                expected: 4,
                found: remaining,
            });
        }

        let header = &data[offset..offset + 4];
        let length = std::str::from_utf8(header)
            .ok()
            .filter(|h| h.bytes().all(|b| b.is_ascii_hexdigit()))
            .and_then(|h| usize::from_str_radix(h, 16).ok())
            .ok_or_else(|| PktLineError::InvalidLength {
                header: String::from_utf8_lossy(header).into_owned(),
                offset,
            })?;

        match length {
            0 => {
                offset += 4;
                continue;
            }
            1..=3 => {
                return Err(PktLineError::InvalidLength {
                    header: String::from_utf8_lossy(header).into_owned(),
                    offset,
                });
            }
            _ => {}
        }

        if length > remaining {
            return Err(PktLineError::Truncated {
                offset,
                expected: length,
                found: remaining,
            });
        }

        let payload = &data[offset + 4..offset + length];
        if !payload.is_empty() {
            lines.push(payload);
        }
        offset += length;
    }

    Ok(lines)
}

/// Parse every reference line in the advertisement.
pub fn parse_refs(data: &[u8]) -> Result<Vec<GitRef>, PktLineError> {
    let mut refs = Vec::new();
    let mut first_ref = true;

    for payload in decode_lines(data)? {
        let text = String::from_utf8_lossy(payload);
        if text.starts_with(SERVICE_PREFIX) {
            continue;
        }

        let mut line: &str = &text;
        if first_ref {
            first_ref = false;
            if let Some(nul) = line.find('\0') {
                line = &line[..nul];
            }
        }
        let line = line.trim_end_matches('\n');

        if let Some(git_ref) = parse_ref_line(line) {
            refs.push(git_ref);
        }
    }

    Ok(refs)
}

/// Tag names (without `refs/tags/`) from the advertisement, peeled entries dropped.
pub fn parse_tags(data: &[u8]) -> Result<Vec<GitRef>, PktLineError> {
    Ok(parse_refs(data)?
        .into_iter()
        .filter_map(|r| {
            let tag = r.name.strip_prefix(TAG_PREFIX)?;
            if tag.ends_with(PEELED_SUFFIX) {
                return None;
            }
            Some(GitRef {
                sha: r.sha,
                name: tag.to_string(),
            })
        })
        .collect())
}

fn parse_ref_line(line: &str) -> Option<GitRef> {
    let (sha, name) = line.split_once(' ')?;
    if sha.len() != 40 || !sha.bytes().all(|b| b.is_ascii_hexdigit()) || name.is_empty() {
        return None;
    }
    Some(GitRef {
        sha: sha.to_string(),
        name: name.to_string(),
    })
}

/// Encode a payload as a single PKT-LINE.
#[cfg(test)]
pub(crate) fn encode_line(payload: &str) -> String {
    format!("{:04x}{}", payload.len() + 4, payload)
}

/// Build a realistic advertisement body for the given `(sha, ref)` pairs.
#[cfg(test)]
pub(crate) fn advertisement(refs: &[(&str, &str)]) -> Vec<u8> {
    let mut body = encode_line("# service=git-upload-pack\n");
    body.push_str("0000");
    for (i, (sha, name)) in refs.iter().enumerate() {
        if i == 0 {
            body.push_str(&encode_line(&format!(
                "{sha} {name}\0multi_ack thin-pack side-band ofs-delta agent=git/2.45.0\n"
            )));
        } else {
            body.push_str(&encode_line(&format!("{sha} {name}\n")));
        }
    }
    body.push_str("0000");
    body.into_bytes()
}
