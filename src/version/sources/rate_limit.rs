//! Upstream quota tracking

use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::HeaderMap;
use serde::Serialize;

use crate::version::error::QuotaExceeded;
use crate::version::types::Channel;

/// Quota counters reported by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitStatus {
    pub remaining: u64,
    pub total: u64,
    pub reset_at: Option<DateTime<Utc>>,
}

impl RateLimitStatus {
    /// Read `x-ratelimit-*` headers. Returns None when the limit header is absent.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let number = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
        };

        let total = number("x-ratelimit-limit")?;
        let remaining = number("x-ratelimit-remaining").unwrap_or(0);
        let reset_at = number("x-ratelimit-reset")
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single());

        Some(Self {
            remaining,
            total,
            reset_at,
        })
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    pub fn into_quota_error(self, channel: Channel) -> QuotaExceeded {
        QuotaExceeded {
            channel,
            remaining: Some(self.remaining),
            total: Some(self.total),
            reset_at: self.reset_at,
        }
    }
}

/// Text-based quota detection for bodies that carry no structured signal.
pub fn looks_like_quota_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("api rate limit exceeded")
        || lower.contains("secondary rate limit")
        || lower.contains("rate limit")
}

/// One-line hint appended to quota errors, e.g.
/// `GitHub API rate limit: 0/60 remaining, resets in 12m 5s (using GITHUB_TOKEN)`.
pub fn describe_quota(
    quota: &QuotaExceeded,
    credential_source: Option<&str>,
    now: DateTime<Utc>,
) -> String {
    let mut message = String::from("GitHub API rate limit");
    match (quota.remaining, quota.total) {
        (Some(remaining), Some(total)) if total > 0 => {
            message.push_str(&format!(": {remaining}/{total} remaining"));
        }
        _ => message.push_str(" exceeded"),
    }

    if let Some(reset_at) = quota.reset_at {
        message.push_str(&format!(
            ", resets in {}",
            format_duration(reset_at.signed_duration_since(now))
        ));
    }

    match credential_source {
        Some(source) => message.push_str(&format!(" (using {source})")),
        None => message.push_str(". Set GITHUB_TOKEN for 5000/hour limit"),
    }

    message
}

fn format_duration(duration: chrono::Duration) -> String {
    let total = duration.num_seconds();
    if total < 0 {
        return "expired".to_string();
    }

    let (hours, minutes, seconds) = (total / 3600, (total / 60) % 60, total % 60);
    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}
