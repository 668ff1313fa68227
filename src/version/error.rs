use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::version::types::Channel;

/// Quota details reported by an upstream that refused a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaExceeded {
    pub channel: Channel,
    pub remaining: Option<u64>,
    pub total: Option<u64>,
    pub reset_at: Option<DateTime<Utc>>,
}

impl std::fmt::Display for QuotaExceeded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} rate limit exceeded", self.channel)?;
        if let (Some(remaining), Some(total)) = (self.remaining, self.total) {
            write!(f, " ({remaining}/{total} remaining")?;
            if let Some(reset_at) = self.reset_at {
                write!(f, ", resets at {}", reset_at.format("%Y-%m-%dT%H:%M:%SZ"))?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{channel} returned status {status} for {url}")]
    Status {
        channel: Channel,
        status: u16,
        url: String,
    },

    #[error("Invalid {channel} response: {message}")]
    Decode { channel: Channel, message: String },

    #[error("{0}")]
    QuotaExceeded(QuotaExceeded),

    #[error("Not found: {query}")]
    NotFound { query: String },

    #[error("Invalid repository '{0}', expected owner/repo")]
    InvalidRepo(String),
}

impl SourceError {
    pub fn decode(channel: Channel, message: impl Into<String>) -> Self {
        Self::Decode {
            channel,
            message: message.into(),
        }
    }

    pub fn not_found(query: impl Into<String>) -> Self {
        Self::NotFound {
            query: query.into(),
        }
    }

    pub fn is_quota(&self) -> bool {
        matches!(self, Self::QuotaExceeded(_))
    }

    pub fn quota(&self) -> Option<&QuotaExceeded> {
        match self {
            Self::QuotaExceeded(quota) => Some(quota),
            _ => None,
        }
    }

    /// Errors worth retrying on the same channel: gateway failures, timeouts,
    /// and connection failures.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(e) => e.is_timeout() || e.is_connect(),
            Self::Status { status, .. } => matches!(status, 502..=504),
            _ => false,
        }
    }
}
