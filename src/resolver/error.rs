use thiserror::Error;

use crate::config::NOT_FOUND_LISTED_VERSIONS;
use crate::resolver::expr::ExprError;
use crate::resolver::template::TemplateError;
use crate::version::error::{QuotaExceeded, SourceError};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("{}", version_not_found_message(.package, .requested, .available, .suggestion.as_deref()))]
    VersionNotFound {
        package: String,
        requested: String,
        available: Vec<String>,
        suggestion: Option<String>,
    },

    #[error("No asset matching '{pattern}' for {package} on {platform}; available: {}", .available.join(", "))]
    AssetNotFound {
        package: String,
        pattern: String,
        platform: String,
        available: Vec<String>,
    },

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Expression(#[from] ExprError),

    #[error("No expression evaluator configured for '{field}'")]
    MissingEvaluator { field: String },

    #[error("Rate limited and strict checksum mode requires checksum verification: {quota}. {hint}")]
    StrictChecksum { quota: QuotaExceeded, hint: String },

    #[error("Rate limited and no url_template or asset pattern is configured for fallback: {quota}. {hint}")]
    DegradedUnavailable { quota: QuotaExceeded, hint: String },

    #[error("Invalid platform '{0}', expected os-arch")]
    InvalidPlatform(String),

    #[error("Resolution of {package} timed out")]
    DeadlineExceeded { package: String },
}

impl ResolveError {
    /// Quota details when the failure stems from rate limiting
    pub fn quota(&self) -> Option<&QuotaExceeded> {
        match self {
            ResolveError::Source(e) => e.quota(),
            ResolveError::StrictChecksum { quota, .. }
            | ResolveError::DegradedUnavailable { quota, .. } => Some(quota),
            _ => None,
        }
    }
}

fn version_not_found_message(
    package: &str,
    requested: &str,
    available: &[String],
    suggestion: Option<&str>,
) -> String {
    let mut message = format!("Version {requested} not found for {package}");
    if available.is_empty() {
        return message;
    }

    let listed: Vec<&str> = available
        .iter()
        .take(NOT_FOUND_LISTED_VERSIONS)
        .map(String::as_str)
        .collect();
    message.push_str(&format!("; available: {}", listed.join(", ")));
    if available.len() > NOT_FOUND_LISTED_VERSIONS {
        message.push_str(&format!(
            " ... and {} more",
            available.len() - NOT_FOUND_LISTED_VERSIONS
        ));
    }
    if let Some(suggestion) = suggestion {
        message.push_str(&format!(". Did you mean: {suggestion}?"));
    }
    message
}
