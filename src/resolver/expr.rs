//! Contract for the external expression evaluator
//!
//! The expression language lives outside this crate. The resolver only needs
//! three narrow entry points: transforming a version list, extracting asset
//! details from a JSON index, and evaluating a single configuration field.

use std::collections::BTreeMap;

#[cfg(test)]
use mockall::automock;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::resolver::error::ResolveError;
use crate::resolver::template::{self, TemplateVars};
use crate::version::types::Version;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Expression '{expr}' failed: {message}")]
pub struct ExprError {
    pub expr: String,
    pub message: String,
}

/// Input to [`ExpressionEvaluator::extract_asset`]
#[derive(Debug, Clone, Serialize)]
pub struct AssetContext {
    /// Parsed JSON asset index
    pub json: Value,
    pub os: String,
    pub arch: String,
    pub version: String,
    pub package: String,
    /// `os-arch`
    pub platform: String,
}

/// Output of [`ExpressionEvaluator::extract_asset`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetDiscovery {
    /// Checksum value, with or without an `algo:` prefix
    pub checksum: Option<String>,
    /// Algorithm name when `checksum` carries no prefix
    pub checksum_type: Option<String>,
    /// Download URL overriding the templated one
    pub url: Option<String>,
}

#[cfg_attr(test, automock)]
pub trait ExpressionEvaluator: Send + Sync {
    /// Filter and/or rewrite discovered versions. Returned records may carry a
    /// new `version`; callers re-sort the result.
    fn filter_versions(&self, versions: Vec<Version>, expr: &str) -> Result<Vec<Version>, ExprError>;

    /// Extract download details from a JSON asset index.
    fn extract_asset(&self, context: &AssetContext, expr: &str) -> Result<AssetDiscovery, ExprError>;

    /// Evaluate a single field (binary path, checksum file) against string variables.
    fn evaluate_field(&self, expr: &str, vars: &BTreeMap<String, String>) -> Result<String, ExprError>;
}

/// Heuristic for telling expressions apart from plain `{placeholder}` templates
pub fn looks_like_expression(field: &str) -> bool {
    field.contains('\n')
        || field.contains(" ? ")
        || field.contains(" in ")
        || field.contains("==")
        || field.contains("!=")
}

/// Evaluate a configuration field as an expression when it looks like one,
/// otherwise expand it as a template.
pub fn render_field(
    evaluator: Option<&dyn ExpressionEvaluator>,
    field: &str,
    vars: &TemplateVars,
) -> Result<String, ResolveError> {
    if looks_like_expression(field) {
        let evaluator = evaluator.ok_or_else(|| ResolveError::MissingEvaluator {
            field: field.to_string(),
        })?;
        return Ok(evaluator.evaluate_field(field, vars.as_map())?);
    }

    Ok(template::expand(field, vars)?)
}
