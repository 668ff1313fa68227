//! `{placeholder}` expansion for asset patterns and URL templates

use std::collections::BTreeMap;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid template '{pattern}': {message}")]
pub struct TemplateError {
    pub pattern: String,
    pub message: String,
}

/// Values available to a template, keyed by placeholder name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateVars(BTreeMap<String, String>);

impl TemplateVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

/// Substitute every `{name}` placeholder in `template`.
///
/// Brace groups that are not a bare identifier, such as the glob alternation
/// `{tar.gz,zip}`, are copied through unchanged. An identifier that has no value
/// in `vars` is an error.
pub fn expand(template: &str, vars: &TemplateVars) -> Result<String, TemplateError> {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        output.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let close = after.find('}').ok_or_else(|| TemplateError {
            pattern: template.to_string(),
            message: "unclosed '{'".to_string(),
        })?;
        let inner = &after[..close];

        if is_identifier(inner) {
            let value = vars.get(inner).ok_or_else(|| TemplateError {
                pattern: template.to_string(),
                message: format!("unknown placeholder '{{{inner}}}'"),
            })?;
            output.push_str(value);
        } else {
            output.push('{');
            output.push_str(inner);
            output.push('}');
        }

        rest = &after[close + 1..];
    }

    output.push_str(rest);
    Ok(output)
}

/// A URL template ending in `/` is a directory; the asset name goes after it.
pub fn normalize_url_template(template: &str) -> String {
    if template.ends_with('/') {
        format!("{template}{{asset}}")
    } else {
        template.to_string()
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
