//! Custom message templates.
//!
//! Templates use `{name}` placeholders. `{{` and `}}` produce literal braces.
//! Rendering is strict: an unknown placeholder or a stray brace is an error,
//! never silently passed through.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

/// Placeholder, or an escaped brace pair.
static TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\{|\}\}|\{([^{}]*)\}").unwrap());

static NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Errors that can occur when rendering a custom template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// Template references a field that does not exist
    #[error("unknown placeholder {{{0}}}")]
    UnknownPlaceholder(String),

    /// Template syntax is broken
    #[error("malformed template at byte {position}: {reason}")]
    Malformed { position: usize, reason: String },
}

/// Values available to a template, one per placeholder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateData {
    pub project_name: String,
    pub project_slug: String,
    pub env: String,
    pub tags: String,
    pub culprit: String,
    pub title: String,
    pub link: String,
    pub id: String,
    pub level: String,
    pub message: String,
    pub release: String,
    pub platform: String,
}

impl TemplateData {
    /// Placeholder names a template may use.
    pub const PLACEHOLDERS: &'static [&'static str] = &[
        "project_name",
        "project_slug",
        "env",
        "tags",
        "culprit",
        "title",
        "link",
        "id",
        "level",
        "message",
        "release",
        "platform",
    ];

    /// Look up a placeholder value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        let value = match name {
            "project_name" => &self.project_name,
            "project_slug" => &self.project_slug,
            "env" => &self.env,
            "tags" => &self.tags,
            "culprit" => &self.culprit,
            "title" => &self.title,
            "link" => &self.link,
            "id" => &self.id,
            "level" => &self.level,
            "message" => &self.message,
            "release" => &self.release,
            "platform" => &self.platform,
            _ => return None,
        };
        Some(value)
    }
}

/// Render `template` with `data`.
///
/// # Errors
///
/// Returns [`TemplateError::UnknownPlaceholder`] for a well-formed name that
/// has no value, and [`TemplateError::Malformed`] for stray braces or
/// placeholders that are not plain identifiers.
pub fn render(template: &str, data: &TemplateData) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for caps in TOKEN.captures_iter(template) {
        let Some(token) = caps.get(0) else { continue };

        let literal = &template[last..token.start()];
        check_literal(literal, last)?;
        out.push_str(literal);

        match token.as_str() {
            "{{" => out.push('{'),
            "}}" => out.push('}'),
            _ => {
                let name = caps.get(1).map_or("", |m| m.as_str());
                if !NAME.is_match(name) {
                    return Err(TemplateError::Malformed {
                        position: token.start(),
                        reason: format!("invalid placeholder {:?}", token.as_str()),
                    });
                }
                let value = data
                    .get(name)
                    .ok_or_else(|| TemplateError::UnknownPlaceholder(name.to_string()))?;
                out.push_str(value);
            }
        }

        last = token.end();
    }

    let tail = &template[last..];
    check_literal(tail, last)?;
    out.push_str(tail);

    Ok(out)
}

/// Literal text between tokens must not contain a lone brace.
fn check_literal(literal: &str, offset: usize) -> Result<(), TemplateError> {
    match literal.find(['{', '}']) {
        Some(idx) => Err(TemplateError::Malformed {
            position: offset + idx,
            reason: format!("single '{}' encountered", &literal[idx..=idx]),
        }),
        None => Ok(()),
    }
}
