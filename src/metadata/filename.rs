//! Target filename templates.
//!
//! A template mixes literal text with three placeholders:
//!
//! | Placeholder          | Replaced by                                   |
//! |----------------------|-----------------------------------------------|
//! | `{date}`             | received date, formatted as `%Y-%m-%d`        |
//! | `{date:<strftime>}`  | received date, formatted with `<strftime>`    |
//! | `{description}`      | normalized description                        |
//! | `{tags}`             | tags joined with the configured separator     |
//!
//! `{{` and `}}` produce literal braces. Templates are validated when they
//! are parsed, so rendering cannot fail.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset};

use crate::error::{ArchiveError, Result};

use super::identity::TagSet;

/// Template used when the configuration does not set one.
pub const DEFAULT_TEMPLATE: &str = "{date:%Y-%m-%d}_{description}_[{tags}].pdf";

/// Date pattern used by a bare `{date}`.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Separator used between tags when the configuration does not set one.
pub const DEFAULT_TAG_SEPARATOR: &str = " ";

/// Stands in for `/` inside the description and tags.
pub const PATH_SEPARATOR_REPLACEMENT: &str = "-";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Date(String),
    Description,
    Tags,
}

/// A parsed, validated filename template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameTemplate {
    source: String,
    segments: Vec<Segment>,
    tag_separator: String,
}

impl FilenameTemplate {
    /// Parse and validate a template string.
    pub fn parse(template: &str) -> Result<Self> {
        let invalid = |reason: String| ArchiveError::InvalidTemplate {
            template: template.to_string(),
            reason,
        };

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();

        while let Some(ch) = chars.next() {
            match ch {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err(invalid("unmatched '}'".to_string())),
                '{' => {
                    let mut placeholder = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some('{') => {
                                return Err(invalid("'{' inside a placeholder".to_string()))
                            }
                            Some(c) => placeholder.push(c),
                            None => return Err(invalid("unclosed '{'".to_string())),
                        }
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(parse_placeholder(&placeholder).map_err(invalid)?);
                }
                _ => literal.push(ch),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: template.to_string(),
            segments,
            tag_separator: DEFAULT_TAG_SEPARATOR.to_string(),
        })
    }

    /// Use `separator` between tags instead of a single space.
    pub fn with_tag_separator(mut self, separator: impl Into<String>) -> Self {
        self.tag_separator = separator.into();
        self
    }

    /// The template string this was parsed from.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Render the filename. Pure and deterministic.
    ///
    /// `/` in the description or a tag becomes [`PATH_SEPARATOR_REPLACEMENT`],
    /// so body text never addresses a sub-collection. A `/` from a literal or
    /// a date pattern is kept. Nothing else is escaped.
    pub fn render(
        &self,
        received_at: &DateTime<FixedOffset>,
        description: &str,
        tags: &TagSet,
    ) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Date(pattern) => out.push_str(&received_at.format(pattern).to_string()),
                Segment::Description => out.push_str(&path_safe(description)),
                Segment::Tags => {
                    let safe: Vec<String> = tags.as_slice().iter().map(|t| path_safe(t)).collect();
                    out.push_str(&safe.join(&self.tag_separator));
                }
            }
        }
        out
    }
}

impl Default for FilenameTemplate {
    fn default() -> Self {
        Self {
            source: DEFAULT_TEMPLATE.to_string(),
            segments: vec![
                Segment::Date(DEFAULT_DATE_FORMAT.to_string()),
                Segment::Literal("_".to_string()),
                Segment::Description,
                Segment::Literal("_[".to_string()),
                Segment::Tags,
                Segment::Literal("].pdf".to_string()),
            ],
            tag_separator: DEFAULT_TAG_SEPARATOR.to_string(),
        }
    }
}

impl std::fmt::Display for FilenameTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

fn path_safe(field: &str) -> String {
    field.replace('/', PATH_SEPARATOR_REPLACEMENT)
}

fn parse_placeholder(placeholder: &str) -> std::result::Result<Segment, String> {
    let (name, suffix) = match placeholder.split_once(':') {
        Some((name, suffix)) => (name.trim(), Some(suffix)),
        None => (placeholder.trim(), None),
    };

    match (name, suffix) {
        ("date", None) => Ok(Segment::Date(DEFAULT_DATE_FORMAT.to_string())),
        ("date", Some(pattern)) => {
            validate_date_format(pattern)?;
            Ok(Segment::Date(pattern.to_string()))
        }
        ("description", None) => Ok(Segment::Description),
        ("tags", None) => Ok(Segment::Tags),
        ("description" | "tags", Some(_)) => Err(format!("'{name}' takes no format")),
        _ => Err(format!("unknown placeholder '{{{placeholder}}}'")),
    }
}

fn validate_date_format(pattern: &str) -> std::result::Result<(), String> {
    if pattern.is_empty() {
        return Err("empty date format".to_string());
    }
    if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
        return Err(format!("invalid date format '{pattern}'"));
    }
    Ok(())
}
