//! The positional body format of data-archive mails.
//!
//! ```text
//! Electric Bill              <- line 0: description
//! finance utilities          <- line 1: space-separated tags
//! jane                       <- line 2: person override (optional)
//! ```
//!
//! Every field is optional. Anything after line 2 is ignored.

use thiserror::Error;

/// One positional field of the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyField {
    Description,
    Tags,
    PersonOverride,
}

impl BodyField {
    /// Zero-based line the field is read from.
    pub fn line(self) -> usize {
        match self {
            Self::Description => 0,
            Self::Tags => 1,
            Self::PersonOverride => 2,
        }
    }
}

impl std::fmt::Display for BodyField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Description => "description",
            Self::Tags => "tags",
            Self::PersonOverride => "person override",
        };
        f.write_str(name)
    }
}

/// A field the body did not have a line for.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("body has no line {line} ({field})", line = .0.line(), field = .0)]
pub struct MissingField(pub BodyField);

/// Normalized fields of a mail body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodyMetadata {
    description: Option<String>,
    tags: Option<Vec<String>>,
    person_override: Option<String>,
}

impl BodyMetadata {
    /// Normalized description.
    pub fn description(&self) -> Result<&str, MissingField> {
        self.description
            .as_deref()
            .ok_or(MissingField(BodyField::Description))
    }

    /// Normalized tags, in body order. May be empty even when present.
    pub fn tags(&self) -> Result<&[String], MissingField> {
        self.tags
            .as_deref()
            .ok_or(MissingField(BodyField::Tags))
    }

    /// Normalized person override. Present but empty for a blank third line.
    pub fn person_override(&self) -> Result<&str, MissingField> {
        self.person_override
            .as_deref()
            .ok_or(MissingField(BodyField::PersonOverride))
    }

    /// Fields the body had no line for, in line order.
    pub fn missing_fields(&self) -> Vec<BodyField> {
        let mut missing = Vec::new();
        if self.description.is_none() {
            missing.push(BodyField::Description);
        }
        if self.tags.is_none() {
            missing.push(BodyField::Tags);
        }
        if self.person_override.is_none() {
            missing.push(BodyField::PersonOverride);
        }
        missing
    }
}

/// Lower-case, trim, and replace internal spaces with hyphens.
///
/// Idempotent: `normalize(&normalize(s)) == normalize(s)`.
pub fn normalize(text: &str) -> String {
    text.to_lowercase().trim().replace(' ', "-")
}

/// Split a body into its positional fields.
///
/// Lines end at `\n` or `\r\n`. Missing lines leave the field absent;
/// this never fails.
pub fn extract(body: &str) -> BodyMetadata {
    let mut lines = body.lines();

    BodyMetadata {
        description: lines.next().map(normalize),
        tags: lines.next().map(split_tags),
        person_override: lines.next().map(normalize),
    }
}

/// Split a tag line on spaces. Runs of spaces do not produce empty tags.
fn split_tags(line: &str) -> Vec<String> {
    line.split(' ')
        .map(normalize)
        .filter(|tag| !tag.is_empty())
        .collect()
}
