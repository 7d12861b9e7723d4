//! RFC 5322 header access: folding and `Date:` parsing.
//!
//! `mail-parser` handles the MIME structure, but the received date has a
//! stricter contract here: one RFC 5322 format with a few well-known
//! deviations, and a hard failure otherwise. So the raw `Date:` value is
//! read straight from the header block and parsed with chrono.

use chrono::{DateTime, FixedOffset};
use tracing::warn;

/// Formats tried after chrono's RFC 2822 parser gave up. All of them are
/// RFC 5322 dates with the day-of-week already stripped.
const DATE_FORMATS: [&str; 2] = ["%d %b %Y %H:%M:%S %z", "%d %b %Y %H:%M %z"];

/// Return the first value of header `name` (case-insensitive) from a raw message.
///
/// Only the header block (everything before the first blank line) is read.
pub fn header_value(raw_message: &[u8], name: &str) -> Option<String> {
    let header_end = find_header_end(raw_message).unwrap_or(raw_message.len());
    let text = String::from_utf8_lossy(&raw_message[..header_end]);
    let headers = unfold_headers(&text);
    get_header(&headers, &name.to_lowercase())
}

/// Find the byte offset where headers end (position of the first blank line).
pub(crate) fn find_header_end(data: &[u8]) -> Option<usize> {
    for i in 0..data.len().saturating_sub(1) {
        if data[i] == b'\n' && data[i + 1] == b'\n' {
            return Some(i);
        }
        if i + 3 < data.len()
            && data[i] == b'\r'
            && data[i + 1] == b'\n'
            && data[i + 2] == b'\r'
            && data[i + 3] == b'\n'
        {
            return Some(i);
        }
    }
    None
}

/// Unfold headers: join continuation lines (starting with space or tab) with the previous header.
///
/// Returns a list of `(lowercase_name, raw_value)` pairs.
fn unfold_headers(text: &str) -> Vec<(String, String)> {
    let mut result: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(last) = result.last_mut() {
                last.1.push(' ');
                last.1.push_str(line.trim());
            }
        } else if let Some(colon_pos) = line.find(':') {
            let name = line[..colon_pos].trim().to_lowercase();
            let value = line[colon_pos + 1..].trim().to_string();
            result.push((name, value));
        }
    }

    result
}

fn get_header(headers: &[(String, String)], name: &str) -> Option<String> {
    headers
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.clone())
}

/// Parse an RFC 5322 `Date:` value, keeping the sender's UTC offset so the
/// calendar date matches what the sender saw.
///
/// Accepts the canonical form (`Sat, 02 Mar 2024 09:15:00 +0100`) plus the
/// usual deviations: no day-of-week, no seconds, a trailing `(comment)` and
/// named zones such as `CEST`. Anything else yields `None`.
pub fn parse_date(date_str: &str) -> Option<DateTime<FixedOffset>> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt);
    }

    let candidate = replace_named_tz(&strip_day_of_week(&strip_comment(trimmed)));
    for fmt in &DATE_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&candidate, fmt) {
            return Some(dt);
        }
    }

    warn!(date = trimmed, "Could not parse date");
    None
}

/// Drop a trailing `(comment)`, e.g. `"+0000 (UTC)"` → `"+0000"`.
fn strip_comment(s: &str) -> String {
    match (s.rfind('('), s.ends_with(')')) {
        (Some(pos), true) => s[..pos].trim().to_string(),
        _ => s.to_string(),
    }
}

/// Strip leading day-of-week prefix (e.g. "Thu, " or "Thu ").
fn strip_day_of_week(s: &str) -> String {
    let days = [
        "Mon,", "Tue,", "Wed,", "Thu,", "Fri,", "Sat,", "Sun,", "Mon ", "Tue ", "Wed ", "Thu ",
        "Fri ", "Sat ", "Sun ",
    ];
    for day in &days {
        if let Some(rest) = s.strip_prefix(day) {
            return rest.trim().to_string();
        }
    }
    s.to_string()
}

/// Replace well-known timezone abbreviations with numeric offsets.
fn replace_named_tz(s: &str) -> String {
    // Longest names first: "CEST" also ends with "EST".
    let tzs = [
        ("CEST", "+0200"),
        ("EST", "-0500"),
        ("EDT", "-0400"),
        ("CST", "-0600"),
        ("CDT", "-0500"),
        ("MST", "-0700"),
        ("MDT", "-0600"),
        ("PST", "-0800"),
        ("PDT", "-0700"),
        ("GMT", "+0000"),
        ("UTC", "+0000"),
        ("CET", "+0100"),
        ("JST", "+0900"),
    ];
    let mut result = s.to_string();
    for (name, offset) in &tzs {
        if result.ends_with(name) {
            let pos = result.len() - name.len();
            result.replace_range(pos.., offset);
            return result;
        }
    }
    result
}
