//! MIME message parsing: sender, plain-text body and PDF attachment extraction.

use mail_parser::{Message, MessageParser, MessagePart, MimeHeaders, PartType};
use tracing::debug;

use crate::error::{ArchiveError, Result};
use crate::model::address::EmailAddress;
use crate::model::attachment::PdfAttachment;
use crate::model::mail::{ParsedMail, RawMessage};
use crate::parser::header;

/// Why a fetched message was left out of the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No `text/plain` body part (HTML-only mails included).
    NoPlainTextBody,
    /// No attachment with content type `application/pdf`.
    NoPdfAttachment,
    /// The `Date:` header could not be parsed and the run is configured to
    /// skip such messages instead of aborting.
    MalformedDate,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::NoPlainTextBody => "no plain-text body",
            Self::NoPdfAttachment => "no PDF attachment",
            Self::MalformedDate => "malformed Date header",
        };
        f.write_str(text)
    }
}

/// Result of parsing one raw message.
#[derive(Debug, Clone)]
pub enum ParseOutcome {
    /// The message is a data-archive mail.
    Parsed(ParsedMail),
    /// The message is not eligible. Not an error.
    Skipped(SkipReason),
}

/// Parse a fetched message into a [`ParsedMail`].
///
/// Eligibility is checked before the date, so a message that would be
/// skipped anyway never fails the run because of its `Date:` header.
///
/// # Errors
/// - [`ArchiveError::MimeError`] if the bytes are not a message at all.
/// - [`ArchiveError::InvalidDate`] if the `Date:` header is missing or malformed.
pub fn parse_raw_message(raw: &RawMessage) -> Result<ParseOutcome> {
    let message_bytes = skip_from_line(&raw.bytes);

    let msg = MessageParser::default().parse(message_bytes).ok_or_else(|| {
        ArchiveError::MimeError(format!("message {} is not an RFC 5322 message", raw.id))
    })?;

    let Some(body_text) = plain_text_body(&msg) else {
        return Ok(ParseOutcome::Skipped(SkipReason::NoPlainTextBody));
    };
    let Some(attachment) = first_pdf_attachment(&msg) else {
        return Ok(ParseOutcome::Skipped(SkipReason::NoPdfAttachment));
    };

    let date_raw = header::header_value(message_bytes, "date").unwrap_or_default();
    let received_at = header::parse_date(&date_raw).ok_or_else(|| ArchiveError::InvalidDate {
        id: raw.id,
        value: date_raw.clone(),
    })?;

    Ok(ParseOutcome::Parsed(ParsedMail {
        id: raw.id,
        sender: sender_address(&msg, message_bytes),
        received_at,
        subject: msg.subject().unwrap_or("").to_string(),
        body_text,
        attachment,
    }))
}

/// The first body part that really is `text/plain`.
///
/// `mail-parser` lists an HTML part as the text body when no plain part
/// exists; those are rejected here rather than converted.
fn plain_text_body(msg: &Message<'_>) -> Option<String> {
    msg.text_bodies().find_map(|part| match &part.body {
        PartType::Text(text) => Some(text.to_string()),
        _ => None,
    })
}

/// The first `application/pdf` attachment. Later PDFs are ignored.
fn first_pdf_attachment(msg: &Message<'_>) -> Option<PdfAttachment> {
    let mut pdfs = msg.attachments().enumerate().filter(|(_, part)| is_pdf(part));
    let (idx, part) = pdfs.next()?;

    let ignored = pdfs.count();
    if ignored > 0 {
        debug!(ignored, "Ignoring additional PDF attachments");
    }

    Some(PdfAttachment {
        filename: part
            .attachment_name()
            .map(String::from)
            .unwrap_or_else(|| format!("attachment_{idx}.pdf")),
        data: part.contents().to_vec(),
    })
}

fn is_pdf(part: &MessagePart<'_>) -> bool {
    part.content_type().is_some_and(|ct| {
        ct.ctype().eq_ignore_ascii_case("application")
            && ct.subtype().is_some_and(|sub| sub.eq_ignore_ascii_case("pdf"))
    })
}

/// Sender from the structured `From:` parse, falling back to the raw header.
fn sender_address(msg: &Message<'_>, message_bytes: &[u8]) -> EmailAddress {
    msg.from()
        .and_then(EmailAddress::from_parsed)
        .unwrap_or_else(|| {
            let raw = header::header_value(message_bytes, "from").unwrap_or_default();
            EmailAddress::parse(&raw)
        })
}

/// Skip an mbox `From ` separator line (and a UTF-8 BOM) at the start of the data.
fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);

    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}
