//! Core mail types: raw fetched messages, parsed archive mails, and the
//! archiving decision derived from them.

use chrono::{DateTime, FixedOffset};

use super::address::EmailAddress;
use super::attachment::PdfAttachment;

/// A message as fetched from the mailbox, before any parsing.
#[derive(Debug, Clone)]
pub struct RawMessage {
    /// Server-assigned identifier (IMAP UID), stable for one session.
    pub id: u32,

    /// Full RFC 5322 message bytes.
    pub bytes: Vec<u8>,
}

/// A data-archive mail that passed the parser's eligibility rules.
///
/// Holds everything the metadata stages need. Immutable once built.
#[derive(Debug, Clone)]
pub struct ParsedMail {
    /// Server-assigned identifier, carried through to deletion.
    pub id: u32,

    /// Sender (first `From:` mailbox).
    pub sender: EmailAddress,

    /// Parsed from the `Date:` header, in the sender's offset.
    pub received_at: DateTime<FixedOffset>,

    /// Decoded subject line, for progress output only.
    pub subject: String,

    /// The first `text/plain` body part.
    pub body_text: String,

    /// The first `application/pdf` attachment.
    pub attachment: PdfAttachment,
}

/// Everything decided for one archive mail.
///
/// This is what gets reported per message so an operator can audit the
/// decisions before trusting automated deletion.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Server-assigned identifier.
    pub id: u32,

    /// Sender address as found in the `From:` header.
    pub sender: String,

    /// Received date.
    pub received_at: DateTime<FixedOffset>,

    /// Resolved person.
    pub person: String,

    /// Normalized description (empty if the body had none).
    pub description: String,

    /// Final tag set, person included.
    pub tags: Vec<String>,

    /// Derived target filename.
    pub filename: String,

    /// Path below the archive root the attachment is uploaded to.
    pub remote_path: String,

    /// Attachment size in bytes.
    pub size: u64,
}
