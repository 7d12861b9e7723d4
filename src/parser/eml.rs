//! Reader for individual `.eml` files (RFC 5322 messages saved to disk).
//!
//! Lets the archiving pipeline run against local files without a mailbox.

use std::path::Path;

use crate::error::{ArchiveError, Result};
use crate::model::mail::RawMessage;
use crate::parser::mime::{self, ParseOutcome};

/// Read a `.eml` file into a [`RawMessage`] with the given id.
pub fn read_eml(path: impl AsRef<Path>, id: u32) -> Result<RawMessage> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ArchiveError::FileNotFound(path.to_path_buf())
        } else {
            ArchiveError::io(path, e)
        }
    })?;
    Ok(RawMessage { id, bytes })
}

/// Read and parse a single `.eml` file.
pub fn parse_eml(path: impl AsRef<Path>, id: u32) -> Result<ParseOutcome> {
    let raw = read_eml(path, id)?;
    mime::parse_raw_message(&raw)
}
