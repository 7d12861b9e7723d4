//! Attachment payloads.

/// The PDF attachment selected for archiving.
///
/// Unlike header data, the payload is already decoded (base64 or
/// quoted-printable removed) and ready to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfAttachment {
    /// Filename from `Content-Disposition` / `Content-Type`. Generated if missing.
    pub filename: String,

    /// Decoded payload.
    pub data: Vec<u8>,
}

impl PdfAttachment {
    /// Decoded size in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}
