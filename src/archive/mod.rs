//! Remote archive: where attachments end up.

pub mod webdav;

use crate::error::Result;

/// A hierarchical remote file store.
pub trait Archive {
    /// Store `data` at `path` (relative to the archive root), replacing any
    /// existing file. Returning `Ok` means the store confirmed the write.
    fn upload(&mut self, path: &str, data: &[u8]) -> Result<()>;
}

/// Join the archive base path and a file name with exactly one `/`.
///
/// Nothing is escaped here; that is up to the archive implementation.
pub fn remote_path(base_path: &str, filename: &str) -> String {
    let base = base_path.trim_matches('/');
    if base.is_empty() {
        filename.to_string()
    } else {
        format!("{base}/{filename}")
    }
}
