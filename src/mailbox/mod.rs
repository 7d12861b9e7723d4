//! Mailbox access: the operations the archiver needs from a mail server.

pub mod imap;

use crate::error::Result;
use crate::model::mail::RawMessage;

/// A selected mailbox on a mail server.
///
/// Implementations hold one authenticated session. Ids are server-assigned
/// and only need to be stable for the lifetime of that session.
pub trait Mailbox {
    /// Ids of all messages whose subject contains `marker`, ascending.
    fn search_subject(&mut self, marker: &str) -> Result<Vec<u32>>;

    /// Fetch one complete message without changing its flags.
    fn fetch(&mut self, id: u32) -> Result<RawMessage>;

    /// Flag the given messages as deleted.
    fn mark_deleted(&mut self, ids: &[u32]) -> Result<()>;

    /// Permanently remove all messages flagged as deleted.
    fn expunge(&mut self) -> Result<()>;

    /// End the session. Further calls fail with `SessionClosed`.
    fn logout(&mut self) -> Result<()>;
}
