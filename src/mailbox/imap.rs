//! IMAP mailbox over implicit TLS.

use std::net::TcpStream;

use native_tls::{TlsConnector, TlsStream};
use tracing::{debug, info, warn};

use crate::config::ImapConfig;
use crate::error::{ArchiveError, Result};
use crate::model::mail::RawMessage;

use super::Mailbox;

type TlsSession = imap::Session<TlsStream<TcpStream>>;

/// An authenticated IMAP session with one mailbox selected.
///
/// The session is logged out by [`Mailbox::logout`], or on drop if that was
/// never called.
pub struct ImapMailbox {
    session: Option<TlsSession>,
    mailbox: String,
}

impl ImapMailbox {
    /// Connect, log in and select the configured mailbox.
    pub fn connect(config: &ImapConfig) -> Result<Self> {
        info!(host = %config.host, port = config.port, "Connecting to IMAP server");
        let tls = TlsConnector::builder().build()?;
        let client = imap::connect((config.host.as_str(), config.port), &config.host, &tls)?;

        let mut session = client
            .login(&config.user, &config.password)
            .map_err(|(e, _client)| e)?;
        debug!(user = %config.user, "IMAP login ok");

        let selected = session.select(&config.mailbox)?;
        info!(
            mailbox = %config.mailbox,
            exists = selected.exists,
            "Selected mailbox"
        );

        Ok(Self {
            session: Some(session),
            mailbox: config.mailbox.clone(),
        })
    }

    fn session(&mut self) -> Result<&mut TlsSession> {
        self.session.as_mut().ok_or(ArchiveError::SessionClosed)
    }
}

impl Mailbox for ImapMailbox {
    fn search_subject(&mut self, marker: &str) -> Result<Vec<u32>> {
        let query = search_query(marker);
        debug!(mailbox = %self.mailbox, %query, "IMAP search");
        let mut uids: Vec<u32> = self.session()?.uid_search(&query)?.into_iter().collect();
        uids.sort_unstable();
        Ok(uids)
    }

    fn fetch(&mut self, id: u32) -> Result<RawMessage> {
        // BODY.PEEK leaves \Seen alone, so skipped mails stay unread.
        let fetches = self.session()?.uid_fetch(id.to_string(), "BODY.PEEK[]")?;
        let bytes = fetches
            .iter()
            .find_map(|f| f.body().map(<[u8]>::to_vec))
            .ok_or_else(|| ArchiveError::MimeError(format!("no body returned for UID {id}")))?;
        debug!(id, size = bytes.len(), "Fetched message");
        Ok(RawMessage { id, bytes })
    }

    fn mark_deleted(&mut self, ids: &[u32]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let uid_set = uid_set(ids);
        self.session()?
            .uid_store(&uid_set, "+FLAGS.SILENT (\\Deleted)")?;
        debug!(%uid_set, "Flagged messages as deleted");
        Ok(())
    }

    fn expunge(&mut self) -> Result<()> {
        let removed = self.session()?.expunge()?;
        debug!(count = removed.len(), "Expunged messages");
        Ok(())
    }

    fn logout(&mut self) -> Result<()> {
        if let Some(mut session) = self.session.take() {
            session.logout()?;
            debug!("IMAP logout");
        }
        Ok(())
    }
}

impl Drop for ImapMailbox {
    fn drop(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.logout() {
                warn!(error = %e, "IMAP logout on drop failed");
            }
        }
    }
}

/// `UID SEARCH` arguments for a subject substring. Non-ASCII markers need
/// an explicit charset or servers answer `BAD`.
fn search_query(marker: &str) -> String {
    if marker.is_ascii() {
        format!("SUBJECT {}", quote(marker))
    } else {
        format!("CHARSET UTF-8 SUBJECT {}", quote(marker))
    }
}

/// Quote a string for an IMAP `SEARCH` argument.
fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

fn uid_set(ids: &[u32]) -> String {
    ids.iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
