//! The archiving run: search → fetch → parse → derive → upload → delete.
//!
//! Messages are handled strictly one after another, in ascending id order.
//! Deletion only happens after the whole batch, and only for ids whose
//! upload the archive confirmed. A run that dies halfway therefore leaves
//! every message in the mailbox, uploaded or not, ready for the next run.

use tracing::{debug, info, warn};

use crate::archive::{self, Archive};
use crate::error::{ArchiveError, Result};
use crate::mailbox::Mailbox;
use crate::metadata::body::BodyField;
use crate::metadata::{Derived, MetadataDeriver};
use crate::model::mail::{ArchiveEntry, ParsedMail};
use crate::parser::mime::{self, ParseOutcome, SkipReason};

/// Run-wide settings taken from the configuration.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Subject substring that selects candidate messages.
    pub subject_marker: String,
    /// Archive collection the files are uploaded into.
    pub base_path: String,
    /// Treat a malformed `Date:` header as a skip instead of aborting.
    pub skip_malformed_dates: bool,
}

/// What the run is allowed to change.
pub enum Mode<'a> {
    /// Derive and report everything; upload nothing, delete nothing.
    DryRun,
    /// Upload to `archive`, then delete the uploaded mails unless `keep_mails`.
    Live {
        archive: &'a mut dyn Archive,
        keep_mails: bool,
    },
}

/// Progress notifications, in the order they happen.
#[derive(Debug)]
pub enum Progress<'a> {
    /// The mailbox search finished.
    Searched { candidates: usize },
    /// A message was left out of the batch.
    Skipped { id: u32, reason: SkipReason },
    /// Metadata was derived. `missing` lists body lines that were absent.
    Derived {
        entry: &'a ArchiveEntry,
        missing: &'a [BodyField],
    },
    /// The archive confirmed the upload (or would have, in a dry run).
    Uploaded { entry: &'a ArchiveEntry, dry_run: bool },
    /// The upload failed; the message stays in the mailbox.
    UploadFailed {
        entry: &'a ArchiveEntry,
        error: &'a ArchiveError,
    },
    /// Uploaded messages were removed from the mailbox.
    Deleted { count: usize },
    /// Deletion was suppressed by dry-run or keep-mails.
    Kept { count: usize },
}

/// Outcome of one run.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Messages matching the subject marker.
    pub candidates: usize,
    /// Messages left out, with the reason.
    pub skipped: Vec<(u32, SkipReason)>,
    /// Messages uploaded (or planned, in a dry run).
    pub archived: Vec<ArchiveEntry>,
    /// Messages whose upload failed, with the error text.
    pub failed: Vec<(ArchiveEntry, String)>,
    /// Ids confirmed uploaded, in processing order.
    pub successful_ids: Vec<u32>,
    /// Messages removed from the mailbox.
    pub deleted: usize,
}

/// Sequences the archiving stages over one mailbox batch.
pub struct Archiver<'a> {
    deriver: &'a MetadataDeriver,
    settings: RunSettings,
}

impl<'a> Archiver<'a> {
    pub fn new(deriver: &'a MetadataDeriver, settings: RunSettings) -> Self {
        Self { deriver, settings }
    }

    /// Process the batch, then log out of the mailbox whatever happened.
    pub fn run(
        &self,
        mailbox: &mut dyn Mailbox,
        mode: Mode<'_>,
        progress: &dyn Fn(&Progress<'_>),
    ) -> Result<RunReport> {
        let outcome = self.process(mailbox, mode, progress);
        if let Err(e) = mailbox.logout() {
            warn!(error = %e, "Mailbox logout failed");
        }
        outcome
    }

    fn process(
        &self,
        mailbox: &mut dyn Mailbox,
        mut mode: Mode<'_>,
        progress: &dyn Fn(&Progress<'_>),
    ) -> Result<RunReport> {
        let ids = mailbox.search_subject(&self.settings.subject_marker)?;
        info!(
            marker = %self.settings.subject_marker,
            count = ids.len(),
            "Retrieved candidate mails"
        );
        progress(&Progress::Searched {
            candidates: ids.len(),
        });

        let mut report = RunReport {
            candidates: ids.len(),
            ..RunReport::default()
        };

        for id in ids {
            let raw = mailbox.fetch(id)?;
            let mail = match mime::parse_raw_message(&raw) {
                Ok(ParseOutcome::Parsed(mail)) => mail,
                Ok(ParseOutcome::Skipped(reason)) => {
                    skip(&mut report, id, reason, progress);
                    continue;
                }
                Err(e @ ArchiveError::InvalidDate { .. }) if self.settings.skip_malformed_dates => {
                    warn!(error = %e, "Skipping message");
                    skip(&mut report, id, SkipReason::MalformedDate, progress);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let derived = self.deriver.derive(&mail);
            let entry = archive_entry(&mail, &derived, &self.settings.base_path);
            let missing = derived.metadata.missing_fields();
            info!(
                id,
                person = %entry.person,
                tags = ?entry.tags,
                filename = %entry.filename,
                "Derived archive name"
            );
            progress(&Progress::Derived {
                entry: &entry,
                missing: &missing,
            });

            match &mut mode {
                Mode::DryRun => {
                    progress(&Progress::Uploaded {
                        entry: &entry,
                        dry_run: true,
                    });
                    report.successful_ids.push(id);
                    report.archived.push(entry);
                }
                Mode::Live { archive, .. } => {
                    match archive.upload(&entry.remote_path, &mail.attachment.data) {
                        Ok(()) => {
                            debug!(id, path = %entry.remote_path, "Upload confirmed");
                            progress(&Progress::Uploaded {
                                entry: &entry,
                                dry_run: false,
                            });
                            report.successful_ids.push(id);
                            report.archived.push(entry);
                        }
                        Err(e) => {
                            warn!(id, path = %entry.remote_path, error = %e, "Upload failed");
                            progress(&Progress::UploadFailed {
                                entry: &entry,
                                error: &e,
                            });
                            report.failed.push((entry, e.to_string()));
                        }
                    }
                }
            }
        }

        match mode {
            Mode::Live {
                keep_mails: false, ..
            } if !report.successful_ids.is_empty() => {
                mailbox.mark_deleted(&report.successful_ids)?;
                mailbox.expunge()?;
                report.deleted = report.successful_ids.len();
                info!(count = report.deleted, "Deleted archived mails");
                progress(&Progress::Deleted {
                    count: report.deleted,
                });
            }
            _ => {
                if !report.successful_ids.is_empty() {
                    progress(&Progress::Kept {
                        count: report.successful_ids.len(),
                    });
                }
            }
        }

        Ok(report)
    }
}

fn skip(report: &mut RunReport, id: u32, reason: SkipReason, progress: &dyn Fn(&Progress<'_>)) {
    info!(id, %reason, "Skipping message");
    progress(&Progress::Skipped { id, reason });
    report.skipped.push((id, reason));
}

/// Assemble the per-message decision record.
pub fn archive_entry(mail: &ParsedMail, derived: &Derived, base_path: &str) -> ArchiveEntry {
    ArchiveEntry {
        id: mail.id,
        sender: mail.sender.address.clone(),
        received_at: mail.received_at,
        person: derived.person.clone(),
        description: derived.metadata.description().unwrap_or("").to_string(),
        tags: derived.tags.as_slice().to_vec(),
        filename: derived.filename.clone(),
        remote_path: archive::remote_path(base_path, &derived.filename),
        size: mail.attachment.size(),
    }
}
