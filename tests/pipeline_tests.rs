//! Integration tests for the archiving run, against in-memory fakes of the
//! mailbox and the archive.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use mail_to_files::archive::Archive;
use mail_to_files::config::PersonAddresses;
use mail_to_files::error::{ArchiveError, Result};
use mail_to_files::mailbox::Mailbox;
use mail_to_files::metadata::filename::FilenameTemplate;
use mail_to_files::metadata::identity::{PersonDirectory, PersonTagPosition};
use mail_to_files::metadata::MetadataDeriver;
use mail_to_files::model::mail::RawMessage;
use mail_to_files::parser::mime::SkipReason;
use mail_to_files::pipeline::{Archiver, Mode, Progress, RunSettings};

fn fixture(name: &str) -> Vec<u8> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read(path).unwrap()
}

// ─── Fakes ──────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeMailbox {
    messages: BTreeMap<u32, Vec<u8>>,
    fail_fetch: Option<u32>,
    searched: Vec<String>,
    fetched: Vec<u32>,
    deleted: Vec<u32>,
    expunged: bool,
    logged_out: bool,
}

impl FakeMailbox {
    fn with(messages: &[(u32, &str)]) -> Self {
        Self {
            messages: messages
                .iter()
                .map(|&(id, name)| (id, fixture(name)))
                .collect(),
            ..Self::default()
        }
    }
}

impl Mailbox for FakeMailbox {
    fn search_subject(&mut self, marker: &str) -> Result<Vec<u32>> {
        self.searched.push(marker.to_string());
        Ok(self.messages.keys().copied().collect())
    }

    fn fetch(&mut self, id: u32) -> Result<RawMessage> {
        if self.fail_fetch == Some(id) {
            return Err(ArchiveError::SessionClosed);
        }
        self.fetched.push(id);
        Ok(RawMessage {
            id,
            bytes: self.messages[&id].clone(),
        })
    }

    fn mark_deleted(&mut self, ids: &[u32]) -> Result<()> {
        self.deleted.extend_from_slice(ids);
        Ok(())
    }

    fn expunge(&mut self) -> Result<()> {
        self.expunged = true;
        Ok(())
    }

    fn logout(&mut self) -> Result<()> {
        self.logged_out = true;
        Ok(())
    }
}

#[derive(Default)]
struct FakeArchive {
    reject: HashSet<String>,
    uploads: Vec<(String, Vec<u8>)>,
}

impl Archive for FakeArchive {
    fn upload(&mut self, path: &str, data: &[u8]) -> Result<()> {
        if self.reject.contains(path) {
            return Err(ArchiveError::UploadRejected {
                method: "PUT".to_string(),
                path: path.to_string(),
                status: 507,
            });
        }
        self.uploads.push((path.to_string(), data.to_vec()));
        Ok(())
    }
}

fn deriver() -> MetadataDeriver {
    let mut table = BTreeMap::new();
    table.insert(
        "finance-jane".to_string(),
        PersonAddresses::One("jane@example.com".to_string()),
    );
    MetadataDeriver::new(
        PersonDirectory::from_table(&table),
        FilenameTemplate::parse("{date:%Y-%m-%d}_{description}_[{tags}]").unwrap(),
        PersonTagPosition::End,
    )
}

fn settings() -> RunSettings {
    RunSettings {
        subject_marker: "da".to_string(),
        base_path: "Documents/Archive".to_string(),
        skip_malformed_dates: false,
    }
}

const BILL_PATH: &str = "Documents/Archive/2024-03-02_electric-bill_[finance utilities finance-jane]";
const TAX_PATH: &str = "Documents/Archive/2024-01-15_tax-return-2023_[taxes finance bob-smith]";

fn quiet(_: &Progress<'_>) {}

// ─── Live runs ──────────────────────────────────────────────────────

#[test]
fn test_live_run_uploads_and_deletes() {
    let deriver = deriver();
    let mut mailbox = FakeMailbox::with(&[(10, "electric_bill.eml"), (11, "override.eml")]);
    let mut archive = FakeArchive::default();

    let report = Archiver::new(&deriver, settings())
        .run(
            &mut mailbox,
            Mode::Live {
                archive: &mut archive,
                keep_mails: false,
            },
            &quiet,
        )
        .unwrap();

    assert_eq!(mailbox.searched, ["da"]);
    assert_eq!(report.candidates, 2);
    assert_eq!(report.successful_ids, [10, 11]);
    assert_eq!(report.deleted, 2);
    assert_eq!(mailbox.deleted, [10, 11]);
    assert!(mailbox.expunged);
    assert!(mailbox.logged_out);

    let paths: Vec<&str> = archive.uploads.iter().map(|(p, _)| p.as_str()).collect();
    assert_eq!(paths, [BILL_PATH, TAX_PATH]);
    assert!(archive.uploads[0].1.starts_with(b"%PDF"));
    assert_eq!(report.archived[0].person, "finance-jane");
    assert_eq!(report.archived[1].person, "bob-smith");
}

#[test]
fn test_failed_upload_is_never_deleted() {
    let deriver = deriver();
    let mut mailbox = FakeMailbox::with(&[(10, "electric_bill.eml"), (11, "override.eml")]);
    let mut archive = FakeArchive {
        reject: HashSet::from([BILL_PATH.to_string()]),
        ..FakeArchive::default()
    };

    let report = Archiver::new(&deriver, settings())
        .run(
            &mut mailbox,
            Mode::Live {
                archive: &mut archive,
                keep_mails: false,
            },
            &quiet,
        )
        .unwrap();

    assert_eq!(report.successful_ids, [11]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0.id, 10);
    assert!(report.failed[0].1.contains("507"));
    assert!(!mailbox.deleted.contains(&10));
    assert_eq!(mailbox.deleted, [11]);
}

#[test]
fn test_all_uploads_failing_deletes_nothing() {
    let deriver = deriver();
    let mut mailbox = FakeMailbox::with(&[(10, "electric_bill.eml")]);
    let mut archive = FakeArchive {
        reject: HashSet::from([BILL_PATH.to_string()]),
        ..FakeArchive::default()
    };

    let report = Archiver::new(&deriver, settings())
        .run(
            &mut mailbox,
            Mode::Live {
                archive: &mut archive,
                keep_mails: false,
            },
            &quiet,
        )
        .unwrap();

    assert!(report.successful_ids.is_empty());
    assert!(mailbox.deleted.is_empty());
    assert!(!mailbox.expunged);
}

#[test]
fn test_keep_mails_suppresses_deletion() {
    let deriver = deriver();
    let mut mailbox = FakeMailbox::with(&[(10, "electric_bill.eml")]);
    let mut archive = FakeArchive::default();

    let report = Archiver::new(&deriver, settings())
        .run(
            &mut mailbox,
            Mode::Live {
                archive: &mut archive,
                keep_mails: true,
            },
            &quiet,
        )
        .unwrap();

    assert_eq!(archive.uploads.len(), 1);
    assert_eq!(report.successful_ids, [10]);
    assert_eq!(report.deleted, 0);
    assert!(mailbox.deleted.is_empty());
    assert!(!mailbox.expunged);
}

// ─── Skips ──────────────────────────────────────────────────────────

#[test]
fn test_ineligible_mails_are_skipped_and_kept() {
    let deriver = deriver();
    let mut mailbox = FakeMailbox::with(&[
        (1, "html_only.eml"),
        (2, "electric_bill.eml"),
        (3, "no_pdf.eml"),
    ]);
    let mut archive = FakeArchive::default();

    let report = Archiver::new(&deriver, settings())
        .run(
            &mut mailbox,
            Mode::Live {
                archive: &mut archive,
                keep_mails: false,
            },
            &quiet,
        )
        .unwrap();

    assert_eq!(report.candidates, 3);
    assert_eq!(
        report.skipped,
        [
            (1, SkipReason::NoPlainTextBody),
            (3, SkipReason::NoPdfAttachment)
        ]
    );
    assert_eq!(report.archived.len(), 1);
    assert_eq!(mailbox.deleted, [2]);
}

#[test]
fn test_malformed_date_aborts_and_logs_out() {
    let deriver = deriver();
    let mut mailbox = FakeMailbox::with(&[(1, "electric_bill.eml"), (2, "bad_date.eml")]);
    let mut archive = FakeArchive::default();

    let err = Archiver::new(&deriver, settings())
        .run(
            &mut mailbox,
            Mode::Live {
                archive: &mut archive,
                keep_mails: false,
            },
            &quiet,
        )
        .unwrap_err();

    assert!(matches!(err, ArchiveError::InvalidDate { id: 2, .. }));
    assert!(mailbox.logged_out);
    // Message 1 was uploaded, but the batch never reached deletion.
    assert_eq!(archive.uploads.len(), 1);
    assert!(mailbox.deleted.is_empty());
}

#[test]
fn test_malformed_date_can_be_skipped() {
    let deriver = deriver();
    let mut mailbox = FakeMailbox::with(&[(1, "bad_date.eml"), (2, "electric_bill.eml")]);
    let mut archive = FakeArchive::default();
    let settings = RunSettings {
        skip_malformed_dates: true,
        ..settings()
    };

    let report = Archiver::new(&deriver, settings)
        .run(
            &mut mailbox,
            Mode::Live {
                archive: &mut archive,
                keep_mails: false,
            },
            &quiet,
        )
        .unwrap();

    assert_eq!(report.skipped, [(1, SkipReason::MalformedDate)]);
    assert_eq!(mailbox.deleted, [2]);
}

#[test]
fn test_fetch_error_logs_out() {
    let deriver = deriver();
    let mut mailbox = FakeMailbox::with(&[(1, "electric_bill.eml"), (2, "override.eml")]);
    mailbox.fail_fetch = Some(2);

    let result = Archiver::new(&deriver, settings()).run(&mut mailbox, Mode::DryRun, &quiet);

    assert!(matches!(result, Err(ArchiveError::SessionClosed)));
    assert!(mailbox.logged_out);
    assert_eq!(mailbox.fetched, [1]);
}

// ─── Dry run ────────────────────────────────────────────────────────

#[test]
fn test_dry_run_changes_nothing() {
    let deriver = deriver();
    let mut mailbox = FakeMailbox::with(&[(10, "electric_bill.eml"), (11, "html_only.eml")]);

    let report = Archiver::new(&deriver, settings())
        .run(&mut mailbox, Mode::DryRun, &quiet)
        .unwrap();

    assert_eq!(report.successful_ids, [10]);
    assert_eq!(report.archived[0].remote_path, BILL_PATH);
    assert_eq!(report.deleted, 0);
    assert!(mailbox.deleted.is_empty());
    assert!(!mailbox.expunged);
    assert!(mailbox.logged_out);
}

#[test]
fn test_slash_in_description_is_one_path_segment() {
    let deriver = deriver();
    let bill = String::from_utf8(fixture("electric_bill.eml")).unwrap();
    let mut mailbox = FakeMailbox::default();
    mailbox.messages.insert(
        7,
        bill.replace("Electric Bill\n", "Invoice 03/24\n").into_bytes(),
    );
    let mut archive = FakeArchive::default();

    let report = Archiver::new(&deriver, settings())
        .run(
            &mut mailbox,
            Mode::Live {
                archive: &mut archive,
                keep_mails: false,
            },
            &quiet,
        )
        .unwrap();

    assert_eq!(report.archived[0].description, "invoice-03/24");
    assert_eq!(
        archive.uploads[0].0,
        "Documents/Archive/2024-03-02_invoice-03-24_[finance utilities finance-jane]"
    );
    assert_eq!(mailbox.deleted, [7]);
}

#[test]
fn test_empty_mailbox() {
    let deriver = deriver();
    let mut mailbox = FakeMailbox::default();
    let mut archive = FakeArchive::default();

    let report = Archiver::new(&deriver, settings())
        .run(
            &mut mailbox,
            Mode::Live {
                archive: &mut archive,
                keep_mails: false,
            },
            &quiet,
        )
        .unwrap();

    assert_eq!(report.candidates, 0);
    assert!(archive.uploads.is_empty());
    assert!(!mailbox.expunged);
    assert!(mailbox.logged_out);
}

// ─── Progress ───────────────────────────────────────────────────────

#[test]
fn test_progress_events_in_order() {
    let deriver = deriver();
    let mut mailbox = FakeMailbox::with(&[(1, "no_pdf.eml"), (2, "electric_bill.eml")]);
    let mut archive = FakeArchive::default();
    let events = RefCell::new(Vec::new());

    Archiver::new(&deriver, settings())
        .run(
            &mut mailbox,
            Mode::Live {
                archive: &mut archive,
                keep_mails: false,
            },
            &|event: &Progress<'_>| {
                let name = match event {
                    Progress::Searched { candidates } => format!("searched {candidates}"),
                    Progress::Skipped { id, .. } => format!("skipped {id}"),
                    Progress::Derived { entry, .. } => format!("derived {}", entry.id),
                    Progress::Uploaded { entry, dry_run } => {
                        format!("uploaded {} {dry_run}", entry.id)
                    }
                    Progress::UploadFailed { entry, .. } => format!("failed {}", entry.id),
                    Progress::Deleted { count } => format!("deleted {count}"),
                    Progress::Kept { count } => format!("kept {count}"),
                };
                events.borrow_mut().push(name);
            },
        )
        .unwrap();

    assert_eq!(
        events.into_inner(),
        [
            "searched 2",
            "skipped 1",
            "derived 2",
            "uploaded 2 false",
            "deleted 1"
        ]
    );
}
