//! CLI entry point for `mail-to-files`.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use mail_to_files::archive::webdav::WebDavArchive;
use mail_to_files::config::{self, Config};
use mail_to_files::error::ArchiveError;
use mail_to_files::mailbox::imap::ImapMailbox;
use mail_to_files::metadata::body::BodyField;
use mail_to_files::model::mail::ArchiveEntry;
use mail_to_files::parser::eml;
use mail_to_files::parser::mime::{ParseOutcome, SkipReason};
use mail_to_files::pipeline::{self, Archiver, Mode, Progress, RunReport, RunSettings};

#[derive(Parser)]
#[command(
    name = "mail-to-files",
    version,
    about = "Archive PDF attachments from marked mails into a WebDAV store"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Archive all marked mails, then delete them from the mailbox
    Run {
        /// Configuration file
        #[arg(short = 'c', long, value_name = "FILE")]
        config_file: Option<PathBuf>,
        /// Upload, but leave the mails in the mailbox
        #[arg(long)]
        keep_mails: bool,
        /// Derive and report everything, change nothing
        #[arg(long)]
        dry_run: bool,
    },
    /// Show the archive names derived from local .eml files
    Preview {
        /// Configuration file
        #[arg(short = 'c', long, value_name = "FILE")]
        config_file: Option<PathBuf>,
        /// Message files to inspect
        #[arg(value_name = "FILE.eml", required = true)]
        files: Vec<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config_file,
            keep_mails,
            dry_run,
        } => {
            let config = load_config(config_file.as_deref(), cli.verbose)?;
            cmd_run(&config, keep_mails, dry_run)
        }
        Commands::Preview {
            config_file,
            files,
            json,
        } => {
            let config = load_config(config_file.as_deref(), cli.verbose)?;
            cmd_preview(&config, &files, json)
        }
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Load the configuration and set up logging from it.
fn load_config(explicit: Option<&Path>, verbose: u8) -> anyhow::Result<Config> {
    let path = config::config_file_path(explicit);
    let config = Config::load(&path)?;

    let log_level = match verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);
    Ok(config)
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config
        .general
        .log_dir
        .as_ref()
        .filter(|dir| std::fs::create_dir_all(dir).is_ok());

    if let Some(dir) = log_dir {
        let file_appender = tracing_appender::rolling::never(dir, "mail-to-files.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mail-to-files", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Archive all marked mails.
fn cmd_run(config: &Config, keep_mails: bool, dry_run: bool) -> anyhow::Result<()> {
    let deriver = config.metadata_deriver()?;
    let settings = RunSettings {
        subject_marker: config.imap.subject_marker.clone(),
        base_path: config.archive.base_path.clone(),
        skip_malformed_dates: config.general.skip_malformed_dates,
    };

    // Connect both ends before touching any mail.
    let mut archive = if dry_run {
        None
    } else {
        Some(WebDavArchive::connect(&config.archive)?)
    };
    let mut mailbox = ImapMailbox::connect(&config.imap)?;

    let mode = match archive.as_mut() {
        Some(archive) => Mode::Live {
            archive,
            keep_mails,
        },
        None => Mode::DryRun,
    };

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Archiving [{bar:40.cyan/blue}] {pos}/{len}")
            .expect("valid template")
            .progress_chars("#>-"),
    );
    pb.enable_steady_tick(Duration::from_millis(120));

    let start = Instant::now();
    let report = Archiver::new(&deriver, settings).run(&mut mailbox, mode, &|event: &Progress<'_>| {
        report_progress(&pb, event)
    });
    pb.finish_and_clear();
    let report = report?;

    print_run_summary(&report, dry_run, keep_mails, start.elapsed());
    Ok(())
}

/// Wire pipeline progress to the progress bar.
fn report_progress(pb: &ProgressBar, event: &Progress<'_>) {
    use humansize::{format_size, BINARY};

    match event {
        Progress::Searched { candidates } => pb.set_length(*candidates as u64),
        Progress::Skipped { id, reason } => {
            pb.println(format!("  skip   #{id:<6} {reason}"));
            pb.inc(1);
        }
        Progress::Derived { entry, missing } => {
            if !missing.is_empty() {
                pb.println(format!(
                    "  note   #{:<6} missing {}",
                    entry.id,
                    missing_list(missing)
                ));
            }
        }
        Progress::Uploaded { entry, dry_run } => {
            let verb = if *dry_run { "plan" } else { "upload" };
            pb.println(format!(
                "  {verb:<6} #{:<6} {} ({}, {})",
                entry.id,
                entry.remote_path,
                entry.person,
                format_size(entry.size, BINARY)
            ));
            pb.inc(1);
        }
        Progress::UploadFailed { entry, error } => {
            pb.println(format!("  FAILED #{:<6} {}: {error}", entry.id, entry.remote_path));
            pb.inc(1);
        }
        Progress::Deleted { count } => pb.println(format!("  deleted {count} mail(s)")),
        Progress::Kept { count } => pb.println(format!("  kept {count} mail(s) in the mailbox")),
    }
}

fn missing_list(missing: &[BodyField]) -> String {
    missing
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Print the run outcome in a human-readable table.
fn print_run_summary(report: &RunReport, dry_run: bool, keep_mails: bool, elapsed: Duration) {
    use humansize::{format_size, BINARY};

    let archived_bytes: u64 = report.archived.iter().map(|e| e.size).sum();
    let count_skipped = |reason: SkipReason| {
        report
            .skipped
            .iter()
            .filter(|(_, r)| *r == reason)
            .count()
    };

    println!();
    if dry_run {
        println!("  Dry run: nothing was uploaded or deleted.");
        println!();
    }
    println!("  {:<25} {}", "Candidates", report.candidates);
    println!(
        "  {:<25} {} ({})",
        if dry_run { "Would archive" } else { "Archived" },
        report.archived.len(),
        format_size(archived_bytes, BINARY)
    );
    println!("  {:<25} {}", "Skipped", report.skipped.len());
    for reason in [
        SkipReason::NoPlainTextBody,
        SkipReason::NoPdfAttachment,
        SkipReason::MalformedDate,
    ] {
        let n = count_skipped(reason);
        if n > 0 {
            println!("    {n:>6}  {reason}");
        }
    }
    println!("  {:<25} {}", "Upload failures", report.failed.len());
    if !dry_run {
        let deleted = if keep_mails {
            "kept (--keep-mails)".to_string()
        } else {
            report.deleted.to_string()
        };
        println!("  {:<25} {}", "Deleted", deleted);
    }
    println!("  {:<25} {:.2?}", "Elapsed", elapsed);

    if !report.failed.is_empty() {
        println!();
        println!("  Failed uploads (mails kept):");
        for (entry, error) in &report.failed {
            println!("    #{:<6} {}: {error}", entry.id, entry.remote_path);
        }
    }
    println!();
}

/// Run parsing and derivation on local files and print the results.
fn cmd_preview(config: &Config, files: &[PathBuf], json: bool) -> anyhow::Result<()> {
    let deriver = config.metadata_deriver()?;

    let mut entries: Vec<(PathBuf, Result<ArchiveEntry, SkipReason>)> = Vec::new();
    for (i, path) in files.iter().enumerate() {
        let id = u32::try_from(i + 1)?;
        let parsed = match eml::parse_eml(path, id) {
            Err(ArchiveError::InvalidDate { .. }) if config.general.skip_malformed_dates => {
                Ok(ParseOutcome::Skipped(SkipReason::MalformedDate))
            }
            other => other,
        };
        let outcome = match parsed? {
            ParseOutcome::Parsed(mail) => {
                let derived = deriver.derive(&mail);
                Ok(pipeline::archive_entry(
                    &mail,
                    &derived,
                    &config.archive.base_path,
                ))
            }
            ParseOutcome::Skipped(reason) => Err(reason),
        };
        entries.push((path.clone(), outcome));
    }

    if json {
        print_preview_json(&entries)
    } else {
        print_preview_table(&entries);
        Ok(())
    }
}

/// Print preview results as a human-readable table.
fn print_preview_table(entries: &[(PathBuf, Result<ArchiveEntry, SkipReason>)]) {
    println!();
    println!(
        "  {:<24} {:<17} {:<16} {}",
        "File", "Date", "Person", "Archive path"
    );
    println!("  {}", "-".repeat(98));

    for (path, outcome) in entries {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name_trunc: String = name.chars().take(23).collect();
        match outcome {
            Ok(entry) => {
                let person_trunc: String = entry.person.chars().take(15).collect();
                println!(
                    "  {:<24} {:<17} {:<16} {}",
                    name_trunc,
                    entry.received_at.format("%Y-%m-%d %H:%M"),
                    person_trunc,
                    entry.remote_path
                );
            }
            Err(reason) => println!("  {:<24} skipped: {reason}", name_trunc),
        }
    }
    println!();
}

/// Print preview results as JSON.
fn print_preview_json(
    entries: &[(PathBuf, Result<ArchiveEntry, SkipReason>)],
) -> anyhow::Result<()> {
    let items: Vec<serde_json::Value> = entries
        .iter()
        .map(|(path, outcome)| match outcome {
            Ok(entry) => serde_json::json!({
                "file": path.to_string_lossy(),
                "entry": entry,
            }),
            Err(reason) => serde_json::json!({
                "file": path.to_string_lossy(),
                "skipped": reason.to_string(),
            }),
        })
        .collect();

    let output = serde_json::json!({
        "file_count": entries.len(),
        "results": items,
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
