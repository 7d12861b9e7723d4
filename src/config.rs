//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. the `--config-file` argument
//! 2. `$MAIL_TO_FILES_CONFIG` (environment variable)
//! 3. `~/.config/mail-to-files/config.toml` (Linux/macOS)
//!    `%APPDATA%\mail-to-files\config.toml` (Windows)
//! 4. `./config.toml`
//!
//! The mailbox and archive sections have no defaults, so a missing file is
//! an error rather than a silent fallback.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ArchiveError, Result};
use crate::metadata::filename::{
    FilenameTemplate, DEFAULT_TAG_SEPARATOR, DEFAULT_TEMPLATE,
};
use crate::metadata::identity::{PersonDirectory, PersonTagPosition};
use crate::metadata::MetadataDeriver;

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "MAIL_TO_FILES_CONFIG";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// General behavior settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Mail server connection.
    pub imap: ImapConfig,
    /// Remote archive connection.
    pub archive: ArchiveConfig,
    /// Target filename settings.
    #[serde(default)]
    pub filename: FilenameConfig,
    /// Person label → one or more sender addresses.
    #[serde(default)]
    pub persons: BTreeMap<String, PersonAddresses>,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Directory for a plain-text log file. No file logging when unset.
    pub log_dir: Option<PathBuf>,
    /// Skip messages with a malformed `Date:` header instead of aborting.
    pub skip_malformed_dates: bool,
}

/// Mail server connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImapConfig {
    pub host: String,
    #[serde(default = "default_imap_port")]
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Mailbox to scan.
    #[serde(default = "default_mailbox")]
    pub mailbox: String,
    /// Subject substring that marks data-archive mails.
    #[serde(default = "default_subject_marker")]
    pub subject_marker: String,
}

/// Remote archive (WebDAV) connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// WebDAV root, e.g. `https://cloud.example.com/remote.php/dav/files/me`.
    pub url: String,
    pub user: String,
    pub password: String,
    /// Collection below `url` the files are stored in.
    #[serde(default)]
    pub base_path: String,
    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Target filename settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilenameConfig {
    /// Filename template, see [`FilenameTemplate`].
    pub template: String,
    /// Separator placed between tags in `{tags}`.
    pub tag_separator: String,
    /// Where the person is inserted when it is not already a tag.
    pub person_tag_position: PersonTagPosition,
}

/// Addresses of one person: a single string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PersonAddresses {
    One(String),
    Many(Vec<String>),
}

impl PersonAddresses {
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        let slice = match self {
            Self::One(address) => std::slice::from_ref(address),
            Self::Many(addresses) => addresses.as_slice(),
        };
        slice.iter().map(String::as_str)
    }
}

// ── Default implementations ─────────────────────────────────────

fn default_imap_port() -> u16 {
    993
}

fn default_mailbox() -> String {
    "INBOX".to_string()
}

fn default_subject_marker() -> String {
    "da".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            log_dir: None,
            skip_malformed_dates: false,
        }
    }
}

impl Default for FilenameConfig {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
            tag_separator: DEFAULT_TAG_SEPARATOR.to_string(),
            person_tag_position: PersonTagPosition::End,
        }
    }
}

// ── Load / validate ─────────────────────────────────────────────

impl Config {
    /// Parse configuration from TOML text. `path` is only used in errors.
    pub fn from_toml(contents: &str, path: &Path) -> Result<Self> {
        let config: Config =
            toml::from_str(contents).map_err(|e| ArchiveError::config(path, e.to_string()))?;
        config.validate(path)?;
        Ok(config)
    }

    /// Load and validate the configuration file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ArchiveError::FileNotFound(path.to_path_buf())
            } else {
                ArchiveError::io(path, e)
            }
        })?;
        let config = Self::from_toml(&contents, path)?;
        tracing::info!(path = %path.display(), persons = config.persons.len(), "Loaded config");
        Ok(config)
    }

    /// Parsed filename template with the configured tag separator.
    pub fn filename_template(&self) -> Result<FilenameTemplate> {
        Ok(FilenameTemplate::parse(&self.filename.template)?
            .with_tag_separator(self.filename.tag_separator.clone()))
    }

    /// Build the metadata stages from this configuration.
    pub fn metadata_deriver(&self) -> Result<MetadataDeriver> {
        Ok(MetadataDeriver::new(
            PersonDirectory::from_table(&self.persons),
            self.filename_template()?,
            self.filename.person_tag_position,
        ))
    }

    fn validate(&self, path: &Path) -> Result<()> {
        self.filename_template()?;
        if self.imap.host.trim().is_empty() {
            return Err(ArchiveError::config(path, "imap.host is empty"));
        }
        if self.imap.subject_marker.trim().is_empty() {
            return Err(ArchiveError::config(path, "imap.subject_marker is empty"));
        }
        if self.archive.url.trim().is_empty() {
            return Err(ArchiveError::config(path, "archive.url is empty"));
        }
        Ok(())
    }
}

/// Determine the config file path: explicit argument, then env var, then
/// the standard config directory, then the working directory.
pub fn config_file_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        return PathBuf::from(env_path);
    }

    if let Some(path) = dirs::config_dir().map(|d| d.join("mail-to-files").join("config.toml")) {
        if path.exists() {
            return path;
        }
    }

    PathBuf::from("config.toml")
}
