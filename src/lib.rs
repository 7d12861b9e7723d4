//! `mail-to-files` — archive PDF attachments from a mailbox into a remote
//! file store.
//!
//! Mails whose subject carries a marker are fetched, their body lines are
//! turned into a description, tags and a person, the first PDF attachment
//! is uploaded under a templated filename, and the mails that were archived
//! are removed from the mailbox.

pub mod archive;
pub mod config;
pub mod error;
pub mod mailbox;
pub mod metadata;
pub mod model;
pub mod parser;
pub mod pipeline;
