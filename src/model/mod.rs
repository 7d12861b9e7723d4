//! Core data model types for archive mails, addresses, and attachments.

pub mod address;
pub mod attachment;
pub mod mail;
