//! Email parsing: `.eml` reading, header access and MIME extraction.

pub mod eml;
pub mod header;
pub mod mime;
