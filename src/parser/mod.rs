//! Email parsing: MIME part extraction.

pub mod mime;
