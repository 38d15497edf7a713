//! `usps-mail`: counts today's USPS Informed Delivery mail and packages.
//!
//! The library logs into an IMAP mailbox, counts the mail pieces announced in
//! the "Informed Delivery Daily Digest" emails and the packages reported as
//! "Item Delivered", publishes both counts as sensor states, and serves the
//! scanned mail images one at a time through a camera.

pub mod camera;
pub mod config;
pub mod error;
pub mod mailbox;
pub mod model;
pub mod parser;
pub mod publish;
pub mod scanner;
pub mod service;
