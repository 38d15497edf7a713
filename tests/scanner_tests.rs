//! Integration tests for digest extraction, scan cycles, and the camera
//! rotation, run against `.eml` fixtures served by an in-memory mailbox.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use assert_fs::prelude::*;
use chrono::NaiveDate;
use predicates::prelude::*;

use usps_mail::camera::writer::write_frame;
use usps_mail::camera::{Camera, MailCamera};
use usps_mail::config;
use usps_mail::error::{MailError, Result};
use usps_mail::mailbox::{Connect, Mailbox};
use usps_mail::model::image::{load_fallback, sniff_content_type, NO_MAIL_PNG};
use usps_mail::model::scan::{ScanHandle, ScanResult};
use usps_mail::parser::mime::parse_message;
use usps_mail::publish::MemoryPublisher;
use usps_mail::scanner::{get_mail_count, get_package_count, MailScanner};

const FALLBACK: &[u8] = b"fallback image";

fn fixture(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn load(name: &str) -> Vec<u8> {
    std::fs::read(fixture(name)).unwrap()
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 14).unwrap()
}

/// Mailbox over a list of raw messages. `SEARCH` understands the `FROM` and
/// `SUBJECT` keys as case-insensitive substring matches on the header, which
/// is how IMAP servers treat them; `SINCE` is ignored.
#[derive(Clone)]
struct FixtureMailbox {
    messages: Vec<Vec<u8>>,
}

impl FixtureMailbox {
    fn new(names: &[&str]) -> Self {
        Self {
            messages: names.iter().map(|n| load(n)).collect(),
        }
    }

    fn header(raw: &[u8], name: &str) -> String {
        let text = String::from_utf8_lossy(raw);
        let prefix = format!("{}:", name.to_ascii_lowercase());
        text.lines()
            .take_while(|l| !l.is_empty())
            .find(|l| l.to_ascii_lowercase().starts_with(&prefix))
            .map(|l| l[prefix.len()..].trim().to_ascii_lowercase())
            .unwrap_or_default()
    }

    fn key(criteria: &str, key: &str) -> Option<String> {
        let start = criteria.find(&format!("{key} \""))? + key.len() + 2;
        let len = criteria[start..].find('"')?;
        Some(criteria[start..start + len].to_ascii_lowercase())
    }
}

impl Mailbox for FixtureMailbox {
    fn search(&mut self, criteria: &str) -> Result<Vec<u32>> {
        let subject = Self::key(criteria, "SUBJECT");
        let from = Self::key(criteria, "FROM");
        Ok(self
            .messages
            .iter()
            .enumerate()
            .filter(|(_, raw)| {
                subject
                    .as_ref()
                    .is_none_or(|s| Self::header(raw, "Subject").contains(s.as_str()))
                    && from
                        .as_ref()
                        .is_none_or(|f| Self::header(raw, "From").contains(f.as_str()))
            })
            .map(|(i, _)| i as u32 + 1)
            .collect())
    }

    fn fetch_rfc822(&mut self, seq: u32) -> Result<Option<Vec<u8>>> {
        Ok(self.messages.get(seq as usize - 1).cloned())
    }
}

/// Hands out the fixture mailbox, or rejects the login while `reject` is set.
struct FixtureConnector {
    mailbox: FixtureMailbox,
    reject: Arc<AtomicBool>,
}

impl Connect for FixtureConnector {
    type Session = FixtureMailbox;

    fn connect(&self) -> Result<FixtureMailbox> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(MailError::Authentication {
                username: "someone@example.com".into(),
                reason: "NO [AUTHENTICATIONFAILED] Invalid credentials".into(),
            });
        }
        Ok(self.mailbox.clone())
    }
}

struct Setup {
    scanner: MailScanner<FixtureConnector>,
    handle: ScanHandle,
    publisher: Arc<MemoryPublisher>,
    reject: Arc<AtomicBool>,
}

fn setup(names: &[&str]) -> Setup {
    let publisher = Arc::new(MemoryPublisher::new());
    let handle = ScanHandle::new(ScanResult::placeholder(FALLBACK));
    let reject = Arc::new(AtomicBool::new(false));
    let scanner = MailScanner::new(
        FixtureConnector {
            mailbox: FixtureMailbox::new(names),
            reject: reject.clone(),
        },
        handle.clone(),
        publisher.clone(),
        FALLBACK.to_vec(),
    );
    Setup {
        scanner,
        handle,
        publisher,
        reject,
    }
}

fn sensor(publisher: &MemoryPublisher, entity_id: &str) -> Option<u32> {
    publisher.get(entity_id).and_then(|s| s.as_count())
}

// ─── Test 1: A digest with one attachment yields one JPEG ───────────

#[test]
fn test_digest_single_attachment() {
    let parsed = parse_message(&load("digest_one.eml")).unwrap();
    assert_eq!(
        parsed.subject.as_deref(),
        Some("Your Informed Delivery Daily Digest")
    );
    assert_eq!(parsed.parts.len(), 1, "HTML body has no disposition");
    let part = &parsed.parts[0];
    assert_eq!(part.content_type, "image/jpeg");
    assert_eq!(part.filename.as_deref(), Some("mailpiece-1.jpg"));
    assert!(!part.is_inline);
    assert_eq!(sniff_content_type(&part.data), "image/jpeg");
}

// ─── Test 2: Inline parts inside nested multiparts count too ────────

#[test]
fn test_digest_inline_and_nested_parts() {
    let parsed = parse_message(&load("digest_inline.eml")).unwrap();
    assert_eq!(parsed.parts.len(), 2);
    assert!(parsed.parts[0].is_inline);
    assert_eq!(sniff_content_type(&parsed.parts[0].data), "image/gif");
    assert_eq!(sniff_content_type(&parsed.parts[1].data), "image/png");
}

// ─── Test 3: Plain notification has nothing to extract ──────────────

#[test]
fn test_package_notice_has_no_parts() {
    let parsed = parse_message(&load("package_delivered.eml")).unwrap();
    assert!(parsed.parts.is_empty());
}

// ─── Test 4: Only digests are counted, only deliveries are packages ─

#[test]
fn test_counts_ignore_unrelated_mail() {
    let mut mailbox = FixtureMailbox::new(&[
        "newsletter.eml",
        "digest_one.eml",
        "package_delivered.eml",
        "digest_inline.eml",
    ]);
    let mail = get_mail_count(&mut mailbox, today()).unwrap();
    assert_eq!(mail.letters, 3, "1 attachment + 2 parts; newsletter skipped");
    assert_eq!(mail.images.len(), 3);
    assert_eq!(get_package_count(&mut mailbox, today()).unwrap(), 1);
}

// ─── Test 5: 3 digests + 2 deliveries → 3 letters, 2 packages ───────

#[test]
fn test_scan_three_digests_two_packages() {
    let s = setup(&[
        "digest_one.eml",
        "package_delivered.eml",
        "digest_one.eml",
        "newsletter.eml",
        "digest_one.eml",
        "package_delivered.eml",
    ]);

    let summary = s.scanner.scan_on(today()).unwrap();
    assert_eq!(summary.letters, 3);
    assert_eq!(summary.packages, 2);
    assert!(!summary.used_placeholder);
    assert_eq!(sensor(&s.publisher, "sensor.usps_letters"), Some(3));
    assert_eq!(sensor(&s.publisher, "sensor.usps_packages"), Some(2));

    let camera = MailCamera::new("USPS Mail Pictures", s.handle.clone());
    let frames: Vec<Vec<u8>> = (0..6).map(|_| camera.next_image()).collect();
    assert_eq!(s.handle.snapshot().images().len(), 3);
    assert_eq!(frames[0..3], frames[3..6], "rotation wraps after 3 images");
}

// ─── Test 6: No digests → zero letters and the placeholder ──────────

#[test]
fn test_scan_without_digests_serves_placeholder() {
    let s = setup(&["newsletter.eml", "package_delivered.eml"]);

    let summary = s.scanner.scan_on(today()).unwrap();
    assert_eq!(summary.letters, 0);
    assert_eq!(summary.packages, 1);
    assert!(summary.used_placeholder);
    assert_eq!(sensor(&s.publisher, "sensor.usps_letters"), Some(0));

    let camera = MailCamera::new("USPS Mail Pictures", s.handle.clone());
    for _ in 0..4 {
        assert_eq!(camera.camera_image().as_deref(), Some(FALLBACK));
    }
}

// ─── Test 7: Rejected login publishes nothing and keeps going ───────

#[test]
fn test_login_failure_keeps_previous_result() {
    let s = setup(&["digest_one.eml", "package_delivered.eml"]);
    s.scanner.scan_on(today()).unwrap();
    let published = s.publisher.publish_count();
    let before = s.handle.snapshot();

    s.reject.store(true, Ordering::SeqCst);
    let err = s.scanner.scan_on(today()).unwrap_err();
    assert!(matches!(err, MailError::Authentication { .. }));
    assert_eq!(s.publisher.publish_count(), published);
    assert!(Arc::ptr_eq(&before, &s.handle.snapshot()));

    // The next cycle after the password is fixed succeeds.
    s.reject.store(false, Ordering::SeqCst);
    assert!(s.scanner.scan_on(today()).is_ok());
    assert_eq!(s.publisher.publish_count(), published + 2);
}

// ─── Test 8: Rescanning an unchanged mailbox gives the same counts ──

#[test]
fn test_rescan_is_idempotent() {
    let s = setup(&["digest_inline.eml", "package_delivered.eml"]);
    let first = s.scanner.scan_on(today()).unwrap();
    let second = s.scanner.scan_on(today()).unwrap();
    assert_eq!(first.letters, second.letters);
    assert_eq!(first.packages, second.packages);
    assert_eq!(first.images, second.images);
}

// ─── Test 9: A new scan restarts the rotation at the first image ────

#[test]
fn test_new_scan_resets_cursor() {
    let s = setup(&["digest_inline.eml"]);
    s.scanner.scan_on(today()).unwrap();
    let camera = MailCamera::new("USPS Mail Pictures", s.handle.clone());
    let first = camera.next_image();
    camera.next_image();

    s.scanner.scan_on(today()).unwrap();
    assert_eq!(s.handle.snapshot().cursor(), 0);
    assert_eq!(camera.next_image(), first);
}

// ─── Test 10: Frames land on disk in rotation order ─────────────────

#[test]
fn test_write_frames_to_disk() {
    let s = setup(&["digest_inline.eml"]);
    s.scanner.scan_on(today()).unwrap();
    let camera = MailCamera::new("USPS Mail Pictures", s.handle.clone());

    let dir = assert_fs::TempDir::new().unwrap();
    let out = dir.child("www").child("usps_mail.img");
    assert!(write_frame(&camera, out.path()).unwrap());
    out.assert(predicate::path::is_file());
    assert_eq!(sniff_content_type(&std::fs::read(out.path()).unwrap()), "image/gif");

    assert!(write_frame(&camera, out.path()).unwrap());
    assert_eq!(sniff_content_type(&std::fs::read(out.path()).unwrap()), "image/png");
    dir.child("www")
        .child(".usps_mail.img.tmp")
        .assert(predicate::path::missing());
}

// ─── Test 11: Config file with a relative placeholder override ──────

#[test]
fn test_config_resolves_placeholder_relative_to_file() {
    let dir = assert_fs::TempDir::new().unwrap();
    dir.child("no_mail.png").write_binary(b"custom placeholder").unwrap();
    let config_file = dir.child("config.toml");
    config_file
        .write_str(
            r#"
[account]
provider = "yahoo"
email = "someone@yahoo.com"
password = "app-password"
port = "993"

[camera]
default_image = "no_mail.png"
"#,
        )
        .unwrap();

    let config = config::load_config(Some(config_file.path())).unwrap();
    assert_eq!(
        config.account.server_host().as_deref(),
        Some("imap.mail.yahoo.com")
    );
    let placeholder = config.camera.default_image_path(config.config_dir());
    assert_eq!(load_fallback(placeholder.as_deref()), b"custom placeholder");
}

// ─── Test 12: Missing placeholder override falls back to built-in ───

#[test]
fn test_missing_placeholder_uses_builtin() {
    let dir = assert_fs::TempDir::new().unwrap();
    let missing = dir.child("gone.png");
    assert_eq!(load_fallback(Some(missing.path())), NO_MAIL_PNG);
    assert_eq!(sniff_content_type(NO_MAIL_PNG), "image/png");
}
