//! The scan cycle: log in, count digests and deliveries, extract images,
//! swap in the new result, publish the sensors.

use std::sync::Arc;
use std::time::Instant;

use chrono::{Local, NaiveDate};
use tracing::{debug, error, info, warn};

use crate::error::{MailError, Result};
use crate::mailbox::query::{digest_criteria, package_criteria};
use crate::mailbox::{Connect, Mailbox};
use crate::model::scan::{ScanHandle, ScanResult, ScanSummary};
use crate::model::sensor::SensorState;
use crate::parser::mime;
use crate::publish::StatePublisher;

/// Images found in today's digest emails.
#[derive(Debug, Default)]
pub struct MailCount {
    /// Number of qualifying parts; reported as the letter count.
    pub letters: u32,
    /// Decoded payloads in mailbox order.
    pub images: Vec<Vec<u8>>,
}

/// Search for today's digest emails and pull every attachment out of them.
///
/// Each non-multipart part with a `Content-Disposition` counts as one letter.
/// Messages that cannot be parsed are skipped with a warning.
pub fn get_mail_count<M: Mailbox + ?Sized>(session: &mut M, today: NaiveDate) -> Result<MailCount> {
    let criteria = digest_criteria(today);
    debug!(since = %today, "Searching for digest mails");
    let ids = session.search(&criteria)?;

    let mut count = MailCount::default();
    for id in ids {
        let Some(raw) = session.fetch_rfc822(id)? else {
            warn!(id, "Server returned no body for digest message");
            continue;
        };
        match mime::parse_message(&raw) {
            Ok(parsed) => {
                debug!(
                    id,
                    subject = parsed.subject.as_deref().unwrap_or(""),
                    parts = parsed.parts.len(),
                    "Parsed digest message"
                );
                for part in parsed.parts {
                    debug!(
                        id,
                        filename = part.filename.as_deref().unwrap_or("-"),
                        content_type = %part.content_type,
                        inline = part.is_inline,
                        size = part.data.len(),
                        "Extracted mail image"
                    );
                    count.images.push(part.data);
                    count.letters += 1;
                }
            }
            Err(e) => warn!(id, error = %e, "Skipping unparseable digest message"),
        }
    }

    debug!(count = count.letters, "Found mail images");
    Ok(count)
}

/// Count today's "Item Delivered" notifications.
pub fn get_package_count<M: Mailbox + ?Sized>(session: &mut M, today: NaiveDate) -> Result<u32> {
    let ids = session.search(&package_criteria(today))?;
    let count = ids.len() as u32;
    debug!(count, "Found packages");
    Ok(count)
}

/// Runs scan cycles against one mailbox and publishes their results.
pub struct MailScanner<C: Connect> {
    connector: C,
    handle: ScanHandle,
    publisher: Arc<dyn StatePublisher>,
    fallback: Vec<u8>,
}

impl<C: Connect> MailScanner<C> {
    /// `fallback` is stored as the only image when a scan finds none.
    pub fn new(
        connector: C,
        handle: ScanHandle,
        publisher: Arc<dyn StatePublisher>,
        fallback: Vec<u8>,
    ) -> Self {
        Self {
            connector,
            handle,
            publisher,
            fallback,
        }
    }

    /// The handle results are published to.
    pub fn handle(&self) -> &ScanHandle {
        &self.handle
    }

    /// Run one cycle for today's date.
    pub fn scan(&self) -> Result<ScanSummary> {
        self.scan_on(Local::now().date_naive())
    }

    /// Run one cycle counting mail received on or after `today`.
    ///
    /// On connection or authentication failure nothing is published and the
    /// previous result stays in place; the error is logged and returned.
    pub fn scan_on(&self, today: NaiveDate) -> Result<ScanSummary> {
        let start = Instant::now();

        let mut session = self.connector.connect().inspect_err(log_cycle_failure)?;
        let outcome = collect(&mut session, today);
        session.logout();
        let (mail, packages) = outcome.inspect_err(log_cycle_failure)?;

        let letters = mail.letters;
        let result = ScanResult::new(letters, packages, mail.images, &self.fallback);
        if result.is_placeholder() {
            debug!("No digest images today, using placeholder");
        }
        let summary = ScanSummary::from_result(&result, start.elapsed());
        self.handle.replace(result);

        info!(
            letters,
            packages,
            images = summary.images,
            elapsed_ms = summary.elapsed_ms as u64,
            "Mail scan complete"
        );

        self.publish(letters, packages)?;
        Ok(summary)
    }

    /// Publish both sensors, attempting each even if the other fails.
    fn publish(&self, letters: u32, packages: u32) -> Result<()> {
        let mut first_error = None;
        for state in [SensorState::letters(letters), SensorState::packages(packages)] {
            if let Err(e) = self.publisher.set_state(&state) {
                error!(entity_id = %state.entity_id, error = %e, "Failed to publish sensor");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn collect<M: Mailbox>(session: &mut M, today: NaiveDate) -> Result<(MailCount, u32)> {
    let mail = get_mail_count(session, today)?;
    let packages = get_package_count(session, today)?;
    Ok((mail, packages))
}

fn log_cycle_failure(e: &MailError) {
    match e {
        MailError::Authentication { .. } => error!(
            error = %e,
            "Failed to authenticate using the given credentials. Check your username, password, host and port."
        ),
        _ if e.is_session_failure() => {
            error!(error = %e, "Error connecting or logging into the mail server")
        }
        _ => error!(error = %e, "Mail scan failed"),
    }
}
