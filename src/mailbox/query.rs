//! The two fixed IMAP SEARCH queries and their date formatting.

use chrono::NaiveDate;

/// Subject of the daily mail-scan digest.
pub const DIGEST_SUBJECT: &str = "Informed Delivery Daily Digest";
/// Sender of delivery confirmations.
pub const PACKAGE_SENDER: &str = "auto-reply@usps.com";
/// Subject of delivery confirmations.
pub const PACKAGE_SUBJECT: &str = "Item Delivered";

/// Format a date the way IMAP `SINCE` expects it: `DD-Mon-YYYY`.
///
/// Month names are always the English abbreviations, independent of locale.
pub fn imap_date(date: NaiveDate) -> String {
    date.format("%d-%b-%Y").to_string()
}

/// `SEARCH` criteria for digest emails received on or after `since`.
pub fn digest_criteria(since: NaiveDate) -> String {
    format!(
        "(SUBJECT \"{DIGEST_SUBJECT}\" SINCE \"{}\")",
        imap_date(since)
    )
}

/// `SEARCH` criteria for delivery confirmations received on or after `since`.
pub fn package_criteria(since: NaiveDate) -> String {
    format!(
        "(FROM \"{PACKAGE_SENDER}\" SUBJECT \"{PACKAGE_SUBJECT}\" SINCE \"{}\")",
        imap_date(since)
    )
}
