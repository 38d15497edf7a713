//! Mailbox access: the session seam the scanner runs against, and its IMAP
//! implementation.

pub mod query;
pub mod session;

use crate::error::Result;

/// An authenticated session with a folder already selected.
pub trait Mailbox {
    /// Run `SEARCH` with the given criteria and return matching sequence
    /// numbers in ascending order.
    fn search(&mut self, criteria: &str) -> Result<Vec<u32>>;

    /// Fetch the full RFC 822 message for a sequence number.
    ///
    /// Returns `None` if the server sent no body for it.
    fn fetch_rfc822(&mut self, seq: u32) -> Result<Option<Vec<u8>>>;

    /// End the session. Errors are not interesting at this point.
    fn logout(&mut self) {}
}

/// Opens one [`Mailbox`] session per scan cycle.
pub trait Connect {
    type Session: Mailbox;

    /// Connect, authenticate, and select the configured folder.
    fn connect(&self) -> Result<Self::Session>;
}

impl<M: Mailbox + ?Sized> Mailbox for Box<M> {
    fn search(&mut self, criteria: &str) -> Result<Vec<u32>> {
        (**self).search(criteria)
    }

    fn fetch_rfc822(&mut self, seq: u32) -> Result<Option<Vec<u8>>> {
        (**self).fetch_rfc822(seq)
    }

    fn logout(&mut self) {
        (**self).logout()
    }
}
