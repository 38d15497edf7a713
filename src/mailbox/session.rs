//! IMAP over implicit TLS.
//!
//! One session is opened per scan cycle and logged out at the end of it;
//! nothing is pooled between cycles.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

use crate::config::AccountConfig;
use crate::error::{MailError, Result};
use crate::mailbox::{Connect, Mailbox};

type TlsSession = imap::Session<native_tls::TlsStream<TcpStream>>;

/// Everything needed to open a mailbox session.
#[derive(Clone)]
pub struct SessionSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub folder: String,
    pub timeout: Duration,
}

impl SessionSettings {
    /// Resolve the server and credentials from the account configuration.
    pub fn from_config(account: &AccountConfig) -> Result<Self> {
        let host = account.server_host().ok_or_else(|| {
            MailError::Config(format!(
                "no IMAP server known for provider {:?}; set account.host",
                account.provider
            ))
        })?;
        debug!(provider = ?account.provider, host = %host, "Resolved mail server");
        Ok(Self {
            host,
            port: account.port,
            username: account.email.clone(),
            password: account.password.clone(),
            folder: account.inbox_folder.clone(),
            timeout: account.timeout(),
        })
    }
}

impl std::fmt::Debug for SessionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("folder", &self.folder)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Opens [`ImapSession`]s against a real server.
#[derive(Debug, Clone)]
pub struct ImapConnector {
    settings: SessionSettings,
}

impl ImapConnector {
    pub fn new(settings: SessionSettings) -> Self {
        Self { settings }
    }
}

impl Connect for ImapConnector {
    type Session = ImapSession;

    fn connect(&self) -> Result<ImapSession> {
        let s = &self.settings;
        debug!(host = %s.host, port = s.port, "Connecting to mail server");

        let tcp = open_tcp(&s.host, s.port, s.timeout)?;
        let tls = native_tls::TlsConnector::builder()
            .build()
            .map_err(|e| MailError::Tls(format!("TLS connector build failed: {e}")))?;
        let stream = tls
            .connect(&s.host, tcp)
            .map_err(|e| MailError::Tls(format!("handshake with {} failed: {e}", s.host)))?;

        let session = open_session(stream, s)?;
        Ok(ImapSession {
            session,
            logged_out: false,
        })
    }
}

/// An authenticated IMAP session with the folder selected.
pub struct ImapSession {
    session: TlsSession,
    logged_out: bool,
}

impl Mailbox for ImapSession {
    fn search(&mut self, criteria: &str) -> Result<Vec<u32>> {
        debug!(criteria, "SEARCH");
        let found = self
            .session
            .search(criteria)
            .map_err(|e| MailError::imap("SEARCH", e))?;
        let mut ids: Vec<u32> = found.into_iter().collect();
        ids.sort_unstable();
        Ok(ids)
    }

    fn fetch_rfc822(&mut self, seq: u32) -> Result<Option<Vec<u8>>> {
        let fetches = self
            .session
            .fetch(seq.to_string(), "RFC822")
            .map_err(|e| MailError::imap("FETCH", e))?;
        Ok(fetches
            .iter()
            .find_map(|f: &imap::types::Fetch| f.body().map(<[u8]>::to_vec)))
    }

    fn logout(&mut self) {
        if self.logged_out {
            return;
        }
        self.logged_out = true;
        if let Err(error) = self.session.logout() {
            debug!(%error, "IMAP logout failed");
        }
    }
}

/// Read the greeting, log in and select the folder on an established stream.
///
/// A session whose SELECT fails is logged out before the error is returned.
fn open_session<T: Read + Write>(stream: T, s: &SessionSettings) -> Result<imap::Session<T>> {
    let mut client = imap::Client::new(stream);
    client
        .read_greeting()
        .map_err(|e| MailError::Connection {
            host: s.host.clone(),
            port: s.port,
            reason: format!("no IMAP greeting: {e}"),
        })?;

    let mut session = client
        .login(&s.username, &s.password)
        .map_err(|(e, _client)| MailError::Authentication {
            username: s.username.clone(),
            reason: e.to_string(),
        })?;
    debug!(username = %s.username, "Logged into mail server");

    if let Err(e) = session.select(&s.folder) {
        if let Err(error) = session.logout() {
            debug!(%error, "IMAP logout after failed SELECT failed");
        }
        return Err(MailError::imap("SELECT", e));
    }
    debug!(folder = %s.folder, "Selected folder");
    Ok(session)
}

/// Connect with a timeout, trying every resolved address in turn.
fn open_tcp(host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    let connection_error = |reason: String| MailError::Connection {
        host: host.to_string(),
        port,
        reason,
    };

    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(|e| connection_error(format!("could not resolve: {e}")))?;

    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                stream
                    .set_read_timeout(Some(timeout))
                    .and_then(|_| stream.set_write_timeout(Some(timeout)))
                    .map_err(|e| connection_error(e.to_string()))?;
                return Ok(stream);
            }
            Err(e) => {
                debug!(%addr, error = %e, "Connect attempt failed");
                last_error = Some(e);
            }
        }
    }

    Err(connection_error(match last_error {
        Some(e) => e.to_string(),
        None => "no addresses resolved".to_string(),
    }))
}
