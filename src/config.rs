//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `--config <path>` on the command line
//! 2. `$USPS_MAIL_CONFIG` (environment variable)
//! 3. `~/.config/usps-mail/config.toml` (Linux/macOS)
//!    `%APPDATA%\usps-mail\config.toml` (Windows)
//!
//! Mailbox credentials have no usable default, so unlike purely cosmetic
//! settings a missing file is an error. Secrets may also come from
//! `$USPS_MAIL_PASSWORD` and `$USPS_MAIL_HA_TOKEN`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{MailError, Result};

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "USPS_MAIL_CONFIG";
/// Environment variable overriding `account.password`.
pub const PASSWORD_ENV: &str = "USPS_MAIL_PASSWORD";
/// Environment variable overriding `publish.token`.
pub const TOKEN_ENV: &str = "USPS_MAIL_HA_TOKEN";
/// Longest accepted scan interval: one year.
pub const MAX_INTERVAL_SECS: u64 = 365 * 24 * 60 * 60;
/// Log file name inside the cache directory.
pub const LOG_FILE_NAME: &str = "usps-mail.log";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Mailbox account settings.
    pub account: AccountConfig,
    /// Scan scheduling.
    pub scan: ScanConfig,
    /// Camera entity settings.
    pub camera: CameraConfig,
    /// Where sensor states are published.
    pub publish: PublishConfig,
    /// Directory of the file this configuration was loaded from.
    #[serde(skip)]
    pub source_dir: Option<PathBuf>,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
}

/// Mail provider shorthand, resolved to a fixed IMAP hostname.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Gmail,
    Yahoo,
    Outlook,
    #[serde(other)]
    Other,
}

impl Provider {
    /// The IMAP hostname for this provider, if it has a well-known one.
    pub fn mailserver(self) -> Option<&'static str> {
        match self {
            Provider::Gmail => Some("imap.gmail.com"),
            Provider::Yahoo => Some("imap.mail.yahoo.com"),
            Provider::Outlook => Some("imap-mail.outlook.com"),
            Provider::Other => None,
        }
    }
}

/// Mailbox account settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// Provider shorthand.
    pub provider: Provider,
    /// Explicit IMAP hostname; takes precedence over `provider`.
    pub host: Option<String>,
    /// Login name (usually the email address).
    pub email: String,
    /// Login password or app password.
    pub password: String,
    /// Folder to search (default: "Inbox").
    pub inbox_folder: String,
    /// IMAPS port. Accepts either `993` or `"993"`.
    #[serde(deserialize_with = "deserialize_port")]
    pub port: u16,
    /// Connect and read timeout in seconds.
    pub timeout_secs: u64,
}

/// Scan scheduling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Seconds between scheduled scans (default: 3600).
    pub interval_secs: u64,
}

/// Which camera implementation backs the camera entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraSource {
    /// Cycle through images extracted from digest emails.
    #[default]
    Mail,
    /// Serve a single image file from disk.
    File,
}

/// Camera entity settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Whether the camera entity is set up at all.
    pub enabled: bool,
    /// Display name of the camera.
    pub name: String,
    /// Backing implementation.
    pub source: CameraSource,
    /// Image served when `source = "file"`.
    pub file_path: Option<PathBuf>,
    /// Placeholder override, relative to the config directory, or "None".
    pub default_image: Option<String>,
    /// If set, the current frame is written here every `refresh_secs`.
    pub output_path: Option<PathBuf>,
    /// Seconds between frames written to `output_path`.
    pub refresh_secs: u64,
}

/// Sensor publishing backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishBackend {
    /// Keep states in memory and log them.
    #[default]
    Log,
    /// Push states to the Home Assistant REST API.
    HomeAssistant,
}

/// Sensor publishing settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Backend selection.
    pub backend: PublishBackend,
    /// Base URL of the Home Assistant instance.
    pub base_url: Option<String>,
    /// Long-lived access token.
    pub token: Option<String>,
    /// HTTP timeout in seconds.
    pub timeout_secs: u64,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            cache_dir: None,
        }
    }
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            host: None,
            email: String::new(),
            password: String::new(),
            inbox_folder: "Inbox".to_string(),
            port: 993,
            timeout_secs: 30,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60 * 60, // hourly
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            name: crate::camera::DEFAULT_NAME.to_string(),
            source: CameraSource::Mail,
            file_path: None,
            default_image: None,
            output_path: None,
            refresh_secs: 10,
        }
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            backend: PublishBackend::Log,
            base_url: None,
            token: None,
            timeout_secs: 10,
        }
    }
}

// Secrets stay out of `{:?}` output, which ends up in logs.
impl std::fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountConfig")
            .field("provider", &self.provider)
            .field("host", &self.host)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("inbox_folder", &self.inbox_folder)
            .field("port", &self.port)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl std::fmt::Debug for PublishConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishConfig")
            .field("backend", &self.backend)
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn deserialize_port<'de, D>(deserializer: D) -> std::result::Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PortValue {
        Number(u16),
        Text(String),
    }

    match PortValue::deserialize(deserializer)? {
        PortValue::Number(port) => Ok(port),
        PortValue::Text(text) => text
            .trim()
            .parse::<u16>()
            .map_err(|_| serde::de::Error::custom(format!("invalid port '{text}'"))),
    }
}

// ── Accessors ───────────────────────────────────────────────────

impl AccountConfig {
    /// Resolve the IMAP hostname: explicit `host`, else the provider's server.
    pub fn server_host(&self) -> Option<String> {
        match self.host.as_deref().map(str::trim) {
            Some(host) if !host.is_empty() => Some(host.to_string()),
            _ => self.provider.mailserver().map(String::from),
        }
    }

    /// Connect / read timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl ScanConfig {
    /// Scan interval as a [`Duration`].
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl CameraConfig {
    /// Resolve the placeholder override against `config_dir`.
    ///
    /// `None`, an empty string, and the literal `"None"` all mean "no override".
    pub fn default_image_path(&self, config_dir: Option<&Path>) -> Option<PathBuf> {
        let raw = self.default_image.as_deref()?.trim();
        if raw.is_empty() || raw == "None" {
            return None;
        }
        let path = PathBuf::from(raw);
        if path.is_absolute() {
            return Some(path);
        }
        Some(match config_dir {
            Some(dir) => dir.join(path),
            None => path,
        })
    }

    /// Frame refresh period as a [`Duration`].
    pub fn refresh(&self) -> Duration {
        Duration::from_secs(self.refresh_secs.max(1))
    }
}

impl Config {
    /// Check that every setting needed for a scan cycle is present.
    pub fn validate(&self) -> Result<()> {
        let account = &self.account;
        if account.email.trim().is_empty() {
            return Err(MailError::Config("account.email is required".into()));
        }
        if account.password.is_empty() {
            return Err(MailError::Config(format!(
                "account.password is required (or set ${PASSWORD_ENV})"
            )));
        }
        if account.server_host().is_none() {
            return Err(MailError::Config(
                "account.host is required when provider is \"other\"".into(),
            ));
        }
        if account.port == 0 {
            return Err(MailError::Config("account.port must be non-zero".into()));
        }
        if account.inbox_folder.trim().is_empty() {
            return Err(MailError::Config("account.inbox_folder is empty".into()));
        }
        if self.scan.interval_secs == 0 {
            return Err(MailError::Config("scan.interval_secs must be positive".into()));
        }
        if self.scan.interval_secs > MAX_INTERVAL_SECS {
            return Err(MailError::Config(format!(
                "scan.interval_secs must be at most {MAX_INTERVAL_SECS} (one year)"
            )));
        }
        if self.camera.enabled
            && self.camera.source == CameraSource::File
            && self.camera.file_path.is_none()
        {
            return Err(MailError::Config(
                "camera.file_path is required when camera.source is \"file\"".into(),
            ));
        }
        if self.publish.backend == PublishBackend::HomeAssistant {
            if self.publish.base_url.as_deref().unwrap_or("").is_empty() {
                return Err(MailError::Config(
                    "publish.base_url is required for the home_assistant backend".into(),
                ));
            }
            if self.publish.token.as_deref().unwrap_or("").is_empty() {
                return Err(MailError::Config(format!(
                    "publish.token is required for the home_assistant backend (or set ${TOKEN_ENV})"
                )));
            }
        }
        Ok(())
    }

    /// Replace secrets with values supplied out of band (environment).
    pub fn apply_overrides(&mut self, password: Option<String>, token: Option<String>) {
        if let Some(password) = password.filter(|p| !p.is_empty()) {
            self.account.password = password;
        }
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            self.publish.token = Some(token);
        }
    }

    /// Directory relative paths in this configuration are resolved against.
    pub fn config_dir(&self) -> Option<&Path> {
        self.source_dir.as_deref()
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Parse a configuration from TOML text.
pub fn parse_config(contents: &str) -> Result<Config> {
    toml::from_str::<Config>(contents).map_err(|e| MailError::Config(e.to_string()))
}

/// Load and validate the configuration.
///
/// `explicit` takes precedence over the environment and standard locations.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => config_file_path().ok_or_else(|| {
            MailError::Config("Could not determine config file path".into())
        })?,
    };

    if !path.exists() {
        return Err(MailError::Config(format!(
            "config file not found: {}",
            path.display()
        )));
    }

    let contents = std::fs::read_to_string(&path).map_err(|e| MailError::io(&path, e))?;
    let mut config: Config = toml::from_str(&contents)
        .map_err(|e| MailError::Config(format!("{}: {e}", path.display())))?;
    config.source_dir = path.parent().map(Path::to_path_buf);
    config.apply_overrides(
        std::env::var(PASSWORD_ENV).ok(),
        std::env::var(TOKEN_ENV).ok(),
    );
    config.validate()?;

    tracing::info!(path = %path.display(), "Loaded config");
    Ok(config)
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("usps-mail").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("usps-mail")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join(LOG_FILE_NAME)
}
