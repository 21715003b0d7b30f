//! Connection and service configuration
//!
//! All settings are plain values handed to constructors. The `from_env`
//! helpers read a `.env` file if present, then the process environment.

use crate::error::{Error, Result};
use std::env;

/// Default chat-completion model.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Default chat-completion endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// How the IMAP connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Security {
    /// TLS from the first byte (port 993).
    Tls,
    /// Plain TCP upgraded with STARTTLS (port 143, local bridges).
    StartTls,
}

impl Security {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tls" | "ssl" => Ok(Self::Tls),
            "starttls" => Ok(Self::StartTls),
            other => Err(Error::Config(format!(
                "Invalid IMAP_SECURITY '{other}' (expected tls or starttls)"
            ))),
        }
    }
}

/// IMAP connection configuration
#[derive(Debug, Clone)]
pub struct ImapConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub security: Security,
    /// Skip certificate verification (self-signed bridges, test servers).
    pub accept_invalid_certs: bool,
}

impl ImapConfig {
    /// Load IMAP configuration from environment variables
    ///
    /// Reads from `.env` file if present. Required variables:
    /// - `IMAP_USERNAME`
    /// - `IMAP_PASSWORD` (or `APP_PWD`)
    ///
    /// Optional (with defaults):
    /// - `IMAP_HOST` (default: `imap.gmail.com`)
    /// - `IMAP_PORT` (default: `993`)
    /// - `IMAP_SECURITY` (default: `tls`)
    /// - `IMAP_ACCEPT_INVALID_CERTS` (default: `false`)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            host: lookup("IMAP_HOST").unwrap_or_else(|| "imap.gmail.com".to_string()),
            port: parse_port(lookup("IMAP_PORT"), "IMAP_PORT", 993)?,
            username: lookup("IMAP_USERNAME")
                .ok_or_else(|| Error::Config("IMAP_USERNAME not set".into()))?,
            password: lookup("IMAP_PASSWORD")
                .or_else(|| lookup("APP_PWD"))
                .ok_or_else(|| Error::Config("IMAP_PASSWORD not set".into()))?,
            security: lookup("IMAP_SECURITY")
                .map_or(Ok(Security::Tls), |v| Security::parse(&v))?,
            accept_invalid_certs: parse_bool(
                lookup("IMAP_ACCEPT_INVALID_CERTS"),
                "IMAP_ACCEPT_INVALID_CERTS",
            )?,
        })
    }
}

/// SMTP submission configuration
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Address replies are sent from.
    pub from_address: String,
}

impl SmtpConfig {
    /// Load SMTP configuration from environment variables
    ///
    /// Credentials default to the IMAP ones (`IMAP_USERNAME`,
    /// `IMAP_PASSWORD` / `APP_PWD`) unless `SMTP_USERNAME` /
    /// `SMTP_PASSWORD` are set. `SMTP_HOST` defaults to
    /// `smtp.gmail.com`, `SMTP_PORT` to `587` and `MAIL_FROM` to the
    /// username.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let username = lookup("SMTP_USERNAME")
            .or_else(|| lookup("IMAP_USERNAME"))
            .ok_or_else(|| Error::Config("SMTP_USERNAME not set".into()))?;
        let password = lookup("SMTP_PASSWORD")
            .or_else(|| lookup("IMAP_PASSWORD"))
            .or_else(|| lookup("APP_PWD"))
            .ok_or_else(|| Error::Config("SMTP_PASSWORD not set".into()))?;

        Ok(Self {
            host: lookup("SMTP_HOST").unwrap_or_else(|| "smtp.gmail.com".to_string()),
            port: parse_port(lookup("SMTP_PORT"), "SMTP_PORT", 587)?,
            from_address: lookup("MAIL_FROM").unwrap_or_else(|| username.clone()),
            username,
            password,
        })
    }
}

/// Chat-completion extraction configuration
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub api_key: String,
    pub model: String,
    pub endpoint: String,
}

impl ExtractorConfig {
    /// Configuration with the default model and endpoint.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Load extraction configuration from environment variables
    ///
    /// `OPENAI_KEY` is required and must not be blank. `OPENAI_MODEL`
    /// and `OPENAI_ENDPOINT` override the defaults.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = lookup("OPENAI_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::Config("OPENAI_KEY not set".into()))?;

        let mut config = Self::new(api_key);
        if let Some(model) = lookup("OPENAI_MODEL").filter(|m| !m.trim().is_empty()) {
            config = config.with_model(model);
        }
        if let Some(endpoint) = lookup("OPENAI_ENDPOINT").filter(|e| !e.trim().is_empty()) {
            config = config.with_endpoint(endpoint);
        }
        Ok(config)
    }
}

fn parse_port(value: Option<String>, name: &str, default: u16) -> Result<u16> {
    value.map_or(Ok(default), |v| {
        v.trim()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid {name}: {e}")))
    })
}

fn parse_bool(value: Option<String>, name: &str) -> Result<bool> {
    let Some(value) = value else {
        return Ok(false);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" | "" => Ok(false),
        other => Err(Error::Config(format!("Invalid {name}: '{other}'"))),
    }
}
