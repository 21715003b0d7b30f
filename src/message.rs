//! Detached message snapshots
//!
//! A [`MailMessage`] owns everything read from the server, so it stays
//! usable after the session that produced it has been closed.

use crate::error::{Error, Result};
use crate::mime::MimePart;
use chrono::{DateTime, Utc};
use mail_parser::{HeaderName, MessageParser};
use serde::Serialize;
use std::fmt;

/// Raw message bytes as returned by a mailbox session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub uid: u32,
    pub bytes: Vec<u8>,
}

impl RawMessage {
    #[must_use]
    pub const fn new(uid: u32, bytes: Vec<u8>) -> Self {
        Self { uid, bytes }
    }
}

/// A single mailbox address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Address {
    pub name: Option<String>,
    pub email: String,
}

impl Address {
    #[must_use]
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            name: None,
            email: email.into(),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    fn from_addr(addr: &mail_parser::Addr<'_>) -> Option<Self> {
        let email = addr.address()?.trim();
        if email.is_empty() {
            return None;
        }
        Some(Self {
            name: addr
                .name()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(ToString::to_string),
            email: email.to_string(),
        })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} <{}>", self.email),
            None => f.write_str(&self.email),
        }
    }
}

/// Immutable snapshot of a fetched message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailMessage {
    /// IMAP UID within the folder it was fetched from.
    pub id: u32,
    pub subject: Option<String>,
    pub sender: Option<Address>,
    pub reply_to: Option<Address>,
    pub recipients: Vec<Address>,
    pub sent_date: Option<DateTime<Utc>>,
    /// `Message-ID` including its angle brackets.
    pub message_id: Option<String>,
    /// Raw `References` value, whitespace-collapsed, order untouched.
    pub references: Option<String>,
    pub body: MimePart,
}

impl MailMessage {
    /// Parse raw RFC 5322 bytes into an owned snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the bytes are not a message at all.
    pub fn from_raw(uid: u32, raw: &[u8]) -> Result<Self> {
        let parsed = MessageParser::default()
            .parse(raw)
            .ok_or_else(|| Error::Parse(format!("UID {uid} is not an RFC 5322 message")))?;

        let first_address = |addr: Option<&mail_parser::Address<'_>>| {
            addr.and_then(|a| a.first()).and_then(Address::from_addr)
        };

        let recipients = parsed
            .to()
            .map(|to| to.iter().filter_map(Address::from_addr).collect())
            .unwrap_or_default();

        Ok(Self {
            id: uid,
            subject: parsed.subject().map(ToString::to_string),
            sender: first_address(parsed.from()),
            reply_to: first_address(parsed.reply_to()),
            recipients,
            sent_date: parsed
                .date()
                .and_then(|d| DateTime::from_timestamp(d.to_timestamp(), 0)),
            message_id: collapse_folding(parsed.header_raw(HeaderName::MessageId))
                .or_else(|| parsed.message_id().map(|id| format!("<{id}>"))),
            references: collapse_folding(parsed.header_raw(HeaderName::References)),
            body: MimePart::from_parsed(&parsed),
        })
    }

    /// The subject, or an empty string when the header is missing.
    #[must_use]
    pub fn subject_or_empty(&self) -> &str {
        self.subject.as_deref().unwrap_or_default()
    }
}

/// Raw header value with folding whitespace collapsed to single spaces.
fn collapse_folding(raw: Option<&str>) -> Option<String> {
    let value = raw?
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    (!value.is_empty()).then_some(value)
}
