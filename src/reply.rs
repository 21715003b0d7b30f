//! Threaded reply composition

use crate::error::{Error, Result};
use crate::fetch::MessageFetchService;
use crate::folder::Folder;
use crate::message::{Address, MailMessage};
use crate::mime::flatten;
use crate::send::MailSender;
use crate::store::MailStore;
use crate::threading::build_reply_threading;
use chrono::{DateTime, Utc};
use lettre::message::Mailbox;
use serde::Serialize;
use std::time::SystemTime;
use tracing::{info, warn};

/// Separator between the new text and the quoted original.
pub const QUOTE_SEPARATOR: &str = "----- Original Message -----";

/// A plain-text message ready for a [`MailSender`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    pub from: Address,
    pub to: Address,
    pub subject: String,
    pub in_reply_to: Option<String>,
    pub references: Option<String>,
    pub date: DateTime<Utc>,
    pub body: String,
}

impl OutboundMessage {
    /// Build the wire message. Threading headers are only emitted when
    /// present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Compose`] if an address is not a valid mailbox.
    pub fn to_lettre(&self) -> Result<lettre::Message> {
        let mut builder = lettre::Message::builder()
            .from(mailbox(&self.from)?)
            .to(mailbox(&self.to)?)
            .subject(self.subject.clone())
            .date(SystemTime::from(self.date));

        if let Some(in_reply_to) = &self.in_reply_to {
            builder = builder.in_reply_to(in_reply_to.clone());
        }
        if let Some(references) = &self.references {
            builder = builder.references(references.clone());
        }

        builder
            .body(self.body.clone())
            .map_err(|e| Error::Compose(format!("Failed to build message: {e}")))
    }
}

fn mailbox(address: &Address) -> Result<Mailbox> {
    let email = address
        .email
        .parse()
        .map_err(|e| Error::Compose(format!("Invalid address '{}': {e}", address.email)))?;
    Ok(Mailbox::new(address.name.clone(), email))
}

/// Subject for a reply: `Re: ` is added unless the subject already
/// starts with `re:` in any case.
#[must_use]
pub fn reply_subject(subject: &str) -> String {
    let already_reply = subject
        .get(..3)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("re:"));
    if already_reply {
        subject.to_string()
    } else {
        format!("Re: {subject}")
    }
}

/// Compose a threaded reply to `source`.
///
/// The recipient is `Reply-To` when present, otherwise `From`. If the
/// original body cannot be flattened the quoted block carries the
/// reason instead and composition still succeeds.
///
/// # Errors
///
/// Returns [`Error::Compose`] if the source has neither `Reply-To` nor
/// `From`.
pub fn compose_reply(
    source: &MailMessage,
    from: &Address,
    reply_body: &str,
) -> Result<OutboundMessage> {
    let to = source
        .reply_to
        .as_ref()
        .or(source.sender.as_ref())
        .cloned()
        .ok_or_else(|| {
            Error::Compose(format!("Message {} has no Reply-To or From address", source.id))
        })?;

    let original = flatten(&source.body).unwrap_or_else(|e| {
        warn!("Quoting message {} without its content: {}", source.id, e);
        format!("Error retrieving original message content: {e}")
    });

    let body = format!(
        "{reply_body}\n\n{QUOTE_SEPARATOR}\nFrom: {}\nDate: {}\nSubject: {}\n\n{original}",
        source
            .sender
            .as_ref()
            .map_or_else(|| "unknown".to_string(), ToString::to_string),
        source
            .sent_date
            .map_or_else(|| "unknown".to_string(), |d| d.to_rfc2822()),
        source.subject_or_empty(),
    );

    let threading = build_reply_threading(source);

    Ok(OutboundMessage {
        from: from.clone(),
        to,
        subject: reply_subject(source.subject_or_empty()),
        in_reply_to: threading.as_ref().map(|t| t.in_reply_to.clone()),
        references: threading.map(|t| t.references),
        date: Utc::now(),
        body,
    })
}

/// Fetch the latest message in `folder`, reply to it and send the
/// reply.
///
/// Returns `Ok(None)` when the folder is empty.
///
/// # Errors
///
/// Propagates fetch, compose and send failures.
pub async fn reply_to_latest<S, M>(
    fetcher: &MessageFetchService<S>,
    sender: &M,
    folder: &Folder,
    from: &Address,
    reply_body: &str,
) -> Result<Option<OutboundMessage>>
where
    S: MailStore,
    M: MailSender + ?Sized,
{
    let Some(latest) = fetcher.fetch_latest(folder).await? else {
        info!("No messages in {}, nothing to reply to", folder);
        return Ok(None);
    };

    let reply = compose_reply(&latest, from, reply_body)?;
    sender.send(&reply).await?;
    info!("Replied to message {} from {}", latest.id, folder);
    Ok(Some(reply))
}
