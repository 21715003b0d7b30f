//! Reply threading headers
//!
//! `In-Reply-To` names the parent; `References` is the parent's own
//! chain with the parent appended. Upstream values are passed through
//! verbatim: no reordering, no deduplication.

use crate::message::MailMessage;
use serde::Serialize;

/// Threading headers for a reply to one source message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadingHeaders {
    pub in_reply_to: String,
    pub references: String,
}

/// Derive reply threading from the message being answered.
///
/// Returns `None` when the source has no (or a blank) `Message-ID`; a
/// reply to such a message is sent without threading headers.
#[must_use]
pub fn build_reply_threading(source: &MailMessage) -> Option<ThreadingHeaders> {
    let message_id = source.message_id.as_deref().map(str::trim)?;
    if message_id.is_empty() {
        return None;
    }

    let references = match source.references.as_deref().map(str::trim) {
        Some(chain) if !chain.is_empty() => format!("{chain} {message_id}"),
        _ => message_id.to_string(),
    };

    Some(ThreadingHeaders {
        in_reply_to: message_id.to_string(),
        references,
    })
}
