//! MIME body trees and flattening
//!
//! A message body is snapshotted into an owned [`MimePart`] tree at
//! fetch time. [`flatten`] turns that tree into a single text by
//! concatenating the text leaves in document order.

use crate::error::{Error, Result};
use mail_parser::{MessagePart, MimeHeaders, PartType};
use serde::Serialize;
use std::fmt;

/// Default bound on container nesting accepted by [`Flattener`].
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Hard ceiling on container nesting. Snapshots stop recursing here
/// (deep or cyclic part ids) and [`Flattener::with_max_depth`] never
/// goes above it, so a cut-off subtree always surfaces as
/// [`Error::NestingTooDeep`].
pub const MAX_SUPPORTED_DEPTH: usize = 256;

/// Media type of a leaf part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    /// `text/plain`
    PlainText,
    /// `text/html`
    Html,
    /// Anything else, as `type/subtype`.
    Other(String),
}

impl MediaType {
    /// Classify a `type/subtype` pair, case-insensitively.
    #[must_use]
    pub fn from_mime(ctype: &str, subtype: Option<&str>) -> Self {
        let subtype = subtype.unwrap_or("");
        if ctype.eq_ignore_ascii_case("text") && subtype.eq_ignore_ascii_case("plain") {
            Self::PlainText
        } else if ctype.eq_ignore_ascii_case("text") && subtype.eq_ignore_ascii_case("html") {
            Self::Html
        } else if subtype.is_empty() {
            Self::Other(ctype.to_ascii_lowercase())
        } else {
            Self::Other(format!(
                "{}/{}",
                ctype.to_ascii_lowercase(),
                subtype.to_ascii_lowercase()
            ))
        }
    }

    #[must_use]
    pub const fn is_text(&self) -> bool {
        matches!(self, Self::PlainText | Self::Html)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PlainText => f.write_str("text/plain"),
            Self::Html => f.write_str("text/html"),
            Self::Other(mime) => f.write_str(mime),
        }
    }
}

/// Raw content of a leaf part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LeafBody {
    /// Decoded text.
    Text(String),
    /// Non-text payload; only its size is kept.
    Binary { len: usize },
    /// Content that could not be materialized, with the reason.
    Unreadable(String),
}

/// A node in a message body tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MimePart {
    Leaf { media_type: MediaType, body: LeafBody },
    /// Children in document order.
    Container(Vec<Self>),
}

impl MimePart {
    #[must_use]
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Leaf {
            media_type: MediaType::PlainText,
            body: LeafBody::Text(text.into()),
        }
    }

    #[must_use]
    pub fn html(text: impl Into<String>) -> Self {
        Self::Leaf {
            media_type: MediaType::Html,
            body: LeafBody::Text(text.into()),
        }
    }

    #[must_use]
    pub const fn container(children: Vec<Self>) -> Self {
        Self::Container(children)
    }

    /// Build the tree for a parsed message, starting at its root part.
    ///
    /// A message without any parts yields an empty container.
    #[must_use]
    pub fn from_parsed(message: &mail_parser::Message<'_>) -> Self {
        if message.parts.is_empty() {
            return Self::Container(Vec::new());
        }
        snapshot_part(&message.parts, 0, 0)
    }
}

impl From<String> for MimePart {
    fn from(text: String) -> Self {
        Self::plain(text)
    }
}

impl From<&str> for MimePart {
    fn from(text: &str) -> Self {
        Self::plain(text)
    }
}

fn snapshot_part(parts: &[MessagePart<'_>], index: usize, depth: usize) -> MimePart {
    let Some(part) = parts.get(index) else {
        return MimePart::Container(Vec::new());
    };

    let media_type = part.content_type().map_or(MediaType::PlainText, |ct| {
        MediaType::from_mime(ct.ctype(), ct.subtype())
    });

    match &part.body {
        PartType::Multipart(children) => {
            if depth >= MAX_SUPPORTED_DEPTH {
                return MimePart::Container(Vec::new());
            }
            MimePart::Container(
                children
                    .iter()
                    .filter_map(|id| usize::try_from(*id).ok())
                    .map(|child| snapshot_part(parts, child, depth + 1))
                    .collect(),
            )
        }
        PartType::Text(text) | PartType::Html(text) => {
            let body = if part.is_encoding_problem && media_type.is_text() {
                LeafBody::Unreadable(format!("{media_type} part could not be decoded"))
            } else {
                LeafBody::Text(text.to_string())
            };
            MimePart::Leaf { media_type, body }
        }
        PartType::Binary(bytes) | PartType::InlineBinary(bytes) => {
            let body = if media_type.is_text() {
                match std::str::from_utf8(bytes) {
                    Ok(text) => LeafBody::Text(text.to_string()),
                    Err(e) => LeafBody::Unreadable(format!("{media_type} part is not text: {e}")),
                }
            } else {
                LeafBody::Binary { len: bytes.len() }
            };
            MimePart::Leaf { media_type, body }
        }
        PartType::Message(nested) => MimePart::Leaf {
            media_type: MediaType::Other("message/rfc822".to_string()),
            body: LeafBody::Binary {
                len: nested.raw_message.len(),
            },
        },
    }
}

/// Flattens body trees into text with a bound on container nesting.
#[derive(Debug, Clone, Copy)]
pub struct Flattener {
    max_depth: usize,
}

impl Default for Flattener {
    fn default() -> Self {
        Self::new()
    }
}

impl Flattener {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Flattener with a custom nesting bound, capped at
    /// [`MAX_SUPPORTED_DEPTH`].
    #[must_use]
    pub const fn with_max_depth(max_depth: usize) -> Self {
        let max_depth = if max_depth > MAX_SUPPORTED_DEPTH {
            MAX_SUPPORTED_DEPTH
        } else {
            max_depth
        };
        Self { max_depth }
    }

    /// Flatten `root` into a single string.
    ///
    /// Text leaves (`text/plain`, `text/html`) contribute their raw
    /// content unchanged, containers contribute the concatenation of
    /// their children in document order, and every other leaf
    /// contributes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ContentRead`] when a text leaf could not be
    /// materialized, and [`Error::NestingTooDeep`] when containers nest
    /// deeper than the configured bound.
    pub fn flatten(&self, root: &MimePart) -> Result<String> {
        let mut out = String::new();
        self.append(root, 0, &mut out)?;
        Ok(out)
    }

    fn append(&self, part: &MimePart, depth: usize, out: &mut String) -> Result<()> {
        match part {
            MimePart::Leaf { media_type, body } => {
                if !media_type.is_text() {
                    return Ok(());
                }
                match body {
                    LeafBody::Text(text) => out.push_str(text),
                    LeafBody::Unreadable(reason) => {
                        return Err(Error::ContentRead(reason.clone()));
                    }
                    LeafBody::Binary { .. } => {}
                }
                Ok(())
            }
            MimePart::Container(children) => {
                if depth >= self.max_depth {
                    return Err(Error::NestingTooDeep {
                        limit: self.max_depth,
                    });
                }
                for child in children {
                    self.append(child, depth + 1, out)?;
                }
                Ok(())
            }
        }
    }
}

/// Flatten with the default nesting bound.
///
/// # Errors
///
/// See [`Flattener::flatten`].
pub fn flatten(root: &MimePart) -> Result<String> {
    Flattener::new().flatten(root)
}
