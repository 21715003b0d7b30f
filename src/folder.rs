//! Mailbox folder locations
//!
//! A [`Folder`] names the container a fetch reads from. Sessions
//! always open it read-only, so reading never changes server-side
//! state.

use std::fmt;

/// A mailbox folder on the IMAP server.
///
/// # Examples
///
/// ```
/// use mailpipe::Folder;
///
/// assert_eq!(Folder::Inbox.as_str(), "INBOX");
/// assert_eq!(Folder::from("[Gmail]/Sent Mail").as_str(), "[Gmail]/Sent Mail");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Folder {
    /// The INBOX folder (RFC 3501 required, case-insensitive).
    #[default]
    Inbox,
    /// Any other mailbox, addressed by its server-side name.
    Named(String),
}

impl Folder {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::from(name.into())
    }

    /// The mailbox name as sent on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Inbox => "INBOX",
            Self::Named(name) => name,
        }
    }
}

impl fmt::Display for Folder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Folder {
    fn from(s: &str) -> Self {
        if s.eq_ignore_ascii_case("inbox") {
            Self::Inbox
        } else {
            Self::Named(s.to_string())
        }
    }
}

impl From<String> for Folder {
    fn from(s: String) -> Self {
        if s.eq_ignore_ascii_case("inbox") {
            Self::Inbox
        } else {
            Self::Named(s)
        }
    }
}
