//! Mailbox access seams
//!
//! [`MailStore`] opens sessions; a [`MailSession`] offers the handful
//! of folder operations the fetch service needs. The IMAP
//! implementation lives in [`crate::imap`]; tests substitute their own.

use crate::error::Result;
use crate::folder::Folder;
use crate::message::RawMessage;
use crate::search::SearchFilter;
use async_trait::async_trait;

/// Something that can open authenticated mailbox sessions.
#[async_trait]
pub trait MailStore: Send + Sync {
    type Session: MailSession;

    /// Connect and authenticate.
    ///
    /// Implementations report failures as
    /// [`Error::MailboxConnect`](crate::Error::MailboxConnect).
    async fn connect(&self) -> Result<Self::Session>;
}

/// An authenticated session with at most one open folder.
///
/// Everything except `connect` reports failures as
/// [`Error::MailboxProtocol`](crate::Error::MailboxProtocol).
#[async_trait]
pub trait MailSession: Send {
    /// Open `folder` read-only: flags are never changed and closing it
    /// never expunges.
    async fn open_folder(&mut self, folder: &Folder) -> Result<()>;

    /// The last message of the folder listing, or `None` when the
    /// folder is empty. Only that one message is downloaded.
    async fn latest(&mut self) -> Result<Option<RawMessage>>;

    /// Messages in the open folder matching `filter`, in server order.
    async fn search(&mut self, filter: SearchFilter) -> Result<Vec<RawMessage>>;

    /// Close the open folder without expunging.
    async fn close_folder(&mut self) -> Result<()>;

    async fn disconnect(&mut self) -> Result<()>;
}
