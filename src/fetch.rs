//! Message retrieval with guaranteed session cleanup
//!
//! Every call connects, opens the folder read-only, snapshots what it
//! needs into owned [`MailMessage`]s and then tears the session down.
//! Cleanup always runs; its failures are logged and never replace the
//! result of the operation itself.

use crate::error::Result;
use crate::folder::Folder;
use crate::message::{MailMessage, RawMessage};
use crate::search::SearchFilter;
use crate::store::{MailSession, MailStore};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy)]
enum Selection {
    Latest,
    Unread,
}

/// Fetches detached message snapshots from a [`MailStore`].
#[derive(Debug, Clone)]
pub struct MessageFetchService<S> {
    store: S,
}

impl<S: MailStore> MessageFetchService<S> {
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// The last message the folder listing returns, or `None` when the
    /// folder is empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MailboxConnect`](crate::Error::MailboxConnect)
    /// if the session cannot be opened,
    /// [`Error::MailboxProtocol`](crate::Error::MailboxProtocol) if the
    /// folder cannot be opened or listed, and
    /// [`Error::Parse`](crate::Error::Parse) if the body is not a
    /// message.
    pub async fn fetch_latest(&self, folder: &Folder) -> Result<Option<MailMessage>> {
        let mut messages = self.run(folder, Selection::Latest).await?;
        Ok(messages.pop())
    }

    /// Every message without the `\Seen` flag, in search order.
    ///
    /// # Errors
    ///
    /// Same as [`fetch_latest`](Self::fetch_latest).
    pub async fn fetch_unread(&self, folder: &Folder) -> Result<Vec<MailMessage>> {
        self.run(folder, Selection::Unread).await
    }

    async fn run(&self, folder: &Folder, selection: Selection) -> Result<Vec<MailMessage>> {
        let mut session = self.store.connect().await?;
        let mut opened = false;

        let outcome = read_folder(&mut session, folder, selection, &mut opened).await;

        if opened && let Err(e) = session.close_folder().await {
            warn!("Failed to close {}: {}", folder, e);
        }
        if let Err(e) = session.disconnect().await {
            warn!("Failed to disconnect: {}", e);
        }

        outcome
    }
}

async fn read_folder<T: MailSession>(
    session: &mut T,
    folder: &Folder,
    selection: Selection,
    opened: &mut bool,
) -> Result<Vec<MailMessage>> {
    session.open_folder(folder).await?;
    *opened = true;

    let raw: Vec<RawMessage> = match selection {
        Selection::Latest => session.latest().await?.into_iter().collect(),
        Selection::Unread => session.search(SearchFilter::Unseen).await?,
    };
    debug!("{:?} in {}: {} raw messages", selection, folder, raw.len());

    let messages = raw
        .iter()
        .map(|m| MailMessage::from_raw(m.uid, &m.bytes))
        .collect::<Result<Vec<_>>>()?;

    info!("Snapshotted {} messages from {}", messages.len(), folder);
    Ok(messages)
}
