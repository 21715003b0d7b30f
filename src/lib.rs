//! Mail fetch, flatten, thread and extract pipeline
//!
//! Fetches messages over IMAP as detached snapshots, flattens their
//! MIME bodies to plain text, derives reply threading headers, and
//! asks a chat-completion endpoint for the human-written part of a
//! message, falling back to a local JSON envelope when that fails.
//!
//! ```no_run
//! # async fn demo() -> mailpipe::Result<()> {
//! use mailpipe::{Folder, ImapConfig, ImapStore, MessageFetchService};
//!
//! let fetcher = MessageFetchService::new(ImapStore::new(ImapConfig::from_env()?));
//! if let Some(message) = fetcher.fetch_latest(&Folder::Inbox).await? {
//!     println!("{}", mailpipe::flatten(&message.body)?);
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod extract;
mod fetch;
mod folder;
mod imap;
mod message;
mod mime;
mod reply;
mod search;
mod send;
mod store;
mod threading;

pub use config::{
    DEFAULT_ENDPOINT, DEFAULT_MODEL, ExtractorConfig, ImapConfig, Security, SmtpConfig,
};
pub use error::{Error, Result};
pub use extract::{
    ExtractionProfile, ExtractionRequest, ExtractionResult, Extractor, fallback_json,
};
pub use fetch::MessageFetchService;
pub use folder::Folder;
pub use imap::{ImapMailSession, ImapStore};
pub use message::{Address, MailMessage, RawMessage};
pub use mime::{
    DEFAULT_MAX_DEPTH, Flattener, LeafBody, MAX_SUPPORTED_DEPTH, MediaType, MimePart, flatten,
};
pub use reply::{OutboundMessage, QUOTE_SEPARATOR, compose_reply, reply_subject, reply_to_latest};
pub use search::SearchFilter;
pub use send::{MailSender, SmtpSender, compose_plain};
pub use store::{MailSession, MailStore};
pub use threading::{ThreadingHeaders, build_reply_threading};
