//! Error types for mailpipe

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// TCP, TLS or LOGIN failure while opening a mailbox session.
    #[error("Mailbox connection failed: {0}")]
    MailboxConnect(String),

    /// Opening a folder, searching or fetching failed on an open session.
    #[error("Mailbox protocol error: {0}")]
    MailboxProtocol(String),

    /// A body leaf whose raw content could not be materialized.
    #[error("Failed to read message content: {0}")]
    ContentRead(String),

    #[error("MIME tree nested deeper than {limit} levels")]
    NestingTooDeep { limit: usize },

    #[error("Email parsing error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cannot compose message: {0}")]
    Compose(String),

    #[error("Send error: {0}")]
    Send(String),
}

pub type Result<T> = std::result::Result<T, Error>;
