//! Error types for the mailbox store

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No mailbox for user {0}")]
    MailboxNotFound(String),

    #[error("Malformed registry entry on line {line}")]
    MalformedRegistry { line: usize },

    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Invalid username {0:?}")]
    InvalidUsername(String),

    #[error("Password must be a single non-empty word")]
    InvalidPassword,

    #[error("User {0} already exists")]
    UserExists(String),

    #[error("No message at index {index} (mailbox holds {count})")]
    NoSuchMessage { index: usize, count: usize },

    #[error("Locking failed: {0}")]
    Lock(#[from] nix::errno::Errno),
}
