//! Error types for the POP3 server
//!
//! On the server side protocol mistakes by the client are ordinary `-ERR`
//! replies and these errors end the session. [`Pop3Client`](crate::pop3::Pop3Client)
//! reports refused commands as [`Pop3Error::Refused`].

use thiserror::Error;

use crate::framer::FramerError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum Pop3Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Framing error: {0}")]
    Framer(#[from] FramerError),

    #[error("Mailbox store error: {0}")]
    Store(#[from] StoreError),

    #[error("Connection closed unexpectedly")]
    ConnectionClosed,

    #[error("Server refused command: -ERR {0}")]
    Refused(String),

    #[error("Unexpected reply: {0}")]
    UnexpectedReply(String),
}
