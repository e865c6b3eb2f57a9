//! # Mailroom
//!
//! Mailroom is a small SMTP and POP3 server pair backed by flat files.
//!
//! SMTP accepts messages and hands them to a [`MailSink`]; the
//! [`MailboxDelivery`] sink appends them to the mailboxes of a
//! [`MailStore`]. POP3 lets users read and delete what was delivered.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mailroom::{MailStore, MailboxDelivery, Pop3Server, SmtpServer};
//! use std::thread;
//!
//! let store = MailStore::new("users", "users.d");
//! store.add_user("bob", "secret").unwrap();
//!
//! let smtp = SmtpServer::new("mail.local", MailboxDelivery::new(store.clone()));
//! thread::spawn(move || smtp.start("127.0.0.1:2525").unwrap());
//!
//! Pop3Server::new(store).start("127.0.0.1:1110").unwrap();
//! ```
//!
//! For tests, an `mpsc::Sender<Email>` is also a sink: every accepted
//! message shows up on the matching receiver.
//!
//! ## Supported SMTP commands
//!
//! - `HELO` - Identify the sender
//! - `MAIL FROM` - Specify the sender's address
//! - `RCPT TO` - Specify the destination (multiple destinations are supported)
//! - `DATA` - Send the email body
//! - `RSET` - Reset the current transaction
//! - `NOOP` - Do nothing
//! - `QUIT` - Close connection
//! - `VRFY`, `HELP` - Diagnostics only
//!
//! ## Supported POP3 commands
//!
//! `USER`, `PASS`, `STAT`, `LIST`, `RETR`, `DELE`, `RSET`, `NOOP` and `QUIT`.
//! `APOP`, `TOP` and `UIDL` are recognised but answered with `-ERR`.
//!
//! [`SmtpClient`] and [`Pop3Client`] drive the two servers from the other
//! side, applying and undoing the dot-stuffing of message bodies.
//!
//! ## Mailboxes
//!
//! The registry file holds one `username password` pair per line. Each user
//! has a directory with a `mailbox.txt` log. A POP3 session holds an
//! exclusive `flock` on the mailbox from `PASS` until it ends; a second
//! session for the same user is refused at `PASS`.
//!
//! ## Notes
//!
//! - Only the minimal command set of RFC 5321 and RFC 1939 is implemented.
//! - Passwords are stored and compared in plain text.
//! - SSL/TLS connection is not supported.
//! - Mail relay is not supported.

pub mod config;
pub mod framer;
pub mod listener;
pub mod pop3;
pub mod smtp;
pub mod store;
pub mod transparency;

pub use config::{Config, ConfigError};
pub use framer::{Framer, FramerError};
pub use listener::{Listener, ShutdownHandle};
pub use pop3::{Pop3Client, Pop3Error, Pop3Response, Pop3Server, Pop3Session};
pub use smtp::{
    Email, MailSink, MailboxDelivery, SmtpClient, SmtpError, SmtpLimits, SmtpResponse,
    SmtpServer, SmtpSession, SmtpState,
};
pub use store::{MailStore, MailboxLock, StoreError};
