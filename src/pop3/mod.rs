//! POP3 server implementation

pub mod client;
pub mod commands;
pub mod error;
pub mod maildrop;
pub mod response;
pub mod server;
pub mod session;

pub use client::Pop3Client;
pub use commands::Pop3Command;
pub use error::Pop3Error;
pub use maildrop::{DeleteError, Maildrop};
pub use response::Pop3Response;
pub use server::Pop3Server;
pub use session::{AuthPhase, Pop3Phase, Pop3Session};
