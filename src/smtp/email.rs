//! Email data structures and functionality

use std::net::SocketAddr;
use std::time::SystemTime;

/// A message accepted by the SMTP server, envelope included
#[derive(Debug, Clone)]
pub struct Email {
    /// Address of the client that submitted the message
    pub peer: SocketAddr,

    /// The sender's email address
    pub from: String,

    /// List of recipient email addresses
    pub to: Vec<String>,

    /// The email content including headers and body, `\n` line endings
    pub data: String,

    /// When the email was received by the server
    pub timestamp: SystemTime,
}

impl Email {
    /// Create a new email
    pub fn new(peer: SocketAddr, from: String, to: Vec<String>, data: String) -> Self {
        Self {
            peer,
            from,
            to,
            data,
            timestamp: SystemTime::now(),
        }
    }

    /// Check if this email was sent to a specific recipient
    pub fn has_recipient(&self, recipient: &str) -> bool {
        self.to.iter().any(|addr| addr == recipient)
    }

    /// Get the size of the email data in bytes
    pub fn data_size(&self) -> usize {
        self.data.len()
    }

    /// Get the subject line from the email headers (if present)
    pub fn get_subject(&self) -> Option<&str> {
        for line in self.data.lines() {
            if line.is_empty() {
                // End of headers
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                if name.eq_ignore_ascii_case("subject") {
                    return Some(value.trim());
                }
            }
        }
        None
    }
}
