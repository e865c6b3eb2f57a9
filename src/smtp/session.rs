//! SMTP session state management

use std::net::SocketAddr;

use crate::smtp::email::Email;
use crate::smtp::error::{SmtpError, SmtpLimits};

/// What the next framed unit from the client is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpState {
    /// Reading command lines terminated by CRLF
    Command,
    /// Reading a mail body terminated by CRLF.CRLF
    Data,
}

/// Manages the state and data for a single SMTP session
///
/// Invariants: `from` is only set after HELO, `to` is only non-empty once
/// `from` is set, and [`SmtpState::Data`] is only entered with recipients.
#[derive(Debug)]
pub struct SmtpSession {
    /// Current state of the session
    pub state: SmtpState,
    /// Client domain from HELO command
    pub client_domain: Option<String>,
    /// Sender address from MAIL FROM command
    pub from: Option<String>,
    /// List of recipients from RCPT TO commands
    pub to: Vec<String>,
}

impl SmtpSession {
    /// Create a new SMTP session
    pub fn new() -> Self {
        Self {
            state: SmtpState::Command,
            client_domain: None,
            from: None,
            to: Vec::new(),
        }
    }

    /// Byte sequence ending the next unit in the current state.
    ///
    /// The CRLF closing the `DATA` line belongs to that command, so a bare
    /// `.` straight after it does not end the mail data. The shortest body is
    /// one empty line: `DATA\r\n\r\n.\r\n`.
    pub fn terminator(&self) -> &'static [u8] {
        match self.state {
            SmtpState::Command => b"\r\n",
            SmtpState::Data => b"\r\n.\r\n",
        }
    }

    /// Reset the session to post-HELO state (clears transaction data)
    pub fn reset(&mut self) {
        self.state = SmtpState::Command;
        self.from = None;
        self.to.clear();
        // Keep client_domain as it's set by HELO
    }

    /// Record the HELO greeting; only one is accepted per session
    pub fn set_client_domain(&mut self, domain: String) -> Result<(), SmtpError> {
        if self.client_domain.is_some() {
            return Err(SmtpError::InvalidState("Duplicate HELO".to_string()));
        }

        if domain.len() > SmtpLimits::DOMAIN_MAX_LENGTH {
            return Err(SmtpError::DomainTooLong {
                max: SmtpLimits::DOMAIN_MAX_LENGTH,
            });
        }

        self.reset(); // Clear any existing transaction
        self.client_domain = Some(domain);
        Ok(())
    }

    /// Fail unless HELO has been seen
    pub fn require_greeting(&self) -> Result<(), SmtpError> {
        if self.client_domain.is_none() {
            return Err(SmtpError::InvalidState("send HELO first".to_string()));
        }
        Ok(())
    }

    /// Fail if a MAIL transaction is already open
    pub fn require_no_sender(&self) -> Result<(), SmtpError> {
        if self.from.is_some() {
            return Err(SmtpError::InvalidState("nested MAIL command".to_string()));
        }
        Ok(())
    }

    /// Fail unless MAIL has been accepted
    pub fn require_sender(&self) -> Result<(), SmtpError> {
        self.require_greeting()?;
        if self.from.is_none() {
            return Err(SmtpError::InvalidState("need MAIL command".to_string()));
        }
        Ok(())
    }

    /// Fail unless at least one RCPT has been accepted
    pub fn require_recipients(&self) -> Result<(), SmtpError> {
        self.require_greeting()?;
        if self.to.is_empty() {
            return Err(SmtpError::InvalidState("need RCPT command".to_string()));
        }
        Ok(())
    }

    /// Set the sender address
    pub fn set_sender(&mut self, sender: String) -> Result<(), SmtpError> {
        self.require_greeting()?;
        self.require_no_sender()?;

        if sender.len() > SmtpLimits::PATH_MAX_LENGTH {
            return Err(SmtpError::PathTooLong {
                max: SmtpLimits::PATH_MAX_LENGTH,
            });
        }

        self.from = Some(sender);
        self.to.clear();
        Ok(())
    }

    /// Add a recipient address
    pub fn add_recipient(&mut self, recipient: String) -> Result<(), SmtpError> {
        self.require_sender()?;

        if recipient.len() > SmtpLimits::PATH_MAX_LENGTH {
            return Err(SmtpError::PathTooLong {
                max: SmtpLimits::PATH_MAX_LENGTH,
            });
        }

        if self.to.len() >= SmtpLimits::MAX_RECIPIENTS {
            return Err(SmtpError::TooManyRecipients {
                max: SmtpLimits::MAX_RECIPIENTS,
            });
        }

        self.to.push(recipient);
        Ok(())
    }

    /// Start data collection mode
    pub fn start_data_mode(&mut self) -> Result<(), SmtpError> {
        self.require_recipients()?;
        self.state = SmtpState::Data;
        Ok(())
    }

    /// Finish data collection and create an email.
    ///
    /// `body` is the already unstuffed mail data. The transaction is reset
    /// whether or not the email is later accepted.
    pub fn finish_data_collection(
        &mut self,
        peer: SocketAddr,
        body: String,
    ) -> Result<Email, SmtpError> {
        if self.state != SmtpState::Data {
            return Err(SmtpError::InvalidState(
                "Not in data collection mode".to_string(),
            ));
        }

        let from = self
            .from
            .take()
            .ok_or_else(|| SmtpError::InvalidState("No sender specified".to_string()))?;
        let to = std::mem::take(&mut self.to);
        self.reset();

        Ok(Email::new(peer, from, to, body))
    }
}

impl Default for SmtpSession {
    fn default() -> Self {
        Self::new()
    }
}
