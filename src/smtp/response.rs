//! SMTP response handling

use crate::smtp::error::SmtpError;

/// Represents an SMTP response that can be sent to a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpResponse {
    /// The SMTP response code (e.g., "250", "354", "500")
    pub code: String,
    /// The human-readable message
    pub message: String,
}

impl SmtpResponse {
    /// Create a new SMTP response
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
        }
    }

    /// Create a success response (250 OK)
    pub fn ok() -> Self {
        Self::new("250", "OK")
    }

    /// Create a greeting response (220)
    pub fn greeting(hostname: &str) -> Self {
        Self::new("220", &format!("{hostname} Service Ready"))
    }

    /// Create a HELO response (250)
    pub fn helo(hostname: &str, client_domain: &str) -> Self {
        Self::new("250", &format!("{hostname} Hello {client_domain}"))
    }

    /// Create a MAIL response (250)
    pub fn sender_ok(sender: &str) -> Self {
        Self::new("250", &format!("{sender} Sender OK"))
    }

    /// Create a RCPT response (250)
    pub fn recipient_ok() -> Self {
        Self::new("250", "Recipient OK")
    }

    /// Create a DATA intermediate response (354)
    pub fn data_start() -> Self {
        Self::new("354", "End data with <CR><LF>.<CR><LF>")
    }

    /// Create a VRFY response for an address we will not check (252)
    pub fn cannot_verify() -> Self {
        Self::new(
            "252",
            "Cannot VRFY user, but will accept message and attempt delivery",
        )
    }

    /// Create a QUIT response (221)
    pub fn quit(hostname: &str) -> Self {
        Self::new("221", &format!("{hostname} Closing connection"))
    }

    /// Create an error response from a code and text
    pub fn error(code: &str, message: &str) -> Self {
        Self::new(code, message)
    }

    /// Create the reply describing `error`
    pub fn from_error(error: &SmtpError) -> Self {
        Self::new(error.to_response_code(), &error.to_response_message())
    }

    /// Parse a single reply line, CRLF already removed
    pub fn parse(line: &str) -> Option<Self> {
        let code = line.get(..3)?;
        if !code.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let message = line[3..].strip_prefix([' ', '-']).unwrap_or(&line[3..]);
        Some(Self::new(code, message))
    }

    /// Format the response for sending over the wire
    pub fn format(&self) -> String {
        format!("{} {}\r\n", self.code, self.message)
    }

    /// Check if this is a success response (2xx)
    pub fn is_success(&self) -> bool {
        self.code.starts_with('2')
    }

    /// Check if this is an error response (4xx or 5xx)
    pub fn is_error(&self) -> bool {
        self.code.starts_with('4') || self.code.starts_with('5')
    }
}
