//! Error types for the SMTP server

use thiserror::Error;

use crate::framer::FramerError;

#[derive(Error, Debug)]
pub enum SmtpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Framing error: {0}")]
    Framer(#[from] FramerError),

    #[error("Command {0:?} not recognized")]
    InvalidCommand(String),

    #[error("Empty command line")]
    BadSyntax,

    #[error("Invalid state for command")]
    InvalidState(String),

    #[error("Invalid syntax")]
    InvalidSyntax(String),

    #[error("{0} parameters not supported")]
    UnsupportedParameters(&'static str),

    #[error("Cannot verify {0}")]
    CannotVerify(String),

    #[error("Path too long (max {max} characters)")]
    PathTooLong { max: usize },

    #[error("Too many recipients (max {max})")]
    TooManyRecipients { max: usize },

    #[error("Domain name too long (max {max} characters)")]
    DomainTooLong { max: usize },

    #[error("Connection closed unexpectedly")]
    ConnectionClosed,

    #[error("Unexpected reply: {0}")]
    UnexpectedReply(String),
}

/// SMTP size limits as defined in RFC 5321 section 4.5.3
pub struct SmtpLimits;

impl SmtpLimits {
    /// Maximum length of a domain name given to HELO
    pub const DOMAIN_MAX_LENGTH: usize = 64;

    /// Maximum length of a path (reverse-path or forward-path)
    pub const PATH_MAX_LENGTH: usize = 256;

    /// Maximum length of a reply line including CRLF
    pub const REPLY_LINE_MAX_LENGTH: usize = 512;

    /// Maximum number of recipients per message
    pub const MAX_RECIPIENTS: usize = 100;
}

/// Maps SMTP errors to appropriate response codes
impl SmtpError {
    pub fn to_response_code(&self) -> &'static str {
        match self {
            SmtpError::Io(_) => "421",
            SmtpError::Framer(FramerError::UnitTooLong { .. }) => "500",
            SmtpError::Framer(_) => "421",
            SmtpError::InvalidCommand(_) => "500",
            SmtpError::BadSyntax => "500",
            SmtpError::InvalidState(_) => "503",
            SmtpError::InvalidSyntax(_) => "501",
            SmtpError::UnsupportedParameters(_) => "555",
            SmtpError::CannotVerify(_) => "502",
            SmtpError::PathTooLong { .. } => "501",
            SmtpError::TooManyRecipients { .. } => "552",
            SmtpError::DomainTooLong { .. } => "501",
            SmtpError::ConnectionClosed => "421",
            SmtpError::UnexpectedReply(_) => "421",
        }
    }

    pub fn to_response_message(&self) -> String {
        match self {
            SmtpError::Io(_) => "Service not available".to_string(),
            SmtpError::Framer(FramerError::UnitTooLong { max }) => {
                format!("Line too long (max {max} bytes)")
            }
            SmtpError::Framer(_) => "Service not available".to_string(),
            SmtpError::InvalidCommand(cmd) => format!("Error: command \"{cmd}\" not recognized"),
            SmtpError::BadSyntax => "Error: bad syntax".to_string(),
            SmtpError::InvalidState(msg) => format!("Bad sequence of commands: {msg}"),
            SmtpError::InvalidSyntax(msg) => format!("Syntax: {msg}"),
            SmtpError::UnsupportedParameters(cmd) => {
                format!("{cmd} parameters not recognized or not implemented")
            }
            SmtpError::CannotVerify(arg) => format!("Could not VRFY {arg}"),
            SmtpError::PathTooLong { max } => format!("Path too long (max {max} characters)"),
            SmtpError::TooManyRecipients { max } => format!("Too many recipients (max {max})"),
            SmtpError::DomainTooLong { max } => {
                format!("Domain name too long (max {max} characters)")
            }
            SmtpError::ConnectionClosed => "Connection closed".to_string(),
            SmtpError::UnexpectedReply(reply) => format!("Unexpected reply: {reply}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_errors_are_503() {
        let e = SmtpError::InvalidState("send HELO first".to_string());
        assert_eq!(e.to_response_code(), "503");
        assert_eq!(
            e.to_response_message(),
            "Bad sequence of commands: send HELO first"
        );
    }

    #[test]
    fn test_parameter_errors_are_555() {
        let e = SmtpError::UnsupportedParameters("MAIL FROM");
        assert_eq!(e.to_response_code(), "555");
        assert_eq!(
            e.to_response_message(),
            "MAIL FROM parameters not recognized or not implemented"
        );
    }

    #[test]
    fn test_unknown_command_is_500() {
        let e = SmtpError::InvalidCommand("EHLO".to_string());
        assert_eq!(e.to_response_code(), "500");
        assert_eq!(e.to_response_message(), "Error: command \"EHLO\" not recognized");
    }
}
