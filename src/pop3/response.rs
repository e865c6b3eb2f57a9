//! POP3 replies and their wire encoding

use std::borrow::Cow;

use crate::transparency::stuff;

/// A reply sent to a POP3 client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pop3Response {
    /// `+OK` single line
    Ok(Cow<'static, str>),
    /// `-ERR` single line
    Err(Cow<'static, str>),
    /// Multi-line scan listing of `(message number, octets)` pairs
    List(Vec<(usize, usize)>),
    /// Multi-line message body, `\n` line endings
    Message(String),
}

impl Pop3Response {
    pub fn ok(message: impl Into<Cow<'static, str>>) -> Self {
        Pop3Response::Ok(message.into())
    }

    pub fn err(message: impl Into<Cow<'static, str>>) -> Self {
        Pop3Response::Err(message.into())
    }

    /// Parse a `+OK`/`-ERR` status line as received by a client
    pub fn parse(line: &str) -> Option<Self> {
        let (status, message) = line.split_once(' ').unwrap_or((line, ""));
        let message = Cow::Owned(message.to_owned());
        match status {
            "+OK" => Some(Pop3Response::Ok(message)),
            "-ERR" => Some(Pop3Response::Err(message)),
            _ => None,
        }
    }

    pub fn is_ok(&self) -> bool {
        !matches!(self, Pop3Response::Err(_))
    }

    pub fn serialize(&self) -> Vec<u8> {
        match self {
            Pop3Response::Ok(message) => status_line(b"+OK", message),
            Pop3Response::Err(message) => status_line(b"-ERR", message),
            Pop3Response::List(entries) => {
                let mut buf = Vec::with_capacity(entries.len() * 8 + 16);
                buf.extend_from_slice(format!("+OK {} messages\r\n", entries.len()).as_bytes());
                for (number, octets) in entries {
                    buf.extend_from_slice(format!("{number} {octets}\r\n").as_bytes());
                }
                buf.extend_from_slice(b".\r\n");
                buf
            }
            Pop3Response::Message(body) => {
                let mut buf = Vec::with_capacity(body.len() + 32);
                buf.extend_from_slice(format!("+OK {} octets\r\n", body.len()).as_bytes());
                buf.extend_from_slice(stuff(body).as_bytes());
                buf
            }
        }
    }
}

fn status_line(status: &[u8], message: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(message.len() + 7);
    buf.extend_from_slice(status);
    if !message.is_empty() {
        buf.push(b' ');
        buf.extend_from_slice(message.as_bytes());
    }
    buf.extend_from_slice(b"\r\n");
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_lines() {
        assert_eq!(
            Pop3Response::ok("Maildrop locked and ready").serialize(),
            b"+OK Maildrop locked and ready\r\n"
        );
        assert_eq!(
            Pop3Response::err(format!("Message {} already deleted", 2)).serialize(),
            b"-ERR Message 2 already deleted\r\n"
        );
        assert_eq!(Pop3Response::ok("").serialize(), b"+OK\r\n");
    }

    #[test]
    fn test_listing() {
        let response = Pop3Response::List(vec![(1, 40), (3, 55)]);
        assert_eq!(
            response.serialize(),
            b"+OK 2 messages\r\n1 40\r\n3 55\r\n.\r\n"
        );
        assert_eq!(
            Pop3Response::List(Vec::new()).serialize(),
            b"+OK 0 messages\r\n.\r\n"
        );
    }

    #[test]
    fn test_message_is_stuffed() {
        let response = Pop3Response::Message("Subject: x\n.\nend".to_string());
        assert_eq!(
            String::from_utf8(response.serialize()).unwrap(),
            "+OK 16 octets\r\nSubject: x\r\n..\r\nend\r\n.\r\n"
        );
    }

    #[test]
    fn test_parse_status_line() {
        assert_eq!(Pop3Response::parse("+OK 2 95"), Some(Pop3Response::ok("2 95")));
        assert_eq!(Pop3Response::parse("+OK"), Some(Pop3Response::ok("")));
        assert_eq!(
            Pop3Response::parse("-ERR Invalid password"),
            Some(Pop3Response::err("Invalid password"))
        );
        assert_eq!(Pop3Response::parse("220 smtp"), None);
        assert_eq!(Pop3Response::parse("+OKAY"), None);
    }

    #[test]
    fn test_is_ok() {
        assert!(Pop3Response::ok("x").is_ok());
        assert!(Pop3Response::List(Vec::new()).is_ok());
        assert!(!Pop3Response::err("x").is_ok());
    }
}
