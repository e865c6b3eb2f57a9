//! Minimal SMTP client for submitting messages to a server

use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};

use tracing::debug;

use crate::framer::Framer;
use crate::smtp::error::SmtpError;
use crate::smtp::response::SmtpResponse;
use crate::transparency::{CRLF, stuff};

/// A connection to an SMTP server that has sent its `220` greeting
#[derive(Debug)]
pub struct SmtpClient {
    framer: Framer<TcpStream>,
    writer: TcpStream,
    greeting: SmtpResponse,
}

impl SmtpClient {
    /// Connect and wait for the greeting
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self, SmtpError> {
        let writer = TcpStream::connect(addr)?;
        let framer = Framer::new(writer.try_clone()?);
        let mut client = Self {
            framer,
            writer,
            greeting: SmtpResponse::new("000", ""),
        };
        client.greeting = client.expect_reply("220")?;
        Ok(client)
    }

    /// The server's greeting line
    pub fn greeting(&self) -> &SmtpResponse {
        &self.greeting
    }

    /// Send one command line and read the reply
    pub fn command(&mut self, line: &str) -> Result<SmtpResponse, SmtpError> {
        debug!(command = line, "Sending command");
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(CRLF.as_bytes())?;
        self.writer.flush()?;
        self.read_reply()
    }

    pub fn helo(&mut self, domain: &str) -> Result<SmtpResponse, SmtpError> {
        let reply = self.command(&format!("HELO {domain}"))?;
        expect(reply, "250")
    }

    /// Send a message with `From`, `To` and `Subject` headers put in front of
    /// `message`
    pub fn send_mail(
        &mut self,
        from: &str,
        to: &[&str],
        subject: &str,
        message: &str,
    ) -> Result<(), SmtpError> {
        let reply = self.command(&format!("MAIL FROM: <{from}>"))?;
        expect(reply, "250")?;
        for rcpt in to {
            let reply = self.command(&format!("RCPT TO: <{rcpt}>"))?;
            expect(reply, "250")?;
        }

        let data = format!(
            "From: {from}\nTo: {}\nSubject: {subject}\n{message}",
            to.join(", ")
        );
        self.data(&data)
    }

    /// Send `DATA` followed by `body`, which uses `\n` line endings
    pub fn data(&mut self, body: &str) -> Result<(), SmtpError> {
        let reply = self.command("DATA")?;
        expect(reply, "354")?;

        self.writer.write_all(stuff(body).as_bytes())?;
        self.writer.flush()?;
        self.expect_reply("250")?;
        Ok(())
    }

    pub fn quit(mut self) -> Result<(), SmtpError> {
        let reply = self.command("QUIT")?;
        expect(reply, "221")?;
        Ok(())
    }

    fn read_reply(&mut self) -> Result<SmtpResponse, SmtpError> {
        let line = self
            .framer
            .read_until(CRLF.as_bytes())?
            .ok_or(SmtpError::ConnectionClosed)?;
        let line = String::from_utf8_lossy(&line);
        debug!(reply = %line, "Received reply");
        SmtpResponse::parse(&line).ok_or_else(|| SmtpError::UnexpectedReply(line.into_owned()))
    }

    fn expect_reply(&mut self, code: &str) -> Result<SmtpResponse, SmtpError> {
        let reply = self.read_reply()?;
        expect(reply, code)
    }
}

fn expect(reply: SmtpResponse, code: &str) -> Result<SmtpResponse, SmtpError> {
    if reply.code == code {
        Ok(reply)
    } else {
        Err(SmtpError::UnexpectedReply(reply.format().trim_end().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smtp::server::SmtpServer;
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_client_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::channel();
        let server = SmtpServer::new("test.local", tx);
        thread::spawn(move || server.start_with_listener(listener).unwrap());

        let mut client = SmtpClient::connect(addr).unwrap();
        assert_eq!(client.greeting().message, "test.local Service Ready");
        client.helo("client.local").unwrap();
        client
            .send_mail("alice", &["bob", "carol"], "hello", "line one\n.\n..two")
            .unwrap();
        client.quit().unwrap();

        let email = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(email.from, "alice");
        assert_eq!(email.to, vec!["bob", "carol"]);
        assert_eq!(
            email.data,
            "From: alice\nTo: bob, carol\nSubject: hello\nline one\n.\n..two"
        );
    }

    #[test]
    fn test_unexpected_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, _rx) = mpsc::channel();
        let server = SmtpServer::new("test.local", tx);
        thread::spawn(move || server.start_with_listener(listener).unwrap());

        let mut client = SmtpClient::connect(addr).unwrap();
        let result = client.send_mail("alice", &["bob"], "s", "m");
        assert!(matches!(result, Err(SmtpError::UnexpectedReply(ref r)) if r.starts_with("503")));
    }
}
