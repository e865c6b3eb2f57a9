//! Minimal POP3 client for reading a maildrop

use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};

use tracing::debug;

use crate::framer::Framer;
use crate::pop3::error::Pop3Error;
use crate::pop3::response::Pop3Response;
use crate::transparency::{CRLF, END_OF_DATA, unstuff, unstuff_line};

/// A connection to a POP3 server that has sent its `+OK` greeting
#[derive(Debug)]
pub struct Pop3Client {
    framer: Framer<TcpStream>,
    writer: TcpStream,
    greeting: String,
}

impl Pop3Client {
    /// Connect and wait for the greeting
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self, Pop3Error> {
        let writer = TcpStream::connect(addr)?;
        let framer = Framer::new(writer.try_clone()?);
        let mut client = Self {
            framer,
            writer,
            greeting: String::new(),
        };
        client.greeting = client.read_ok()?;
        Ok(client)
    }

    /// Text of the server's greeting, without `+OK`
    pub fn greeting(&self) -> &str {
        &self.greeting
    }

    /// Send one command line and read the status reply
    pub fn command(&mut self, line: &str) -> Result<Pop3Response, Pop3Error> {
        if line.get(..4).is_some_and(|kw| kw.eq_ignore_ascii_case("PASS")) {
            debug!("Sending PASS");
        } else {
            debug!(command = line, "Sending command");
        }
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(CRLF.as_bytes())?;
        self.writer.flush()?;
        self.read_status()
    }

    /// USER followed by PASS
    pub fn authenticate(&mut self, user: &str, password: &str) -> Result<(), Pop3Error> {
        let reply = self.command(&format!("USER {user}"))?;
        expect_ok(reply)?;
        let reply = self.command(&format!("PASS {password}"))?;
        expect_ok(reply)?;
        Ok(())
    }

    /// Message count and total size of the maildrop
    pub fn stat(&mut self) -> Result<(usize, usize), Pop3Error> {
        let reply = self.command("STAT")?;
        let text = expect_ok(reply)?;
        parse_scan(&text).ok_or(Pop3Error::UnexpectedReply(text))
    }

    /// Scan listing of every message not marked as deleted
    pub fn list(&mut self) -> Result<Vec<(usize, usize)>, Pop3Error> {
        let reply = self.command("LIST")?;
        expect_ok(reply)?;

        let mut listing = Vec::new();
        loop {
            let line = self.read_line()?;
            if line == "." {
                return Ok(listing);
            }
            let entry = parse_scan(unstuff_line(&line))
                .ok_or_else(|| Pop3Error::UnexpectedReply(line.clone()))?;
            listing.push(entry);
        }
    }

    /// Size of message `number`
    pub fn list_one(&mut self, number: usize) -> Result<usize, Pop3Error> {
        let reply = self.command(&format!("LIST {number}"))?;
        let text = expect_ok(reply)?;
        match parse_scan(&text) {
            Some((_, octets)) => Ok(octets),
            None => Err(Pop3Error::UnexpectedReply(text)),
        }
    }

    /// Fetch message `number` with `\n` line endings and the dot-stuffing undone
    pub fn retr(&mut self, number: usize) -> Result<String, Pop3Error> {
        let reply = self.command(&format!("RETR {number}"))?;
        expect_ok(reply)?;

        let data = self
            .framer
            .read_until(END_OF_DATA.as_bytes())?
            .ok_or(Pop3Error::ConnectionClosed)?;
        Ok(unstuff(&String::from_utf8_lossy(&data)))
    }

    pub fn dele(&mut self, number: usize) -> Result<(), Pop3Error> {
        let reply = self.command(&format!("DELE {number}"))?;
        expect_ok(reply)?;
        Ok(())
    }

    /// Unmark all deletions of this session
    pub fn rset(&mut self) -> Result<(), Pop3Error> {
        let reply = self.command("RSET")?;
        expect_ok(reply)?;
        Ok(())
    }

    pub fn noop(&mut self) -> Result<(), Pop3Error> {
        let reply = self.command("NOOP")?;
        expect_ok(reply)?;
        Ok(())
    }

    /// End the session, committing any deletions
    pub fn quit(mut self) -> Result<(), Pop3Error> {
        let reply = self.command("QUIT")?;
        expect_ok(reply)?;
        Ok(())
    }

    fn read_line(&mut self) -> Result<String, Pop3Error> {
        let line = self
            .framer
            .read_until(CRLF.as_bytes())?
            .ok_or(Pop3Error::ConnectionClosed)?;
        Ok(String::from_utf8_lossy(&line).into_owned())
    }

    fn read_status(&mut self) -> Result<Pop3Response, Pop3Error> {
        let line = self.read_line()?;
        debug!(reply = %line, "Received reply");
        Pop3Response::parse(&line).ok_or(Pop3Error::UnexpectedReply(line))
    }

    fn read_ok(&mut self) -> Result<String, Pop3Error> {
        let reply = self.read_status()?;
        expect_ok(reply)
    }
}

/// Text of a `+OK` reply, or the refusal as an error
fn expect_ok(reply: Pop3Response) -> Result<String, Pop3Error> {
    match reply {
        Pop3Response::Ok(text) => Ok(text.into_owned()),
        Pop3Response::Err(text) => Err(Pop3Error::Refused(text.into_owned())),
        other => Err(Pop3Error::UnexpectedReply(format!("{other:?}"))),
    }
}

/// `<number> <octets>`, ignoring anything after the two fields
fn parse_scan(text: &str) -> Option<(usize, usize)> {
    let mut fields = text.split_whitespace();
    let first = fields.next()?.parse().ok()?;
    let second = fields.next()?.parse().ok()?;
    Some((first, second))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pop3::server::Pop3Server;
    use crate::store::MailStore;
    use std::net::TcpListener;
    use std::thread;
    use tempfile::TempDir;

    fn start(messages: &[&str]) -> (TempDir, MailStore, std::net::SocketAddr) {
        let dir = TempDir::new().unwrap();
        let store = MailStore::new(dir.path().join("users"), dir.path().join("users.d"));
        store.add_user("bob", "right").unwrap();
        for message in messages {
            store.append_message("bob", message).unwrap();
        }

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Pop3Server::new(store.clone());
        thread::spawn(move || server.start_with_listener(listener).unwrap());
        (dir, store, addr)
    }

    #[test]
    fn test_retr_undoes_dot_stuffing() {
        let (_dir, store, addr) = start(&["From: a\nTo: bob\nSubject: s\nHi\n.\n..two\nbye"]);
        let stored = store.list_messages("bob").unwrap().remove(0);

        let mut client = Pop3Client::connect(addr).unwrap();
        assert_eq!(client.greeting(), "POP3 server ready");
        client.authenticate("bob", "right").unwrap();

        assert_eq!(client.stat().unwrap(), (1, stored.len()));
        assert_eq!(client.list().unwrap(), vec![(1, stored.len())]);
        assert_eq!(client.list_one(1).unwrap(), stored.len());

        let message = client.retr(1).unwrap();
        assert_eq!(message, stored);
        assert!(message.ends_with("\nHi\n.\n..two\nbye"));
        client.quit().unwrap();
    }

    #[test]
    fn test_empty_listing() {
        let (_dir, _store, addr) = start(&[]);

        let mut client = Pop3Client::connect(addr).unwrap();
        client.authenticate("bob", "right").unwrap();
        assert_eq!(client.stat().unwrap(), (0, 0));
        assert!(client.list().unwrap().is_empty());
        client.noop().unwrap();
        client.quit().unwrap();
    }

    #[test]
    fn test_dele_rset_and_commit() {
        let (_dir, store, addr) = start(&[
            "From: a\nTo: bob\nSubject: one\n1",
            "From: a\nTo: bob\nSubject: two\n2",
        ]);

        let mut client = Pop3Client::connect(addr).unwrap();
        client.authenticate("bob", "right").unwrap();
        client.dele(1).unwrap();
        assert_eq!(client.stat().unwrap().0, 1);
        client.rset().unwrap();
        assert_eq!(client.stat().unwrap().0, 2);

        client.dele(2).unwrap();
        assert!(matches!(client.dele(2), Err(Pop3Error::Refused(ref r)) if r == "Message 2 already deleted"));
        client.quit().unwrap();

        let remaining = store.list_messages("bob").unwrap();
        assert_eq!(remaining.len(), 1);
        assert!(remaining[0].contains("Subject: one"));
    }

    #[test]
    fn test_refusals() {
        let (_dir, _store, addr) = start(&[]);

        let mut client = Pop3Client::connect(addr).unwrap();
        assert!(matches!(
            client.authenticate("nobody", "x"),
            Err(Pop3Error::Refused(ref r)) if r == "No mailbox for given user"
        ));
        assert!(matches!(
            client.authenticate("bob", "wrong"),
            Err(Pop3Error::Refused(ref r)) if r == "Invalid password"
        ));
        assert!(matches!(client.retr(1), Err(Pop3Error::Refused(_))));
    }

    #[test]
    fn test_parse_scan() {
        assert_eq!(parse_scan("2 95"), Some((2, 95)));
        assert_eq!(parse_scan("1 40 extra"), Some((1, 40)));
        assert_eq!(parse_scan("messages"), None);
    }
}
