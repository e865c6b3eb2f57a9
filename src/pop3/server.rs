//! POP3 server implementation

use crate::framer::{Framer, FramerError};
use crate::listener::Listener;
use crate::pop3::error::Pop3Error;
use crate::pop3::response::Pop3Response;
use crate::pop3::session::Pop3Session;
use crate::store::MailStore;
use crate::transparency::CRLF;

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};

use tracing::{debug, error, info, info_span};

/// POP3 server giving access to the mailboxes of a [`MailStore`]
#[derive(Debug, Clone)]
pub struct Pop3Server {
    store: MailStore,
    max_line_bytes: Option<usize>,
}

impl Pop3Server {
    pub fn new(store: MailStore) -> Self {
        Self {
            store,
            max_line_bytes: None,
        }
    }

    /// Drop connections whose command lines outgrow `max` bytes
    pub fn with_line_limit(mut self, max: usize) -> Self {
        self.max_line_bytes = Some(max);
        self
    }

    pub fn store(&self) -> &MailStore {
        &self.store
    }

    /// Start the server on the specified address (blocking)
    pub fn start(&self, addr: impl ToSocketAddrs) -> Result<(), Pop3Error> {
        self.serve(Listener::bind(addr)?)
    }

    /// Start the server with an existing listener (blocking)
    pub fn start_with_listener(&self, listener: TcpListener) -> Result<(), Pop3Error> {
        self.serve(Listener::from_std(listener)?)
    }

    /// Run the accept loop until the listener is shut down
    pub fn serve(&self, listener: Listener) -> Result<(), Pop3Error> {
        let server = self.clone();
        listener.run("pop3", move |stream, peer| server.handle_client(stream, peer))?;
        Ok(())
    }

    /// Handle a client connection
    pub fn handle_client(&self, stream: TcpStream, peer: SocketAddr) {
        let span = info_span!("pop3", %peer);
        let _enter = span.enter();

        let reader = match stream.try_clone() {
            Ok(reader) => reader,
            Err(e) => {
                error!(error = %e, "Cannot clone client stream");
                return;
            }
        };

        match self.run_session(reader, stream) {
            Ok(()) => info!("Connection closed"),
            Err(e) => error!(error = %e, "Error handling client"),
        }
    }

    /// Drive one session over any byte transport.
    ///
    /// Any maildrop lock taken by the session is released on return.
    pub fn run_session<R: Read, W: Write>(&self, reader: R, mut writer: W) -> Result<(), Pop3Error> {
        let mut framer = match self.max_line_bytes {
            Some(max) => Framer::with_limit(reader, max),
            None => Framer::new(reader),
        };
        let mut session = Pop3Session::new(self.store.clone());

        send_response(&mut writer, &Pop3Response::ok("POP3 server ready"))?;

        while !session.is_finished() {
            let line = match framer.read_until(CRLF.as_bytes()) {
                Ok(Some(line)) => line,
                Ok(None) => {
                    debug!("Client closed connection");
                    break;
                }
                Err(e) => {
                    if let FramerError::UnitTooLong { max } = &e {
                        // Best effort, the session ends either way
                        let reply = Pop3Response::err(format!("Line too long (max {max} bytes)"));
                        let _ = send_response(&mut writer, &reply);
                    }
                    return Err(e.into());
                }
            };
            let line = String::from_utf8_lossy(&line);
            debug!(command = %redact(&line), "Received command");

            let response = match session.process(&line) {
                Ok(response) => response,
                Err(e) => {
                    // Best effort, the session ends either way
                    let _ = send_response(&mut writer, &Pop3Response::err("Internal server error"));
                    return Err(e);
                }
            };
            send_response(&mut writer, &response)?;
        }

        Ok(())
    }
}

/// Keep passwords out of the logs
fn redact(line: &str) -> &str {
    match line.get(..4) {
        Some(keyword) if keyword.eq_ignore_ascii_case("PASS") => "PASS ****",
        _ => line,
    }
}

fn send_response<W: Write>(writer: &mut W, response: &Pop3Response) -> Result<(), Pop3Error> {
    writer.write_all(&response.serialize())?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Cursor};
    use std::thread;
    use tempfile::TempDir;

    fn setup() -> (TempDir, MailStore) {
        let dir = TempDir::new().unwrap();
        let store = MailStore::new(dir.path().join("users"), dir.path().join("users.d"));
        store.add_user("bob", "right").unwrap();
        store
            .append_message("bob", "From: a\nTo: bob\nSubject: s\nhello\n.\nbye")
            .unwrap();
        (dir, store)
    }

    fn run(server: &Pop3Server, input: &str) -> String {
        let mut output = Vec::new();
        server
            .run_session(Cursor::new(input.as_bytes().to_vec()), &mut output)
            .unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_greeting_and_sign_off() {
        let (_dir, store) = setup();
        let server = Pop3Server::new(store);

        let output = run(&server, "QUIT\r\nNOOP\r\n");
        assert_eq!(output, "+OK POP3 server ready\r\n+OK POP3 server signing off\r\n");
    }

    #[test]
    fn test_retr_is_dot_stuffed() {
        let (_dir, store) = setup();
        let server = Pop3Server::new(store.clone());
        let message = store.list_messages("bob").unwrap().remove(0);

        let output = run(&server, "USER bob\r\nPASS right\r\nRETR 1\r\nQUIT\r\n");
        let expected = format!(
            "+OK {} octets\r\n{}",
            message.len(),
            message.replace('\n', "\r\n").replace("\r\n.\r\n", "\r\n..\r\n")
        );
        assert!(output.contains(&expected), "{output}");
        assert!(output.contains("\r\nbye\r\n.\r\n+OK POP3 server signing off\r\n"));
    }

    #[test]
    fn test_lock_released_on_disconnect() {
        let (_dir, store) = setup();
        let server = Pop3Server::new(store.clone());

        // No QUIT: the peer just goes away
        let output = run(&server, "USER bob\r\nPASS right\r\nDELE 1\r\n");
        assert!(output.ends_with("+OK Message 1 deleted\r\n"));

        assert!(store.try_lock("bob").unwrap().is_some());
        assert_eq!(store.list_messages("bob").unwrap().len(), 1);
    }

    #[test]
    fn test_store_failure_ends_session() {
        let dir = TempDir::new().unwrap();
        let store = MailStore::new(dir.path().join("missing"), dir.path().join("users.d"));
        let server = Pop3Server::new(store);

        let mut output = Vec::new();
        let result = server.run_session(Cursor::new(b"USER bob\r\nNOOP\r\n".to_vec()), &mut output);

        assert!(matches!(result, Err(Pop3Error::Store(_))));
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "+OK POP3 server ready\r\n-ERR Internal server error\r\n"
        );
    }

    #[test]
    fn test_overlong_line_gets_final_err() {
        let (_dir, store) = setup();
        let server = Pop3Server::new(store).with_line_limit(16);

        let mut output = Vec::new();
        let input = format!("USER {}\r\nNOOP\r\n", "b".repeat(40));
        let result = server.run_session(Cursor::new(input.into_bytes()), &mut output);

        assert!(matches!(
            result,
            Err(Pop3Error::Framer(FramerError::UnitTooLong { max: 16 }))
        ));
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "+OK POP3 server ready\r\n-ERR Line too long (max 16 bytes)\r\n"
        );
    }

    #[test]
    fn test_redact() {
        assert_eq!(redact("pass hunter2"), "PASS ****");
        assert_eq!(redact("USER bob"), "USER bob");
        assert_eq!(redact("NO"), "NO");
    }

    #[test]
    fn test_over_tcp() {
        let (_dir, store) = setup();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Pop3Server::new(store);
        thread::spawn(move || server.start_with_listener(listener).unwrap());

        let mut stream = TcpStream::connect(addr).unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        assert_eq!(line, "+OK POP3 server ready\r\n");

        stream.write_all(b"USER nobody\r\n").unwrap();
        line.clear();
        reader.read_line(&mut line).unwrap();
        assert_eq!(line, "-ERR No mailbox for given user\r\n");
    }
}
