//! SMTP server implementation

use crate::framer::{Framer, FramerError};
use crate::listener::Listener;
use crate::smtp::commands::SmtpCommandHandler;
use crate::smtp::delivery::MailSink;
use crate::smtp::error::{SmtpError, SmtpLimits};
use crate::smtp::response::SmtpResponse;
use crate::smtp::session::{SmtpSession, SmtpState};
use crate::transparency::unstuff;

use std::fmt;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;

use tracing::{debug, error, info, info_span, warn};

/// SMTP server handing every accepted message to a [`MailSink`]
#[derive(Clone)]
pub struct SmtpServer {
    /// Server hostname
    hostname: String,
    sink: Arc<dyn MailSink>,
    max_line_bytes: Option<usize>,
}

impl fmt::Debug for SmtpServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpServer")
            .field("hostname", &self.hostname)
            .field("max_line_bytes", &self.max_line_bytes)
            .finish_non_exhaustive()
    }
}

impl SmtpServer {
    /// Create a new SMTP server
    pub fn new(hostname: &str, sink: impl MailSink + 'static) -> Self {
        Self {
            hostname: hostname.to_owned(),
            sink: Arc::new(sink),
            max_line_bytes: None,
        }
    }

    /// Drop connections whose command or mail data outgrows `max` bytes
    pub fn with_line_limit(mut self, max: usize) -> Self {
        self.max_line_bytes = Some(max);
        self
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Start the server on the specified address (blocking)
    pub fn start(&self, addr: impl ToSocketAddrs) -> Result<(), SmtpError> {
        self.serve(Listener::bind(addr)?)
    }

    /// Start the server with an existing listener (blocking)
    pub fn start_with_listener(&self, listener: TcpListener) -> Result<(), SmtpError> {
        self.serve(Listener::from_std(listener)?)
    }

    /// Run the accept loop until the listener is shut down
    pub fn serve(&self, listener: Listener) -> Result<(), SmtpError> {
        let server = self.clone();
        listener.run("smtp", move |stream, peer| server.handle_client(stream, peer))?;
        Ok(())
    }

    /// Handle a client connection
    pub fn handle_client(&self, stream: TcpStream, peer: SocketAddr) {
        let span = info_span!("smtp", %peer);
        let _enter = span.enter();

        let reader = match stream.try_clone() {
            Ok(reader) => reader,
            Err(e) => {
                error!(error = %e, "Cannot clone client stream");
                return;
            }
        };

        match self.run_session(reader, stream, peer) {
            Ok(()) => info!("Connection closed"),
            Err(e) => error!(error = %e, "Error handling client"),
        }
    }

    /// Drive one session over any byte transport
    pub fn run_session<R: Read, W: Write>(
        &self,
        reader: R,
        mut writer: W,
        peer: SocketAddr,
    ) -> Result<(), SmtpError> {
        let mut framer = match self.max_line_bytes {
            Some(max) => Framer::with_limit(reader, max),
            None => Framer::new(reader),
        };
        let command_handler = SmtpCommandHandler::new(&self.hostname);
        let mut session = SmtpSession::new();

        self.send_response(&mut writer, &SmtpResponse::greeting(&self.hostname))?;

        loop {
            let unit = match framer.read_until(session.terminator()) {
                Ok(Some(unit)) => unit,
                Ok(None) => {
                    debug!("Client closed connection");
                    break;
                }
                Err(e) => {
                    let e = SmtpError::from(e);
                    if matches!(e, SmtpError::Framer(FramerError::UnitTooLong { .. })) {
                        // Best effort, the session ends either way
                        let _ = self.send_response(&mut writer, &SmtpResponse::from_error(&e));
                    }
                    return Err(e);
                }
            };
            let text = String::from_utf8_lossy(&unit);

            match session.state {
                SmtpState::Data => {
                    let response = self.accept_data(&mut session, peer, &text);
                    self.send_response(&mut writer, &response)?;
                }
                SmtpState::Command => {
                    debug!(command = %text, "Received command");
                    let response = match command_handler.process_command(&text, &mut session) {
                        Ok(response) => response,
                        Err(e) => SmtpResponse::from_error(&e),
                    };
                    self.send_response(&mut writer, &response)?;
                    if response.code == "221" {
                        break; // QUIT command
                    }
                }
            }
        }

        Ok(())
    }

    /// Turn a framed DATA unit into an email and hand it to the sink
    fn accept_data(&self, session: &mut SmtpSession, peer: SocketAddr, data: &str) -> SmtpResponse {
        let email = match session.finish_data_collection(peer, unstuff(data)) {
            Ok(email) => email,
            Err(e) => return SmtpResponse::from_error(&e),
        };

        match self.sink.deliver(&email) {
            Ok(()) => {
                info!(
                    from = %email.from,
                    to = ?email.to,
                    octets = email.data_size(),
                    "Accepted message"
                );
                SmtpResponse::ok()
            }
            Err(response) => {
                warn!(code = %response.code, "Message refused by sink");
                response
            }
        }
    }

    /// Send a response to the client
    fn send_response<W: Write>(
        &self,
        writer: &mut W,
        response: &SmtpResponse,
    ) -> Result<(), SmtpError> {
        // Ensure response doesn't exceed maximum line length
        let formatted = response.format();
        if formatted.len() > SmtpLimits::REPLY_LINE_MAX_LENGTH {
            let truncated_response =
                SmtpResponse::new(&response.code, "Response too long (truncated)");
            writer.write_all(truncated_response.format().as_bytes())?;
        } else {
            writer.write_all(formatted.as_bytes())?;
        }
        writer.flush()?;
        debug!(code = %response.code, "Sent reply");
        Ok(())
    }
}
