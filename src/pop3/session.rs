//! POP3 session state machine (RFC 1939)

use std::mem;

use tracing::{debug, error, info, warn};

use crate::pop3::commands::Pop3Command;
use crate::pop3::error::Pop3Error;
use crate::pop3::maildrop::{DeleteError, Maildrop};
use crate::pop3::response::Pop3Response;
use crate::store::{MailStore, MailboxLock};

const NOT_IN_TRANSACTION: &str = "Not in transaction state, use USER/PASS first to authenticate";
const ALREADY_AUTHENTICATED: &str = "Command not valid in transaction state";
const UNIMPLEMENTED: &str = "Unimplemented command";
const SIGN_OFF: &str = "POP3 server signing off";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pop3Phase {
    Authorization,
    Transaction,
}

/// Progress through USER/PASS while in [`Pop3Phase::Authorization`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    NoUser,
    UserGiven,
}

#[derive(Debug)]
enum State {
    Authorization {
        user: Option<String>,
    },
    Transaction {
        username: String,
        maildrop: Maildrop,
        lock: MailboxLock,
    },
}

/// One client's POP3 conversation.
///
/// The maildrop lock is owned by the transaction state, so it is released on
/// QUIT and whenever the session is dropped.
#[derive(Debug)]
pub struct Pop3Session {
    store: MailStore,
    state: State,
    finished: bool,
}

impl Pop3Session {
    pub fn new(store: MailStore) -> Self {
        Self {
            store,
            state: State::Authorization { user: None },
            finished: false,
        }
    }

    pub fn phase(&self) -> Pop3Phase {
        match self.state {
            State::Authorization { .. } => Pop3Phase::Authorization,
            State::Transaction { .. } => Pop3Phase::Transaction,
        }
    }

    /// `None` once the session is in the transaction phase
    pub fn auth_phase(&self) -> Option<AuthPhase> {
        match &self.state {
            State::Authorization { user: None } => Some(AuthPhase::NoUser),
            State::Authorization { user: Some(_) } => Some(AuthPhase::UserGiven),
            State::Transaction { .. } => None,
        }
    }

    /// User named by USER, or owner of the locked maildrop
    pub fn username(&self) -> Option<&str> {
        match &self.state {
            State::Authorization { user } => user.as_deref(),
            State::Transaction { username, .. } => Some(username),
        }
    }

    pub fn maildrop(&self) -> Option<&Maildrop> {
        match &self.state {
            State::Authorization { .. } => None,
            State::Transaction { maildrop, .. } => Some(maildrop),
        }
    }

    /// Whether QUIT has been processed and the connection should close
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Handle one command line
    pub fn process(&mut self, line: &str) -> Result<Pop3Response, Pop3Error> {
        let Some(command) = Pop3Command::parse(line) else {
            return Ok(Pop3Response::err("Unknown command"));
        };

        if command.is_authorization() && self.phase() == Pop3Phase::Transaction {
            return Ok(Pop3Response::err(ALREADY_AUTHENTICATED));
        }

        match command {
            Pop3Command::User(name) => self.handle_user(name),
            Pop3Command::Pass(password) => self.handle_pass(password),
            Pop3Command::Apop => Ok(Pop3Response::err(UNIMPLEMENTED)),
            Pop3Command::Quit => Ok(self.handle_quit()),
            command => self.handle_transaction(command),
        }
    }

    fn handle_user(&mut self, name: Option<&str>) -> Result<Pop3Response, Pop3Error> {
        let State::Authorization { user } = &mut self.state else {
            return Ok(Pop3Response::err(ALREADY_AUTHENTICATED));
        };
        if user.is_some() {
            return Ok(Pop3Response::err(
                "Invalid command sequence, USER command already received successfully",
            ));
        }
        let Some(name) = name else {
            return Ok(Pop3Response::err("Invalid argument"));
        };

        if !self.store.user_exists(name)? {
            debug!(user = name, "Unknown user");
            return Ok(Pop3Response::err("No mailbox for given user"));
        }

        *user = Some(name.to_owned());
        Ok(Pop3Response::ok(format!("{name} is a valid mailbox")))
    }

    fn handle_pass(&mut self, password: Option<&str>) -> Result<Pop3Response, Pop3Error> {
        let State::Authorization { user } = &mut self.state else {
            return Ok(Pop3Response::err(ALREADY_AUTHENTICATED));
        };
        let Some(username) = user.clone() else {
            return Ok(Pop3Response::err(
                "Invalid command sequence, must send USER command first",
            ));
        };
        let Some(password) = password else {
            return Ok(Pop3Response::err("Invalid argument"));
        };

        if !self.store.validate_credentials(&username, password)? {
            info!(user = %username, "Authentication failed");
            return Ok(Pop3Response::err("Invalid password"));
        }

        let Some(lock) = self.store.try_lock(&username)? else {
            warn!(user = %username, "Maildrop already locked by another session");
            return Ok(Pop3Response::err("Unable to lock maildrop"));
        };

        let maildrop = Maildrop::new(self.store.list_messages(&username)?);
        info!(
            user = %username,
            messages = maildrop.count(),
            "Maildrop locked"
        );
        self.state = State::Transaction {
            username,
            maildrop,
            lock,
        };
        Ok(Pop3Response::ok("Maildrop locked and ready"))
    }

    fn handle_quit(&mut self) -> Pop3Response {
        self.finished = true;

        let state = mem::replace(&mut self.state, State::Authorization { user: None });
        let State::Transaction {
            username,
            maildrop,
            lock,
        } = state
        else {
            return Pop3Response::ok(SIGN_OFF);
        };

        let deleted = maildrop.deleted_indices();
        let response = match self.store.delete_messages(&username, &deleted) {
            Ok(()) => {
                info!(user = %username, removed = deleted.len(), "Maildrop updated");
                Pop3Response::ok(SIGN_OFF)
            }
            Err(e) => {
                error!(user = %username, error = %e, "Cannot commit deletions");
                Pop3Response::err("some deleted messages not removed")
            }
        };

        debug!(user = lock.username(), "Releasing maildrop lock");
        drop(lock);
        response
    }

    fn handle_transaction(&mut self, command: Pop3Command<'_>) -> Result<Pop3Response, Pop3Error> {
        let State::Transaction {
            username, maildrop, ..
        } = &mut self.state
        else {
            return Ok(Pop3Response::err(NOT_IN_TRANSACTION));
        };

        let response = match command {
            Pop3Command::Stat => Pop3Response::ok(format!(
                "{} {}",
                maildrop.count(),
                maildrop.total_octets()
            )),
            Pop3Command::List(None) => Pop3Response::List(maildrop.listing()),
            Pop3Command::List(Some(arg)) => match message_number(arg) {
                Some(number) => match maildrop.octets(number) {
                    Some(octets) => Pop3Response::ok(format!("{number} {octets}")),
                    None => no_such_message(maildrop),
                },
                None => invalid_number(),
            },
            Pop3Command::Retr(arg) => match arg.and_then(message_number) {
                Some(number) => match maildrop.get(number) {
                    Some(message) => Pop3Response::Message(message.to_owned()),
                    None => no_such_message(maildrop),
                },
                None => invalid_number(),
            },
            Pop3Command::Dele(arg) => match arg.and_then(message_number) {
                Some(number) => match maildrop.delete(number) {
                    Ok(()) => Pop3Response::ok(format!("Message {number} deleted")),
                    Err(DeleteError::AlreadyDeleted) => {
                        Pop3Response::err(format!("Message {number} already deleted"))
                    }
                    Err(DeleteError::NoSuchMessage) => no_such_message(maildrop),
                },
                None => invalid_number(),
            },
            Pop3Command::Rset => {
                *maildrop = Maildrop::new(self.store.list_messages(username)?);
                Pop3Response::ok(format!("maildrop has {} messages", maildrop.count()))
            }
            Pop3Command::Noop => Pop3Response::ok(""),
            Pop3Command::Top | Pop3Command::Uidl => Pop3Response::err(UNIMPLEMENTED),
            Pop3Command::User(_)
            | Pop3Command::Pass(_)
            | Pop3Command::Apop
            | Pop3Command::Quit => Pop3Response::err(ALREADY_AUTHENTICATED),
        };
        Ok(response)
    }
}

fn message_number(arg: &str) -> Option<usize> {
    arg.parse().ok()
}

fn invalid_number() -> Pop3Response {
    Pop3Response::err("Invalid argument, requires a valid message number")
}

fn no_such_message(maildrop: &Maildrop) -> Pop3Response {
    Pop3Response::err(format!(
        "No such message, only {} messages in maildrop",
        maildrop.count()
    ))
}
