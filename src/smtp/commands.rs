//! Implementation of SMTP commands

use crate::smtp::error::SmtpError;
use crate::smtp::response::SmtpResponse;
use crate::smtp::session::SmtpSession;

/// Commands understood by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpCommand {
    Helo,
    Mail,
    Rcpt,
    Data,
    Rset,
    Noop,
    Quit,
    Vrfy,
    Help,
}

impl SmtpCommand {
    /// Look up a command keyword, ignoring case
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        let command = match keyword.to_ascii_uppercase().as_str() {
            "HELO" => SmtpCommand::Helo,
            "MAIL" => SmtpCommand::Mail,
            "RCPT" => SmtpCommand::Rcpt,
            "DATA" => SmtpCommand::Data,
            "RSET" => SmtpCommand::Rset,
            "NOOP" => SmtpCommand::Noop,
            "QUIT" => SmtpCommand::Quit,
            "VRFY" => SmtpCommand::Vrfy,
            "HELP" => SmtpCommand::Help,
            _ => return None,
        };
        Some(command)
    }

    /// Usage line reported by HELP
    pub fn syntax(self) -> &'static str {
        match self {
            SmtpCommand::Helo => "HELO hostname",
            SmtpCommand::Mail => "MAIL FROM: <address>",
            SmtpCommand::Rcpt => "RCPT TO: <address>",
            SmtpCommand::Data => "DATA",
            SmtpCommand::Rset => "RSET",
            SmtpCommand::Noop => "NOOP",
            SmtpCommand::Quit => "QUIT",
            SmtpCommand::Vrfy => "VRFY <address>",
            SmtpCommand::Help => "HELP [command]",
        }
    }
}

const SUPPORTED_COMMANDS: &str = "HELO MAIL RCPT DATA RSET NOOP QUIT VRFY";

/// Handles SMTP commands and returns appropriate responses
#[derive(Debug)]
pub struct SmtpCommandHandler<'a> {
    hostname: &'a str,
}

impl<'a> SmtpCommandHandler<'a> {
    /// Create a new command handler
    pub fn new(hostname: &'a str) -> Self {
        Self { hostname }
    }

    /// Process a command line and return a response
    pub fn process_command(
        &self,
        command_line: &str,
        session: &mut SmtpSession,
    ) -> Result<SmtpResponse, SmtpError> {
        if command_line.trim().is_empty() {
            return Err(SmtpError::BadSyntax);
        }

        let (keyword, arg) = match command_line.split_once(' ') {
            Some((keyword, rest)) => (keyword, Some(rest.trim()).filter(|a| !a.is_empty())),
            None => (command_line, None),
        };

        let command = SmtpCommand::from_keyword(keyword)
            .ok_or_else(|| SmtpError::InvalidCommand(keyword.to_uppercase()))?;

        match command {
            SmtpCommand::Helo => self.handle_helo(arg, session),
            SmtpCommand::Mail => self.handle_mail(arg, session),
            SmtpCommand::Rcpt => self.handle_rcpt(arg, session),
            SmtpCommand::Data => self.handle_data(arg, session),
            SmtpCommand::Rset => self.handle_rset(arg, session),
            SmtpCommand::Noop => self.handle_noop(arg),
            SmtpCommand::Quit => self.handle_quit(),
            SmtpCommand::Vrfy => self.handle_vrfy(arg),
            SmtpCommand::Help => self.handle_help(arg),
        }
    }

    /// Handle HELO command
    fn handle_helo(
        &self,
        arg: Option<&str>,
        session: &mut SmtpSession,
    ) -> Result<SmtpResponse, SmtpError> {
        let client_domain =
            arg.ok_or_else(|| SmtpError::InvalidSyntax(SmtpCommand::Helo.syntax().to_string()))?;

        session.set_client_domain(client_domain.to_string())?;

        Ok(SmtpResponse::helo(self.hostname, client_domain))
    }

    /// Handle MAIL command
    fn handle_mail(
        &self,
        arg: Option<&str>,
        session: &mut SmtpSession,
    ) -> Result<SmtpResponse, SmtpError> {
        session.require_greeting()?;

        let (addr, params) = parse_path(arg, "FROM:", SmtpCommand::Mail)?;
        session.require_no_sender()?;
        if !params.is_empty() {
            return Err(SmtpError::UnsupportedParameters("MAIL FROM"));
        }

        session.set_sender(addr.to_string())?;

        Ok(SmtpResponse::sender_ok(addr))
    }

    /// Handle RCPT command
    fn handle_rcpt(
        &self,
        arg: Option<&str>,
        session: &mut SmtpSession,
    ) -> Result<SmtpResponse, SmtpError> {
        session.require_sender()?;

        let (addr, params) = parse_path(arg, "TO:", SmtpCommand::Rcpt)?;
        if !params.is_empty() {
            return Err(SmtpError::UnsupportedParameters("RCPT TO"));
        }

        session.add_recipient(addr.to_string())?;

        Ok(SmtpResponse::recipient_ok())
    }

    /// Handle DATA command
    fn handle_data(
        &self,
        arg: Option<&str>,
        session: &mut SmtpSession,
    ) -> Result<SmtpResponse, SmtpError> {
        session.require_recipients()?;

        if arg.is_some() {
            return Err(SmtpError::InvalidSyntax(
                SmtpCommand::Data.syntax().to_string(),
            ));
        }

        session.start_data_mode()?;

        Ok(SmtpResponse::data_start())
    }

    /// Handle RSET command
    fn handle_rset(
        &self,
        arg: Option<&str>,
        session: &mut SmtpSession,
    ) -> Result<SmtpResponse, SmtpError> {
        if arg.is_some() {
            return Err(SmtpError::InvalidSyntax(
                SmtpCommand::Rset.syntax().to_string(),
            ));
        }

        session.reset();
        Ok(SmtpResponse::ok())
    }

    /// Handle NOOP command
    fn handle_noop(&self, arg: Option<&str>) -> Result<SmtpResponse, SmtpError> {
        if arg.is_some() {
            return Err(SmtpError::InvalidSyntax(
                SmtpCommand::Noop.syntax().to_string(),
            ));
        }
        Ok(SmtpResponse::ok())
    }

    /// Handle QUIT command
    fn handle_quit(&self) -> Result<SmtpResponse, SmtpError> {
        Ok(SmtpResponse::quit(self.hostname))
    }

    /// Handle VRFY command; addresses are never actually checked
    fn handle_vrfy(&self, arg: Option<&str>) -> Result<SmtpResponse, SmtpError> {
        let arg =
            arg.ok_or_else(|| SmtpError::InvalidSyntax(SmtpCommand::Vrfy.syntax().to_string()))?;

        match angle_address(arg) {
            Some((addr, _)) if !addr.is_empty() => Ok(SmtpResponse::cannot_verify()),
            _ => Err(SmtpError::CannotVerify(arg.to_string())),
        }
    }

    /// Handle HELP command
    fn handle_help(&self, arg: Option<&str>) -> Result<SmtpResponse, SmtpError> {
        match arg {
            None => Ok(SmtpResponse::new(
                "250",
                &format!("Supported commands: {SUPPORTED_COMMANDS}"),
            )),
            Some(topic) => match SmtpCommand::from_keyword(topic) {
                Some(command) => Ok(SmtpResponse::new(
                    "250",
                    &format!("Syntax: {}", command.syntax()),
                )),
                None => Ok(SmtpResponse::error(
                    "501",
                    &format!("Supported commands: {SUPPORTED_COMMANDS}"),
                )),
            },
        }
    }
}

/// Split `<address> params` into its two parts
fn angle_address(text: &str) -> Option<(&str, &str)> {
    let rest = text.strip_prefix('<')?;
    let end = rest.find('>')?;
    Some((&rest[..end], rest[end + 1..].trim()))
}

/// Parse the argument of MAIL or RCPT: `FROM:<addr>` or `TO:<addr>`,
/// followed by optional (unsupported) parameters
fn parse_path<'l>(
    arg: Option<&'l str>,
    keyword: &str,
    command: SmtpCommand,
) -> Result<(&'l str, &'l str), SmtpError> {
    let syntax_error = || SmtpError::InvalidSyntax(command.syntax().to_string());

    let arg = arg.ok_or_else(syntax_error)?;
    let prefix = arg.get(..keyword.len()).ok_or_else(syntax_error)?;
    if !prefix.eq_ignore_ascii_case(keyword) {
        return Err(syntax_error());
    }

    match angle_address(arg[keyword.len()..].trim_start()) {
        Some((addr, params)) if !addr.is_empty() => Ok((addr, params)),
        _ => Err(syntax_error()),
    }
}
