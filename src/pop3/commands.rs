//! POP3 command parsing

/// A command line split into keyword and raw argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pop3Command<'a> {
    // Authorization state
    User(Option<&'a str>),
    Pass(Option<&'a str>),
    Apop,
    Quit,

    // Transaction state
    Stat,
    List(Option<&'a str>),
    Retr(Option<&'a str>),
    Dele(Option<&'a str>),
    Noop,
    Rset,
    Top,
    Uidl,
}

impl<'a> Pop3Command<'a> {
    /// Parse a command line. `None` for an empty line or unknown keyword.
    pub fn parse(line: &'a str) -> Option<Self> {
        let line = line.trim();
        let (keyword, arg) = match line.split_once(' ') {
            Some((keyword, rest)) => (keyword, Some(rest.trim()).filter(|a| !a.is_empty())),
            None => (line, None),
        };

        let command = match keyword.to_ascii_uppercase().as_str() {
            "USER" => Pop3Command::User(arg),
            "PASS" => Pop3Command::Pass(arg),
            "APOP" => Pop3Command::Apop,
            "QUIT" => Pop3Command::Quit,
            "STAT" => Pop3Command::Stat,
            "LIST" => Pop3Command::List(arg),
            "RETR" => Pop3Command::Retr(arg),
            "DELE" => Pop3Command::Dele(arg),
            "NOOP" => Pop3Command::Noop,
            "RSET" => Pop3Command::Rset,
            "TOP" => Pop3Command::Top,
            "UIDL" => Pop3Command::Uidl,
            _ => return None,
        };
        Some(command)
    }

    /// Whether the command only makes sense before authentication
    pub fn is_authorization(&self) -> bool {
        matches!(
            self,
            Pop3Command::User(_) | Pop3Command::Pass(_) | Pop3Command::Apop
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keywords() {
        assert_eq!(Pop3Command::parse("user bob"), Some(Pop3Command::User(Some("bob"))));
        assert_eq!(Pop3Command::parse("PASS  right "), Some(Pop3Command::Pass(Some("right"))));
        assert_eq!(Pop3Command::parse("Stat"), Some(Pop3Command::Stat));
        assert_eq!(Pop3Command::parse("LIST"), Some(Pop3Command::List(None)));
        assert_eq!(Pop3Command::parse("LIST 2"), Some(Pop3Command::List(Some("2"))));
        assert_eq!(Pop3Command::parse("TOP 1 10"), Some(Pop3Command::Top));
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(Pop3Command::parse(""), None);
        assert_eq!(Pop3Command::parse("   "), None);
        assert_eq!(Pop3Command::parse("CAPA"), None);
    }

    #[test]
    fn test_missing_argument() {
        assert_eq!(Pop3Command::parse("USER"), Some(Pop3Command::User(None)));
        assert_eq!(Pop3Command::parse("RETR "), Some(Pop3Command::Retr(None)));
    }
}
