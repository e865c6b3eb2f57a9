//! The flat user registry: one `username password` pair per line

use crate::store::error::StoreError;

/// One registry line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

/// Parse registry text. Blank lines are skipped.
pub fn parse(text: &str) -> Result<Vec<Credential>, StoreError> {
    let mut entries = Vec::new();

    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut fields = line.split_whitespace();
        match (fields.next(), fields.next(), fields.next()) {
            (Some(username), Some(password), None) => entries.push(Credential {
                username: username.to_owned(),
                password: password.to_owned(),
            }),
            _ => return Err(StoreError::MalformedRegistry { line: i + 1 }),
        }
    }

    Ok(entries)
}

/// Check a password against the first entry carrying `username`
pub fn verify(entries: &[Credential], username: &str, password: &str) -> bool {
    entries
        .iter()
        .find(|c| c.username == username)
        .is_some_and(|c| c.password == password)
}

/// Render one registry line, newline included
pub fn format_entry(username: &str, password: &str) -> String {
    format!("{username} {password}\n")
}
