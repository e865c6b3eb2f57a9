//! Flat-file mailbox store
//!
//! Layout on disk:
//!
//! ```text
//! <registry>                 one "username password" pair per line
//! <users_dir>/<user>/mailbox.txt        message log, records end with "\n.\n"
//! <users_dir>/<user>/mailbox.txt.lock   advisory lock held by a POP3 session
//! ```
//!
//! Every call is atomic on its own; holding a maildrop across calls is what
//! [`MailboxLock`] is for.

pub mod error;
pub mod lock;
pub mod mailbox;
pub mod registry;

pub use error::StoreError;
pub use lock::MailboxLock;

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use tracing::debug;

use crate::store::lock::lock_file;

const MAILBOX_FILE: &str = "mailbox.txt";
const LOCK_FILE: &str = "mailbox.txt.lock";

/// Handle on a registry file and the directory of user mailboxes
#[derive(Debug, Clone)]
pub struct MailStore {
    registry: PathBuf,
    users_dir: PathBuf,
}

impl MailStore {
    /// Create a store handle. Nothing is touched on disk until used.
    pub fn new(registry: impl Into<PathBuf>, users_dir: impl Into<PathBuf>) -> Self {
        Self {
            registry: registry.into(),
            users_dir: users_dir.into(),
        }
    }

    pub fn registry_path(&self) -> &Path {
        &self.registry
    }

    pub fn users_dir(&self) -> &Path {
        &self.users_dir
    }

    /// All registered usernames, in registry order
    pub fn list_users(&self) -> Result<Vec<String>, StoreError> {
        Ok(self
            .read_registry()?
            .into_iter()
            .map(|c| c.username)
            .collect())
    }

    /// Whether `username` appears in the registry
    pub fn user_exists(&self, username: &str) -> Result<bool, StoreError> {
        Ok(self
            .read_registry()?
            .iter()
            .any(|c| c.username == username))
    }

    /// Exact-match password check against the first entry for `username`
    pub fn validate_credentials(&self, username: &str, password: &str) -> Result<bool, StoreError> {
        let entries = self.read_registry()?;
        Ok(registry::verify(&entries, username, password))
    }

    /// Register a user and create an empty mailbox
    pub fn add_user(&self, username: &str, password: &str) -> Result<(), StoreError> {
        let dir = self.mailbox_dir(username)?;
        if password.is_empty() || password.contains(char::is_whitespace) {
            return Err(StoreError::InvalidPassword);
        }

        let entries = match self.read_registry() {
            Ok(entries) => entries,
            Err(StoreError::Io(e)) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e),
        };
        if entries.iter().any(|c| c.username == username) {
            return Err(StoreError::UserExists(username.to_owned()));
        }

        fs::create_dir_all(&dir)?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(MAILBOX_FILE))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.registry)?;
        lock_file(&file, true)?;
        file.write_all(registry::format_entry(username, password).as_bytes())?;
        Ok(())
    }

    /// Take the maildrop lock without waiting.
    ///
    /// Returns `Ok(None)` if another session already holds it.
    pub fn try_lock(&self, username: &str) -> Result<Option<MailboxLock>, StoreError> {
        let dir = self.existing_mailbox_dir(username)?;
        MailboxLock::try_acquire(&dir.join(LOCK_FILE), username)
    }

    /// Deliver `raw` to `owner`, stamped with the current local time
    pub fn append_message(&self, owner: &str, raw: &str) -> Result<(), StoreError> {
        self.append_message_received(owner, raw, Local::now().naive_local())
    }

    /// Deliver `raw` to `owner` with an explicit `Received:` time
    pub fn append_message_received(
        &self,
        owner: &str,
        raw: &str,
        received: NaiveDateTime,
    ) -> Result<(), StoreError> {
        let dir = self.existing_mailbox_dir(owner)?;
        let message = mailbox::stamp_received(raw, received)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(MAILBOX_FILE))?;
        lock_file(&file, true)?;
        file.write_all(mailbox::encode_record(&message).as_bytes())?;
        file.sync_data()?;

        debug!(owner, octets = message.len(), "message appended");
        Ok(())
    }

    /// Every message in `username`'s log, oldest first
    pub fn list_messages(&self, username: &str) -> Result<Vec<String>, StoreError> {
        let mut file = self.open_log(username, false)?;
        lock_file(&file, false)?;

        let mut log = String::new();
        file.read_to_string(&mut log)?;
        Ok(mailbox::decode_log(&log))
    }

    /// Rewrite the log without the messages at `indices` (0-based)
    pub fn delete_messages(&self, username: &str, indices: &[usize]) -> Result<(), StoreError> {
        if indices.is_empty() {
            return Ok(());
        }

        let mut file = self.open_log(username, true)?;
        lock_file(&file, true)?;

        let mut log = String::new();
        file.read_to_string(&mut log)?;
        let messages = mailbox::decode_log(&log);

        if let Some(&index) = indices.iter().find(|&&i| i >= messages.len()) {
            return Err(StoreError::NoSuchMessage {
                index,
                count: messages.len(),
            });
        }

        let kept = messages
            .iter()
            .enumerate()
            .filter(|(i, _)| !indices.contains(i))
            .map(|(_, m)| m.as_str());
        let rewritten = mailbox::encode_log(kept);

        file.seek(SeekFrom::Start(0))?;
        file.set_len(0)?;
        file.write_all(rewritten.as_bytes())?;
        file.sync_data()?;

        debug!(username, removed = indices.len(), "mailbox rewritten");
        Ok(())
    }

    fn read_registry(&self) -> Result<Vec<registry::Credential>, StoreError> {
        let file = File::open(&self.registry)?;
        lock_file(&file, false)?;
        let mut text = String::new();
        (&file).read_to_string(&mut text)?;
        registry::parse(&text)
    }

    fn open_log(&self, username: &str, write: bool) -> Result<File, StoreError> {
        let path = self.existing_mailbox_dir(username)?.join(MAILBOX_FILE);
        OpenOptions::new()
            .read(true)
            .write(write)
            .open(path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => StoreError::MailboxNotFound(username.to_owned()),
                _ => StoreError::Io(e),
            })
    }

    fn existing_mailbox_dir(&self, username: &str) -> Result<PathBuf, StoreError> {
        let dir = self.mailbox_dir(username)?;
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(StoreError::MailboxNotFound(username.to_owned()))
        }
    }

    fn mailbox_dir(&self, username: &str) -> Result<PathBuf, StoreError> {
        let invalid = username.is_empty()
            || username == "."
            || username == ".."
            || username.contains(['/', '\\', '\0'])
            || username.contains(char::is_whitespace);
        if invalid {
            return Err(StoreError::InvalidUsername(username.to_owned()));
        }
        Ok(self.users_dir.join(username))
    }
}
