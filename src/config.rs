//! Server configuration, read from an optional TOML file
//!
//! ```toml
//! hostname = "mail.example"
//! accept_poll_ms = 50
//!
//! [smtp]
//! listen = "0.0.0.0:25"
//!
//! [pop3]
//! listen = "0.0.0.0:110"
//!
//! [store]
//! registry = "/var/lib/mailroom/users"
//! users_dir = "/var/lib/mailroom/users.d"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::store::MailStore;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid configuration in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Name the servers announce in greetings
    pub hostname: String,

    /// Longest the accept loop sleeps before noticing a shutdown
    pub accept_poll_ms: u64,

    /// Cap on a single command line or mail body, unlimited if unset
    pub max_line_bytes: Option<usize>,

    pub smtp: ListenConfig,
    pub pop3: ListenConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListenConfig {
    /// Address to bind, `host:port`
    pub listen: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// File of `username password` lines
    pub registry: PathBuf,

    /// Directory holding one mailbox directory per user
    pub users_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hostname: "localhost".to_string(),
            accept_poll_ms: 50,
            max_line_bytes: None,
            smtp: ListenConfig {
                listen: "127.0.0.1:2525".to_string(),
            },
            pop3: ListenConfig {
                listen: "127.0.0.1:1110".to_string(),
            },
            store: StoreConfig::default(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            registry: PathBuf::from("users"),
            users_dir: PathBuf::from("users.d"),
        }
    }
}

impl Config {
    /// Load `path`, or the defaults when no file is given
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn accept_poll(&self) -> Duration {
        Duration::from_millis(self.accept_poll_ms)
    }

    pub fn mail_store(&self) -> MailStore {
        MailStore::new(&self.store.registry, &self.store.users_dir)
    }
}
