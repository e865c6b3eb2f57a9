//! Advisory `flock(2)` locks on mailbox files

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::Path;

use nix::errno::Errno;
use nix::fcntl::{FlockArg, flock};

use crate::store::error::StoreError;

/// Exclusive hold on one user's maildrop.
///
/// Acquired without blocking by [`MailStore::try_lock`](crate::MailStore::try_lock)
/// and released when dropped, whichever way the owning session ends.
#[derive(Debug)]
pub struct MailboxLock {
    file: File,
    username: String,
}

impl MailboxLock {
    /// Try to lock `path`; `Ok(None)` means another holder has it
    pub(crate) fn try_acquire(path: &Path, username: &str) -> Result<Option<Self>, StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;

        match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
            Ok(()) => Ok(Some(Self {
                file,
                username: username.to_owned(),
            })),
            Err(e) if e == Errno::EWOULDBLOCK => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Owner of the locked maildrop
    pub fn username(&self) -> &str {
        &self.username
    }
}

impl Drop for MailboxLock {
    fn drop(&mut self) {
        // Closing the descriptor releases the lock as well
        let _ = flock(self.file.as_raw_fd(), FlockArg::Unlock);
    }
}

/// Block until `file` is locked, shared or exclusive.
///
/// Used around single reads and writes of a mailbox log; the lock lives as
/// long as the open file.
pub(crate) fn lock_file(file: &File, exclusive: bool) -> Result<(), StoreError> {
    let arg = if exclusive {
        FlockArg::LockExclusive
    } else {
        FlockArg::LockShared
    };

    loop {
        match flock(file.as_raw_fd(), arg) {
            Ok(()) => return Ok(()),
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_lock_is_refused() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mailbox.txt.lock");

        let first = MailboxLock::try_acquire(&path, "bob").unwrap();
        assert!(first.is_some());
        assert!(MailboxLock::try_acquire(&path, "bob").unwrap().is_none());
    }

    #[test]
    fn test_drop_releases_lock() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mailbox.txt.lock");

        let first = MailboxLock::try_acquire(&path, "bob").unwrap().unwrap();
        assert_eq!(first.username(), "bob");
        drop(first);

        assert!(MailboxLock::try_acquire(&path, "bob").unwrap().is_some());
    }
}
