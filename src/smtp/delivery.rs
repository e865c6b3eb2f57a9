//! Where accepted mail goes

use std::sync::mpsc;

use tracing::{error, info, warn};

use crate::smtp::email::Email;
use crate::smtp::response::SmtpResponse;
use crate::store::MailStore;

/// Receives every message accepted at the end of DATA.
///
/// An `Err` carries the negative reply sent to the client in place of `250`.
pub trait MailSink: Send + Sync {
    fn deliver(&self, email: &Email) -> Result<(), SmtpResponse>;
}

/// Hand messages to a channel. Dropped receivers are ignored.
impl MailSink for mpsc::Sender<Email> {
    fn deliver(&self, email: &Email) -> Result<(), SmtpResponse> {
        // Errors when there are no listeners.
        let _ = self.send(email.clone());
        Ok(())
    }
}

/// Append messages to the mailbox of each recipient registered in a store
#[derive(Debug, Clone)]
pub struct MailboxDelivery {
    store: MailStore,
}

impl MailboxDelivery {
    pub fn new(store: MailStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &MailStore {
        &self.store
    }
}

impl MailSink for MailboxDelivery {
    fn deliver(&self, email: &Email) -> Result<(), SmtpResponse> {
        let users = self.store.list_users().map_err(|e| {
            error!(error = %e, "Cannot read user registry");
            SmtpResponse::error("554", "Transaction failed: mailbox store unavailable")
        })?;

        let mut delivered: Vec<&str> = Vec::new();
        for rcpt in &email.to {
            if delivered.contains(&rcpt.as_str()) {
                continue;
            }
            if !users.iter().any(|u| u == rcpt) {
                warn!(recipient = %rcpt, "No local mailbox for recipient");
                continue;
            }

            self.store.append_message(rcpt, &email.data).map_err(|e| {
                error!(recipient = %rcpt, error = %e, "Mailbox store rejected message");
                SmtpResponse::error("554", &format!("Transaction failed: {e}"))
            })?;
            delivered.push(rcpt);
        }

        if delivered.is_empty() {
            return Err(SmtpResponse::error("550", "No such user here"));
        }

        info!(from = %email.from, recipients = ?delivered, "Delivered message");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, MailboxDelivery) {
        let dir = TempDir::new().unwrap();
        let store = MailStore::new(dir.path().join("users"), dir.path().join("users.d"));
        store.add_user("bob", "right").unwrap();
        store.add_user("carol", "secret").unwrap();
        (dir, MailboxDelivery::new(store))
    }

    fn email(to: &[&str], data: &str) -> Email {
        Email::new(
            "127.0.0.1:6000".parse().unwrap(),
            "alice".to_string(),
            to.iter().map(|s| s.to_string()).collect(),
            data.to_string(),
        )
    }

    const MESSAGE: &str = "From: alice\nTo: bob\nSubject: hi\nHello\n.";

    #[test]
    fn test_channel_sink() {
        let (tx, rx) = mpsc::channel();
        tx.deliver(&email(&["bob"], MESSAGE)).unwrap();
        assert_eq!(rx.recv().unwrap().data, MESSAGE);

        drop(rx);
        assert!(tx.deliver(&email(&["bob"], MESSAGE)).is_ok());
    }

    #[test]
    fn test_delivers_to_registered_recipients() {
        let (_dir, sink) = setup();

        sink.deliver(&email(&["bob", "nobody", "carol", "bob"], MESSAGE))
            .unwrap();

        let bob = sink.store().list_messages("bob").unwrap();
        assert_eq!(bob.len(), 1);
        assert!(bob[0].ends_with("Hello\n."));
        assert!(bob[0].lines().nth(3).unwrap().starts_with("Received: "));
        assert_eq!(sink.store().list_messages("carol").unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_recipients_rejected() {
        let (_dir, sink) = setup();
        let response = sink.deliver(&email(&["nobody"], MESSAGE)).unwrap_err();
        assert_eq!(response.code, "550");
    }

    #[test]
    fn test_malformed_message_rejected() {
        let (_dir, sink) = setup();
        let response = sink
            .deliver(&email(&["bob"], "Subject: hi\n\nno envelope headers"))
            .unwrap_err();
        assert_eq!(response.code, "554");
        assert!(sink.store().list_messages("bob").unwrap().is_empty());
    }
}
