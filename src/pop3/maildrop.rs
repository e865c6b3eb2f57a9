//! In-memory snapshot of a mailbox for one POP3 transaction
//!
//! Deleted messages keep their slot until the transaction commits, so message
//! numbers stay stable for the whole session.

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteError {
    #[error("no such message")]
    NoSuchMessage,

    #[error("message already deleted")]
    AlreadyDeleted,
}

#[derive(Debug, Clone)]
struct Slot {
    message: String,
    deleted: bool,
}

/// Messages of one mailbox, addressed by 1-based message number
#[derive(Debug, Clone, Default)]
pub struct Maildrop {
    slots: Vec<Slot>,
}

impl Maildrop {
    pub fn new(messages: Vec<String>) -> Self {
        Self {
            slots: messages
                .into_iter()
                .map(|message| Slot {
                    message,
                    deleted: false,
                })
                .collect(),
        }
    }

    /// Number of messages not marked deleted
    pub fn count(&self) -> usize {
        self.live().count()
    }

    /// Size in octets of the messages not marked deleted
    pub fn total_octets(&self) -> usize {
        self.live().map(|(_, slot)| slot.message.len()).sum()
    }

    /// Message `number`, unless it is out of range or deleted
    pub fn get(&self, number: usize) -> Option<&str> {
        self.slot(number)
            .filter(|slot| !slot.deleted)
            .map(|slot| slot.message.as_str())
    }

    pub fn octets(&self, number: usize) -> Option<usize> {
        self.get(number).map(str::len)
    }

    /// Mark message `number` deleted
    pub fn delete(&mut self, number: usize) -> Result<(), DeleteError> {
        let index = number.checked_sub(1).ok_or(DeleteError::NoSuchMessage)?;
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(DeleteError::NoSuchMessage)?;
        if slot.deleted {
            return Err(DeleteError::AlreadyDeleted);
        }
        slot.deleted = true;
        Ok(())
    }

    /// `(message number, octets)` of every message not marked deleted
    pub fn listing(&self) -> Vec<(usize, usize)> {
        self.live()
            .map(|(index, slot)| (index + 1, slot.message.len()))
            .collect()
    }

    /// 0-based store indices of the messages marked deleted
    pub fn deleted_indices(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.deleted)
            .map(|(index, _)| index)
            .collect()
    }

    fn slot(&self, number: usize) -> Option<&Slot> {
        self.slots.get(number.checked_sub(1)?)
    }

    fn live(&self) -> impl Iterator<Item = (usize, &Slot)> {
        self.slots.iter().enumerate().filter(|(_, slot)| !slot.deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn maildrop() -> Maildrop {
        Maildrop::new(vec!["a".repeat(40), "b".repeat(55), "c".repeat(7)])
    }

    #[test]
    fn test_counts() {
        let snapshot = maildrop();
        assert_eq!(snapshot.count(), 3);
        assert_eq!(snapshot.total_octets(), 102);
        assert_eq!(snapshot.listing(), vec![(1, 40), (2, 55), (3, 7)]);
    }

    #[test]
    fn test_numbers_are_one_based() {
        let snapshot = maildrop();
        assert_eq!(snapshot.octets(1), Some(40));
        assert_eq!(snapshot.octets(3), Some(7));
        assert_eq!(snapshot.get(0), None);
        assert_eq!(snapshot.get(4), None);
    }

    #[test]
    fn test_delete_keeps_numbering() {
        let mut snapshot = maildrop();
        snapshot.delete(2).unwrap();

        assert_eq!(snapshot.count(), 2);
        assert_eq!(snapshot.total_octets(), 47);
        assert_eq!(snapshot.get(2), None);
        assert_eq!(snapshot.octets(3), Some(7));
        assert_eq!(snapshot.listing(), vec![(1, 40), (3, 7)]);
        assert_eq!(snapshot.deleted_indices(), vec![1]);
    }

    #[test]
    fn test_delete_twice_rejected() {
        let mut snapshot = maildrop();
        snapshot.delete(1).unwrap();
        assert_eq!(snapshot.delete(1), Err(DeleteError::AlreadyDeleted));
        assert_eq!(snapshot.count(), 2);
    }

    #[test]
    fn test_delete_out_of_range() {
        let mut snapshot = maildrop();
        assert_eq!(snapshot.delete(0), Err(DeleteError::NoSuchMessage));
        assert_eq!(snapshot.delete(4), Err(DeleteError::NoSuchMessage));
        assert!(snapshot.deleted_indices().is_empty());
    }
}
