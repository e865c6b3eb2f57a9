//! Terminator-delimited framing over a byte stream
//!
//! Both servers read their input through a [`Framer`]: commands are framed by
//! `\r\n`, SMTP mail data by `\r\n.\r\n`. The terminator can change between
//! calls, so bytes left over from one read are kept for the next.

use std::io::{self, Read};

use thiserror::Error;

/// Size of each read from the transport
const READ_CHUNK: usize = 1024;

#[derive(Error, Debug)]
pub enum FramerError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Unit too long (max {max} bytes)")]
    UnitTooLong { max: usize },
}

/// Buffered reader splitting a stream on arbitrary terminator sequences
#[derive(Debug)]
pub struct Framer<R> {
    reader: R,
    buffer: Vec<u8>,
    limit: Option<usize>,
}

impl<R: Read> Framer<R> {
    /// Create a framer without a unit size cap
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: Vec::new(),
            limit: None,
        }
    }

    /// Create a framer that fails once a pending unit grows past `max` bytes
    pub fn with_limit(reader: R, max: usize) -> Self {
        Self {
            reader,
            buffer: Vec::new(),
            limit: Some(max),
        }
    }

    /// Read until `terminator` is seen and return the bytes before it.
    ///
    /// The terminator itself is consumed; anything after it stays buffered.
    /// Returns `Ok(None)` when the peer closes the stream before a complete
    /// unit arrived.
    pub fn read_until(&mut self, terminator: &[u8]) -> Result<Option<Vec<u8>>, FramerError> {
        debug_assert!(!terminator.is_empty());

        // Only the tail that could still complete a match needs rescanning
        let mut scan_from = 0;
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            if let Some(pos) = find(&self.buffer[scan_from..], terminator) {
                let end = scan_from + pos;
                if let Some(max) = self.limit {
                    if end > max {
                        return Err(FramerError::UnitTooLong { max });
                    }
                }
                let rest = self.buffer.split_off(end + terminator.len());
                self.buffer.truncate(end);
                let unit = std::mem::replace(&mut self.buffer, rest);
                return Ok(Some(unit));
            }

            // A trailing partial terminator does not count against the cap
            if let Some(max) = self.limit {
                if self.buffer.len() > max + terminator.len() - 1 {
                    return Err(FramerError::UnitTooLong { max });
                }
            }

            scan_from = self.buffer.len().saturating_sub(terminator.len() - 1);

            let n = match self.reader.read(&mut chunk) {
                Ok(0) => return Ok(None),
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            self.buffer.extend_from_slice(&chunk[..n]);
        }
    }

    /// Bytes received but not yet returned as a unit
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    /// Hands out at most `step` bytes per read
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        step: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    fn trickle(data: &[u8], step: usize) -> Trickle {
        Trickle {
            data: data.to_vec(),
            pos: 0,
            step,
        }
    }

    #[test]
    fn test_reads_lines_in_order() {
        let mut framer = Framer::new(Cursor::new(b"HELO a\r\nNOOP\r\n".to_vec()));
        assert_eq!(framer.read_until(b"\r\n").unwrap().unwrap(), b"HELO a");
        assert_eq!(framer.read_until(b"\r\n").unwrap().unwrap(), b"NOOP");
        assert!(framer.read_until(b"\r\n").unwrap().is_none());
    }

    #[test]
    fn test_into_inner_returns_transport() {
        let mut framer = Framer::new(Cursor::new(b"USER bob\r\nPASS".to_vec()));
        framer.read_until(b"\r\n").unwrap();
        assert_eq!(framer.get_ref().position(), 14);
        assert_eq!(framer.pending(), b"PASS");
        assert_eq!(framer.into_inner().into_inner(), b"USER bob\r\nPASS");
    }

    #[test]
    fn test_terminator_split_across_reads() {
        let mut framer = Framer::new(trickle(b"DATA\r\nbody\r\n.\r\nQUIT\r\n", 1));
        assert_eq!(framer.read_until(b"\r\n").unwrap().unwrap(), b"DATA");
        assert_eq!(framer.read_until(b"\r\n.\r\n").unwrap().unwrap(), b"body");
        assert_eq!(framer.read_until(b"\r\n").unwrap().unwrap(), b"QUIT");
    }

    #[test]
    fn test_remainder_kept_when_terminator_changes() {
        let mut framer = Framer::new(Cursor::new(b"DATA\r\nline1\r\nline2\r\n.\r\n".to_vec()));
        assert_eq!(framer.read_until(b"\r\n").unwrap().unwrap(), b"DATA");
        assert_eq!(framer.pending(), b"line1\r\nline2\r\n.\r\n");
        assert_eq!(
            framer.read_until(b"\r\n.\r\n").unwrap().unwrap(),
            b"line1\r\nline2"
        );
        assert!(framer.pending().is_empty());
    }

    #[test]
    fn test_end_of_stream_before_terminator() {
        let mut framer = Framer::new(Cursor::new(b"partial".to_vec()));
        assert!(framer.read_until(b"\r\n").unwrap().is_none());
    }

    #[test]
    fn test_empty_unit() {
        let mut framer = Framer::new(Cursor::new(b"\r\nX\r\n".to_vec()));
        assert_eq!(framer.read_until(b"\r\n").unwrap().unwrap(), b"");
        assert_eq!(framer.read_until(b"\r\n").unwrap().unwrap(), b"X");
    }

    #[test]
    fn test_limit() {
        let data = vec![b'a'; 100];
        let mut framer = Framer::with_limit(trickle(&data, 10), 32);
        assert!(matches!(
            framer.read_until(b"\r\n"),
            Err(FramerError::UnitTooLong { max: 32 })
        ));
    }

    #[test]
    fn test_limit_applies_to_complete_units() {
        let mut data = vec![b'a'; 40];
        data.extend_from_slice(b"\r\n");
        let mut framer = Framer::with_limit(Cursor::new(data), 32);
        assert!(matches!(
            framer.read_until(b"\r\n"),
            Err(FramerError::UnitTooLong { max: 32 })
        ));
    }

    #[test]
    fn test_unit_of_exactly_max_bytes_split_terminator() {
        let mut framer = Framer::with_limit(trickle(b"abcd\r\nefgh\r\n", 5), 4);
        assert_eq!(framer.read_until(b"\r\n").unwrap().unwrap(), b"abcd");
        assert_eq!(framer.read_until(b"\r\n").unwrap().unwrap(), b"efgh");

        let mut framer = Framer::with_limit(trickle(b"line\r\n.\r\n", 6), 4);
        assert_eq!(framer.read_until(b"\r\n.\r\n").unwrap().unwrap(), b"line");
    }

    #[test]
    fn test_limit_not_hit_by_short_units() {
        let mut framer = Framer::with_limit(Cursor::new(b"short\r\n".to_vec()), 32);
        assert_eq!(framer.read_until(b"\r\n").unwrap().unwrap(), b"short");
    }

    proptest! {
        #[test]
        fn chunking_does_not_change_units(
            lines in prop::collection::vec("[a-z .]{0,20}", 1..8),
            step in 1usize..16,
        ) {
            let mut wire = Vec::new();
            for line in &lines {
                wire.extend_from_slice(line.as_bytes());
                wire.extend_from_slice(b"\r\n");
            }

            let mut framer = Framer::with_limit(trickle(&wire, step), 20);
            for line in &lines {
                let unit = framer.read_until(b"\r\n").unwrap().unwrap();
                prop_assert_eq!(unit, line.as_bytes().to_vec());
            }
            prop_assert!(framer.read_until(b"\r\n").unwrap().is_none());
        }
    }
}
