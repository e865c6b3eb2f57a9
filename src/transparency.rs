//! Dot-stuffing for multi-line bodies (RFC 5321 section 4.5.2, RFC 1939)
//!
//! Inside the library message text uses `\n` line endings. On the wire lines
//! end with `\r\n`, any line starting with `.` gets one extra `.`, and the body
//! is closed by a line holding a single `.`.

use std::borrow::Cow;

/// Line separator on the wire
pub const CRLF: &str = "\r\n";

/// Terminator closing a stuffed multi-line body
pub const END_OF_DATA: &str = "\r\n.\r\n";

const NEWLINE: char = '\n';

/// Escape a single line for transmission or storage
pub fn stuff_line(line: &str) -> Cow<'_, str> {
    if line.starts_with('.') {
        Cow::Owned(format!(".{line}"))
    } else {
        Cow::Borrowed(line)
    }
}

/// Undo [`stuff_line`]: strip exactly one leading `.`
pub fn unstuff_line(line: &str) -> &str {
    line.strip_prefix('.').unwrap_or(line)
}

/// Encode a body for the wire, including the closing `.` line
pub fn stuff(body: &str) -> String {
    let mut out = String::with_capacity(body.len() + END_OF_DATA.len() + 8);
    for (i, line) in body.split(NEWLINE).enumerate() {
        if i > 0 {
            out.push_str(CRLF);
        }
        out.push_str(&stuff_line(line));
    }
    out.push_str(END_OF_DATA);
    out
}

/// Decode a body received from the wire.
///
/// `data` is the unit preceding the `\r\n.\r\n` terminator, as returned by the
/// framer.
pub fn unstuff(data: &str) -> String {
    data.split(CRLF)
        .map(unstuff_line)
        .collect::<Vec<_>>()
        .join("\n")
}
