//! Pattern buffer with efficient tail-search optimization.
//!
//! Only the last `search_depth` bytes of the buffer are searched for prompt
//! patterns. A full running configuration can be hundreds of kilobytes, and
//! the prompt is always at the end.

use memchr::memmem;
use regex::bytes::Regex;

/// Output accumulated from a shell channel, with ANSI escapes removed.
pub struct PatternBuffer {
    /// The accumulated output buffer.
    buffer: Vec<u8>,

    /// How many bytes from the end to search for patterns.
    search_depth: usize,

    /// Escape-sequence parser; keeps state across chunk boundaries.
    parser: vte::Parser,
}

/// Output up to a matched pattern, and the matched text itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matched {
    pub output: Vec<u8>,
    pub matched: String,
}

impl PatternBuffer {
    /// Create a new pattern buffer with the specified search depth.
    pub fn new(search_depth: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            search_depth,
            parser: vte::Parser::new(),
        }
    }

    /// Extend the buffer with raw channel data, stripping escape sequences
    /// and carriage returns.
    pub fn extend(&mut self, data: &[u8]) {
        let mut sink = PlainText {
            out: &mut self.buffer,
        };
        self.parser.advance(&mut sink, data);
    }

    /// Search only the tail of the buffer for the pattern.
    ///
    /// On a match, everything before the match is returned as output, the
    /// match itself as text, and both are removed from the buffer. Bytes
    /// after the match stay buffered.
    pub fn take_until(&mut self, pattern: &Regex) -> Option<Matched> {
        let start = self.buffer.len().saturating_sub(self.search_depth);
        let (m_start, m_end) = pattern
            .find(&self.buffer[start..])
            .map(|m| (start + m.start(), start + m.end()))?;

        let matched = String::from_utf8_lossy(&self.buffer[m_start..m_end]).into_owned();
        let rest = self.buffer.split_off(m_end);
        self.buffer.truncate(m_start);
        let output = std::mem::replace(&mut self.buffer, rest);

        Some(Matched { output, matched })
    }

    /// Discard everything up to and including the line holding `needle`.
    ///
    /// Used to skip a command's echo. Returns false if the needle has not
    /// arrived yet or its line is not complete.
    pub fn skip_past_line(&mut self, needle: &str) -> bool {
        let Some(pos) = memmem::find(&self.buffer, needle.as_bytes()) else {
            return false;
        };
        let after = pos + needle.len();
        match memchr::memchr(b'\n', &self.buffer[after..]) {
            Some(nl) => {
                self.buffer.drain(..after + nl + 1);
                true
            }
            None => false,
        }
    }

    /// Get the buffer contents as a string (lossy UTF-8 conversion).
    pub fn as_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.buffer)
    }

    /// Get the current buffer length.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for PatternBuffer {
    fn default() -> Self {
        Self::new(1000)
    }
}

/// vte performer keeping printable text, newlines and tabs.
struct PlainText<'a> {
    out: &'a mut Vec<u8>,
}

impl vte::Perform for PlainText<'_> {
    fn print(&mut self, c: char) {
        let mut utf8 = [0u8; 4];
        self.out.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
    }

    fn execute(&mut self, byte: u8) {
        if matches!(byte, b'\n' | b'\t') {
            self.out.push(byte);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_extend() {
        let mut buffer = PatternBuffer::new(100);
        buffer.extend(b"Hello, world!");
        assert_eq!(buffer.as_str_lossy(), "Hello, world!");
    }

    #[test]
    fn test_ansi_and_cr_stripping() {
        let mut buffer = PatternBuffer::new(100);
        buffer.extend(b"\x1b[32mGreen text\x1b[0m\r\n");
        assert_eq!(buffer.as_str_lossy(), "Green text\n");
    }

    #[test]
    fn test_escape_split_across_chunks() {
        let mut buffer = PatternBuffer::new(100);
        buffer.extend(b"abc\x1b[3");
        buffer.extend(b"2mdef");
        assert_eq!(buffer.as_str_lossy(), "abcdef");
    }

    #[test]
    fn test_take_until_splits_output_and_prompt() {
        let mut buffer = PatternBuffer::new(100);
        buffer.extend(b"hostname r1\n!\nend\nr1#");
        let pattern = Regex::new(r"(?m)^r1#\s?$").unwrap();

        let matched = buffer.take_until(&pattern).unwrap();
        assert_eq!(matched.output, b"hostname r1\n!\nend\n");
        assert_eq!(matched.matched, "r1#");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_take_until_only_searches_tail() {
        let mut buffer = PatternBuffer::new(10);
        buffer.extend(b"router#");
        buffer.extend(&[b'x'; 100]);

        let pattern = Regex::new(r"router#").unwrap();
        assert!(buffer.take_until(&pattern).is_none());
        assert_eq!(buffer.len(), 107);
    }

    #[test]
    fn test_take_until_keeps_trailing_bytes() {
        let mut buffer = PatternBuffer::new(100);
        buffer.extend(b"out\nPassword: extra");
        let pattern = Regex::new(r"Password:").unwrap();

        let matched = buffer.take_until(&pattern).unwrap();
        assert_eq!(matched.output, b"out\n");
        assert_eq!(buffer.as_str_lossy(), " extra");
    }

    #[test]
    fn test_skip_past_line() {
        let mut buffer = PatternBuffer::new(100);
        buffer.extend(b"r1#show running-config");
        assert!(!buffer.skip_past_line("show running-config"));

        buffer.extend(b"\r\nBuilding configuration...\n");
        assert!(buffer.skip_past_line("show running-config"));
        assert_eq!(buffer.as_str_lossy(), "Building configuration...\n");
    }
}
