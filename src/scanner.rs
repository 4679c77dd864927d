//! Line-at-a-time cursor over a `BufRead`, with one-line push-back and a
//! position that can be sampled tear-free from another thread.

use std::io::{self, BufRead};
use std::sync::{Arc, Mutex};

/// Cross-thread handle onto a scanner's `(lineno, offset)` position, for a
/// progress bar to poll without touching pipeline internals.
#[derive(Clone, Default)]
pub struct SharedPosition(Arc<Mutex<(u64, u64)>>);

impl SharedPosition {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new((0, 0))))
    }

    pub fn get(&self) -> (u64, u64) {
        *self.0.lock().expect("position mutex poisoned")
    }

    fn set(&self, pos: (u64, u64)) {
        *self.0.lock().expect("position mutex poisoned") = pos;
    }
}

pub struct Scanner<R> {
    reader: R,
    lineno: u64,
    /// Start offset of the most recently returned line.
    offset: u64,
    /// Offset of the next unread byte.
    read_offset: u64,
    pushback: Option<Vec<u8>>,
    shared: Option<SharedPosition>,
}

impl<R: BufRead> Scanner<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            lineno: 0,
            offset: 0,
            read_offset: 0,
            pushback: None,
            shared: None,
        }
    }

    /// Attach a handle that `next()` keeps updated with the current position.
    pub fn with_shared_position(mut self, shared: SharedPosition) -> Self {
        self.shared = Some(shared);
        self
    }

    /// Read the next line as raw bytes (including its trailing `\n`, if
    /// any), or `Ok(None)` at end of stream (not an error). Lines are read
    /// with `read_until`, not `read_line`, since a dump's row-data sections
    /// routinely carry non-UTF-8 bytes (latin1-charset text, raw BLOB
    /// bytes in an `INSERT` row) that would make `read_line` fail on
    /// otherwise-valid input.
    pub fn next(&mut self) -> io::Result<Option<Vec<u8>>> {
        if let Some(line) = self.pushback.take() {
            self.lineno += 1;
            self.publish();
            return Ok(Some(line));
        }

        let mut buf = Vec::new();
        let n = self.reader.read_until(b'\n', &mut buf)?;
        if n == 0 {
            return Ok(None);
        }
        self.offset = self.read_offset;
        self.read_offset += n as u64;
        self.lineno += 1;
        self.publish();
        Ok(Some(buf))
    }

    /// Push a single line back so the next `next()` call returns it again,
    /// with the scanner's position restored to what it was when that line
    /// was originally returned.
    pub fn push_back(&mut self, line: Vec<u8>) {
        self.lineno -= 1;
        self.pushback = Some(line);
    }

    pub fn lineno(&self) -> u64 {
        self.lineno
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn position(&self) -> (u64, u64) {
        (self.lineno, self.offset)
    }

    fn publish(&self) {
        if let Some(shared) = &self.shared {
            shared.set((self.lineno, self.offset));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn scanner_of(text: &str) -> Scanner<Cursor<&[u8]>> {
        Scanner::new(Cursor::new(text.as_bytes()))
    }

    #[test]
    fn reads_lines_in_order() {
        let mut s = scanner_of("one\ntwo\nthree\n");
        assert_eq!(s.next().unwrap().as_deref(), Some(b"one\n".as_slice()));
        assert_eq!(s.next().unwrap().as_deref(), Some(b"two\n".as_slice()));
        assert_eq!(s.next().unwrap().as_deref(), Some(b"three\n".as_slice()));
        assert_eq!(s.next().unwrap(), None);
    }

    #[test]
    fn tracks_position() {
        let mut s = scanner_of("abc\nde\nf\n");
        s.next().unwrap();
        assert_eq!(s.position(), (1, 0));
        s.next().unwrap();
        assert_eq!(s.position(), (2, 4));
        s.next().unwrap();
        assert_eq!(s.position(), (3, 7));
    }

    #[test]
    fn push_back_then_next_reproduces_position() {
        let mut s = scanner_of("abc\nde\nf\n");
        s.next().unwrap();
        let line = s.next().unwrap().unwrap();
        let pos_before_pushback = s.position();
        s.push_back(line.clone());
        let again = s.next().unwrap().unwrap();
        assert_eq!(again, line);
        assert_eq!(s.position(), pos_before_pushback);
    }

    #[test]
    fn shared_position_reflects_reads() {
        let shared = SharedPosition::new();
        let mut s = scanner_of("abc\nde\n").with_shared_position(shared.clone());
        assert_eq!(shared.get(), (0, 0));
        s.next().unwrap();
        assert_eq!(shared.get(), (1, 0));
        s.next().unwrap();
        assert_eq!(shared.get(), (2, 4));
    }

    #[test]
    fn reads_a_line_with_non_utf8_bytes() {
        // A latin1-charset dump row: 0xE9 is not valid UTF-8 on its own.
        let mut raw = b"INSERT INTO `t` VALUES (1,'caf\xE9');\n".to_vec();
        raw.extend_from_slice(b"next\n");
        let mut s = Scanner::new(Cursor::new(raw.as_slice()));
        let first = s.next().unwrap().unwrap();
        assert!(first.starts_with(b"INSERT INTO"));
        assert!(first.contains(&0xE9));
        assert_eq!(s.next().unwrap().as_deref(), Some(b"next\n".as_slice()));
    }
}
