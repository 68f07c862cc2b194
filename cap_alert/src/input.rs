//! ABOUTME: Read-once, replayable document buffer
//! ABOUTME: The namespace sniff, schema check and parse all run over the same bytes

use std::io::{self, BufRead, Read};

/// A document read fully into memory, consumable repeatedly via [`CachedInput::reset`]
#[derive(Debug, Clone)]
pub struct CachedInput {
    bytes: Vec<u8>,
    position: usize,
}

impl CachedInput {
    /// Drain `source` exactly once
    pub fn from_reader<R: Read>(mut source: R) -> io::Result<Self> {
        let mut bytes = Vec::new();
        source.read_to_end(&mut bytes)?;
        Ok(Self::from_bytes(bytes))
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            position: 0,
        }
    }

    /// Rewind to the first byte
    pub fn reset(&mut self) {
        self.position = 0;
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// 1-based line and column of a byte offset, clamped to the buffer
    pub fn line_column(&self, offset: usize) -> (usize, usize) {
        let offset = offset.min(self.bytes.len());
        let before = &self.bytes[..offset];
        let line = before.iter().filter(|b| **b == b'\n').count() + 1;
        let line_start = before
            .iter()
            .rposition(|b| *b == b'\n')
            .map_or(0, |i| i + 1);
        let column = String::from_utf8_lossy(&before[line_start..]).chars().count() + 1;
        (line, column)
    }
}

impl Read for CachedInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl BufRead for CachedInput {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        Ok(&self.bytes[self.position..])
    }

    fn consume(&mut self, amt: usize) {
        self.position = (self.position + amt).min(self.bytes.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingReader<'a> {
        inner: &'a [u8],
        reads: &'a mut usize,
    }

    impl Read for CountingReader<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            *self.reads += 1;
            self.inner.read(buf)
        }
    }

    #[test]
    fn test_reset_replays_same_bytes() {
        let mut input = CachedInput::from_bytes("<alert/>");
        let mut first = String::new();
        input.read_to_string(&mut first).unwrap();
        input.reset();
        let mut second = String::new();
        input.read_to_string(&mut second).unwrap();
        assert_eq!(first, second);
        assert_eq!(input.len(), 8);
    }

    #[test]
    fn test_source_is_drained_once() {
        let mut reads = 0;
        let reader = CountingReader {
            inner: b"<alert/>",
            reads: &mut reads,
        };
        let mut input = CachedInput::from_reader(reader).unwrap();
        let after_load = reads;
        for _ in 0..3 {
            let mut text = String::new();
            input.read_to_string(&mut text).unwrap();
            input.reset();
        }
        assert_eq!(reads, after_load);
    }

    #[test]
    fn test_as_bytes_through_mutable_borrow() {
        let mut owned = CachedInput::from_bytes("<alert/>");
        let input = &mut owned;
        input.consume(3);
        let bytes: &[u8] = input.as_bytes();
        assert_eq!(bytes, b"<alert/>");
    }

    #[test]
    fn test_line_column() {
        let input = CachedInput::from_bytes("ab\ncd\nef");
        assert_eq!(input.line_column(0), (1, 1));
        assert_eq!(input.line_column(4), (2, 2));
        assert_eq!(input.line_column(100), (3, 3));
    }
}
