//! Prompt-delimited output buffer.
//!
//! Accumulates raw stdout bytes from the subprocess and splits them at the
//! first occurrence of the prompt marker. Bytes read past the marker belong
//! to the *next* command's output and are retained across calls rather than
//! dropped.

use memchr::memmem;

/// Buffer for accumulating subprocess output and locating the prompt marker.
///
/// The marker is a fixed literal (e.g. `"(Pdb) "`), so detection is a plain
/// substring search rather than a regex scan.
#[derive(Debug)]
pub struct PromptBuffer {
    /// The accumulated output bytes, including any carryover from a
    /// previous split.
    buffer: Vec<u8>,

    /// The literal prompt marker to search for.
    marker: Vec<u8>,
}

impl PromptBuffer {
    /// Create a new buffer searching for the given literal marker.
    pub fn new(marker: impl Into<Vec<u8>>) -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            marker: marker.into(),
        }
    }

    /// Append newly read bytes.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Split the buffer at the first occurrence of the marker.
    ///
    /// Returns everything before the marker; the marker itself is consumed
    /// and anything after it stays buffered for the next read cycle.
    /// Returns `None` if the marker is not present.
    pub fn split_at_marker(&mut self) -> Option<Vec<u8>> {
        let pos = memmem::find(&self.buffer, &self.marker)?;
        let before: Vec<u8> = self.buffer[..pos].to_vec();
        self.buffer.drain(..pos + self.marker.len());
        Some(before)
    }

    /// Take ownership of the buffered bytes and reset.
    ///
    /// Used to flush best-effort output on EOF or timeout.
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer)
    }

    /// Get the current buffer length.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer, discarding any carryover.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_mid_buffer() {
        let mut buffer = PromptBuffer::new("(Pdb) ");
        buffer.extend(b"abc(Pdb) def");

        let before = buffer.split_at_marker().unwrap();
        assert_eq!(before, b"abc");

        // Remainder after the marker is retained for the next cycle
        assert_eq!(buffer.take(), b"def");
    }

    #[test]
    fn test_split_marker_at_start() {
        let mut buffer = PromptBuffer::new("(Pdb) ");
        buffer.extend(b"(Pdb) ");

        let before = buffer.split_at_marker().unwrap();
        assert!(before.is_empty());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_no_marker() {
        let mut buffer = PromptBuffer::new("(Pdb) ");
        buffer.extend(b"some output without a prompt\n");
        assert!(buffer.split_at_marker().is_none());
        assert_eq!(buffer.len(), 29);
    }

    #[test]
    fn test_marker_split_across_reads() {
        let mut buffer = PromptBuffer::new("(Pdb) ");
        buffer.extend(b"output\n(Pd");
        assert!(buffer.split_at_marker().is_none());

        buffer.extend(b"b) ");
        let before = buffer.split_at_marker().unwrap();
        assert_eq!(before, b"output\n");
    }

    #[test]
    fn test_only_first_marker_consumed() {
        let mut buffer = PromptBuffer::new("(Pdb) ");
        buffer.extend(b"one\n(Pdb) two\n(Pdb) ");

        assert_eq!(buffer.split_at_marker().unwrap(), b"one\n");
        assert_eq!(buffer.split_at_marker().unwrap(), b"two\n");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_take_clears_buffer() {
        let mut buffer = PromptBuffer::new("(Pdb) ");
        buffer.extend(b"partial");
        assert_eq!(buffer.take(), b"partial");
        assert!(buffer.is_empty());
    }
}
