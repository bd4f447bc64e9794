//! Receive buffer that reassembles `\r\n`-delimited lines.
//!
//! The serial channel delivers bytes in whatever chunks the UART happens to
//! have ready. `LineBuffer` accumulates them and hands out complete lines one
//! at a time, keeping everything after the consumed delimiter for the next
//! call so a single read can be drained line by line.

/// Line delimiter used by the AT firmware in both directions.
pub const LINE_DELIMITER: &[u8] = b"\r\n";

/// Accumulation buffer for bytes received from the module.
#[derive(Debug, Clone, Default)]
pub struct LineBuffer {
    data: Vec<u8>,
}

impl LineBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append newly received bytes to the tail.
    pub fn append(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Whether a delimiter is present anywhere in the buffer.
    pub fn has_complete_line(&self) -> bool {
        self.delimiter_position().is_some()
    }

    /// Remove and return the first complete line, without its delimiter.
    ///
    /// Returns `None` when no delimiter has been received yet. Bytes after
    /// the delimiter are left in place.
    pub fn take_line(&mut self) -> Option<String> {
        let end = self.delimiter_position()?;
        let line = String::from_utf8_lossy(&self.data[..end]).into_owned();
        self.data.drain(..end + LINE_DELIMITER.len());
        Some(line)
    }

    /// Bytes received so far that do not yet form a complete line.
    ///
    /// Only meaningful once every complete line has been taken.
    pub fn pending(&self) -> &[u8] {
        &self.data
    }

    /// Whether the buffered bytes contain `needle`.
    pub fn pending_contains(&self, needle: &str) -> bool {
        let needle = needle.as_bytes();
        if needle.is_empty() {
            return true;
        }
        self.data.windows(needle.len()).any(|w| w == needle)
    }

    /// Remove and return everything buffered, terminated or not.
    pub fn take_pending(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.data).into_owned();
        self.data.clear();
        text
    }

    /// Drop all buffered bytes.
    pub fn reset(&mut self) {
        self.data.clear();
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn delimiter_position(&self) -> Option<usize> {
        self.data
            .windows(LINE_DELIMITER.len())
            .position(|w| w == LINE_DELIMITER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn drain(buffer: &mut LineBuffer) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = buffer.take_line() {
            lines.push(line);
        }
        lines
    }

    #[test]
    fn test_single_line() {
        let mut buffer = LineBuffer::new();
        buffer.append(b"OK\r\n");

        assert!(buffer.has_complete_line());
        assert_eq!(buffer.take_line(), Some("OK".to_string()));
        assert!(buffer.is_empty());
        assert_eq!(buffer.take_line(), None);
    }

    #[test]
    fn test_remainder_is_kept() {
        let mut buffer = LineBuffer::new();
        buffer.append(b"busy p...\r\nSEND OK\r\n+IPD,5:");

        assert_eq!(buffer.take_line(), Some("busy p...".to_string()));
        assert_eq!(buffer.take_line(), Some("SEND OK".to_string()));
        assert!(!buffer.has_complete_line());
        assert_eq!(buffer.pending(), b"+IPD,5:");
    }

    #[test]
    fn test_delimiter_split_across_chunks() {
        let mut buffer = LineBuffer::new();
        buffer.append(b"WIFI GOT IP\r");
        assert!(!buffer.has_complete_line());

        buffer.append(b"\nOK");
        assert_eq!(buffer.take_line(), Some("WIFI GOT IP".to_string()));
        assert_eq!(buffer.pending(), b"OK");
    }

    #[test]
    fn test_empty_lines() {
        let mut buffer = LineBuffer::new();
        buffer.append(b"\r\n\r\nready\r\n");

        assert_eq!(drain(&mut buffer), vec!["", "", "ready"]);
    }

    #[test]
    fn test_bare_carriage_return_is_not_a_delimiter() {
        let mut buffer = LineBuffer::new();
        buffer.append(b"a\rb\nc");

        assert!(!buffer.has_complete_line());
        assert_eq!(buffer.len(), 5);
    }

    #[test]
    fn test_arbitrary_chunking_yields_same_lines() {
        let input: &[u8] =
            b"AT+CIPSTATUS\r\nSTATUS:2\r\n+CIPSTATUS:0,\"TCP\"\r\n\r\nOK\r\ntrailing";
        let expected = vec!["AT+CIPSTATUS", "STATUS:2", "+CIPSTATUS:0,\"TCP\"", "", "OK"];

        for chunk_size in 1..=input.len() {
            let mut buffer = LineBuffer::new();
            let mut lines = Vec::new();
            for chunk in input.chunks(chunk_size) {
                buffer.append(chunk);
                lines.extend(drain(&mut buffer));
            }
            assert_eq!(lines, expected, "chunk size {}", chunk_size);
            assert_eq!(buffer.pending(), b"trailing");
        }
    }

    #[test]
    fn test_pending_contains_and_take() {
        let mut buffer = LineBuffer::new();
        buffer.append(b"+IPD,2:42");

        assert!(buffer.pending_contains("42"));
        assert!(!buffer.pending_contains("OK"));
        assert_eq!(buffer.take_pending(), "+IPD,2:42");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_reset() {
        let mut buffer = LineBuffer::new();
        buffer.append(b"stale\r\npartial");
        buffer.reset();

        assert!(buffer.is_empty());
        assert!(!buffer.has_complete_line());
    }
}
