//! Splits a byte stream into command lines.

use thiserror::Error;

/// Longest partial line a client may leave buffered.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Framing failures. Each one ends the session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FramerError {
    /// An unterminated line grew past [`MAX_LINE_BYTES`].
    #[error("line too long: {size} bytes exceeds {max_size} byte limit")]
    LineTooLong {
        /// Bytes buffered so far.
        size: usize,
        /// Configured limit.
        max_size: usize,
    },
}

/// Accumulates received bytes and yields complete, non-blank lines.
///
/// Lines end at `\n`; a trailing `\r` is dropped. Decoding happens once a line
/// is complete, so a multi-byte character split across reads survives.
#[derive(Debug)]
pub struct LineFramer {
    buffer: Vec<u8>,
    max_line: usize,
}

impl LineFramer {
    /// Creates a framer with the default line limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limit(MAX_LINE_BYTES)
    }

    /// Creates a framer that rejects partial lines longer than `max_line`.
    #[must_use]
    pub const fn with_limit(max_line: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_line,
        }
    }

    /// Appends `bytes` and returns every line they complete, in order.
    ///
    /// # Errors
    ///
    /// Returns [`FramerError::LineTooLong`] when the retained partial line
    /// exceeds the limit.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<String>, FramerError> {
        self.buffer.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(end) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let mut raw: Vec<u8> = self.buffer.drain(..=end).collect();
            raw.pop();
            let decoded = String::from_utf8_lossy(&raw);
            let line = decoded.strip_suffix('\r').unwrap_or(&decoded);
            if !line.trim().is_empty() {
                lines.push(line.to_owned());
            }
        }
        if self.buffer.len() > self.max_line {
            return Err(FramerError::LineTooLong {
                size: self.buffer.len(),
                max_size: self.max_line,
            });
        }
        Ok(lines)
    }

    /// Bytes of the partial line waiting for its terminator.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}
