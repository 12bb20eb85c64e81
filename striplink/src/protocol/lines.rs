//! Line splitting over a chunked byte stream.
//!
//! The serial link delivers bytes in chunks of arbitrary size. A chunk may
//! end in the middle of a line; that tail is kept as the fragment and glued
//! to the front of the next chunk.

/// Whether a byte separates lines (`\n` or `\r`; runs count as one).
fn is_separator(byte: u8) -> bool {
    byte == b'\n' || byte == b'\r'
}

/// Turns raw byte chunks into complete lines.
///
/// The fragment is held as raw bytes, so a multi-byte UTF-8 character split
/// across two chunks is decoded intact. Complete lines are decoded lossily.
/// Empty lines never come out: a run of separators is a single separator.
#[derive(Debug, Default, Clone)]
pub struct LineSplitter {
    rest: Vec<u8>,
}

impl LineSplitter {
    /// Create a splitter with an empty fragment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk, returning every line it completes, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut start = 0;

        for (i, &byte) in chunk.iter().enumerate() {
            if !is_separator(byte) {
                continue;
            }
            self.rest.extend_from_slice(&chunk[start..i]);
            if !self.rest.is_empty() {
                lines.push(String::from_utf8_lossy(&self.rest).into_owned());
                self.rest.clear();
            }
            start = i + 1;
        }

        self.rest.extend_from_slice(&chunk[start..]);
        lines
    }

    /// The not-yet-terminated tail carried to the next chunk.
    pub fn fragment(&self) -> &[u8] {
        &self.rest
    }

    /// Drop the fragment.
    pub fn reset(&mut self) {
        self.rest.clear();
    }
}
