//! Control tokens of the line protocol.
//!
//! Every frame is a sequence of text lines. Four reserved line values steer
//! the exchange; a line that equals one of them (after trimming) is control,
//! never payload.
//!
//! ```text
//! host                          controller
//!  | ETX (x8, resets the peer)      |
//!  | STX                            |
//!  | <payload line> ...             |
//!  | ETX                            |
//!  |            ACK:<crc32 decimal> |
//!  | ACK (x3)                       |
//! ```

use std::fmt;

/// Terminator appended to every line written to the wire.
pub const LINE_TERMINATOR: &str = "\n\r";

/// Separator between `ACK` and the checksum in an acknowledgement line.
const ACK_SEPARATOR: char = ':';

/// A reserved line value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// Begin frame (`STX`).
    Start,
    /// End frame, or abort a frame awaiting confirmation (`ETX`).
    End,
    /// Ask the peer for its capability announcement (`ENQ`).
    Enquire,
    /// Confirm delivery (`ACK`).
    Ack,
}

impl Marker {
    /// The exact text of this marker on the wire.
    pub const fn token(self) -> &'static str {
        match self {
            Self::Start => "STX",
            Self::End => "ETX",
            Self::Enquire => "ENQ",
            Self::Ack => "ACK",
        }
    }

    /// Interpret a whole line as a marker.
    ///
    /// Surrounding whitespace is ignored; anything else must match exactly,
    /// so `ACK:123` is not the bare `ACK` marker.
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            "STX" => Some(Self::Start),
            "ETX" => Some(Self::End),
            "ENQ" => Some(Self::Enquire),
            "ACK" => Some(Self::Ack),
            _ => None,
        }
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Build the acknowledgement line for a checksum (`ACK:<decimal>`).
pub fn format_ack(checksum: u32) -> String {
    format!("{}{ACK_SEPARATOR}{checksum}", Marker::Ack.token())
}

/// Extract the checksum from an `ACK:<decimal>` line.
///
/// Returns `None` for the bare `ACK` marker and for malformed values.
pub fn parse_ack(line: &str) -> Option<u32> {
    line.trim()
        .strip_prefix(Marker::Ack.token())?
        .strip_prefix(ACK_SEPARATOR)?
        .parse()
        .ok()
}
