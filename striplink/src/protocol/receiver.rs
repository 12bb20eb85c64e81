//! Frame receiver state machine.
//!
//! The receiver consumes complete lines and never blocks. Each line either
//! advances the state or is dropped; noise resolves itself on the next `STX`
//! or `ENQ`. Writing the reply and handing over the frame is left to the
//! caller through [`Step`], so the machine itself does no I/O.
//!
//! ```text
//!            ENQ (announce)
//!             +---+
//!             v   |
//!  +------> IDLE -+---- STX (clear buffer) ----> RECEIVING <--+
//!  |         ^                                     |   |      |
//!  |         |                                 ETX |   +------+
//!  |         | ACK (deliver) / ETX (abort)         v   payload line
//!  |         +------------------- WAITING <--- PROCESSING
//!  |                                            (reply ACK:<crc>)
//! reset (reconnect)
//! ```

use crate::protocol::checksum::normalize_and_checksum;
use crate::protocol::marker::{Marker, format_ack};
use log::debug;
use std::fmt;

/// Receiver state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReceiverState {
    /// Waiting for `STX` or `ENQ`.
    #[default]
    Idle,
    /// Buffering payload lines until `ETX`.
    Receiving,
    /// Checksum computed, acknowledgement about to go out.
    Processing,
    /// Acknowledgement sent, waiting for the sender's `ACK` or `ETX`.
    Waiting,
}

impl fmt::Display for ReceiverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "IDLE",
            Self::Receiving => "RECEIVING",
            Self::Processing => "PROCESSING",
            Self::Waiting => "WAITING",
        })
    }
}

/// Outcome of feeding one line.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Step {
    /// Line to write back to the peer.
    pub reply: Option<String>,
    /// Frame confirmed by the peer, ready for the payload consumer.
    pub frame: Option<Vec<String>>,
    /// Whether the line was acted upon (false when it was dropped).
    pub handled: bool,
}

impl Step {
    fn ignored() -> Self {
        Self::default()
    }

    fn handled() -> Self {
        Self {
            handled: true,
            ..Self::default()
        }
    }
}

/// Assembles inbound frames and produces acknowledgements.
#[derive(Debug)]
pub struct FrameReceiver {
    name: String,
    state: ReceiverState,
    buffer: Vec<String>,
    announcement: String,
    last_checksum: Option<u32>,
}

impl FrameReceiver {
    /// Create a receiver for the named port, answering `ENQ` with `announcement`.
    pub fn new(name: impl Into<String>, announcement: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: ReceiverState::Idle,
            buffer: Vec::new(),
            announcement: announcement.into(),
            last_checksum: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> ReceiverState {
        self.state
    }

    /// Payload lines buffered for the frame in flight.
    pub fn buffer(&self) -> &[String] {
        &self.buffer
    }

    /// Checksum of the last frame that reached `ETX`.
    pub fn last_checksum(&self) -> Option<u32> {
        self.last_checksum
    }

    /// Return to `IDLE`, discarding any frame in flight.
    pub fn reset(&mut self) {
        if self.state != ReceiverState::Idle || !self.buffer.is_empty() {
            debug!("[{}] reset: {} -> {}", self.name, self.state, ReceiverState::Idle);
        }
        self.state = ReceiverState::Idle;
        self.buffer.clear();
    }

    /// Feed one complete line.
    pub fn process_line(&mut self, line: &str) -> Step {
        let marker = Marker::parse(line);

        match (self.state, marker) {
            (ReceiverState::Idle, Some(Marker::Enquire)) => {
                debug!("[{}] {line}: {} -> {}", self.name, self.state, self.state);
                Step {
                    reply: Some(self.announcement.clone()),
                    ..Step::handled()
                }
            },
            (ReceiverState::Idle, Some(Marker::Start)) => {
                self.transition(line, ReceiverState::Receiving);
                self.buffer.clear();
                Step::handled()
            },
            (ReceiverState::Receiving, Some(Marker::End)) => {
                self.transition(line, ReceiverState::Processing);
                let checksum = normalize_and_checksum(&self.buffer);
                self.last_checksum = Some(checksum);
                debug!(
                    "[{}] {} lines, CRC: {checksum}",
                    self.name,
                    self.buffer.len()
                );
                self.transition(line, ReceiverState::Waiting);
                Step {
                    reply: Some(format_ack(checksum)),
                    ..Step::handled()
                }
            },
            (ReceiverState::Receiving, _) => {
                debug!("[{}] {line}: {} - added to buffer", self.name, self.state);
                self.buffer.push(line.to_string());
                Step::handled()
            },
            (ReceiverState::Waiting, Some(Marker::Ack)) => {
                self.transition(line, ReceiverState::Idle);
                Step {
                    frame: Some(std::mem::take(&mut self.buffer)),
                    ..Step::handled()
                }
            },
            (ReceiverState::Waiting | ReceiverState::Processing, Some(Marker::End)) => {
                self.transition(line, ReceiverState::Idle);
                self.buffer.clear();
                Step::handled()
            },
            _ => {
                debug!("[{}] {line}: {} (ignoring)", self.name, self.state);
                Step::ignored()
            },
        }
    }

    fn transition(&mut self, line: &str, next: ReceiverState) {
        debug!("[{}] {line}: {} -> {next}", self.name, self.state);
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::checksum::message_checksum;

    const ANNOUNCEMENT: &str = r#"POTERION IOT:{"name": "test", "features": [], "properties": []}"#;

    fn receiver() -> FrameReceiver {
        FrameReceiver::new("test", ANNOUNCEMENT)
    }

    fn feed(receiver: &mut FrameReceiver, lines: &[&str]) -> Vec<Step> {
        lines
            .iter()
            .map(|line| receiver.process_line(line))
            .collect()
    }

    #[test]
    fn test_enquire_replies_with_announcement() {
        let mut rx = receiver();
        let step = rx.process_line("ENQ");
        assert_eq!(step.reply.as_deref(), Some(ANNOUNCEMENT));
        assert!(step.handled);
        assert_eq!(rx.state(), ReceiverState::Idle);
    }

    #[test]
    fn test_full_frame_is_acknowledged_and_delivered() {
        let mut rx = receiver();
        let steps = feed(&mut rx, &["STX", "HELLO", "WORLD", "ETX"]);

        let expected = message_checksum("HELLO\nWORLD");
        assert_eq!(steps[3].reply, Some(format!("ACK:{expected}")));
        assert_eq!(rx.state(), ReceiverState::Waiting);
        assert_eq!(rx.last_checksum(), Some(expected));

        let step = rx.process_line("ACK");
        assert_eq!(
            step.frame,
            Some(vec!["HELLO".to_string(), "WORLD".to_string()])
        );
        assert_eq!(rx.state(), ReceiverState::Idle);
        assert!(rx.buffer().is_empty());
    }

    #[test]
    fn test_payload_lines_are_kept_verbatim() {
        let mut rx = receiver();
        feed(&mut rx, &["STX", "  padded  ", "{\"r\":255}", "ETX"]);
        assert_eq!(rx.buffer(), ["  padded  ", "{\"r\":255}"]);
        assert_eq!(
            rx.last_checksum(),
            Some(normalize_and_checksum(["  padded  ", "{\"r\":255}"]))
        );
    }

    #[test]
    fn test_empty_frame() {
        let mut rx = receiver();
        let steps = feed(&mut rx, &["STX", "ETX", "ACK"]);
        assert_eq!(steps[1].reply.as_deref(), Some("ACK:0"));
        assert_eq!(steps[2].frame, Some(Vec::new()));
    }

    #[test]
    fn test_idle_ignores_everything_but_start_and_enquire() {
        let mut rx = receiver();
        for line in ["ETX", "ACK", "ACK:123", "hello", "stx", "   "] {
            let step = rx.process_line(line);
            assert_eq!(step, Step::default(), "line {line:?}");
            assert_eq!(rx.state(), ReceiverState::Idle);
            assert!(rx.buffer().is_empty());
        }
    }

    #[test]
    fn test_receiving_buffers_everything_but_end() {
        let mut rx = receiver();
        feed(&mut rx, &["STX", "one", "STX", "ENQ", "ACK", "   ", "two"]);
        assert_eq!(rx.state(), ReceiverState::Receiving);
        assert_eq!(rx.buffer(), ["one", "STX", "ENQ", "ACK", "   ", "two"]);
    }

    #[test]
    fn test_waiting_abort_on_end_drops_frame() {
        let mut rx = receiver();
        let steps = feed(&mut rx, &["STX", "payload", "ETX", "ETX"]);
        assert!(steps[3].frame.is_none());
        assert_eq!(rx.state(), ReceiverState::Idle);
        assert!(rx.buffer().is_empty());
    }

    #[test]
    fn test_waiting_ignores_noise() {
        let mut rx = receiver();
        feed(&mut rx, &["STX", "payload", "ETX"]);
        for line in ["noise", "STX", "ENQ", "ACK:1"] {
            assert!(!rx.process_line(line).handled);
            assert_eq!(rx.state(), ReceiverState::Waiting);
        }
        assert_eq!(rx.buffer(), ["payload"]);
    }

    #[test]
    fn test_reset_burst_resynchronizes_from_any_state() {
        let prefixes: [&[&str]; 3] = [
            &[],
            &["STX", "stale"],
            &["STX", "stale", "ETX"],
        ];
        for prefix in prefixes {
            let mut rx = receiver();
            feed(&mut rx, prefix);
            feed(&mut rx, &["ETX", "ETX", "ETX", "STX"]);
            assert_eq!(rx.state(), ReceiverState::Receiving, "prefix {prefix:?}");
            assert!(rx.buffer().is_empty(), "prefix {prefix:?}");
        }
    }

    #[test]
    fn test_reset_discards_frame_in_flight() {
        let mut rx = receiver();
        feed(&mut rx, &["STX", "partial"]);
        rx.reset();
        assert_eq!(rx.state(), ReceiverState::Idle);
        assert!(rx.buffer().is_empty());
        assert!(rx.process_line("ACK").frame.is_none());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ReceiverState::Idle.to_string(), "IDLE");
        assert_eq!(ReceiverState::Waiting.to_string(), "WAITING");
    }
}
