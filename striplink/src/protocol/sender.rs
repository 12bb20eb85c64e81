//! Frame sender: push one frame and retry until the peer echoes its checksum.
//!
//! ## Exchange
//!
//! ```text
//! attempt n (n <= max_attempts):
//!   purge, ETX x reset_burst, STX, <message>, ETX
//!   read lines until ACK:<crc> or ack_timeout
//!   success when <crc> == crc32(message without separators)
//! after the loop:
//!   ACK x ack_burst, close
//! ```
//!
//! The leading `ETX` burst pushes a receiver stuck in `RECEIVING` or
//! `WAITING` back to `IDLE` before the new frame starts. The trailing `ACK`
//! burst confirms the last acknowledged frame.
//!
//! Exhausting the attempts is not an error: [`FrameSender::send`] returns
//! `false` and the caller decides what to do next.

use crate::error::{Error, Result};
use crate::is_interrupted_requested;
use crate::port::{Purge, Transport};
use crate::protocol::announce::{ANNOUNCE_PREFIX, Capabilities};
use crate::protocol::checksum::message_checksum;
use crate::protocol::lines::LineSplitter;
use crate::protocol::marker::{Marker, parse_ack};
use log::{debug, info, trace, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Frame sender configuration.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Attempts before giving up.
    pub max_attempts: u32,
    /// How long one attempt waits for the acknowledgement.
    pub ack_timeout: Duration,
    /// Pause between reads that returned nothing.
    pub poll_interval: Duration,
    /// `ETX` lines sent ahead of every frame.
    pub reset_burst: usize,
    /// `ACK` lines sent after the last attempt.
    pub ack_burst: usize,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            ack_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(100),
            reset_burst: 8,
            ack_burst: 3,
        }
    }
}

/// Handle that aborts a running [`FrameSender::send`] from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Request cancellation.
    pub fn cancel(&self) {
        self.0
            .store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0
            .load(Ordering::Relaxed)
    }

    /// Clear a pending request.
    ///
    /// The sender clears it itself once a send or enquiry returns.
    pub fn reset(&self) {
        self.0
            .store(false, Ordering::Relaxed);
    }
}

/// Result of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    /// Attempt number, starting at 1.
    pub number: u32,
    /// Checksum the peer echoed, if any arrived in time.
    pub received: Option<u32>,
    /// Checksum computed locally.
    pub expected: u32,
}

impl Attempt {
    /// Whether the echoed checksum matched.
    pub fn succeeded(&self) -> bool {
        self.received == Some(self.expected)
    }
}

/// Drives the sending side of the protocol over a transport it owns.
pub struct FrameSender<T: Transport> {
    transport: T,
    config: SenderConfig,
    splitter: LineSplitter,
    cancel: CancelHandle,
}

impl<T: Transport> FrameSender<T> {
    /// Create a sender with the default configuration.
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, SenderConfig::default())
    }

    /// Create a sender with a custom configuration.
    pub fn with_config(transport: T, config: SenderConfig) -> Self {
        Self {
            transport,
            config,
            splitter: LineSplitter::new(),
            cancel: CancelHandle::default(),
        }
    }

    /// Handle for cancelling a send in progress.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel
            .clone()
    }

    /// Give the transport back.
    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Send one message, retrying until the peer confirms it.
    pub fn send(&mut self, message: &str) -> bool {
        self.send_with_progress(message, |_| {})
    }

    /// Like [`send`](Self::send), reporting every finished attempt.
    pub fn send_with_progress<F>(&mut self, message: &str, mut progress: F) -> bool
    where
        F: FnMut(&Attempt),
    {
        let name = self
            .transport
            .name()
            .to_string();

        if let Err(e) = self.prepare() {
            warn!("[{name}] Cannot open port for sending: {e}");
            self.cancel
                .reset();
            return false;
        }

        let expected = message_checksum(message);
        let mut attempts = 0;
        let mut success = false;

        while attempts < self.config.max_attempts && !self.should_stop() {
            attempts += 1;
            debug!("[{name}] Sending attempt {attempts}");

            let received = match self.attempt(message) {
                Ok(received) => received,
                Err(e) => {
                    warn!("[{name}] Attempt {attempts} failed: {e}");
                    None
                },
            };
            let attempt = Attempt {
                number: attempts,
                received,
                expected,
            };
            info!(
                "[{name}] Attempt {attempts}: received {:?}, calculated {expected}",
                attempt.received
            );
            progress(&attempt);

            if attempt.succeeded() {
                success = true;
                break;
            }
        }

        self.finish();
        if success {
            info!("[{name}] Sending SUCCESSFUL after {attempts} attempt(s)");
        } else {
            warn!("[{name}] Sending FAILED after {attempts} attempt(s)");
        }
        success
    }

    /// Ask the peer to announce itself.
    pub fn enquire(&mut self) -> Result<Capabilities> {
        let result = self
            .prepare()
            .and_then(|()| self.enquire_once());
        if let Err(e) = self
            .transport
            .close()
        {
            debug!("[{}] Close after enquiry failed: {e}", self.transport.name());
        }
        self.cancel
            .reset();
        result
    }

    fn enquire_once(&mut self) -> Result<Capabilities> {
        self.set_mode_write()?;
        self.transport
            .write_line(Marker::Enquire.token())?;

        let line = self
            .wait_for_line(|line| line.trim_start().starts_with(ANNOUNCE_PREFIX))?
            .ok_or_else(|| Error::Timeout("no capability announcement".into()))?;
        Capabilities::parse_announcement(&line)
    }

    fn prepare(&mut self) -> Result<()> {
        if !self
            .transport
            .is_open()
        {
            self.transport
                .open()?;
        }
        Ok(())
    }

    fn attempt(&mut self, message: &str) -> Result<Option<u32>> {
        self.set_mode_write()?;
        for _ in 0..self.config.reset_burst {
            self.transport
                .write_line(Marker::End.token())?;
        }
        self.transport
            .write_line(Marker::Start.token())?;
        self.transport
            .write_line(message)?;
        self.transport
            .write_line(Marker::End.token())?;

        Ok(self
            .wait_for_line(|line| parse_ack(line).is_some())?
            .and_then(|line| parse_ack(&line)))
    }

    fn finish(&mut self) {
        let name = self
            .transport
            .name()
            .to_string();
        if self
            .transport
            .is_open()
        {
            for _ in 0..self.config.ack_burst {
                if let Err(e) = self
                    .transport
                    .write_line(Marker::Ack.token())
                {
                    warn!("[{name}] Cannot write closing ACK: {e}");
                    break;
                }
            }
        }
        if let Err(e) = self
            .transport
            .close()
        {
            debug!("[{name}] Close after sending failed: {e}");
        }
        self.cancel
            .reset();
    }

    /// Purge both directions and forget any half-read line.
    fn set_mode_write(&mut self) -> Result<()> {
        self.transport
            .purge(Purge::All)?;
        self.splitter
            .reset();
        Ok(())
    }

    /// Read lines until one matches or the acknowledgement timeout expires.
    fn wait_for_line<P>(&mut self, matches: P) -> Result<Option<String>>
    where
        P: Fn(&str) -> bool,
    {
        let deadline = Instant::now() + self.config.ack_timeout;

        while Instant::now() < deadline {
            if self.should_stop() {
                debug!("[{}] Wait cancelled", self.transport.name());
                return Ok(None);
            }

            let chunk = self
                .transport
                .read_available()?;
            if chunk.is_empty() {
                std::thread::sleep(self.config.poll_interval);
                continue;
            }

            for line in self
                .splitter
                .push(&chunk)
            {
                trace!("[{}] Received: {line:?}", self.transport.name());
                if matches(&line) {
                    return Ok(Some(line));
                }
            }
        }

        Ok(None)
    }

    fn should_stop(&self) -> bool {
        self.cancel
            .is_cancelled()
            || is_interrupted_requested()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::mock::{MockTransport, OpenFailure};
    use crate::protocol::marker::format_ack;
    use crate::protocol::receiver::FrameReceiver;
    use std::sync::Mutex;

    fn fast_config() -> SenderConfig {
        let _ = env_logger::builder().is_test(true).try_init();
        SenderConfig {
            ack_timeout: Duration::from_millis(30),
            poll_interval: Duration::from_millis(1),
            ..SenderConfig::default()
        }
    }

    #[test]
    fn test_sender_config_default() {
        let config = SenderConfig::default();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.ack_timeout, Duration::from_secs(5));
        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert_eq!(config.reset_burst, 8);
        assert_eq!(config.ack_burst, 3);
    }

    /// Peer running a real receiver behind the mock wire.
    fn attach_receiver(mock: &MockTransport) -> Arc<Mutex<Vec<Vec<String>>>> {
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&delivered);
        let mut receiver = FrameReceiver::new("peer", "POTERION IOT:{}");
        let mut splitter = LineSplitter::new();
        mock.set_responder(move |text| {
            let mut reply = Vec::new();
            for line in splitter.push(format!("{text}\n\r").as_bytes()) {
                let step = receiver.process_line(&line);
                if let Some(frame) = step.frame {
                    sink.lock()
                        .unwrap()
                        .push(frame);
                }
                if let Some(out) = step.reply {
                    reply.extend_from_slice(out.as_bytes());
                    reply.extend_from_slice(b"\n\r");
                }
            }
            (!reply.is_empty()).then_some(reply)
        });
        delivered
    }

    #[test]
    fn test_send_succeeds_against_receiver() {
        let mock = MockTransport::new();
        let delivered = attach_receiver(&mock);

        let mut sender = FrameSender::with_config(mock.clone(), fast_config());
        assert!(sender.send("HELLO\nWORLD"));

        assert_eq!(mock.count_written("STX"), 1);
        assert_eq!(mock.count_written("ETX"), 9);
        assert_eq!(mock.count_written("ACK"), 3);
        assert_eq!(
            *delivered.lock().unwrap(),
            vec![vec!["HELLO".to_string(), "WORLD".to_string()]]
        );
        assert!(!mock.state().open);
    }

    #[test]
    fn test_frame_layout_on_the_wire() {
        let mock = MockTransport::new();
        let config = SenderConfig {
            max_attempts: 1,
            reset_burst: 2,
            ack_burst: 1,
            ..fast_config()
        };
        let mut sender = FrameSender::with_config(mock.clone(), config);
        assert!(!sender.send("payload"));
        assert_eq!(
            mock.written(),
            vec!["ETX", "ETX", "STX", "payload", "ETX", "ACK"]
        );
    }

    #[test]
    fn test_silent_peer_exhausts_exactly_five_attempts() {
        let mock = MockTransport::new();
        let mut sender = FrameSender::with_config(mock.clone(), fast_config());

        let mut attempts = Vec::new();
        let started = Instant::now();
        let ok = sender.send_with_progress("HELLO", |a| attempts.push(*a));

        assert!(!ok);
        assert_eq!(attempts.len(), 5);
        assert_eq!(
            attempts
                .iter()
                .map(|a| a.number)
                .collect::<Vec<_>>(),
            vec![1, 2, 3, 4, 5]
        );
        assert!(attempts.iter().all(|a| a.received.is_none()));
        assert_eq!(mock.count_written("STX"), 5);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_wrong_checksum_retries_then_succeeds() {
        let mock = MockTransport::new();
        let expected = message_checksum("HELLO");
        let mut frames = 0;
        mock.set_responder(move |text| {
            if text != "ETX" {
                return None;
            }
            frames += 1;
            // Every 9th ETX closes a frame: 8 in the burst, then the trailer.
            match frames {
                9 => Some(format!("{}\n\r", format_ack(expected ^ 1)).into_bytes()),
                18 => Some(format!("{}\n\r", format_ack(expected)).into_bytes()),
                _ => None,
            }
        });

        let mut sender = FrameSender::with_config(mock.clone(), fast_config());
        let mut attempts = Vec::new();
        assert!(sender.send_with_progress("HELLO", |a| attempts.push(*a)));
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].received, Some(expected ^ 1));
        assert!(attempts[1].succeeded());
    }

    #[test]
    fn test_ack_split_across_chunks() {
        let mock = MockTransport::new();
        let line = format!("noise\n\r{}\n\r", format_ack(message_checksum("HI")));
        let (head, tail) = line.split_at(10);
        mock.push_inbound(head.as_bytes());
        mock.push_inbound(tail.as_bytes());

        let mut sender = FrameSender::with_config(mock.clone(), fast_config());
        assert!(sender.send("HI"));
        assert_eq!(mock.count_written("STX"), 1);
    }

    #[test]
    fn test_cancel_stops_after_current_attempt() {
        let mock = MockTransport::new();
        let mut sender = FrameSender::with_config(mock.clone(), fast_config());
        let handle = sender.cancel_handle();
        let mut attempts = 0;
        let ok = sender.send_with_progress("HELLO", |_| {
            attempts += 1;
            handle.cancel();
        });
        assert!(!ok);
        assert_eq!(attempts, 1);
        assert!(!handle.is_cancelled());
    }

    #[test]
    fn test_cancel_before_send_is_kept() {
        let mock = MockTransport::new();
        let delivered = attach_receiver(&mock);
        let mut sender = FrameSender::with_config(mock.clone(), fast_config());
        let handle = sender.cancel_handle();

        handle.cancel();
        let mut attempts = 0;
        assert!(!sender.send_with_progress("HELLO", |_| attempts += 1));
        assert_eq!(attempts, 0);
        assert!(!handle.is_cancelled());

        assert!(sender.send("HELLO"));
        assert_eq!(delivered.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_open_failure_returns_false() {
        let mock = MockTransport::new();
        mock.fail_next_open(OpenFailure::Busy);
        let mut sender = FrameSender::with_config(mock.clone(), fast_config());
        assert!(!sender.send("HELLO"));
        assert!(mock.written().is_empty());
    }

    #[test]
    fn test_enquire_parses_announcement() {
        let mock = MockTransport::new();
        let caps = Capabilities::new("Desk").with_features(["light-strip"]);
        let line = caps.announcement().unwrap();
        mock.set_responder(move |text| {
            (text == "ENQ").then(|| format!("{line}\n\r").into_bytes())
        });

        let mut sender = FrameSender::with_config(mock.clone(), fast_config());
        assert_eq!(sender.enquire().unwrap(), caps);
        assert!(!mock.state().open);
    }

    #[test]
    fn test_enquire_times_out() {
        let mock = MockTransport::new();
        let mut sender = FrameSender::with_config(mock, fast_config());
        assert!(matches!(sender.enquire(), Err(Error::Timeout(_))));
    }
}
