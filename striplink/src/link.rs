//! Link session: one serial port, its receiver and the read/write mode switch.
//!
//! A [`LinkSession`] is the only owner of a port's protocol state. The inbound
//! path ([`LinkSession::poll_inbound`] or [`LinkSession::feed`]) and the
//! [`PortMonitor`](crate::monitor::PortMonitor) both go through the same lock,
//! so a reconnect can never interleave with a line being processed.
//!
//! Replies are written with the session in write mode: both buffers are
//! purged and inbound bytes are dropped until the reply is out, then the
//! output buffer is purged again and listening resumes.
//!
//! Delivered frames are handed to the consumer after the lock is released.

use crate::error::Result;
use crate::events::{EventNotifier, SignalEvent, SignalKind};
use crate::port::{ControlLines, Purge, Transport};
use crate::protocol::lines::LineSplitter;
use crate::protocol::receiver::{FrameReceiver, ReceiverState};
use log::{debug, error, info, trace};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Callback receiving every acknowledged frame, in order.
pub type FrameConsumer = Box<dyn Fn(&[String]) + Send + Sync>;

struct LinkState<T> {
    transport: T,
    listening: bool,
    splitter: LineSplitter,
    receiver: FrameReceiver,
    control: Option<ControlLines>,
    last_transition: Instant,
}

impl<T: Transport> LinkState<T> {
    fn set_mode_write(&mut self) -> Result<()> {
        self.listening = false;
        self.transport
            .purge(Purge::All)
    }

    fn set_mode_read(&mut self) -> Result<()> {
        self.transport
            .purge(Purge::Output)?;
        self.listening = true;
        Ok(())
    }

    fn write_reply(&mut self, reply: &str) -> Result<()> {
        self.set_mode_write()?;
        self.transport
            .write_line(reply)?;
        self.set_mode_read()
    }

    /// Run every complete line through the receiver; returns confirmed frames.
    fn process(&mut self, bytes: &[u8]) -> Vec<Vec<String>> {
        let mut frames = Vec::new();
        for line in self
            .splitter
            .push(bytes)
        {
            trace!("[{}] line {line:?}", self.transport.name());
            let before = self
                .receiver
                .state();
            let step = self
                .receiver
                .process_line(&line);
            if self
                .receiver
                .state()
                != before
            {
                self.last_transition = Instant::now();
            }
            if let Some(reply) = step.reply {
                if let Err(e) = self.write_reply(&reply) {
                    error!("[{}] Cannot write {reply:?}: {e}", self.transport.name());
                }
            }
            if let Some(frame) = step.frame {
                frames.push(frame);
            }
        }
        frames
    }
}

/// Protocol state of one port, shared between the reader and the monitor.
pub struct LinkSession<T: Transport> {
    name: String,
    state: Mutex<LinkState<T>>,
    notifier: EventNotifier,
    consumer: Option<FrameConsumer>,
}

impl<T: Transport> LinkSession<T> {
    /// Create a session over a (usually closed) transport.
    ///
    /// `announcement` is the line written back for every `ENQ`.
    pub fn new(transport: T, announcement: impl Into<String>) -> Self {
        let name = transport
            .name()
            .to_string();
        Self {
            notifier: EventNotifier::new(name.clone()),
            state: Mutex::new(LinkState {
                receiver: FrameReceiver::new(name.clone(), announcement),
                transport,
                listening: false,
                splitter: LineSplitter::new(),
                control: None,
                last_transition: Instant::now(),
            }),
            consumer: None,
            name,
        }
    }

    /// Set the frame consumer.
    #[must_use]
    pub fn with_consumer<F>(mut self, consumer: F) -> Self
    where
        F: Fn(&[String]) + Send + Sync + 'static,
    {
        self.consumer = Some(Box::new(consumer));
        self
    }

    /// Set the signal observer.
    #[must_use]
    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(SignalKind, bool) -> bool + Send + Sync + 'static,
    {
        self.notifier
            .set_observer(observer);
        self
    }

    /// Port name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, LinkState<T>> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Current receiver state.
    pub fn receiver_state(&self) -> ReceiverState {
        self.lock()
            .receiver
            .state()
    }

    /// Payload lines of the frame in flight.
    pub fn buffered_lines(&self) -> Vec<String> {
        self.lock()
            .receiver
            .buffer()
            .to_vec()
    }

    /// Whether the port is open.
    pub fn is_open(&self) -> bool {
        self.lock()
            .transport
            .is_open()
    }

    /// Whether inbound data is currently accepted.
    pub fn is_listening(&self) -> bool {
        let state = self.lock();
        state.listening
            && state
                .transport
                .is_open()
    }

    /// Open the port, purge it and start listening.
    pub fn open(&self) -> Result<()> {
        let mut state = self.lock();
        if !state
            .transport
            .is_open()
        {
            state
                .transport
                .open()?;
        }
        state
            .transport
            .purge(Purge::All)?;
        state.control = None;
        state.last_transition = Instant::now();
        state.set_mode_read()
    }

    /// Tear the link down: purge, close and reset the receiver.
    ///
    /// Runs under the session lock, so no line is processed against the
    /// discarded frame afterwards.
    pub fn shut_down(&self) {
        let mut state = self.lock();
        state.listening = false;
        if state
            .transport
            .is_open()
        {
            if let Err(e) = state
                .transport
                .purge(Purge::All)
            {
                debug!("[{}] Purge before close failed: {e}", self.name);
            }
        }
        if let Err(e) = state
            .transport
            .close()
        {
            debug!("[{}] Close failed: {e}", self.name);
        }
        state
            .receiver
            .reset();
        state
            .splitter
            .reset();
        state.control = None;
        info!("[{}] Link closed", self.name);
    }

    /// Read whatever the port has and process it.
    ///
    /// Returns `Ok(false)` when the port is closed or in write mode, so the
    /// caller can back off.
    pub fn poll_inbound(&self) -> Result<bool> {
        let frames = {
            let mut state = self.lock();
            if !state.listening
                || !state
                    .transport
                    .is_open()
            {
                return Ok(false);
            }
            let chunk = state
                .transport
                .read_available()?;
            if !chunk.is_empty() {
                trace!("[{}] read {} bytes", self.name, chunk.len());
            }
            state.process(&chunk)
        };
        self.deliver(&frames);
        Ok(true)
    }

    /// Process bytes handed over by a push-style transport.
    ///
    /// Bytes arriving outside read mode are dropped. Returns the number of
    /// frames delivered.
    pub fn feed(&self, bytes: &[u8]) -> usize {
        let frames = {
            let mut state = self.lock();
            if !state.listening {
                trace!("[{}] dropped {} bytes while writing", self.name, bytes.len());
                return 0;
            }
            state.process(bytes)
        };
        self.deliver(&frames);
        frames.len()
    }

    fn deliver(&self, frames: &[Vec<String>]) {
        for frame in frames {
            debug!("[{}] Delivering frame of {} line(s)", self.name, frame.len());
            if let Some(consumer) = &self.consumer {
                consumer(frame);
            }
        }
    }

    /// Sample the control lines, returning the previous and the new snapshot.
    pub fn sample_control_lines(&self) -> Result<(Option<ControlLines>, ControlLines)> {
        let mut state = self.lock();
        let current = state
            .transport
            .control_lines()?;
        Ok((state.control.replace(current), current))
    }

    /// How long the receiver has been idle, or `None` while a frame is open.
    pub fn idle_for(&self) -> Option<Duration> {
        let state = self.lock();
        (state
            .receiver
            .state()
            == ReceiverState::Idle)
            .then(|| {
                state
                    .last_transition
                    .elapsed()
            })
    }

    /// Relay a signal transition to the observer.
    pub fn handle_signal(&self, event: SignalEvent) -> bool {
        self.notifier
            .notify(event)
    }
}

impl<T: Transport> fmt::Debug for LinkSession<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkSession")
            .field("name", &self.name)
            .field("notifier", &self.notifier)
            .field("consumer", &self.consumer.is_some())
            .finish_non_exhaustive()
    }
}
