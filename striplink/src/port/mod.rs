//! Transport seam between the protocol engine and a serial device.
//!
//! The engine never touches a serial API directly. It drives a [`Transport`],
//! which the native backend implements on top of the `serialport` crate and
//! tests implement in memory.
//!
//! ```text
//! +------------------------------------------+
//! |  FrameSender   LinkSession   PortMonitor |
//! +--------------------+---------------------+
//!                      |
//!                      v
//!              +-------+-------+
//!              |   Transport   |
//!              +-------+-------+
//!                      |
//!          +-----------+-----------+
//!          v                       v
//!   NativePort (serialport)   in-memory mock
//! ```

#[cfg(feature = "native")]
pub mod native;

#[cfg(test)]
pub(crate) mod mock;

use std::time::Duration;

use crate::error::Result;
use crate::events::SignalEvent;

/// Serial port configuration.
///
/// The link runs at fixed parameters: 115200 baud, 8 data bits, 1 stop bit,
/// no parity and no flow control.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Port name/path (e.g., "/dev/ttyUSB0", "COM3").
    pub port_name: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Read timeout; bounds how long one poll of the port blocks.
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: 115200,
            timeout: Duration::from_millis(50),
        }
    }
}

impl SerialConfig {
    /// Create a configuration for the named port with the fixed link parameters.
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            ..Default::default()
        }
    }

    /// Set the baud rate.
    #[must_use]
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the read timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Which buffers to discard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purge {
    /// Pending inbound bytes.
    Input,
    /// Pending outbound bytes.
    Output,
    /// Both directions.
    All,
}

/// Sampled levels of the modem control lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlLines {
    /// Clear To Send.
    pub cts: bool,
    /// Data Set Ready.
    pub dsr: bool,
    /// Ring indicator.
    pub ring: bool,
    /// Receive Line Signal Detect (carrier detect).
    pub rlsd: bool,
}

impl ControlLines {
    /// Whether CTS, DSR or RLSD dropped since `previous`.
    ///
    /// A drop on any of them means the peer most likely reset. Ring is not
    /// considered.
    pub fn has_falling_edge(&self, previous: &Self) -> bool {
        (previous.cts && !self.cts) || (previous.dsr && !self.dsr) || (previous.rlsd && !self.rlsd)
    }

    /// One event per line whose level differs from `previous`.
    pub fn changes_since(&self, previous: &Self) -> Vec<SignalEvent> {
        let mut events = Vec::new();
        if self.cts != previous.cts {
            events.push(SignalEvent::ClearToSend(self.cts));
        }
        if self.dsr != previous.dsr {
            events.push(SignalEvent::DataSetReady(self.dsr));
        }
        if self.ring != previous.ring {
            events.push(SignalEvent::Ring(self.ring));
        }
        if self.rlsd != previous.rlsd {
            events.push(SignalEvent::Rlsd(self.rlsd));
        }
        events
    }
}

/// Capability surface the engine needs from a serial device.
///
/// Opening and closing are repeatable: a transport starts closed, and the
/// monitor cycles it through close/open on every reconnect.
pub trait Transport: Send {
    /// Port name/path, used to tag log lines.
    fn name(&self) -> &str;

    /// Open the device with the configured parameters.
    fn open(&mut self) -> Result<()>;

    /// Close the device. Closing a closed transport is a no-op.
    fn close(&mut self) -> Result<()>;

    /// Whether the device is currently open.
    fn is_open(&self) -> bool;

    /// Discard buffered data.
    fn purge(&mut self, purge: Purge) -> Result<()>;

    /// Write one line followed by the wire terminator.
    fn write_line(&mut self, text: &str) -> Result<()>;

    /// Read whatever bytes are available, waiting at most the read timeout.
    ///
    /// An empty vector means nothing arrived.
    fn read_available(&mut self) -> Result<Vec<u8>>;

    /// Sample the modem control lines.
    fn control_lines(&mut self) -> Result<ControlLines>;
}
