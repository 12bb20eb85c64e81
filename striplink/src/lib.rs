//! # striplink
//!
//! Framing and acknowledgement engine for serial LED-strip controllers.
//!
//! Frames travel as text lines over a serial port. A frame is opened by `STX`,
//! closed by `ETX`, and confirmed by the receiver with `ACK:<crc32>`. The
//! sender retries until the checksum matches. The crate provides:
//!
//! - Line splitting across arbitrary read boundaries
//! - The receiving state machine and the retrying sender
//! - A port monitor that reconnects when the peer resets
//! - Capability announcements in reply to `ENQ`
//! - Serial port discovery
//!
//! ## Supported Platforms
//!
//! - **Native** (default): Linux, macOS, Windows via the `serialport` crate
//!
//! Other platforms can plug in their own [`Transport`].
//!
//! ## Features
//!
//! - `native` (default): Native serial port support
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use striplink::{Capabilities, FrameSender, LinkSession, PortMonitor, SerialConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     #[cfg(feature = "native")]
//!     {
//!         use striplink::NativePort;
//!
//!         // Receive frames on one port
//!         let port = NativePort::new(SerialConfig::new("/dev/ttyUSB0"));
//!         let announcement = Capabilities::default().announcement()?;
//!         let session = Arc::new(
//!             LinkSession::new(port, announcement)
//!                 .with_consumer(|frame| println!("{}", frame.join("\n"))),
//!         );
//!         let monitor = PortMonitor::new(Arc::clone(&session));
//!         monitor.tick();
//!         session.poll_inbound()?;
//!
//!         // Send one frame on another
//!         let port = NativePort::new(SerialConfig::new("/dev/ttyUSB1"));
//!         let mut sender = FrameSender::new(port);
//!         if !sender.send("FF0000\n00FF00") {
//!             eprintln!("peer did not confirm the frame");
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::sync::{Arc, OnceLock};

pub mod device;
pub mod error;
pub mod events;
pub mod link;
pub mod monitor;
pub mod port;
pub mod protocol;

static INTERRUPT_CHECKER: OnceLock<Arc<dyn Fn() -> bool + Send + Sync>> = OnceLock::new();

/// Register a global interruption checker used by long-running library loops.
///
/// The checker should return `true` when the current operation should stop
/// (for example after receiving Ctrl-C in CLI applications).
pub fn set_interrupt_checker<F>(checker: F)
where
    F: Fn() -> bool + Send + Sync + 'static,
{
    let _ = INTERRUPT_CHECKER.set(Arc::new(checker));
}

/// Returns whether interruption was requested by the embedding application.
#[must_use]
pub fn is_interrupted_requested() -> bool {
    INTERRUPT_CHECKER
        .get()
        .is_some_and(|checker| checker())
}

// Re-exports for convenience
// Native-specific re-exports
#[cfg(feature = "native")]
pub use port::native::NativePort;
pub use {
    device::{DetectedPort, DeviceKind, auto_detect_port, detect_ports},
    error::{Error, Result},
    events::{EventNotifier, SignalEvent, SignalKind},
    link::{FrameConsumer, LinkSession},
    monitor::{MonitorAction, MonitorConfig, PortMonitor, ReconnectReason, run_reader},
    port::{ControlLines, Purge, SerialConfig, Transport},
    protocol::{
        CancelHandle, Capabilities, FrameReceiver, FrameSender, LineSplitter, Marker,
        ReceiverState, SenderConfig, normalize_and_checksum,
    },
};
