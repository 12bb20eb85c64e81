//! Signal transitions reported to an external observer.
//!
//! Purely informational: nothing here affects protocol correctness. Ring
//! indications are logged but never forwarded.

use log::debug;
use std::fmt;

/// Kind of line signal, as seen by the observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    /// Break condition on the data line.
    Break,
    /// Clear To Send (CTS).
    ClearToSend,
    /// Data Set Ready (DSR).
    DataSetReady,
    /// Line or driver error.
    Error,
    /// Ring indicator.
    Ring,
    /// Receive Line Signal Detect (RLSD, a.k.a. DCD).
    Rlsd,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Break => "BREAK",
            Self::ClearToSend => "CTS",
            Self::DataSetReady => "DSR",
            Self::Error => "ERR",
            Self::Ring => "RING",
            Self::Rlsd => "RLSD",
        })
    }
}

/// A signal transition; the flag is `true` when the signal became asserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEvent {
    /// Break condition changed.
    Break(bool),
    /// CTS changed.
    ClearToSend(bool),
    /// DSR changed.
    DataSetReady(bool),
    /// Error condition changed.
    Error(bool),
    /// Ring indicator changed.
    Ring(bool),
    /// RLSD changed.
    Rlsd(bool),
}

impl SignalEvent {
    /// The signal this event is about.
    pub fn kind(&self) -> SignalKind {
        match self {
            Self::Break(_) => SignalKind::Break,
            Self::ClearToSend(_) => SignalKind::ClearToSend,
            Self::DataSetReady(_) => SignalKind::DataSetReady,
            Self::Error(_) => SignalKind::Error,
            Self::Ring(_) => SignalKind::Ring,
            Self::Rlsd(_) => SignalKind::Rlsd,
        }
    }

    /// Whether the signal is now asserted.
    pub fn asserted(&self) -> bool {
        match *self {
            Self::Break(on)
            | Self::ClearToSend(on)
            | Self::DataSetReady(on)
            | Self::Error(on)
            | Self::Ring(on)
            | Self::Rlsd(on) => on,
        }
    }
}

/// Observer callback: `(kind, asserted) -> handled`.
pub type SignalObserver = Box<dyn Fn(SignalKind, bool) -> bool + Send + Sync>;

/// Relays signal transitions to a registered observer.
pub struct EventNotifier {
    name: String,
    observer: Option<SignalObserver>,
}

impl EventNotifier {
    /// Create a notifier without an observer.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            observer: None,
        }
    }

    /// Register the observer, replacing any previous one.
    pub fn set_observer<F>(&mut self, observer: F)
    where
        F: Fn(SignalKind, bool) -> bool + Send + Sync + 'static,
    {
        self.observer = Some(Box::new(observer));
    }

    /// Report one transition. Returns what the observer returned, or `false`
    /// when nothing was forwarded.
    pub fn notify(&self, event: SignalEvent) -> bool {
        let kind = event.kind();
        let asserted = event.asserted();
        debug!(
            "[{}] {kind} - {}",
            self.name,
            if asserted { "ON" } else { "OFF" }
        );

        match event {
            SignalEvent::Ring(_) => false,
            SignalEvent::Break(_)
            | SignalEvent::ClearToSend(_)
            | SignalEvent::DataSetReady(_)
            | SignalEvent::Error(_)
            | SignalEvent::Rlsd(_) => self
                .observer
                .as_ref()
                .is_some_and(|observer| observer(kind, asserted)),
        }
    }
}

impl fmt::Debug for EventNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventNotifier")
            .field("name", &self.name)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}
