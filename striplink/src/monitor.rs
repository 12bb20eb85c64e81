//! Port lifecycle monitor and the inbound reader loop.
//!
//! The monitor keeps one [`LinkSession`] healthy. Every tick it makes sure the
//! port is open, samples the modem control lines and forces a reconnect when
//! the peer looks reset:
//!
//! - CTS, DSR or RLSD dropped since the previous sample
//! - the receiver sat in `IDLE` longer than the idle timeout
//! - the control lines could not be read at all
//!
//! A reconnect purges and closes the port, resets the receiver, waits
//! `reconnect_delay` and opens again.
//!
//! Opening is bounded. A busy port (another process owns it) is left alone
//! until the next tick; other failures are retried `open_retries` times.
//!
//! `serialport` has no data callback, so [`run_reader`] polls the session on
//! its own thread and stands in for one.

use crate::events::SignalEvent;
use crate::is_interrupted_requested;
use crate::link::LinkSession;
use crate::port::Transport;
use log::{debug, info, warn};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Longest single sleep, so stop requests are noticed promptly.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Monitor configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Time between health checks.
    pub poll_interval: Duration,
    /// Reconnect after this long in `IDLE` without a transition. `None` disables.
    pub idle_timeout: Option<Duration>,
    /// Pause between closing and reopening.
    pub reconnect_delay: Duration,
    /// Open attempts per tick for failures other than a busy port.
    pub open_retries: u32,
    /// Pause between those attempts.
    pub open_retry_delay: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            idle_timeout: Some(Duration::from_secs(10)),
            reconnect_delay: Duration::from_millis(500),
            open_retries: 3,
            open_retry_delay: Duration::from_secs(1),
        }
    }
}

/// Why the monitor reconnected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectReason {
    /// CTS, DSR or RLSD fell.
    ControlLineDrop,
    /// No transition for the idle timeout.
    IdleTimeout,
    /// The port stopped answering.
    Fault,
}

impl fmt::Display for ReconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ControlLineDrop => "control line dropped",
            Self::IdleTimeout => "idle timeout",
            Self::Fault => "port fault",
        })
    }
}

/// Outcome of one health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorAction {
    /// Nothing to do.
    Healthy,
    /// The port was closed and is now open.
    Opened,
    /// The port was cycled.
    Reconnected(ReconnectReason),
    /// The port could not be opened this tick.
    OpenFailed,
}

/// Health loop for one session.
pub struct PortMonitor<T: Transport> {
    session: Arc<LinkSession<T>>,
    config: MonitorConfig,
}

impl<T: Transport> PortMonitor<T> {
    /// Create a monitor with the default configuration.
    pub fn new(session: Arc<LinkSession<T>>) -> Self {
        Self::with_config(session, MonitorConfig::default())
    }

    /// Create a monitor with a custom configuration.
    pub fn with_config(session: Arc<LinkSession<T>>, config: MonitorConfig) -> Self {
        Self { session, config }
    }

    /// The monitored session.
    pub fn session(&self) -> &Arc<LinkSession<T>> {
        &self.session
    }

    /// Run one health check.
    pub fn tick(&self) -> MonitorAction {
        if !self
            .session
            .is_open()
        {
            return if self.open_port() {
                MonitorAction::Opened
            } else {
                MonitorAction::OpenFailed
            };
        }

        match self
            .session
            .sample_control_lines()
        {
            Ok((Some(previous), current)) => {
                for event in current.changes_since(&previous) {
                    self.session
                        .handle_signal(event);
                }
                if current.has_falling_edge(&previous) {
                    return self.reconnect(ReconnectReason::ControlLineDrop);
                }
            },
            Ok((None, current)) => {
                debug!("[{}] Control lines: {current:?}", self.session.name());
            },
            Err(e) => {
                warn!("[{}] Cannot read control lines: {e}", self.session.name());
                self.session
                    .handle_signal(SignalEvent::Error(true));
                return self.reconnect(ReconnectReason::Fault);
            },
        }

        if let Some(limit) = self.config.idle_timeout {
            if self
                .session
                .idle_for()
                .is_some_and(|idle| idle >= limit)
            {
                return self.reconnect(ReconnectReason::IdleTimeout);
            }
        }

        MonitorAction::Healthy
    }

    /// Tick every `poll_interval` until `stop` is set or an interrupt is requested.
    pub fn run(&self, stop: &AtomicBool) {
        info!("[{}] Monitoring port", self.session.name());
        while !should_stop(stop) {
            let action = self.tick();
            if action != MonitorAction::Healthy {
                debug!("[{}] Health check: {action:?}", self.session.name());
            }
            sleep_unless_stopped(self.config.poll_interval, stop);
        }
        self.session
            .shut_down();
    }

    fn reconnect(&self, reason: ReconnectReason) -> MonitorAction {
        info!("[{}] Reconnecting: {reason}", self.session.name());
        self.session
            .shut_down();
        std::thread::sleep(self.config.reconnect_delay);
        if self.open_port() {
            MonitorAction::Reconnected(reason)
        } else {
            MonitorAction::OpenFailed
        }
    }

    fn open_port(&self) -> bool {
        let name = self
            .session
            .name();
        let retries = self
            .config
            .open_retries
            .max(1);

        for attempt in 1..=retries {
            match self
                .session
                .open()
            {
                Ok(()) => {
                    info!("[{name}] Port opened");
                    return true;
                },
                Err(e) if e.is_port_busy() => {
                    warn!("[{name}] Port is in use, retrying on next check: {e}");
                    return false;
                },
                Err(e) => {
                    warn!("[{name}] Open attempt {attempt}/{retries} failed: {e}");
                    if attempt < retries {
                        std::thread::sleep(self.config.open_retry_delay);
                    }
                },
            }
        }
        false
    }
}

impl<T: Transport> fmt::Debug for PortMonitor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortMonitor")
            .field("session", &self.session)
            .field("config", &self.config)
            .finish()
    }
}

/// Poll the session for inbound data until `stop` is set.
///
/// Read errors are reported as an `ERR` signal; recovering the port is left
/// to the monitor.
pub fn run_reader<T: Transport>(session: &LinkSession<T>, stop: &AtomicBool, idle_pause: Duration) {
    let mut last_error: Option<Instant> = None;
    while !should_stop(stop) {
        match session.poll_inbound() {
            Ok(true) => {},
            Ok(false) => sleep_unless_stopped(idle_pause, stop),
            Err(e) => {
                // Only report the first error of a burst.
                if last_error.is_none_or(|at| at.elapsed() > idle_pause) {
                    warn!("[{}] Read failed: {e}", session.name());
                    session.handle_signal(SignalEvent::Error(true));
                }
                last_error = Some(Instant::now());
                sleep_unless_stopped(idle_pause, stop);
            },
        }
    }
}

fn should_stop(stop: &AtomicBool) -> bool {
    stop.load(Ordering::Relaxed) || is_interrupted_requested()
}

fn sleep_unless_stopped(duration: Duration, stop: &AtomicBool) {
    let deadline = Instant::now() + duration;
    loop {
        let now = Instant::now();
        if now >= deadline || should_stop(stop) {
            return;
        }
        std::thread::sleep((deadline - now).min(SLEEP_SLICE));
    }
}
