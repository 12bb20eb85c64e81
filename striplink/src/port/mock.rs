//! In-memory transport for unit tests.
//!
//! Clones share one state, so a test can hand a clone to the code under test
//! and keep another to script input and inspect output.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::port::{ControlLines, Purge, Transport};

/// How a scripted `open` fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OpenFailure {
    /// Another process holds the port.
    Busy,
    /// Any other driver error.
    Other,
}

/// Scripted peer: sees every written line and may answer with raw bytes.
pub(crate) type Responder = Box<dyn FnMut(&str) -> Option<Vec<u8>> + Send>;

#[derive(Default)]
pub(crate) struct MockState {
    pub open: bool,
    pub opens: usize,
    pub closes: usize,
    pub purges: Vec<Purge>,
    pub written: Vec<String>,
    pub inbound: VecDeque<Vec<u8>>,
    pub open_failures: VecDeque<OpenFailure>,
    pub control: ControlLines,
    pub control_error: bool,
    pub responder: Option<Responder>,
}

#[derive(Clone, Default)]
pub(crate) struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, MockState> {
        self.state
            .lock()
            .unwrap()
    }

    /// Queue bytes for the next `read_available`.
    pub(crate) fn push_inbound(&self, bytes: &[u8]) {
        self.state()
            .inbound
            .push_back(bytes.to_vec());
    }

    pub(crate) fn set_control(&self, control: ControlLines) {
        self.state().control = control;
    }

    pub(crate) fn fail_next_open(&self, failure: OpenFailure) {
        self.state()
            .open_failures
            .push_back(failure);
    }

    pub(crate) fn set_responder<F>(&self, responder: F)
    where
        F: FnMut(&str) -> Option<Vec<u8>> + Send + 'static,
    {
        self.state().responder = Some(Box::new(responder));
    }

    pub(crate) fn written(&self) -> Vec<String> {
        self.state()
            .written
            .clone()
    }

    pub(crate) fn count_written(&self, line: &str) -> usize {
        self.state()
            .written
            .iter()
            .filter(|l| *l == line)
            .count()
    }
}

impl Transport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    fn open(&mut self) -> Result<()> {
        let mut state = self.state();
        match state
            .open_failures
            .pop_front()
        {
            Some(OpenFailure::Busy) => Err(Error::PortBusy("mock".into())),
            Some(OpenFailure::Other) => Err(Error::Io(std::io::Error::other("mock open failure"))),
            None => {
                state.open = true;
                state.opens += 1;
                Ok(())
            },
        }
    }

    fn close(&mut self) -> Result<()> {
        let mut state = self.state();
        if state.open {
            state.open = false;
            state.closes += 1;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state().open
    }

    fn purge(&mut self, purge: Purge) -> Result<()> {
        let mut state = self.state();
        if !state.open {
            return Err(Error::PortClosed("mock".into()));
        }
        state
            .purges
            .push(purge);
        Ok(())
    }

    fn write_line(&mut self, text: &str) -> Result<()> {
        let mut state = self.state();
        if !state.open {
            return Err(Error::PortClosed("mock".into()));
        }
        state
            .written
            .push(text.to_string());
        let reply = state
            .responder
            .as_mut()
            .and_then(|respond| respond(text));
        if let Some(bytes) = reply {
            state
                .inbound
                .push_back(bytes);
        }
        Ok(())
    }

    fn read_available(&mut self) -> Result<Vec<u8>> {
        let mut state = self.state();
        if !state.open {
            return Err(Error::PortClosed("mock".into()));
        }
        Ok(state
            .inbound
            .pop_front()
            .unwrap_or_default())
    }

    fn control_lines(&mut self) -> Result<ControlLines> {
        let state = self.state();
        if state.control_error {
            return Err(Error::Io(std::io::Error::other("mock control line failure")));
        }
        Ok(state.control)
    }
}
