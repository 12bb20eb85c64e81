//! Native serial transport using the `serialport` crate.
//!
//! `serialport` has no event callbacks, so inbound data is polled: every
//! [`Transport::read_available`] blocks for at most the configured read
//! timeout.

use {
    crate::{
        error::{Error, Result},
        port::{ControlLines, Purge, SerialConfig, Transport},
        protocol::marker::LINE_TERMINATOR,
    },
    log::trace,
    serialport::ClearBuffer,
    std::io::{self, Read, Write},
};

/// Largest chunk taken from the driver in one read.
const READ_CHUNK: usize = 1024;

/// Native serial port transport.
pub struct NativePort {
    config: SerialConfig,
    port: Option<Box<dyn serialport::SerialPort>>,
}

impl NativePort {
    /// Create a closed transport for the given configuration.
    pub fn new(config: SerialConfig) -> Self {
        Self { config, port: None }
    }

    /// Create a transport and open it right away.
    pub fn open_with(config: SerialConfig) -> Result<Self> {
        let mut port = Self::new(config);
        port.open()?;
        Ok(port)
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn serialport::SerialPort>> {
        let name = &self.config.port_name;
        self.port
            .as_mut()
            .ok_or_else(|| Error::PortClosed(name.clone()))
    }
}

impl Transport for NativePort {
    fn name(&self) -> &str {
        &self.config.port_name
    }

    fn open(&mut self) -> Result<()> {
        if self.port.is_some() {
            return Ok(());
        }
        let port = serialport::new(&self.config.port_name, self.config.baud_rate)
            .timeout(self.config.timeout)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .open()?;
        trace!("[{}] opened at {} baud", self.config.port_name, self.config.baud_rate);
        self.port = Some(port);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        // Dropping the handle closes the device.
        if self
            .port
            .take()
            .is_some()
        {
            trace!("[{}] closed", self.config.port_name);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port
            .is_some()
    }

    fn purge(&mut self, purge: Purge) -> Result<()> {
        self.port_mut()?
            .clear(purge.into())?;
        Ok(())
    }

    fn write_line(&mut self, text: &str) -> Result<()> {
        let port = self.port_mut()?;
        port.write_all(text.as_bytes())?;
        port.write_all(LINE_TERMINATOR.as_bytes())?;
        port.flush()?;
        Ok(())
    }

    fn read_available(&mut self) -> Result<Vec<u8>> {
        let port = self.port_mut()?;
        let mut buf = vec![0u8; READ_CHUNK];
        match port.read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            },
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(Vec::new()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn control_lines(&mut self) -> Result<ControlLines> {
        let port = self.port_mut()?;
        Ok(ControlLines {
            cts: port.read_clear_to_send()?,
            dsr: port.read_data_set_ready()?,
            ring: port.read_ring_indicator()?,
            rlsd: port.read_carrier_detect()?,
        })
    }
}

impl From<Purge> for ClearBuffer {
    fn from(purge: Purge) -> Self {
        match purge {
            Purge::Input => Self::Input,
            Purge::Output => Self::Output,
            Purge::All => Self::All,
        }
    }
}
