//! Error types for striplink.

use std::io;
use thiserror::Error;

/// Result type for striplink operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for striplink operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (serial port, file operations).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(serialport::Error),

    /// No serial port matched the request.
    #[error("No serial port found")]
    PortNotFound,

    /// The port is held by another process.
    #[error("Port {0} is already in use")]
    PortBusy(String),

    /// The operation needs an open port.
    #[error("Port {0} is not open")]
    PortClosed(String),

    /// Communication timeout.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Protocol error.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Unsupported operation on this transport or platform.
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl Error {
    /// Whether retrying the open right away is pointless.
    ///
    /// A port owned by another process stays busy until that process lets go,
    /// so the caller should wait for the next health check instead.
    pub fn is_port_busy(&self) -> bool {
        matches!(self, Self::PortBusy(_))
    }
}

#[cfg(feature = "native")]
impl From<serialport::Error> for Error {
    fn from(err: serialport::Error) -> Self {
        match err.kind() {
            serialport::ErrorKind::Io(io::ErrorKind::ResourceBusy) => {
                Self::PortBusy(err.description)
            },
            _ if err
                .description
                .to_ascii_lowercase()
                .contains("busy") =>
            {
                Self::PortBusy(err.description)
            },
            _ => Self::Serial(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_busy_classification() {
        assert!(Error::PortBusy("/dev/ttyUSB0".into()).is_port_busy());
        assert!(!Error::Timeout("ack".into()).is_port_busy());
        assert!(!Error::PortClosed("/dev/ttyUSB0".into()).is_port_busy());
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            Error::PortBusy("/dev/ttyACM0".into()).to_string(),
            "Port /dev/ttyACM0 is already in use"
        );
        assert_eq!(
            Error::Protocol("bad ack".into()).to_string(),
            "Protocol error: bad ack"
        );
    }

    #[cfg(feature = "native")]
    #[test]
    fn test_serialport_busy_maps_to_port_busy() {
        let err = serialport::Error::new(
            serialport::ErrorKind::Io(io::ErrorKind::ResourceBusy),
            "Device or resource busy",
        );
        assert!(Error::from(err).is_port_busy());

        let err = serialport::Error::new(serialport::ErrorKind::NoDevice, "No such device");
        assert!(matches!(Error::from(err), Error::Serial(_)));
    }
}
