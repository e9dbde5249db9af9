//! External collaborators of the slave engine
//!
//! The engine never touches hardware directly. It talks to three small traits:
//!
//! - [`Transport`]: a non-blocking duplex byte stream (UART, USB CDC, socket)
//! - [`Clock`]: a monotonic microsecond counter
//! - [`TxEnable`]: the RS485 driver-enable line, asserted while transmitting
//!
//! With the `rtu` feature, [`SerialTransport`] adapts a serial port opened
//! through `tokio-serial`.

use std::time::Instant;

use crate::error::ModbusResult;

/// Non-blocking byte stream the slave reads requests from and writes responses to
///
/// No method may block waiting for data. `read_into` and `write_from` move as
/// many bytes as are immediately possible and report how many that was.
pub trait Transport {
    /// Number of received bytes ready to be read
    fn available(&mut self) -> ModbusResult<usize>;

    /// Read up to `buf.len()` bytes, returning the number read
    fn read_into(&mut self, buf: &mut [u8]) -> ModbusResult<usize>;

    /// Write up to `buf.len()` bytes, returning the number accepted
    fn write_from(&mut self, buf: &[u8]) -> ModbusResult<usize>;

    /// Free space in the transmit buffer
    ///
    /// `0` means the transport cannot tell; the engine then falls back to
    /// writing a whole response at once followed by [`Transport::flush`].
    fn available_for_write(&mut self) -> ModbusResult<usize>;

    /// Wait until every written byte has left the transmit buffer
    fn flush(&mut self) -> ModbusResult<()>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn available(&mut self) -> ModbusResult<usize> {
        (**self).available()
    }

    fn read_into(&mut self, buf: &mut [u8]) -> ModbusResult<usize> {
        (**self).read_into(buf)
    }

    fn write_from(&mut self, buf: &[u8]) -> ModbusResult<usize> {
        (**self).write_from(buf)
    }

    fn available_for_write(&mut self) -> ModbusResult<usize> {
        (**self).available_for_write()
    }

    fn flush(&mut self) -> ModbusResult<()> {
        (**self).flush()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn available(&mut self) -> ModbusResult<usize> {
        (**self).available()
    }

    fn read_into(&mut self, buf: &mut [u8]) -> ModbusResult<usize> {
        (**self).read_into(buf)
    }

    fn write_from(&mut self, buf: &[u8]) -> ModbusResult<usize> {
        (**self).write_from(buf)
    }

    fn available_for_write(&mut self) -> ModbusResult<usize> {
        (**self).available_for_write()
    }

    fn flush(&mut self) -> ModbusResult<()> {
        (**self).flush()
    }
}

/// Monotonic microsecond clock
pub trait Clock {
    /// Microseconds since an arbitrary fixed origin
    fn micros(&self) -> u64;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn micros(&self) -> u64 {
        (**self).micros()
    }
}

/// Clock backed by [`std::time::Instant`]
#[derive(Debug, Clone, Copy)]
pub struct StdClock {
    origin: Instant,
}

impl StdClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for StdClock {
    fn micros(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }
}

/// Half-duplex transceiver driver-enable output
pub trait TxEnable {
    /// Drive the line high (`true`) while transmitting, low otherwise
    fn set_transmitting(&mut self, active: bool);
}

impl<P: TxEnable + ?Sized> TxEnable for &mut P {
    fn set_transmitting(&mut self, active: bool) {
        (**self).set_transmitting(active)
    }
}

/// Placeholder for slaves without a driver-enable line
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTxEnable;

impl TxEnable for NoTxEnable {
    fn set_transmitting(&mut self, _active: bool) {}
}

#[cfg(feature = "rtu")]
pub use self::serial::SerialTransport;

#[cfg(feature = "rtu")]
mod serial {
    use std::io::{ErrorKind, Read, Write};
    use std::time::Duration;

    use tokio_serial::SerialPort;

    use super::Transport;
    use crate::error::{ModbusError, ModbusResult};

    /// Serial port transport for RTU slaves
    ///
    /// The port is opened with a zero timeout so reads never wait. Serial
    /// drivers do not report free transmit space, so responses go out through
    /// the blocking write-and-flush path.
    pub struct SerialTransport {
        port: Box<dyn SerialPort>,
    }

    impl SerialTransport {
        /// Open `path` at `baud_rate`, 8N1
        pub fn open(path: &str, baud_rate: u32) -> ModbusResult<Self> {
            let port = tokio_serial::new(path, baud_rate)
                .timeout(Duration::ZERO)
                .open()
                .map_err(|e| ModbusError::transport(format!("Failed to open {}: {}", path, e)))?;
            Ok(Self { port })
        }

        /// Wrap an already configured port
        pub fn from_port(port: Box<dyn SerialPort>) -> Self {
            Self { port }
        }

        /// Name of the underlying device, if known
        pub fn name(&self) -> Option<String> {
            self.port.name()
        }
    }

    impl Transport for SerialTransport {
        fn available(&mut self) -> ModbusResult<usize> {
            self.port
                .bytes_to_read()
                .map(|n| n as usize)
                .map_err(|e| ModbusError::transport(e.to_string()))
        }

        fn read_into(&mut self, buf: &mut [u8]) -> ModbusResult<usize> {
            match self.port.read(buf) {
                Ok(n) => Ok(n),
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => Ok(0),
                Err(e) => Err(e.into()),
            }
        }

        fn write_from(&mut self, buf: &[u8]) -> ModbusResult<usize> {
            match self.port.write(buf) {
                Ok(n) => Ok(n),
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => Ok(0),
                Err(e) => Err(e.into()),
            }
        }

        fn available_for_write(&mut self) -> ModbusResult<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> ModbusResult<()> {
            self.port.flush()?;
            Ok(())
        }
    }
}
