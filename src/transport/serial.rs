//! Serial transport implementation

use super::Transport;
use crate::error::{Error, Result};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{Read, Write};
use std::time::Duration;

/// Read timeout. Short so the framer releases the port lock quickly and the
/// transmitter never waits long for it.
const READ_TIMEOUT: Duration = Duration::from_millis(1);

/// Serial transport for the robot's UART / Bluetooth SPP link
pub struct SerialTransport {
    path: String,
    baud_rate: u32,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialTransport {
    /// Open a serial port
    ///
    /// # Arguments
    /// * `path` - Serial port path (e.g., "/dev/rfcomm0")
    /// * `baud_rate` - Baud rate (the robot uses 115200)
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let port = Self::open_port(path, baud_rate)?;
        log::info!("Opened serial port: {} at {} baud", path, baud_rate);

        Ok(SerialTransport {
            path: path.to_string(),
            baud_rate,
            port: Some(port),
        })
    }

    fn open_port(path: &str, baud_rate: u32) -> Result<Box<dyn SerialPort>> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(READ_TIMEOUT)
            .open()?;
        Ok(port)
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        self.port.as_mut().ok_or(Error::NotConnected)
    }
}

impl Transport for SerialTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        match self.port_mut()?.read(buffer) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        Ok(self.port_mut()?.write(data)?)
    }

    fn flush(&mut self) -> Result<()> {
        self.port_mut()?.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        // Dropping the handle closes the file descriptor
        if self.port.take().is_some() {
            log::info!("Closed serial port: {}", self.path);
        }
        Ok(())
    }

    fn reconnect(&mut self) -> Result<()> {
        if self.port.is_some() {
            self.close()?;
        }
        self.port = Some(Self::open_port(&self.path, self.baud_rate)?);
        log::info!("Reconnected serial port: {}", self.path);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }
}
