//! Transport layer for I/O abstraction
//!
//! The protocol engine only needs a byte-stream duplex. Opening and configuring
//! the link belongs to the transport; the driver shares it between its framer
//! and transmitter behind a mutex, so implementations must return promptly from
//! `read` (a timeout reads as 0 bytes).

use crate::error::{Error, Result};

mod mock;
mod serial;

pub use mock::MockTransport;
pub use serial::SerialTransport;

/// Transport trait for device communication
pub trait Transport: Send {
    /// Read data into buffer, returns number of bytes read (0 when nothing arrived)
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize>;

    /// Write data from buffer, returns number of bytes written
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Flush any pending writes (blocking until complete)
    fn flush(&mut self) -> Result<()>;

    /// Close the underlying link. Further reads and writes fail.
    fn close(&mut self) -> Result<()>;

    /// Close (if open) and open the link again with the same settings
    fn reconnect(&mut self) -> Result<()> {
        Err(Error::Other("reconnect not supported".to_string()))
    }

    /// Whether the link is currently open
    fn is_connected(&self) -> bool {
        true
    }
}
