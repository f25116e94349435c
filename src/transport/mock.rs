//! Mock transport for testing
//!
//! An in-memory duplex. Clones share the same buffers, so a test keeps one
//! handle while the driver owns another.

use super::Transport;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Simulated device: sees every written chunk, may answer with bytes to read
type Responder = Box<dyn FnMut(&[u8]) -> Option<Vec<u8>> + Send>;

/// Mock transport for unit testing
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

struct MockTransportInner {
    read_buffer: VecDeque<u8>,
    write_buffer: Vec<u8>,
    responder: Option<Responder>,
    write_limit: Option<usize>,
    fail_writes: bool,
    fail_reads: bool,
    connected: bool,
}

impl MockTransport {
    /// Create a new mock transport
    pub fn new() -> Self {
        MockTransport {
            inner: Arc::new(Mutex::new(MockTransportInner {
                read_buffer: VecDeque::new(),
                write_buffer: Vec::new(),
                responder: None,
                write_limit: None,
                fail_writes: false,
                fail_reads: false,
                connected: true,
            })),
        }
    }

    /// Inject data to be read
    pub fn inject_read(&self, data: &[u8]) {
        self.inner.lock().read_buffer.extend(data);
    }

    /// Get all written data
    pub fn get_written(&self) -> Vec<u8> {
        self.inner.lock().write_buffer.clone()
    }

    /// Clear written data
    pub fn clear_written(&self) {
        self.inner.lock().write_buffer.clear();
    }

    /// Answer writes with bytes queued for reading
    pub fn set_responder<F>(&self, responder: F)
    where
        F: FnMut(&[u8]) -> Option<Vec<u8>> + Send + 'static,
    {
        self.inner.lock().responder = Some(Box::new(responder));
    }

    /// Accept at most `limit` bytes per write (`None` = unlimited)
    pub fn set_write_limit(&self, limit: Option<usize>) {
        self.inner.lock().write_limit = limit;
    }

    /// Make every write fail with an I/O error
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.lock().fail_writes = fail;
    }

    /// Make every read fail with an I/O error
    pub fn set_fail_reads(&self, fail: bool) {
        self.inner.lock().fail_reads = fail;
    }

    /// Simulate link up/down without closing
    pub fn set_connected(&self, connected: bool) {
        self.inner.lock().connected = connected;
    }
}

impl Transport for MockTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let mut inner = self.inner.lock();
        if !inner.connected {
            return Err(Error::NotConnected);
        }
        if inner.fail_reads {
            return Err(Error::Io(std::io::ErrorKind::BrokenPipe.into()));
        }

        let available = inner.read_buffer.len().min(buffer.len());
        for (slot, byte) in buffer.iter_mut().zip(inner.read_buffer.drain(..available)) {
            *slot = byte;
        }
        Ok(available)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let mut inner = self.inner.lock();
        if !inner.connected {
            return Err(Error::NotConnected);
        }
        if inner.fail_writes {
            return Err(Error::Io(std::io::ErrorKind::BrokenPipe.into()));
        }

        let accepted = inner.write_limit.map_or(data.len(), |l| l.min(data.len()));
        inner.write_buffer.extend_from_slice(&data[..accepted]);

        if accepted == data.len() {
            let reply = inner.responder.as_mut().and_then(|r| r(data));
            if let Some(reply) = reply {
                inner.read_buffer.extend(reply);
            }
        }
        Ok(accepted)
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.inner.lock().connected = false;
        Ok(())
    }

    fn reconnect(&mut self) -> Result<()> {
        self.inner.lock().connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.inner.lock().connected
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}
