//! DeviceDriver trait definition

use crate::error::Result;

/// Device driver trait for hardware abstraction
pub trait DeviceDriver: Send + Sync {
    /// Human-readable driver name
    fn name(&self) -> &str;

    /// Start background workers and send the device's startup configuration
    ///
    /// Calling `start` on a running driver returns an error instead of
    /// spawning a second set of workers.
    fn start(&self) -> Result<()>;

    /// Bring the device to rest and stop all background workers
    ///
    /// The transport stays open; closing it is a separate step.
    fn halt(&self) -> Result<()>;
}
