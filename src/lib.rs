//! sphero-io - Packet protocol driver for the Sphero robot
//!
//! Encodes commands into Sphero frames, frames and validates the replies and
//! notifications coming back, and exposes the robot as a [`SpheroDriver`] with
//! a typed command API and an event bus.
//!
//! ```no_run
//! use sphero_io::config::DriverConfig;
//! use sphero_io::transport::SerialTransport;
//! use sphero_io::SpheroDriver;
//!
//! let transport = SerialTransport::open("/dev/rfcomm0", 115_200)?;
//! let sphero = SpheroDriver::new("sphero", Box::new(transport), DriverConfig::default());
//! sphero.start()?;
//! sphero.set_rgb(0, 255, 0)?;
//! sphero.roll(80, 90)?;
//! sphero.halt()?;
//! # Ok::<(), sphero_io::Error>(())
//! ```

pub mod config;
pub mod core;
pub mod devices;
pub mod error;
pub mod transport;

// Re-export commonly used types
pub use config::Config;
pub use devices::sphero::{SpheroDriver, SpheroEvent};
pub use error::{Error, Result};
