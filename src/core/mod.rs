//! Core abstractions shared by device drivers.
//!
//! - [`driver::DeviceDriver`]: Lifecycle trait to implement for new hardware
//! - [`events::EventBus`]: Topic-based fan-out of driver events
//! - [`registry::CommandRegistry`]: Named commands with typed parameters

pub mod driver;
pub mod events;
pub mod registry;
