//! Async notification dispatcher
//!
//! Every tick the buffered notifications are drained newest-first, decoded
//! into typed records and published. Notifications that are neither a
//! collision nor a sensor sample of the expected size are dropped.

use super::constants::*;
use super::messages::{CollisionPacket, DataStreamingPacket, SpheroEvent};
use super::packet::Frame;
use super::responses::AsyncResponses;
use crate::core::events::EventBus;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Decode a notification into an event
pub fn decode_notification(frame: &Frame) -> Option<SpheroEvent> {
    match frame.code() {
        ASYNC_ID_COLLISION => {
            if frame.len() != COLLISION_FRAME_SIZE || frame.as_bytes()[4] != COLLISION_DLEN {
                return None;
            }
            CollisionPacket::decode(frame.data()).map(SpheroEvent::Collision)
        }
        ASYNC_ID_SENSOR_DATA => {
            if frame.len() != SENSOR_DATA_FRAME_SIZE {
                return None;
            }
            DataStreamingPacket::decode(frame.data())
                .map(|sample| SpheroEvent::SensorData(Box::new(sample)))
        }
        _ => None,
    }
}

/// Publish everything buffered, most recent first
///
/// Returns the number of events published.
pub(super) fn drain(notifications: &AsyncResponses, events: &EventBus<SpheroEvent>) -> usize {
    let mut published = 0;
    while let Some(frame) = notifications.pop() {
        match decode_notification(&frame) {
            Some(event) => {
                events.publish(event);
                published += 1;
            }
            None => log::debug!(
                "Sphero: Ignoring notification id=0x{:02X} len={}",
                frame.code(),
                frame.len()
            ),
        }
    }
    published
}

/// Dispatcher loop - drains notifications once per interval until shutdown
pub(super) fn dispatcher_loop(
    notifications: Arc<AsyncResponses>,
    events: Arc<EventBus<SpheroEvent>>,
    shutdown: Arc<AtomicBool>,
    interval_ms: u64,
) {
    while !shutdown.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(interval_ms));
        let published = drain(&notifications, &events);
        if published > 0 {
            log::trace!("Sphero: Dispatched {} notifications", published);
        }
    }

    log::info!("Sphero: Dispatcher thread exiting");
}
