//! Transmit worker for the Sphero driver
//!
//! Drains the outgoing queue in order. A frame counts as sent only when the
//! transport accepts every byte; only then does the sequence counter advance.
//! Failures are logged and published on the `error` topic, never returned to
//! the caller that queued the packet.

use super::SharedTransport;
use super::constants::WORKER_POLL_MS;
use super::messages::SpheroEvent;
use super::packet::{Packet, SequenceCounter};
use super::state::LinkStats;
use crate::core::events::EventBus;
use crate::error::{Error, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Write one packet to the transport
pub fn transmit(transport: &SharedTransport, packet: &Packet) -> Result<()> {
    let bytes = packet.to_bytes();
    let mut transport = transport.lock();

    let written = transport.write(&bytes)?;
    if written != bytes.len() {
        return Err(Error::ShortWrite {
            expected: bytes.len(),
            written,
        });
    }
    transport.flush()
}

/// Everything the transmit worker shares with the driver
pub(super) struct Transmitter {
    pub transport: SharedTransport,
    pub sequence: Arc<SequenceCounter>,
    pub events: Arc<EventBus<SpheroEvent>>,
    pub stats: Arc<LinkStats>,
}

impl Transmitter {
    fn send(&self, packet: &Packet) {
        match transmit(&self.transport, packet) {
            Ok(()) => {
                self.sequence.advance();
                LinkStats::bump(&self.stats.frames_sent);
                log::trace!(
                    "Sphero: Sent CID=0x{:02X} seq={}",
                    packet.command_id(),
                    packet.sequence()
                );
            }
            Err(e) => {
                LinkStats::bump(&self.stats.write_errors);
                log::error!(
                    "Sphero: Failed to send CID=0x{:02X}: {}",
                    packet.command_id(),
                    e
                );
                self.events.publish(SpheroEvent::Error(e.to_string()));
            }
        }
    }
}

/// Writer loop - sends queued packets until shutdown
///
/// On shutdown the packets already queued are still written, so a final
/// stop command reaches the robot.
pub(super) fn writer_loop(tx: Transmitter, outgoing: Receiver<Packet>, shutdown: Arc<AtomicBool>) {
    let poll = Duration::from_millis(WORKER_POLL_MS);

    loop {
        match outgoing.recv_timeout(poll) {
            Ok(packet) => tx.send(&packet),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if shutdown.load(Ordering::Relaxed) {
            for packet in outgoing.try_iter() {
                tx.send(&packet);
            }
            break;
        }
    }

    log::info!("Sphero: Writer thread exiting");
}
