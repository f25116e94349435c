//! Receive framer for the Sphero driver
//!
//! Bytes from the transport accumulate in a ring buffer. Each pass scans for a
//! start pair (`FF FF` reply, `FF FE` notification), reads the 5-byte header
//! for the declared length, and validates the checksum once the whole frame is
//! buffered. A bad checksum or implausible length discards only the first
//! start byte, so the next scan resynchronizes on the following frame instead
//! of trusting a corrupt length.

use super::SharedTransport;
use super::constants::*;
use super::packet::{Frame, FrameKind, response_frame_len};
use super::responses::AsyncResponses;
use super::ring_buffer::RingBuffer;
use super::state::LinkStats;
use crossbeam_channel::Sender;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

fn is_start_pair(first: u8, second: u8) -> bool {
    first == SOP1 && (second == SOP2_SYNC || second == SOP2_ASYNC)
}

/// Largest frame the framer accepts for the given second start byte
fn max_frame_len(sop2: u8) -> usize {
    if sop2 == SOP2_ASYNC {
        MAX_ASYNC_FRAME_SIZE
    } else {
        MAX_SYNC_FRAME_SIZE
    }
}

/// Ring-buffer frame assembler
pub struct FrameReader {
    buffer: RingBuffer<RECEIVE_BUFFER_SIZE>,
    stats: Arc<LinkStats>,
}

impl FrameReader {
    pub fn new(stats: Arc<LinkStats>) -> Self {
        Self {
            buffer: RingBuffer::new(),
            stats,
        }
    }

    /// Append received bytes
    pub fn extend(&mut self, bytes: &[u8]) {
        let dropped = self.buffer.extend(bytes);
        if dropped > 0 {
            log::warn!("Sphero: Receive buffer full, dropped {} bytes", dropped);
        }
    }

    /// Next complete, checksum-valid frame, if one is buffered
    pub fn next_frame(&mut self) -> Option<Frame> {
        loop {
            if self.buffer.len() < RESPONSE_HEADER_SIZE + 1 {
                return None;
            }

            let Some(start) = self.buffer.find_pair(is_start_pair) else {
                // Keep a trailing 0xFF, it may begin the next frame
                let keep = usize::from(self.buffer.get(self.buffer.len() - 1) == Some(SOP1));
                self.buffer.advance(self.buffer.len() - keep);
                return None;
            };
            if start > 0 {
                log::trace!("Sphero: Skipping {} bytes before start pair", start);
                self.buffer.advance(start);
            }

            let mut header = [0u8; RESPONSE_HEADER_SIZE];
            if !self.buffer.copy_to(0, &mut header) {
                return None;
            }
            let Some(total_len) = response_frame_len(&header) else {
                self.buffer.advance(1);
                continue;
            };

            if total_len <= RESPONSE_HEADER_SIZE || total_len > max_frame_len(header[1]) {
                log::debug!("Sphero: Implausible frame length {}, resyncing", total_len);
                LinkStats::bump(&self.stats.malformed_frames);
                self.buffer.advance(1);
                continue;
            }

            // Wait for the rest of the frame
            let Some(bytes) = self.buffer.to_vec(0, total_len) else {
                return None;
            };

            match Frame::decode(bytes) {
                Ok(frame) => {
                    self.buffer.advance(total_len);
                    LinkStats::bump(&self.stats.frames_received);
                    return Some(frame);
                }
                Err(e) => {
                    log::debug!("Sphero: Dropping frame: {}", e);
                    LinkStats::bump(&self.stats.checksum_errors);
                    self.buffer.advance(1);
                }
            }
        }
    }

    /// Bytes buffered but not yet framed
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

/// Send a validated frame to its consumer
pub(super) fn route(frame: Frame, sync_tx: &Sender<Frame>, notifications: &AsyncResponses) {
    match frame.kind() {
        FrameKind::Sync => {
            log::trace!("Sphero: Sync reply seq={} len={}", frame.sequence(), frame.len());
            if sync_tx.send(frame).is_err() {
                log::debug!("Sphero: Sync collector gone, dropping reply");
            }
        }
        FrameKind::Async => {
            log::trace!("Sphero: Notification id=0x{:02X} len={}", frame.code(), frame.len());
            notifications.push(frame);
        }
        FrameKind::Unknown => {
            log::debug!("Sphero: Dropping frame of unknown kind");
        }
    }
}

/// Reader loop - frames incoming bytes until shutdown
///
/// The transport lock is held only for a single read; the short read timeout
/// of the transport keeps the transmitter from starving.
pub(super) fn reader_loop(
    transport: SharedTransport,
    shutdown: Arc<AtomicBool>,
    sync_tx: Sender<Frame>,
    notifications: Arc<AsyncResponses>,
    stats: Arc<LinkStats>,
) {
    let mut reader = FrameReader::new(stats);
    let mut temp_buf = [0u8; 256];

    while !shutdown.load(Ordering::Relaxed) {
        let result = transport.lock().read(&mut temp_buf);

        match result {
            Ok(0) => thread::sleep(Duration::from_millis(READ_IDLE_SLEEP_MS)),
            Ok(n) => {
                reader.extend(&temp_buf[..n]);
                while let Some(frame) = reader.next_frame() {
                    route(frame, &sync_tx, &notifications);
                }
            }
            Err(e) => {
                log::warn!("Sphero: Read error: {}", e);
                LinkStats::bump(&reader.stats.read_errors);
                thread::sleep(Duration::from_millis(READ_ERROR_BACKOFF_MS));
            }
        }
    }

    log::info!("Sphero: Reader thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    fn reader() -> (FrameReader, Arc<LinkStats>) {
        let stats = Arc::new(LinkStats::default());
        (FrameReader::new(Arc::clone(&stats)), stats)
    }

    #[test]
    fn test_frames_split_across_reads() {
        let (mut r, stats) = reader();
        let reply = Frame::sync_reply(0x00, 3, &[1, 2, 3]);
        let bytes = reply.as_bytes();

        r.extend(&bytes[..4]);
        assert!(r.next_frame().is_none());
        r.extend(&bytes[4..]);
        assert_eq!(r.next_frame().unwrap(), reply);
        assert_eq!(r.pending(), 0);
        assert_eq!(stats.snapshot().frames_received, 1);
    }

    #[test]
    fn test_back_to_back_frames() {
        let (mut r, _) = reader();
        let a = Frame::notification(ASYNC_ID_COLLISION, &[0u8; 16]);
        let b = Frame::sync_reply(0x00, 8, &[9, 9, 9]);
        r.extend(a.as_bytes());
        r.extend(b.as_bytes());

        assert_eq!(r.next_frame().unwrap(), a);
        assert_eq!(r.next_frame().unwrap(), b);
        assert!(r.next_frame().is_none());
    }

    #[test]
    fn test_resync_after_garbage() {
        let (mut r, _) = reader();
        let reply = Frame::sync_reply(0x00, 1, &[5, 5, 5]);
        r.extend(&[0x12, 0x34, 0xFF, 0x00, 0x56]);
        r.extend(reply.as_bytes());

        assert_eq!(r.next_frame().unwrap(), reply);
    }

    #[test]
    fn test_resync_after_corrupt_frame() {
        let (mut r, stats) = reader();
        let mut bad = Frame::sync_reply(0x00, 1, &[1, 2, 3]).as_bytes().to_vec();
        bad[6] ^= 0x40;
        let good = Frame::sync_reply(0x00, 2, &[4, 5, 6]);
        r.extend(&bad);
        r.extend(good.as_bytes());

        assert_eq!(r.next_frame().unwrap(), good);
        assert!(stats.snapshot().checksum_errors >= 1);
    }

    #[test]
    fn test_zero_length_is_malformed() {
        let (mut r, stats) = reader();
        r.extend(&[0xFF, 0xFF, 0x00, 0x01, 0x00, 0x00]);
        assert!(r.next_frame().is_none());
        assert!(stats.snapshot().malformed_frames >= 1);
    }

    #[test]
    fn test_long_notification_is_one_frame() {
        let (mut r, stats) = reader();
        // Aggregated samples; -1 and -2 words look like start pairs
        let mut data = vec![0u8; 300];
        data[10..14].copy_from_slice(&[0xFF, 0xFF, 0xFF, 0xFE]);
        let long = Frame::notification(ASYNC_ID_SENSOR_DATA, &data);

        r.extend(long.as_bytes());
        assert_eq!(r.next_frame().unwrap(), long);
        assert_eq!(r.pending(), 0);
        assert_eq!(stats.snapshot().malformed_frames, 0);
    }

    #[test]
    fn test_oversized_frames_are_malformed() {
        let (mut r, stats) = reader();
        // Notification declaring more than the receive buffer holds
        r.extend(&[0xFF, 0xFE, ASYNC_ID_SENSOR_DATA, 0x10, 0x00, 0x00]);
        assert!(r.next_frame().is_none());
        assert_eq!(stats.snapshot().malformed_frames, 1);
    }

    #[test]
    fn test_route_by_kind() {
        let (sync_tx, sync_rx) = unbounded();
        let notes = AsyncResponses::new();

        route(Frame::sync_reply(0x00, 4, &[1, 2, 3]), &sync_tx, &notes);
        route(Frame::notification(ASYNC_ID_SENSOR_DATA, &[0u8; 84]), &sync_tx, &notes);

        assert_eq!(sync_rx.try_recv().unwrap().sequence(), 4);
        assert!(sync_rx.try_recv().is_err());
        assert_eq!(notes.len(), 1);
    }

    #[test]
    fn test_unknown_kind_dropped() {
        let (sync_tx, sync_rx) = unbounded();
        let notes = AsyncResponses::new();
        // Valid checksum, but neither reply nor notification marker
        let mut bytes = vec![0xFF, 0x10, 0x00, 0x01, 0x02, 0x05];
        let chk = super::super::packet::checksum(&bytes[2..]);
        bytes.push(chk);
        let frame = Frame::decode(bytes).unwrap();

        route(frame, &sync_tx, &notes);
        assert!(sync_rx.try_recv().is_err());
        assert!(notes.is_empty());
    }
}
