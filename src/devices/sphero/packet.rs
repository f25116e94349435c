//! Packet codec for the Sphero protocol
//!
//! Command frame (host → robot):
//!
//! ```text
//! [0xFF][0xFF][DID][CID][SEQ][DLEN][BODY ...][CHK]
//! ```
//!
//! Response frames (robot → host):
//!
//! ```text
//! sync:  [0xFF][0xFF][MRSP][SEQ][DLEN][DATA ...][CHK]
//! async: [0xFF][0xFE][ID][DLEN_MSB][DLEN_LSB][DATA ...][CHK]
//! ```
//!
//! `DLEN` counts the data plus the checksum byte. The checksum is the one's
//! complement of the byte sum (mod 256) of everything after the two start
//! bytes, so the same [`checksum`] builds and verifies both directions.

use super::constants::*;
use crate::error::{Error, Result};
use std::sync::atomic::{AtomicU8, Ordering};

/// Sphero checksum: `!(sum(data) mod 256)`
#[inline]
pub fn checksum(data: &[u8]) -> u8 {
    !data.iter().fold(0u8, |sum, &b| sum.wrapping_add(b))
}

// ============================================================================
// Sequence counter
// ============================================================================

/// 8-bit sequence number shared by the encoder and the transmit worker
///
/// Packets are stamped with the current value; the transmitter advances it
/// once per frame it writes in full. Wraps at 256.
#[derive(Debug, Default)]
pub struct SequenceCounter(AtomicU8);

impl SequenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value the next encoded packet will carry
    #[inline]
    pub fn current(&self) -> u8 {
        self.0.load(Ordering::Acquire)
    }

    /// Advance after a successful transmit
    #[inline]
    pub fn advance(&self) {
        self.0.fetch_add(1, Ordering::AcqRel);
    }
}

// ============================================================================
// Outgoing packets
// ============================================================================

/// Command frame ready to be queued for the transmitter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    header: [u8; COMMAND_HEADER_SIZE],
    body: Vec<u8>,
    checksum: u8,
}

impl Packet {
    /// Encode a command frame
    ///
    /// Body longer than 254 bytes does not fit in `DLEN`; no Sphero command
    /// comes close.
    pub fn new(device_id: u8, command_id: u8, sequence: u8, body: Vec<u8>) -> Self {
        debug_assert!(body.len() < 255, "body too long for DLEN");
        let dlen = (body.len() + 1) as u8;
        let header = [SOP1, SOP2_SYNC, device_id, command_id, sequence, dlen];

        let checksum = Self::checksum_of(&header, &body);
        Self {
            header,
            body,
            checksum,
        }
    }

    fn checksum_of(header: &[u8], body: &[u8]) -> u8 {
        !header[2..]
            .iter()
            .chain(body)
            .fold(0u8, |sum, &b| sum.wrapping_add(b))
    }

    /// Validate and split a serialized command frame
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < COMMAND_HEADER_SIZE + 1 {
            return Err(Error::InvalidPacket(format!(
                "command frame too short: {} bytes",
                bytes.len()
            )));
        }
        if bytes[0] != SOP1 || bytes[1] != SOP2_SYNC {
            return Err(Error::InvalidPacket(format!(
                "bad start bytes {:02X} {:02X}",
                bytes[0], bytes[1]
            )));
        }
        let dlen = bytes[5] as usize;
        if bytes.len() != COMMAND_HEADER_SIZE + dlen || dlen == 0 {
            return Err(Error::InvalidPacket(format!(
                "DLEN {} does not match frame length {}",
                dlen,
                bytes.len()
            )));
        }

        let last = bytes.len() - 1;
        let expected = checksum(&bytes[2..last]);
        if expected != bytes[last] {
            return Err(Error::ChecksumError {
                expected,
                actual: bytes[last],
            });
        }

        let mut header = [0u8; COMMAND_HEADER_SIZE];
        header.copy_from_slice(&bytes[..COMMAND_HEADER_SIZE]);
        Ok(Self {
            header,
            body: bytes[COMMAND_HEADER_SIZE..last].to_vec(),
            checksum: bytes[last],
        })
    }

    #[inline]
    pub fn device_id(&self) -> u8 {
        self.header[2]
    }

    #[inline]
    pub fn command_id(&self) -> u8 {
        self.header[3]
    }

    #[inline]
    pub fn sequence(&self) -> u8 {
        self.header[4]
    }

    #[inline]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    #[inline]
    pub fn checksum(&self) -> u8 {
        self.checksum
    }

    /// Total serialized length
    #[inline]
    pub fn len(&self) -> usize {
        COMMAND_HEADER_SIZE + self.body.len() + 1
    }

    /// Serialize header, body and checksum
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.len());
        bytes.extend_from_slice(&self.header);
        bytes.extend_from_slice(&self.body);
        bytes.push(self.checksum);
        bytes
    }
}

// ============================================================================
// Incoming frames
// ============================================================================

/// How the framer routes a validated response frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Acknowledgement to a command, correlated by sequence
    Sync,
    /// Unsolicited notification (collision, sensor stream)
    Async,
    /// Anything else; dropped
    Unknown,
}

/// Validated response frame (header, data and checksum bytes)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Vec<u8>,
}

impl Frame {
    /// Validate a complete response frame
    ///
    /// Only the checksum and minimum size are checked here; routing by
    /// [`Frame::kind`] happens in the framer.
    pub fn decode(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() < RESPONSE_HEADER_SIZE + 1 {
            return Err(Error::InvalidPacket(format!(
                "response frame too short: {} bytes",
                bytes.len()
            )));
        }

        let last = bytes.len() - 1;
        let expected = checksum(&bytes[2..last]);
        if expected != bytes[last] {
            return Err(Error::ChecksumError {
                expected,
                actual: bytes[last],
            });
        }
        Ok(Self { bytes })
    }

    /// Reassemble header and body (data + trailing checksum) and validate
    pub fn from_parts(header: &[u8], body: &[u8]) -> Result<Self> {
        let mut bytes = Vec::with_capacity(header.len() + body.len());
        bytes.extend_from_slice(header);
        bytes.extend_from_slice(body);
        Self::decode(bytes)
    }

    /// Build a synchronous reply, as the robot would send it
    pub fn sync_reply(mrsp: u8, sequence: u8, data: &[u8]) -> Self {
        let dlen = (data.len() + 1) as u8;
        Self::seal(vec![SOP1, SOP2_SYNC, mrsp, sequence, dlen], data)
    }

    /// Build an asynchronous notification, as the robot would send it
    pub fn notification(id_code: u8, data: &[u8]) -> Self {
        let [msb, lsb] = ((data.len() + 1) as u16).to_be_bytes();
        Self::seal(vec![SOP1, SOP2_ASYNC, id_code, msb, lsb], data)
    }

    fn seal(mut bytes: Vec<u8>, data: &[u8]) -> Self {
        bytes.extend_from_slice(data);
        bytes.push(checksum(&bytes[2..]));
        Self { bytes }
    }

    /// Classify by the second start byte
    pub fn kind(&self) -> FrameKind {
        match self.bytes[1] {
            SOP2_SYNC => FrameKind::Sync,
            SOP2_ASYNC => FrameKind::Async,
            _ => FrameKind::Unknown,
        }
    }

    /// Sequence number of a sync reply
    #[inline]
    pub fn sequence(&self) -> u8 {
        self.bytes[3]
    }

    /// Message response code (sync) or ID code (async)
    #[inline]
    pub fn code(&self) -> u8 {
        self.bytes[2]
    }

    /// Data between header and checksum
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.bytes[RESPONSE_HEADER_SIZE..self.bytes.len() - 1]
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Declared length of a response frame from its first five bytes
///
/// Returns `None` when the start bytes are not a response marker.
pub fn response_frame_len(header: &[u8; RESPONSE_HEADER_SIZE]) -> Option<usize> {
    if header[0] != SOP1 {
        return None;
    }
    let dlen = match header[1] {
        SOP2_SYNC => header[4] as usize,
        SOP2_ASYNC => u16::from_be_bytes([header[3], header[4]]) as usize,
        _ => return None,
    };
    Some(RESPONSE_HEADER_SIZE + dlen)
}
