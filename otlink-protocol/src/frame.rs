//! Frame encoding for the co-processor link.
//!
//! Frame format (wire bytes):
//! - START (1 byte): 0xA0
//! - TYPE (2 bytes): packet type identifier, high nibble then low nibble
//! - PAYLOAD (2 bytes per byte): packed record bytes, nibble-serialized
//! - TRAILER (4 bytes): 16-bit checksum as four nibbles, MSB first
//! - STOP (1 byte): 0x60
//!
//! Every byte between the sentinels has its top nibble clear.

use heapless::Vec;

use crate::crc::frame_crc;
use crate::registry::Packet;

/// Frame start sentinel
pub const START_BYTE: u8 = 0b1010_0000;

/// Frame stop sentinel
pub const STOP_BYTE: u8 = 0b0110_0000;

/// Packet type that switches the receiver into streaming mode
pub const STREAM_REQ_ID: u8 = 100;

/// Receive buffer capacity in wire bytes (between the sentinels)
pub const BUFFER_SIZE: usize = 64;

/// Wire bytes taken by the packet type
pub const TYPE_LEN: usize = 2;

/// Wire bytes taken by the checksum trailer
pub const TRAILER_LEN: usize = 4;

/// Smallest acceptable frame body: type, one payload byte, trailer
pub const MIN_BODY_LEN: usize = TYPE_LEN + 2 + TRAILER_LEN;

/// Largest payload a frame body can carry, in decoded bytes
pub const MAX_PAYLOAD_SIZE: usize = (BUFFER_SIZE - TYPE_LEN - TRAILER_LEN) / 2;

/// Largest complete frame, sentinels included
pub const MAX_FRAME_SIZE: usize = BUFFER_SIZE + 2;

/// Wire length of a complete frame carrying `payload_size` bytes
pub const fn frame_len(payload_size: usize) -> usize {
    1 + TYPE_LEN + 2 * payload_size + TRAILER_LEN + 1
}

/// Errors that can occur during frame parsing or encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Byte with a nonzero top nibble inside a frame body
    InvalidByte,
    /// Frame body exceeded the receive buffer
    Overflow,
    /// Frame body shorter than the minimum frame
    TooShort,
    /// Frame body ended on half a byte
    OddLength,
    /// No packet registered for this type
    UnknownType(u8),
    /// Payload length differs from the registered packet size
    SizeMismatch {
        type_id: u8,
        expected: usize,
        actual: usize,
    },
    /// Trailer does not match the computed checksum
    ChecksumMismatch { expected: u16, actual: u16 },
    /// Payload does not fit in a frame
    PayloadTooLarge,
    /// Buffer too small for encoding
    BufferTooSmall,
}

/// How the 16-bit trailer is produced and checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TrailerPolicy {
    /// Transmit zeros and accept any trailer (current co-processor firmware)
    #[default]
    Ignore,
    /// Transmit and verify CRC-16/CCITT-FALSE over type and payload
    Crc16,
}

impl TrailerPolicy {
    /// Trailer value to transmit for a frame
    pub fn trailer(self, type_id: u8, payload: &[u8]) -> u16 {
        match self {
            TrailerPolicy::Ignore => 0,
            TrailerPolicy::Crc16 => frame_crc(type_id, payload),
        }
    }
}

/// Split a byte into its (high, low) nibbles
pub fn split_nibbles(byte: u8) -> [u8; 2] {
    [byte >> 4, byte & 0x0F]
}

/// Join two nibble bytes back into one byte
pub fn join_nibbles(high: u8, low: u8) -> u8 {
    ((high & 0x0F) << 4) | (low & 0x0F)
}

/// Rebuild a trailer word from its four nibble bytes
pub(crate) fn join_trailer(nibbles: &[u8]) -> u16 {
    nibbles
        .iter()
        .fold(0u16, |acc, &n| (acc << 4) | (n & 0x0F) as u16)
}

/// Small cursor over an output buffer
struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Writer<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn put(&mut self, byte: u8) -> Result<(), FrameError> {
        let slot = self.buf.get_mut(self.pos).ok_or(FrameError::BufferTooSmall)?;
        *slot = byte;
        self.pos += 1;
        Ok(())
    }

    fn put_nibbles(&mut self, byte: u8) -> Result<(), FrameError> {
        let [high, low] = split_nibbles(byte);
        self.put(high)?;
        self.put(low)
    }
}

/// Encode a raw type byte and payload into `buffer`
///
/// Returns the number of bytes written.
pub fn encode_raw(
    type_id: u8,
    payload: &[u8],
    policy: TrailerPolicy,
    buffer: &mut [u8],
) -> Result<usize, FrameError> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(FrameError::PayloadTooLarge);
    }

    let trailer = policy.trailer(type_id, payload);
    let mut out = Writer::new(buffer);

    out.put(START_BYTE)?;
    out.put_nibbles(type_id)?;
    for &byte in payload {
        out.put_nibbles(byte)?;
    }
    out.put_nibbles((trailer >> 8) as u8)?;
    out.put_nibbles(trailer as u8)?;
    out.put(STOP_BYTE)?;

    Ok(out.pos)
}

/// Encode a packet into `buffer`
///
/// Returns the number of bytes written, always `frame_len(P::SIZE)`.
pub fn encode<P: Packet>(
    packet: &P,
    policy: TrailerPolicy,
    buffer: &mut [u8],
) -> Result<usize, FrameError> {
    if P::SIZE > MAX_PAYLOAD_SIZE {
        return Err(FrameError::PayloadTooLarge);
    }

    let mut payload = [0u8; MAX_PAYLOAD_SIZE];
    packet.write_to(&mut payload[..P::SIZE]);
    encode_raw(P::TYPE_ID, &payload[..P::SIZE], policy, buffer)
}

/// Encode a packet into a heapless Vec
pub fn encode_to_vec<P: Packet>(
    packet: &P,
    policy: TrailerPolicy,
) -> Result<Vec<u8, MAX_FRAME_SIZE>, FrameError> {
    let mut buffer = [0u8; MAX_FRAME_SIZE];
    let len = encode(packet, policy, &mut buffer)?;
    let mut vec = Vec::new();
    vec.extend_from_slice(&buffer[..len])
        .map_err(|_| FrameError::BufferTooSmall)?;
    Ok(vec)
}

/// Encode a packet the way the current co-processor firmware expects it
pub fn serialize<P: Packet>(packet: &P) -> Result<Vec<u8, MAX_FRAME_SIZE>, FrameError> {
    encode_to_vec(packet, TrailerPolicy::Ignore)
}

/// Encode a streaming frame carrying `data`
///
/// Streaming frames have no trailer; every nibble pair up to STOP is
/// delivered to the receiver's streaming callback.
pub fn encode_stream(data: &[u8], buffer: &mut [u8]) -> Result<usize, FrameError> {
    let mut out = Writer::new(buffer);

    out.put(START_BYTE)?;
    out.put_nibbles(STREAM_REQ_ID)?;
    for &byte in data {
        out.put_nibbles(byte)?;
    }
    out.put(STOP_BYTE)?;

    Ok(out.pos)
}
