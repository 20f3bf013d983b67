//! CRC-16/CCITT-FALSE for the optional frame trailer
//!
//! Polynomial 0x1021, initial value 0xFFFF, no reflection, no final XOR.
//! Covers the type byte followed by the decoded payload bytes.

const POLY: u16 = 0x1021;
const INIT: u16 = 0xFFFF;

/// Fold one byte into a running CRC
pub fn crc16_update(mut crc: u16, byte: u8) -> u16 {
    crc ^= (byte as u16) << 8;
    for _ in 0..8 {
        crc = if crc & 0x8000 != 0 {
            (crc << 1) ^ POLY
        } else {
            crc << 1
        };
    }
    crc
}

/// Checksum of a frame's type byte and payload
pub fn frame_crc(type_id: u8, payload: &[u8]) -> u16 {
    payload
        .iter()
        .fold(crc16_update(INIT, type_id), |crc, &b| crc16_update(crc, b))
}
