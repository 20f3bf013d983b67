//! Packet records exchanged with the co-processor
//!
//! Host → co-processor: [`CpuStatusRequest`], [`OtCommandRequest`]
//! Co-processor → host: [`CpuStatusResponse`], [`GenericStatusResponse`],
//! [`OtCommandResponse`], [`LogRequest`]

use crate::registry::Packet;

fn le_u16(bytes: &[u8], at: usize) -> Option<u16> {
    bytes.get(at..at + 2)?.try_into().ok().map(u16::from_le_bytes)
}

fn le_u32(bytes: &[u8], at: usize) -> Option<u32> {
    bytes.get(at..at + 4)?.try_into().ok().map(u32::from_le_bytes)
}

/// Co-processor version and uptime request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CpuStatusRequest {
    /// Padding, the co-processor ignores it
    pub dummy: u8,
}

impl Packet for CpuStatusRequest {
    const TYPE_ID: u8 = 1;
    const SIZE: usize = 1;

    fn write_to(&self, buf: &mut [u8]) {
        buf[0] = self.dummy;
    }

    fn read_from(bytes: &[u8]) -> Option<Self> {
        Some(Self {
            dummy: *bytes.first()?,
        })
    }
}

/// Reply to [`CpuStatusRequest`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CpuStatusResponse {
    pub cpu_version: u8,
    pub firmware_version: u8,
    pub board_revision: u8,
    /// Seconds since co-processor reset
    pub uptime: u32,
}

impl Packet for CpuStatusResponse {
    const TYPE_ID: u8 = 2;
    const SIZE: usize = 7;

    fn write_to(&self, buf: &mut [u8]) {
        buf[0] = self.cpu_version;
        buf[1] = self.firmware_version;
        buf[2] = self.board_revision;
        buf[3..7].copy_from_slice(&self.uptime.to_le_bytes());
    }

    fn read_from(bytes: &[u8]) -> Option<Self> {
        Some(Self {
            cpu_version: *bytes.first()?,
            firmware_version: *bytes.get(1)?,
            board_revision: *bytes.get(2)?,
            uptime: le_u32(bytes, 3)?,
        })
    }
}

/// Periodic status pushed by the co-processor
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GenericStatusResponse {
    /// Boiler status flags as last read from the bus
    pub boiler_status: u32,
    /// External temperature sensor reading (°C)
    pub ext_temp: f32,
    /// Ambient light level, raw ADC units
    pub light_value: u16,
}

impl Packet for GenericStatusResponse {
    const TYPE_ID: u8 = 3;
    const SIZE: usize = 10;

    fn write_to(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&self.boiler_status.to_le_bytes());
        buf[4..8].copy_from_slice(&self.ext_temp.to_le_bytes());
        buf[8..10].copy_from_slice(&self.light_value.to_le_bytes());
    }

    fn read_from(bytes: &[u8]) -> Option<Self> {
        Some(Self {
            boiler_status: le_u32(bytes, 0)?,
            ext_temp: f32::from_bits(le_u32(bytes, 4)?),
            light_value: le_u16(bytes, 8)?,
        })
    }
}

/// OpenTherm frame to put on the boiler bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OtCommandRequest {
    /// 32-bit OpenTherm word, parity included
    pub payload: u32,
}

impl Packet for OtCommandRequest {
    const TYPE_ID: u8 = 4;
    const SIZE: usize = 4;

    fn write_to(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&self.payload.to_le_bytes());
    }

    fn read_from(bytes: &[u8]) -> Option<Self> {
        Some(Self {
            payload: le_u32(bytes, 0)?,
        })
    }
}

/// OpenTherm frame received from the boiler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OtCommandResponse {
    /// 32-bit OpenTherm word as received
    pub payload: u32,
    /// Co-processor bus status for this exchange
    pub response_status: u8,
}

impl Packet for OtCommandResponse {
    const TYPE_ID: u8 = 5;
    const SIZE: usize = 5;

    fn write_to(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&self.payload.to_le_bytes());
        buf[4] = self.response_status;
    }

    fn read_from(bytes: &[u8]) -> Option<Self> {
        Some(Self {
            payload: le_u32(bytes, 0)?,
            response_status: *bytes.get(4)?,
        })
    }
}

/// Maximum log text carried by one [`LogRequest`]
pub const LOG_CAPACITY: usize = 25;

/// Log line emitted by the co-processor firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LogRequest {
    pub payload: [u8; LOG_CAPACITY],
    /// Number of meaningful bytes in `payload`
    pub length: u8,
}

impl LogRequest {
    /// Build a log record, truncating `text` to [`LOG_CAPACITY`]
    pub fn from_text(text: &[u8]) -> Self {
        let len = text.len().min(LOG_CAPACITY);
        let mut payload = [0u8; LOG_CAPACITY];
        payload[..len].copy_from_slice(&text[..len]);
        Self {
            payload,
            length: len as u8,
        }
    }

    /// The meaningful part of the payload
    pub fn text(&self) -> &[u8] {
        let len = (self.length as usize).min(LOG_CAPACITY);
        &self.payload[..len]
    }
}

impl Packet for LogRequest {
    const TYPE_ID: u8 = 6;
    const SIZE: usize = LOG_CAPACITY + 1;

    fn write_to(&self, buf: &mut [u8]) {
        buf[..LOG_CAPACITY].copy_from_slice(&self.payload);
        buf[LOG_CAPACITY] = self.length;
    }

    fn read_from(bytes: &[u8]) -> Option<Self> {
        Some(Self {
            payload: bytes.get(..LOG_CAPACITY)?.try_into().ok()?,
            length: *bytes.get(LOG_CAPACITY)?,
        })
    }
}
