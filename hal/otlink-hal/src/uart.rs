//! UART serial communication abstractions
//!
//! The session layer drives the link from a cooperative poll loop, so the
//! receive side never blocks: it reports whether bytes are buffered and
//! hands them out one at a time.

/// Conventional link speed between host and co-processor
pub const BAUD_RATE: u32 = 200_000;

/// UART transmitter
pub trait UartTx {
    /// Error type for transmit operations
    type Error;

    /// Write data to the UART
    ///
    /// Blocks until all data has been queued or an error occurs.
    fn write_blocking(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Flush any buffered data
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// UART receiver
pub trait UartRx {
    /// Error type for receive operations
    type Error;

    /// Check whether at least one received byte is buffered
    fn has_data(&mut self) -> bool;

    /// Copy already-buffered bytes into `buf` without waiting
    ///
    /// Returns the number of bytes copied, which may be zero.
    fn read_nonblocking(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Take a single buffered byte, if any
    fn read_byte(&mut self) -> Result<Option<u8>, Self::Error> {
        let mut buf = [0u8; 1];
        match self.read_nonblocking(&mut buf)? {
            0 => Ok(None),
            _ => Ok(Some(buf[0])),
        }
    }
}

/// Combined UART interface
///
/// For UARTs that provide both TX and RX on a single peripheral.
pub trait Uart: UartTx + UartRx {}

// Blanket implementation
impl<T: UartTx + UartRx> Uart for T {}

/// Link settings
///
/// The protocol is byte oriented, so data bits are fixed at eight; only the
/// speed and the character framing around them vary between boards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UartConfig {
    pub baudrate: u32,
    pub parity: Parity,
    pub stop_bits: StopBits,
}

impl Default for UartConfig {
    fn default() -> Self {
        Self {
            baudrate: BAUD_RATE,
            parity: Parity::None,
            stop_bits: StopBits::One,
        }
    }
}

impl UartConfig {
    /// Bits on the line per transferred byte, start bit included
    pub fn bits_per_byte(&self) -> u32 {
        let parity = match self.parity {
            Parity::None => 0,
            Parity::Even | Parity::Odd => 1,
        };
        let stop = match self.stop_bits {
            StopBits::One => 1,
            StopBits::Two => 2,
        };
        1 + 8 + parity + stop
    }

    /// Time to clock `bytes` onto the line, rounded up to whole microseconds
    pub fn transfer_time_us(&self, bytes: usize) -> u32 {
        if self.baudrate == 0 {
            return u32::MAX;
        }
        let bits = bytes as u64 * self.bits_per_byte() as u64;
        let us = (bits * 1_000_000).div_ceil(self.baudrate as u64);
        u32::try_from(us).unwrap_or(u32::MAX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Parity {
    None,
    Even,
    Odd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopBits {
    One,
    Two,
}
