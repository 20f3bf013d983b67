//! Session configuration
//!
//! The defaults reproduce the behaviour of the current co-processor
//! firmware: no response deadline, no parity check on responses and an
//! unchecked frame trailer. Configuration can be persisted as postcard
//! binary data when the `serde` feature is enabled.

use otlink_hal::UartConfig;
use otlink_protocol::{frame_len, OtCommandRequest, OtCommandResponse, Packet, TrailerPolicy};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Trailer handling, mirrored here so the config can be serialized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TrailerMode {
    #[default]
    Ignore,
    Crc16,
}

impl From<TrailerMode> for TrailerPolicy {
    fn from(mode: TrailerMode) -> Self {
        match mode {
            TrailerMode::Ignore => TrailerPolicy::Ignore,
            TrailerMode::Crc16 => TrailerPolicy::Crc16,
        }
    }
}

/// Session behaviour switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SessionConfig {
    /// Time allowed between `send` and the response before the session
    /// reports a timeout; `None` waits forever
    pub response_timeout_ms: Option<u32>,
    /// Treat a response word with odd parity as a protocol error
    pub verify_response_parity: bool,
    /// Frame trailer handling on both directions
    pub trailer: TrailerMode,
}

/// Time an OpenTherm slave may take to answer a request
pub const SLAVE_RESPONSE_MS: u32 = 800;

/// Two OpenTherm frames at 1 kbit/s plus co-processor turnaround
pub const BUS_OVERHEAD_MS: u32 = 200;

impl SessionConfig {
    /// Settings for firmware that computes trailers and parity correctly,
    /// on the default link
    pub fn strict() -> Self {
        Self::strict_for(&UartConfig::default())
    }

    /// Strict settings with the response deadline sized for `link`
    ///
    /// The deadline covers the slave's answer window, the OpenTherm bus
    /// and moving one request and one response frame over the serial link.
    pub fn strict_for(link: &UartConfig) -> Self {
        let frames = frame_len(OtCommandRequest::SIZE) + frame_len(OtCommandResponse::SIZE);
        let link_ms = link.transfer_time_us(frames).div_ceil(1_000);

        Self {
            response_timeout_ms: Some(
                SLAVE_RESPONSE_MS
                    .saturating_add(BUS_OVERHEAD_MS)
                    .saturating_add(link_ms),
            ),
            verify_response_parity: true,
            trailer: TrailerMode::Crc16,
        }
    }
}

/// Errors that can occur while storing or loading configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Output buffer too small
    BufferTooSmall,
    /// Stored bytes are not a valid configuration
    Corrupt,
}

/// Serialize `config` into `buf`, returning the used prefix
#[cfg(feature = "serde")]
pub fn store<'a>(config: &SessionConfig, buf: &'a mut [u8]) -> Result<&'a mut [u8], ConfigError> {
    postcard::to_slice(config, buf).map_err(|_| ConfigError::BufferTooSmall)
}

/// Deserialize a configuration written by [`store`]
#[cfg(feature = "serde")]
pub fn load(bytes: &[u8]) -> Result<SessionConfig, ConfigError> {
    postcard::from_bytes(bytes).map_err(|_| ConfigError::Corrupt)
}
