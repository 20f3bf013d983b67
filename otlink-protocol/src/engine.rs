//! Byte-at-a-time receive state machine
//!
//! ```text
//!                      START
//!   WaitingStart ─────────────────► Accumulating ──(type == 100)──► Streaming
//!        ▲                               │                              │
//!        └──── STOP / bad byte / overflow┴──────── STOP / bad byte ─────┘
//! ```
//!
//! `Accumulating` buffers the whole body and dispatches it through the
//! registry on STOP. `Streaming` forwards each decoded byte to
//! [`FrameEvents::on_stream_byte`] as soon as its second nibble arrives and
//! dispatches nothing.

use heapless::Vec;

use crate::frame::{
    join_nibbles, join_trailer, FrameError, TrailerPolicy, BUFFER_SIZE, MAX_PAYLOAD_SIZE,
    MIN_BODY_LEN, START_BYTE, STOP_BYTE, STREAM_REQ_ID, TRAILER_LEN, TYPE_LEN,
};
use crate::registry::PacketRegistry;

/// Frame-level notifications besides packet dispatch
pub trait FrameEvents {
    /// One decoded byte of a streaming frame
    fn on_stream_byte(&mut self, _byte: u8) {}

    /// A STOP sentinel closed the current frame
    ///
    /// Fires before the frame is processed, whether or not it turns out valid.
    fn on_stop_byte(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Waiting for START byte
    WaitingStart,
    /// Buffering a regular frame body
    Accumulating,
    /// Forwarding decoded bytes; `pending` holds an unpaired high nibble
    Streaming { pending: Option<u8> },
}

/// Counters for everything the engine drops or delivers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameStats {
    pub dispatched: u32,
    pub streamed_bytes: u32,
    pub invalid_bytes: u32,
    pub overflows: u32,
    pub short_frames: u32,
    pub odd_frames: u32,
    pub unknown_types: u32,
    pub size_mismatches: u32,
    pub checksum_mismatches: u32,
}

impl FrameStats {
    /// Total frames dropped for any reason
    pub fn dropped(&self) -> u32 {
        self.invalid_bytes
            .saturating_add(self.overflows)
            .saturating_add(self.short_frames)
            .saturating_add(self.odd_frames)
            .saturating_add(self.unknown_types)
            .saturating_add(self.size_mismatches)
            .saturating_add(self.checksum_mismatches)
    }

    fn record(&mut self, error: &FrameError) {
        let counter = match error {
            FrameError::InvalidByte => &mut self.invalid_bytes,
            FrameError::Overflow => &mut self.overflows,
            FrameError::TooShort => &mut self.short_frames,
            FrameError::OddLength => &mut self.odd_frames,
            FrameError::UnknownType(_) => &mut self.unknown_types,
            FrameError::SizeMismatch { .. } => &mut self.size_mismatches,
            FrameError::ChecksumMismatch { .. } => &mut self.checksum_mismatches,
            FrameError::PayloadTooLarge | FrameError::BufferTooSmall => return,
        };
        *counter = counter.saturating_add(1);
    }
}

/// Receive-side framing engine
///
/// Handlers and notifications run on the context passed to [`feed`], so the
/// engine itself holds no references to its consumer.
///
/// [`feed`]: FramingEngine::feed
pub struct FramingEngine<C> {
    registry: PacketRegistry<C>,
    policy: TrailerPolicy,
    state: State,
    buffer: Vec<u8, BUFFER_SIZE>,
    stats: FrameStats,
}

impl<C: FrameEvents> FramingEngine<C> {
    /// Create an engine dispatching through `registry`
    pub fn new(registry: PacketRegistry<C>, policy: TrailerPolicy) -> Self {
        Self {
            registry,
            policy,
            state: State::WaitingStart,
            buffer: Vec::new(),
            stats: FrameStats::default(),
        }
    }

    /// Drop any partial frame and wait for the next START
    pub fn reset(&mut self) {
        self.state = State::WaitingStart;
        self.buffer.clear();
    }

    /// Returns true while waiting for a START byte
    pub fn is_idle(&self) -> bool {
        self.state == State::WaitingStart
    }

    /// Returns true while inside a streaming frame
    pub fn is_streaming(&self) -> bool {
        matches!(self.state, State::Streaming { .. })
    }

    pub fn registry(&self) -> &PacketRegistry<C> {
        &self.registry
    }

    pub fn policy(&self) -> TrailerPolicy {
        self.policy
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    pub fn clear_stats(&mut self) {
        self.stats = FrameStats::default();
    }

    /// Feed a single byte to the engine
    ///
    /// Returns `Ok(Some(type_id))` when a packet handler ran, `Ok(None)` when
    /// more bytes are needed, or `Err` when a frame was dropped. The engine
    /// is ready for the next frame in every case.
    pub fn feed(&mut self, byte: u8, ctx: &mut C) -> Result<Option<u8>, FrameError> {
        let result = match self.state {
            State::WaitingStart => {
                if byte == START_BYTE {
                    self.buffer.clear();
                    self.state = State::Accumulating;
                }
                // Silently ignore non-START bytes while waiting
                Ok(None)
            }
            State::Accumulating => self.accumulate(byte, ctx),
            State::Streaming { pending } => self.stream(byte, pending, ctx),
        };

        match &result {
            Ok(Some(_)) => self.stats.dispatched = self.stats.dispatched.saturating_add(1),
            Ok(None) => {}
            Err(e) => self.stats.record(e),
        }
        result
    }

    /// Feed multiple bytes to the engine
    ///
    /// Every byte is consumed. Returns the number of packets dispatched;
    /// dropped frames show up in [`stats`](Self::stats).
    pub fn feed_bytes(&mut self, bytes: &[u8], ctx: &mut C) -> usize {
        bytes
            .iter()
            .filter(|&&byte| matches!(self.feed(byte, ctx), Ok(Some(_))))
            .count()
    }

    fn accumulate(&mut self, byte: u8, ctx: &mut C) -> Result<Option<u8>, FrameError> {
        if byte == STOP_BYTE {
            ctx.on_stop_byte();
            let result = self.process(ctx);
            self.reset();
            return result.map(Some);
        }

        if byte >> 4 != 0 {
            // Repeated START before any body byte is tolerated
            if self.buffer.is_empty() && byte == START_BYTE {
                return Ok(None);
            }
            self.reset();
            return Err(FrameError::InvalidByte);
        }

        if self.buffer.push(byte).is_err() {
            self.reset();
            return Err(FrameError::Overflow);
        }

        if self.buffer.len() == TYPE_LEN
            && join_nibbles(self.buffer[0], self.buffer[1]) == STREAM_REQ_ID
        {
            self.buffer.clear();
            self.state = State::Streaming { pending: None };
        }

        Ok(None)
    }

    fn stream(&mut self, byte: u8, pending: Option<u8>, ctx: &mut C) -> Result<Option<u8>, FrameError> {
        if byte == STOP_BYTE {
            ctx.on_stop_byte();
            self.reset();
            return Ok(None);
        }

        if byte >> 4 != 0 {
            if pending.is_none() && byte == START_BYTE {
                return Ok(None);
            }
            self.reset();
            return Err(FrameError::InvalidByte);
        }

        match pending {
            None => self.state = State::Streaming { pending: Some(byte) },
            Some(high) => {
                self.state = State::Streaming { pending: None };
                self.stats.streamed_bytes = self.stats.streamed_bytes.saturating_add(1);
                ctx.on_stream_byte(join_nibbles(high, byte));
            }
        }

        Ok(None)
    }

    /// Validate the buffered body and dispatch it
    fn process(&self, ctx: &mut C) -> Result<u8, FrameError> {
        let len = self.buffer.len();
        if len < MIN_BODY_LEN {
            return Err(FrameError::TooShort);
        }
        if len % 2 != 0 {
            return Err(FrameError::OddLength);
        }

        let type_id = join_nibbles(self.buffer[0], self.buffer[1]);

        let body = &self.buffer[TYPE_LEN..len - TRAILER_LEN];
        let mut payload = [0u8; MAX_PAYLOAD_SIZE];
        let count = body.len() / 2;
        for (slot, pair) in payload.iter_mut().zip(body.chunks_exact(2)) {
            *slot = join_nibbles(pair[0], pair[1]);
        }
        let payload = &payload[..count];

        if self.policy == TrailerPolicy::Crc16 {
            let actual = join_trailer(&self.buffer[len - TRAILER_LEN..]);
            let expected = self.policy.trailer(type_id, payload);
            if actual != expected {
                return Err(FrameError::ChecksumMismatch { expected, actual });
            }
        }

        self.registry.dispatch(type_id, payload, ctx)?;
        Ok(type_id)
    }
}
