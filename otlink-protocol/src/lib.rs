//! Co-processor Serial Protocol
//!
//! This crate implements the byte framing used between the host controller
//! and the OpenTherm co-processor. Every logical byte travels as two wire
//! bytes, each carrying one nibble, so the sentinels can never appear
//! inside a frame body.
//!
//! # Frame Format
//!
//! ```text
//! ┌───────┬──────────┬──────────────────┬──────────┬──────┐
//! │ START │ TYPE     │ PAYLOAD          │ TRAILER  │ STOP │
//! │ 0xA0  │ 2 nibble │ 2 nibbles / byte │ 4 nibble │ 0x60 │
//! └───────┴──────────┴──────────────────┴──────────┴──────┘
//! ```
//!
//! A frame whose type is [`STREAM_REQ_ID`] switches the receiver into
//! streaming mode: every following nibble pair up to STOP is handed to the
//! streaming callback as it arrives instead of being buffered.
//!
//! Incoming frames are dispatched through a [`PacketRegistry`] that maps the
//! type byte to a statically-typed [`Packet`] and its handler.

#![no_std]
#![deny(unsafe_code)]

pub mod crc;
pub mod engine;
pub mod frame;
pub mod packets;
pub mod registry;

pub use engine::{FrameEvents, FrameStats, FramingEngine};
pub use frame::{
    encode, encode_stream, encode_to_vec, frame_len, serialize, FrameError, TrailerPolicy,
    BUFFER_SIZE, MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE, START_BYTE, STOP_BYTE, STREAM_REQ_ID,
};
pub use packets::{
    CpuStatusRequest, CpuStatusResponse, GenericStatusResponse, LogRequest, OtCommandRequest,
    OtCommandResponse,
};
pub use registry::{Packet, PacketHandler, PacketRegistry, RegistryError};
