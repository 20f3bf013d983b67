//! OpenTherm bridge core
//!
//! Host-side logic for driving an OpenTherm boiler through a serial
//! co-processor:
//!
//! - OpenTherm message model (packing, parity, value decoding)
//! - Request/response session over the nibble-framed link
//! - Session configuration and its persisted form
//! - Co-processor reset/boot-strap sequencing
//!
//! ```text
//! bytes ─► FramingEngine ─► PacketRegistry ─► Session inbox ─► get_message()
//! ```

#![no_std]
#![deny(unsafe_code)]

#[macro_use]
mod fmt;

pub mod config;
pub mod coprocessor;
pub mod message;
pub mod session;

pub use config::{ConfigError, SessionConfig, TrailerMode};
pub use coprocessor::Coprocessor;
pub use message::{check_parity, with_parity, MessageId, MessageType, OpenThermMessage, ValueKind};
pub use session::{Mode, Session, SessionError};
