//! otlink Hardware Abstraction Layer
//!
//! Traits for the two hardware collaborators of the bridge: the serial
//! link to the co-processor and the GPIO lines that strap and reset it.
//! Chip-specific crates (ESP32, RP2040, host serial ports, ...) implement
//! these so the protocol and session crates stay board-agnostic.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  otlink-core (session, OpenTherm)       │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  otlink-hal (this crate - traits)       │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//!           chip / host serial driver
//! ```
//!
//! # Traits
//!
//! - [`uart::UartTx`], [`uart::UartRx`] - Serial communication
//! - [`gpio::OutputPin`] - Reset and boot-strap lines

#![no_std]
#![deny(unsafe_code)]

pub mod gpio;
pub mod uart;

pub use gpio::{Level, OutputPin};
pub use uart::{Parity, StopBits, Uart, UartConfig, UartRx, UartTx, BAUD_RATE};
