//! # Rusty Bridge
//!
//! A serial-controlled bus bridge: a host sends single-letter commands over a
//! byte link, and the bridge turns them into read and write cycles on an
//! external 8-bit bus (Z80 style, BUSRQ/BUSACK arbitrated) through a shared
//! 8-bit conductor group, a 3-bit select field and a write strobe.
//!
//! Layers, bottom up:
//! - [`encoding`]: select codes and control words as raw port bit patterns
//! - [`hardware`]: the `BusPort` seam and the register bit-banging behind it
//! - [`multiplexer`], [`arbiter`], [`sequencer`], [`block`]: the bus protocol
//! - [`protocol`]: the command loop the host talks to
//! - [`client`], [`loader`]: the host side, including Intel HEX upload
//! - [`sim`]: a pin-level board model for running everything without hardware

pub mod arbiter;
pub mod block;
pub mod bridge;
pub mod bus;
pub mod client;
pub mod config;
pub mod encoding;
pub mod error;
pub mod hardware;
pub mod hex;
pub mod loader;
pub mod multiplexer;
pub mod pin;
pub mod protocol;
pub mod sequencer;
pub mod sim;
pub mod transport;
pub mod types;

// Re-export commonly used items for easier importing
pub use arbiter::BusArbiter;
pub use bridge::{Bridge, CycleStats, Timing};
pub use config::BridgeConfig;
pub use encoding::{ControlWord, SelectCode};
pub use error::BridgeError;
pub use hardware::{BusPort, RegisterPort, Registers};
pub use multiplexer::SignalMultiplexer;
pub use pin::{Pin, PinValue};
pub use types::{Address, AddressSpace, BusOwnership};
