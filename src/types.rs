use serde::{Deserialize, Serialize};
use std::fmt;

/// 16-bit location on the external bus. Arithmetic wraps at 0xFFFF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(u16);

impl Address {
    pub const fn new(value: u16) -> Self {
        Address(value)
    }

    pub const fn value(&self) -> u16 {
        self.0
    }

    /// Byte latched through the address-low select code.
    pub const fn low(&self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    /// Byte latched through the address-high select code.
    pub const fn high(&self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub const fn from_halves(high: u8, low: u8) -> Self {
        Address(((high as u16) << 8) | low as u16)
    }

    pub fn inc(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }

    pub const fn next(&self) -> Self {
        Address(self.0.wrapping_add(1))
    }

    pub const fn wrapping_add(&self, value: u16) -> Self {
        Address(self.0.wrapping_add(value))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:04X}", self.0)
    }
}

impl From<u16> for Address {
    fn from(value: u16) -> Self {
        Address::new(value)
    }
}

impl From<Address> for u16 {
    fn from(value: Address) -> Self {
        value.value()
    }
}

/// Which space a bus cycle targets: memory (`/MREQ`) or I/O (`/IORQ`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressSpace {
    #[default]
    Memory,
    Io,
}

impl fmt::Display for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressSpace::Memory => write!(f, "memory"),
            AddressSpace::Io => write!(f, "io"),
        }
    }
}

/// Who currently drives the external bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BusOwnership {
    #[default]
    HostOwned,
    BridgeOwned,
}

impl BusOwnership {
    pub fn is_bridge_owned(&self) -> bool {
        matches!(self, BusOwnership::BridgeOwned)
    }
}
