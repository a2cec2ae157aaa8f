use std::fmt;
use std::time::Duration;

use crate::encoding::SelectCode;
use crate::types::{Address, AddressSpace};

/// One observable step on the simulated board, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// A far-end latch committed `value` when its select code was left.
    Latched {
        code: SelectCode,
        value: u8,
        held: Duration,
    },
    BusRequested,
    BusGranted { polls: u32 },
    BusReleased,
    /// The request was dropped before the target ever granted it.
    RequestWithdrawn,
    Sampled { value: u8, granted: bool },
    StrobeAsserted { granted: bool },
    StrobeReleased { width: Duration, granted: bool },
    TargetRead {
        space: AddressSpace,
        address: Address,
        value: u8,
    },
    TargetWrite {
        space: AddressSpace,
        address: Address,
        value: u8,
    },
    TargetReset,
    Contention { mask: u8 },
}

impl TraceEvent {
    pub fn is_latch_of(&self, code: SelectCode) -> bool {
        matches!(self, TraceEvent::Latched { code: c, .. } if *c == code)
    }
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceEvent::Latched { code, value, held } => {
                write!(f, "latch {code} <- {value:02X} (held {held:?})")
            }
            TraceEvent::BusRequested => write!(f, "BUSRQ"),
            TraceEvent::BusGranted { polls } => write!(f, "BUSACK after {polls} polls"),
            TraceEvent::BusReleased => write!(f, "bus released"),
            TraceEvent::RequestWithdrawn => write!(f, "request withdrawn"),
            TraceEvent::Sampled { value, granted } => {
                write!(f, "sample {value:02X} (granted: {granted})")
            }
            TraceEvent::StrobeAsserted { granted } => write!(f, "strobe low (granted: {granted})"),
            TraceEvent::StrobeReleased { width, granted } => {
                write!(f, "strobe high after {width:?} (granted: {granted})")
            }
            TraceEvent::TargetRead {
                space,
                address,
                value,
            } => write!(f, "{space} read {address} = {value:02X}"),
            TraceEvent::TargetWrite {
                space,
                address,
                value,
            } => write!(f, "{space} write {address} = {value:02X}"),
            TraceEvent::TargetReset => write!(f, "target reset"),
            TraceEvent::Contention { mask } => write!(f, "contention on {mask:08b}"),
        }
    }
}
