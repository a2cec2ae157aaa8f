use std::time::Duration;

use crate::arbiter::BusArbiter;
use crate::config::TimingConfig;
use crate::encoding::SelectCode;
use crate::hardware::BusPort;
use crate::multiplexer::SignalMultiplexer;
use crate::types::BusOwnership;

/// Device-dependent delays of the bus protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Hold time for every select code before returning to idle.
    pub settle: Duration,
    /// Width of the write strobe pulse.
    pub strobe: Duration,
    /// Bound on the acknowledge wait; `None` waits forever.
    pub ack_timeout: Option<Duration>,
}

impl Default for Timing {
    fn default() -> Self {
        Timing::from(&TimingConfig::default())
    }
}

impl From<&TimingConfig> for Timing {
    fn from(config: &TimingConfig) -> Self {
        Timing {
            settle: Duration::from_nanos(config.settle_ns),
            strobe: Duration::from_nanos(config.strobe_ns),
            ack_timeout: config.ack_timeout_ms.map(Duration::from_millis),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub reads: u64,
    pub writes: u64,
    pub timeouts: u64,
}

/// The bus-bridge engine: owns the hardware port and the ownership state.
/// Cycle operations live in `sequencer`, block transfers in `block`.
pub struct Bridge<P: BusPort> {
    pub(crate) port: P,
    pub(crate) timing: Timing,
    pub(crate) ownership: BusOwnership,
    pub(crate) stats: CycleStats,
}

impl<P: BusPort> Bridge<P> {
    /// Wraps `port` and parks every line in the idle state.
    pub fn new(mut port: P, timing: Timing) -> Self {
        port.initialize();
        Bridge {
            port,
            timing,
            ownership: BusOwnership::HostOwned,
            stats: CycleStats::default(),
        }
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    pub fn into_port(self) -> P {
        self.port
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn set_timing(&mut self, timing: Timing) {
        self.timing = timing;
    }

    pub fn ownership(&self) -> BusOwnership {
        self.ownership
    }

    pub fn stats(&self) -> CycleStats {
        self.stats
    }

    /// Pulses the target's RESET line through the demultiplexer.
    pub fn reset_target(&mut self) {
        log::info!("pulsing target reset");
        self.pulse(SelectCode::ResetTarget);
    }
}

impl<P: BusPort> SignalMultiplexer for Bridge<P> {
    fn signal_port(&mut self) -> &mut dyn BusPort {
        &mut self.port
    }

    fn settle_time(&self) -> Duration {
        self.timing.settle
    }
}

impl<P: BusPort> BusArbiter for Bridge<P> {
    fn bus_ownership(&self) -> BusOwnership {
        self.ownership
    }

    fn set_bus_ownership(&mut self, ownership: BusOwnership) {
        self.ownership = ownership;
    }

    fn ack_timeout(&self) -> Option<Duration> {
        self.timing.ack_timeout
    }
}
