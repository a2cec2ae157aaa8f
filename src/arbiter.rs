//! Bus ownership handshake (BUSRQ / BUSACK).

use std::time::{Duration, Instant};

use crate::encoding::SelectCode;
use crate::error::BridgeError;
use crate::multiplexer::SignalMultiplexer;
use crate::types::BusOwnership;

pub trait BusArbiter: SignalMultiplexer {
    fn bus_ownership(&self) -> BusOwnership;
    fn set_bus_ownership(&mut self, ownership: BusOwnership);

    /// Upper bound on the acknowledge wait. `None` waits forever.
    fn ack_timeout(&self) -> Option<Duration>;

    /// Requests the bus and spins until the owner acknowledges.
    ///
    /// On timeout the request is withdrawn (select lines back to idle) and
    /// ownership stays with the host.
    fn acquire(&mut self) -> Result<(), BridgeError> {
        debug_assert_eq!(self.bus_ownership(), BusOwnership::HostOwned);

        let timeout = self.ack_timeout();
        let started = Instant::now();
        let mut polls: u64 = 0;

        self.signal_port().request_bus();
        loop {
            polls += 1;
            if self.signal_port().bus_acknowledged() {
                break;
            }
            if let Some(limit) = timeout {
                if started.elapsed() >= limit {
                    self.signal_port().assert_select(SelectCode::Idle);
                    log::warn!("BUSACK not seen after {polls} polls, request withdrawn");
                    return Err(BridgeError::BusTimeout {
                        waited: limit,
                        polls,
                    });
                }
            }
            std::hint::spin_loop();
        }

        log::trace!("bus granted after {polls} polls");
        self.set_bus_ownership(BusOwnership::BridgeOwned);
        Ok(())
    }

    /// Drops the request; the host owns the bus again immediately. The data
    /// lines must already be floating.
    fn release(&mut self) {
        self.signal_port().assert_select(SelectCode::Idle);
        self.set_bus_ownership(BusOwnership::HostOwned);
    }
}
