//! Signal multiplexer: commits values into the far-end latches through the
//! shared conductor group.

use std::time::Duration;

use crate::encoding::{ControlWord, SelectCode};
use crate::hardware::BusPort;
use crate::types::Address;

pub trait SignalMultiplexer {
    fn signal_port(&mut self) -> &mut dyn BusPort;

    /// Minimum time a select code stays asserted before returning to idle.
    fn settle_time(&self) -> Duration;

    /// Asserts `code` for the settle time, then returns the select lines to
    /// idle. Never leaves a non-idle code asserted.
    fn pulse(&mut self, code: SelectCode) {
        let settle = self.settle_time();
        let port = self.signal_port();
        port.assert_select(code);
        port.delay(settle);
        port.assert_select(SelectCode::Idle);
    }

    /// Drives `value` on the shared conductors and latches it into the
    /// register addressed by `code`.
    fn latch(&mut self, code: SelectCode, value: u8) {
        self.signal_port().drive(value);
        self.pulse(code);
    }

    fn latch_control(&mut self, word: ControlWord) {
        self.latch(SelectCode::LatchControl, word.raw());
    }

    /// Latches the low half, then the high half.
    fn latch_address(&mut self, address: Address) {
        self.latch(SelectCode::SelectAddrLow, address.low());
        self.latch(SelectCode::SelectAddrHigh, address.high());
    }
}
