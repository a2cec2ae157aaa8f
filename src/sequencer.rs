//! Cycle sequencer: one complete read or write transaction against the
//! external bus.
//!
//! Every cycle follows the same preamble: control word, address low, address
//! high. Only then is ownership requested, and the data lines are only
//! sampled (or the write strobe pulsed) once the acknowledge has been seen.

use crate::arbiter::BusArbiter;
use crate::bridge::Bridge;
use crate::encoding::{ControlWord, SelectCode};
use crate::error::BridgeError;
use crate::hardware::BusPort;
use crate::multiplexer::SignalMultiplexer;
use crate::types::{Address, AddressSpace};

impl<P: BusPort> Bridge<P> {
    pub fn read_byte(&mut self, address: Address) -> Result<u8, BridgeError> {
        self.read_cycle(AddressSpace::Memory, address)
    }

    pub fn write_byte(&mut self, address: Address, value: u8) -> Result<(), BridgeError> {
        self.write_cycle(AddressSpace::Memory, address, value)
    }

    pub fn read_io(&mut self, address: Address) -> Result<u8, BridgeError> {
        self.read_cycle(AddressSpace::Io, address)
    }

    pub fn write_io(&mut self, address: Address, value: u8) -> Result<(), BridgeError> {
        self.write_cycle(AddressSpace::Io, address, value)
    }

    pub fn read_cycle(&mut self, space: AddressSpace, address: Address) -> Result<u8, BridgeError> {
        self.latch_control(ControlWord::read(space));
        self.latch_address(address);

        // The target drives the conductors once it grants the bus
        self.port.float();
        if let Err(err) = self.acquire() {
            self.stats.timeouts += 1;
            log::warn!("{space} read at {address} abandoned: {err}");
            return Err(err);
        }

        let value = self.port.sample();
        self.release();
        self.stats.reads += 1;

        log::trace!("{space} read {address} -> {value:02X}");
        Ok(value)
    }

    pub fn write_cycle(
        &mut self,
        space: AddressSpace,
        address: Address,
        value: u8,
    ) -> Result<(), BridgeError> {
        self.latch_control(ControlWord::write(space));
        self.latch_address(address);
        self.latch(SelectCode::SelectData, value);

        // The data latch feeds the target; our own outputs must not fight it
        self.port.float();
        if let Err(err) = self.acquire() {
            self.stats.timeouts += 1;
            log::warn!("{space} write at {address} abandoned: {err}");
            return Err(err);
        }

        let strobe = self.timing.strobe;
        self.port.set_write_strobe(true);
        self.port.delay(strobe);
        self.port.set_write_strobe(false);
        self.release();
        self.stats.writes += 1;

        log::trace!("{space} write {address} <- {value:02X}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::Timing;
    use crate::types::BusOwnership;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Select(SelectCode),
        Drive(u8),
        Float,
        Sample,
        Poll,
        Strobe(bool),
        Delay,
    }

    struct ScriptPort {
        calls: Vec<Call>,
        polls_until_ack: Option<u32>,
        sample_value: u8,
    }

    impl ScriptPort {
        fn new(polls_until_ack: Option<u32>) -> Self {
            ScriptPort {
                calls: Vec::new(),
                polls_until_ack,
                sample_value: 0x99,
            }
        }
    }

    impl BusPort for ScriptPort {
        fn assert_select(&mut self, code: SelectCode) {
            self.calls.push(Call::Select(code));
        }
        fn drive(&mut self, value: u8) {
            self.calls.push(Call::Drive(value));
        }
        fn float(&mut self) {
            self.calls.push(Call::Float);
        }
        fn sample(&mut self) -> u8 {
            self.calls.push(Call::Sample);
            self.sample_value
        }
        fn bus_acknowledged(&mut self) -> bool {
            self.calls.push(Call::Poll);
            match self.polls_until_ack.as_mut() {
                Some(0) => true,
                Some(n) => {
                    *n -= 1;
                    false
                }
                None => false,
            }
        }
        fn set_write_strobe(&mut self, active: bool) {
            self.calls.push(Call::Strobe(active));
        }
        fn delay(&mut self, _duration: Duration) {
            self.calls.push(Call::Delay);
        }
    }

    fn bridge(polls_until_ack: Option<u32>) -> Bridge<ScriptPort> {
        let timing = Timing {
            settle: Duration::from_nanos(1),
            strobe: Duration::from_nanos(1),
            ack_timeout: Some(Duration::from_millis(5)),
        };
        let mut bridge = Bridge::new(ScriptPort::new(polls_until_ack), timing);
        bridge.port_mut().calls.clear();
        bridge
    }

    fn latch_calls(code: SelectCode, value: u8) -> Vec<Call> {
        vec![
            Call::Drive(value),
            Call::Select(code),
            Call::Delay,
            Call::Select(SelectCode::Idle),
        ]
    }

    fn preamble(word: ControlWord, address: Address) -> Vec<Call> {
        let mut calls = latch_calls(SelectCode::LatchControl, word.raw());
        calls.extend(latch_calls(SelectCode::SelectAddrLow, address.low()));
        calls.extend(latch_calls(SelectCode::SelectAddrHigh, address.high()));
        calls
    }

    #[test]
    fn test_read_cycle_call_order() {
        let mut bridge = bridge(Some(1));
        let value = bridge.read_byte(Address::new(0x1234)).unwrap();
        assert_eq!(value, 0x99);

        let mut expected = preamble(ControlWord::ReadMemory, Address::new(0x1234));
        expected.extend([
            Call::Float,
            Call::Select(SelectCode::RequestBus),
            Call::Poll,
            Call::Poll,
            Call::Sample,
            Call::Select(SelectCode::Idle),
        ]);
        assert_eq!(bridge.port().calls, expected);
        assert_eq!(bridge.ownership(), BusOwnership::HostOwned);
        assert_eq!(bridge.stats().reads, 1);
    }

    #[test]
    fn test_write_cycle_call_order() {
        let mut bridge = bridge(Some(0));
        bridge.write_io(Address::new(0x00FE), 0x2A).unwrap();

        let mut expected = preamble(ControlWord::WriteIo, Address::new(0x00FE));
        expected.extend(latch_calls(SelectCode::SelectData, 0x2A));
        expected.extend([
            Call::Float,
            Call::Select(SelectCode::RequestBus),
            Call::Poll,
            Call::Strobe(true),
            Call::Delay,
            Call::Strobe(false),
            Call::Select(SelectCode::Idle),
        ]);
        assert_eq!(bridge.port().calls, expected);
        assert_eq!(bridge.stats().writes, 1);
    }

    #[test]
    fn test_unacknowledged_request_times_out() {
        let mut bridge = bridge(None);
        let err = bridge.read_byte(Address::new(0)).unwrap_err();
        assert!(matches!(err, BridgeError::BusTimeout { .. }));

        let calls = &bridge.port().calls;
        assert_eq!(calls.last(), Some(&Call::Select(SelectCode::Idle)));
        assert!(!calls.contains(&Call::Sample));
        assert_eq!(bridge.ownership(), BusOwnership::HostOwned);
        assert_eq!(bridge.stats().timeouts, 1);
        assert_eq!(bridge.stats().reads, 0);
    }

    #[test]
    fn test_timed_out_write_never_strobes() {
        let mut bridge = bridge(None);
        assert!(bridge.write_byte(Address::new(0x10), 1).is_err());
        assert!(!bridge.port().calls.contains(&Call::Strobe(true)));
    }
}
