//! # Hardware Access
//!
//! `BusPort` is the seam between the bus protocol and the physical signals.
//! The sequencing code only ever talks to a `BusPort`; `RegisterPort` is the
//! implementation that bit-bangs the microcontroller's port registers, and it
//! sits on top of any `Registers` provider (real registers or the simulated
//! board in [`crate::sim`]).

use std::time::Duration;

use crate::encoding::{SelectCode, BUSACK_BIT, SELECT_OUTPUTS, STROBE_OUTPUTS};

/// Signal-level operations the bus protocol is built from.
pub trait BusPort {
    /// Puts `code` on the select lines. Exactly one code is asserted at a time.
    fn assert_select(&mut self, code: SelectCode);

    /// Switches the shared conductor group to output and drives `value`.
    fn drive(&mut self, value: u8);

    /// Switches the shared conductor group to input with pull-ups enabled.
    fn float(&mut self);

    /// Reads the shared conductor group.
    fn sample(&mut self) -> u8;

    fn request_bus(&mut self) {
        self.assert_select(SelectCode::RequestBus);
    }

    /// Polls the acknowledge input once.
    fn bus_acknowledged(&mut self) -> bool;

    /// Enables and pulls (or releases and disables) the write strobe line.
    fn set_write_strobe(&mut self, active: bool);

    fn delay(&mut self, duration: Duration);

    /// Brings every line to the safe resting state.
    fn initialize(&mut self) {
        self.set_write_strobe(false);
        self.assert_select(SelectCode::Idle);
        self.float();
    }
}

/// Microcontroller registers touched by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    /// Conductor group output latch (pull-up enables while input).
    PortB,
    DdrB,
    /// Conductor group input pins.
    PinB,
    /// Select, strobe and acknowledge output latch.
    PortD,
    DdrD,
    PinD,
}

pub trait Registers {
    fn write(&mut self, register: Register, value: u8);
    fn read(&mut self, register: Register) -> u8;
    fn delay(&mut self, duration: Duration);
}

/// `BusPort` over raw port registers, using the firmware's register values
/// and write order.
#[derive(Debug)]
pub struct RegisterPort<R: Registers> {
    registers: R,
    select: SelectCode,
}

impl<R: Registers> RegisterPort<R> {
    pub fn new(registers: R) -> Self {
        RegisterPort {
            registers,
            select: SelectCode::Idle,
        }
    }

    pub fn registers(&self) -> &R {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut R {
        &mut self.registers
    }

    pub fn into_inner(self) -> R {
        self.registers
    }

    /// Select code most recently written to port D.
    pub fn select(&self) -> SelectCode {
        self.select
    }
}

impl<R: Registers> BusPort for RegisterPort<R> {
    fn assert_select(&mut self, code: SelectCode) {
        self.select = code;
        self.registers.write(Register::PortD, code.port_value());
    }

    fn drive(&mut self, value: u8) {
        self.registers.write(Register::DdrB, 0xFF);
        self.registers.write(Register::PortB, value);
    }

    fn float(&mut self) {
        self.registers.write(Register::PortB, 0xFF);
        self.registers.write(Register::DdrB, 0x00);
    }

    fn sample(&mut self) -> u8 {
        self.registers.read(Register::PinB)
    }

    fn bus_acknowledged(&mut self) -> bool {
        self.registers.read(Register::PinD) & BUSACK_BIT == 0
    }

    fn set_write_strobe(&mut self, active: bool) {
        if active {
            self.registers.write(Register::DdrD, STROBE_OUTPUTS);
            self.registers
                .write(Register::PortD, self.select.port_value_with_strobe());
        } else {
            self.registers.write(Register::PortD, self.select.port_value());
            self.registers.write(Register::DdrD, SELECT_OUTPUTS);
        }
    }

    fn delay(&mut self, duration: Duration) {
        self.registers.delay(duration);
    }

    fn initialize(&mut self) {
        self.select = SelectCode::Idle;
        self.registers.write(Register::DdrD, SELECT_OUTPUTS);
        self.registers.write(Register::PortD, SelectCode::Idle.port_value());
        self.registers.write(Register::DdrB, 0x00);
        self.registers.write(Register::PortB, 0xFF);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingRegisters {
        writes: Vec<(Register, u8)>,
        pin_d: u8,
        pin_b: u8,
        delayed: Duration,
    }

    impl Registers for RecordingRegisters {
        fn write(&mut self, register: Register, value: u8) {
            self.writes.push((register, value));
        }

        fn read(&mut self, register: Register) -> u8 {
            match register {
                Register::PinB => self.pin_b,
                Register::PinD => self.pin_d,
                _ => 0,
            }
        }

        fn delay(&mut self, duration: Duration) {
            self.delayed += duration;
        }
    }

    #[test]
    fn test_initialize_matches_firmware_startup() {
        let mut port = RegisterPort::new(RecordingRegisters::default());
        port.initialize();
        assert_eq!(
            port.registers().writes,
            vec![
                (Register::DdrD, 0b0011_1000),
                (Register::PortD, 0b1111_1111),
                (Register::DdrB, 0x00),
                (Register::PortB, 0xFF),
            ]
        );
    }

    #[test]
    fn test_write_strobe_sequence() {
        let mut port = RegisterPort::new(RecordingRegisters::default());
        port.request_bus();
        port.set_write_strobe(true);
        port.set_write_strobe(false);
        assert_eq!(
            port.registers().writes,
            vec![
                (Register::PortD, 0b1100_1111),
                (Register::DdrD, 0b0111_1000),
                (Register::PortD, 0b1000_1111),
                (Register::PortD, 0b1100_1111),
                (Register::DdrD, 0b0011_1000),
            ]
        );
    }

    #[test]
    fn test_drive_and_float() {
        let mut port = RegisterPort::new(RecordingRegisters::default());
        port.drive(0x42);
        port.float();
        assert_eq!(
            port.into_inner().writes,
            vec![
                (Register::DdrB, 0xFF),
                (Register::PortB, 0x42),
                (Register::PortB, 0xFF),
                (Register::DdrB, 0x00),
            ]
        );
    }

    #[test]
    fn test_acknowledge_is_active_low() {
        let mut port = RegisterPort::new(RecordingRegisters {
            pin_d: 0xFF,
            ..Default::default()
        });
        assert!(!port.bus_acknowledged());
        port.registers_mut().pin_d = 0xFF & !BUSACK_BIT;
        assert!(port.bus_acknowledged());
    }

    #[test]
    fn test_sample_and_delay_pass_through() {
        let mut port = RegisterPort::new(RecordingRegisters {
            pin_b: 0x5A,
            ..Default::default()
        });
        assert_eq!(port.sample(), 0x5A);
        port.delay(Duration::from_micros(3));
        assert_eq!(port.registers().delayed, Duration::from_micros(3));
    }
}
