//! # Signal Encoding
//!
//! Translation between the logical signals the bridge talks about and the raw
//! bit patterns written to the microcontroller ports. Nothing outside this
//! module knows a port bit position.
//!
//! ## Port D
//!
//! ```text
//!   bit  7 6 5 4 3 2 1 0
//!        - W S S S A - -
//! ```
//!
//! - `W`: write strobe, active low. Only reaches the bus while its direction
//!   bit is set, otherwise the pin floats and the strobe stays inactive.
//! - `S`: 3-bit select field into a 74AC138 demultiplexer. The field is wired
//!   bit-reversed, so the demultiplexer output differs from the field value.
//! - `A`: BUSACK input, active low.
//! - bits 0-1 carry the UART and are never touched here.
//!
//! | field | 74AC138 | signal |
//! |-------|---------|--------|
//! | 000   | 0       | latch control word |
//! | 001   | 4       | BUSRQ |
//! | 010   | 2       | latch address high |
//! | 011   | 6       | not connected |
//! | 100   | 1       | latch address low |
//! | 101   | 5       | target RESET |
//! | 110   | 3       | latch data |
//! | 111   | 7       | not connected (idle) |
//!
//! ## Control word
//!
//! The control latch drives the target's active-low strobes
//! `----/IORQ /MREQ /WR /RD` while the bridge owns the bus.

use crate::types::AddressSpace;
use std::fmt;

/// Port D bits that are outputs while no write strobe is being issued.
pub const SELECT_OUTPUTS: u8 = 0b0011_1000;
/// Port D bits that are outputs while the write strobe is enabled.
pub const STROBE_OUTPUTS: u8 = 0b0111_1000;
/// Write strobe bit on port D (active low).
pub const STROBE_BIT: u8 = 0b0100_0000;
/// BUSACK input bit on port D (active low).
pub const BUSACK_BIT: u8 = 0b0000_0100;

const SELECT_SHIFT: u8 = 3;
const SELECT_MASK: u8 = 0b111;

/// Logical meaning of the 3-bit select field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SelectCode {
    LatchControl,
    SelectAddrLow,
    SelectAddrHigh,
    SelectData,
    RequestBus,
    ResetTarget,
    /// Resting state whenever no transaction is in flight.
    #[default]
    Idle,
}

impl SelectCode {
    pub const ALL: [SelectCode; 7] = [
        SelectCode::LatchControl,
        SelectCode::SelectAddrLow,
        SelectCode::SelectAddrHigh,
        SelectCode::SelectData,
        SelectCode::RequestBus,
        SelectCode::ResetTarget,
        SelectCode::Idle,
    ];

    /// Raw value of the select field as driven by the microcontroller.
    pub const fn field(&self) -> u8 {
        match self {
            SelectCode::LatchControl => 0b000,
            SelectCode::RequestBus => 0b001,
            SelectCode::SelectAddrHigh => 0b010,
            SelectCode::SelectAddrLow => 0b100,
            SelectCode::ResetTarget => 0b101,
            SelectCode::SelectData => 0b110,
            SelectCode::Idle => 0b111,
        }
    }

    /// Decodes a select field. `011` is not wired to anything.
    pub const fn from_field(field: u8) -> Option<SelectCode> {
        match field & SELECT_MASK {
            0b000 => Some(SelectCode::LatchControl),
            0b001 => Some(SelectCode::RequestBus),
            0b010 => Some(SelectCode::SelectAddrHigh),
            0b100 => Some(SelectCode::SelectAddrLow),
            0b101 => Some(SelectCode::ResetTarget),
            0b110 => Some(SelectCode::SelectData),
            0b111 => Some(SelectCode::Idle),
            _ => None,
        }
    }

    /// Full port D value asserting this code with the write strobe inactive.
    pub const fn port_value(&self) -> u8 {
        0b1100_0111 | (self.field() << SELECT_SHIFT)
    }

    /// Port D value asserting this code with the write strobe pulled low.
    pub const fn port_value_with_strobe(&self) -> u8 {
        self.port_value() & !STROBE_BIT
    }

    /// Decodes the select code held on a port D value.
    pub const fn from_port_value(value: u8) -> Option<SelectCode> {
        SelectCode::from_field(value >> SELECT_SHIFT)
    }

    /// 74AC138 output line selected by this code.
    pub const fn demux_output(&self) -> u8 {
        reverse_field(self.field())
    }

    /// Codes that commit the shared conductor value into a far-end latch.
    pub const fn is_latch(&self) -> bool {
        matches!(
            self,
            SelectCode::LatchControl
                | SelectCode::SelectAddrLow
                | SelectCode::SelectAddrHigh
                | SelectCode::SelectData
        )
    }
}

impl fmt::Display for SelectCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SelectCode::LatchControl => "CTRL",
            SelectCode::SelectAddrLow => "ADDR_L",
            SelectCode::SelectAddrHigh => "ADDR_H",
            SelectCode::SelectData => "DATA",
            SelectCode::RequestBus => "BUSRQ",
            SelectCode::ResetTarget => "RESET",
            SelectCode::Idle => "IDLE",
        };
        f.write_str(name)
    }
}

const fn reverse_field(field: u8) -> u8 {
    ((field & 0b001) << 2) | (field & 0b010) | ((field & 0b100) >> 2)
}

/// Command byte latched into the control register ahead of a bus cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlWord {
    ReadMemory,
    WriteMemory,
    ReadIo,
    WriteIo,
}

const RD: u8 = 0b0001;
const WR: u8 = 0b0010;
const MREQ: u8 = 0b0100;
const IORQ: u8 = 0b1000;

impl ControlWord {
    pub const fn read(space: AddressSpace) -> Self {
        match space {
            AddressSpace::Memory => ControlWord::ReadMemory,
            AddressSpace::Io => ControlWord::ReadIo,
        }
    }

    pub const fn write(space: AddressSpace) -> Self {
        match space {
            AddressSpace::Memory => ControlWord::WriteMemory,
            AddressSpace::Io => ControlWord::WriteIo,
        }
    }

    /// Active-low control byte; unused upper bits are held high.
    pub const fn raw(&self) -> u8 {
        let asserted = match self {
            ControlWord::ReadMemory => MREQ | RD,
            ControlWord::WriteMemory => MREQ | WR,
            ControlWord::ReadIo => IORQ | RD,
            ControlWord::WriteIo => IORQ | WR,
        };
        !asserted
    }

    pub const fn from_raw(raw: u8) -> Option<ControlWord> {
        let asserted = !raw & 0x0F;
        if raw & 0xF0 != 0xF0 {
            return None;
        }
        match asserted {
            x if x == MREQ | RD => Some(ControlWord::ReadMemory),
            x if x == MREQ | WR => Some(ControlWord::WriteMemory),
            x if x == IORQ | RD => Some(ControlWord::ReadIo),
            x if x == IORQ | WR => Some(ControlWord::WriteIo),
            _ => None,
        }
    }

    pub const fn space(&self) -> AddressSpace {
        match self {
            ControlWord::ReadMemory | ControlWord::WriteMemory => AddressSpace::Memory,
            ControlWord::ReadIo | ControlWord::WriteIo => AddressSpace::Io,
        }
    }

    pub const fn is_read(&self) -> bool {
        matches!(self, ControlWord::ReadMemory | ControlWord::ReadIo)
    }

    pub const fn is_write(&self) -> bool {
        !self.is_read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(SelectCode::Idle, 0b1111_1111)]
    #[case(SelectCode::SelectAddrLow, 0b1110_0111)]
    #[case(SelectCode::SelectAddrHigh, 0b1101_0111)]
    #[case(SelectCode::SelectData, 0b1111_0111)]
    #[case(SelectCode::LatchControl, 0b1100_0111)]
    #[case(SelectCode::RequestBus, 0b1100_1111)]
    #[case(SelectCode::ResetTarget, 0b1110_1111)]
    fn test_select_port_values(#[case] code: SelectCode, #[case] expected: u8) {
        assert_eq!(code.port_value(), expected);
        assert_eq!(SelectCode::from_port_value(expected), Some(code));
    }

    #[test]
    fn test_write_strobe_value() {
        assert_eq!(SelectCode::RequestBus.port_value_with_strobe(), 0b1000_1111);
        assert_eq!(
            SelectCode::from_port_value(0b1000_1111),
            Some(SelectCode::RequestBus)
        );
    }

    #[rstest]
    #[case(SelectCode::LatchControl, 0)]
    #[case(SelectCode::RequestBus, 4)]
    #[case(SelectCode::SelectAddrHigh, 2)]
    #[case(SelectCode::SelectAddrLow, 1)]
    #[case(SelectCode::ResetTarget, 5)]
    #[case(SelectCode::SelectData, 3)]
    #[case(SelectCode::Idle, 7)]
    fn test_demux_wiring(#[case] code: SelectCode, #[case] output: u8) {
        assert_eq!(code.demux_output(), output);
    }

    #[test]
    fn test_unconnected_field_does_not_decode() {
        assert_eq!(SelectCode::from_field(0b011), None);
    }

    #[test]
    fn test_every_code_round_trips_through_field() {
        for code in SelectCode::ALL {
            assert_eq!(SelectCode::from_field(code.field()), Some(code));
        }
    }

    #[rstest]
    #[case(ControlWord::ReadMemory, 0b1111_1010)]
    #[case(ControlWord::WriteMemory, 0b1111_1001)]
    #[case(ControlWord::ReadIo, 0b1111_0110)]
    #[case(ControlWord::WriteIo, 0b1111_0101)]
    fn test_control_word_values(#[case] word: ControlWord, #[case] raw: u8) {
        assert_eq!(word.raw(), raw);
        assert_eq!(ControlWord::from_raw(raw), Some(word));
    }

    #[test]
    fn test_control_word_rejects_garbage() {
        assert_eq!(ControlWord::from_raw(0xFF), None);
        assert_eq!(ControlWord::from_raw(0b1111_1000), None);
        assert_eq!(ControlWord::from_raw(0b0111_1010), None);
    }

    #[test]
    fn test_control_word_space() {
        assert_eq!(ControlWord::read(AddressSpace::Io), ControlWord::ReadIo);
        assert_eq!(ControlWord::write(AddressSpace::Memory), ControlWord::WriteMemory);
        assert_eq!(ControlWord::WriteIo.space(), AddressSpace::Io);
        assert!(ControlWord::ReadMemory.is_read());
        assert!(ControlWord::WriteIo.is_write());
    }
}
