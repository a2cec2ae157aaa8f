use crate::encoding::{ControlWord, SelectCode};
use crate::types::Address;

/// The four far-end registers loaded through the shared conductor group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatchBank {
    pub control: u8,
    pub address_low: u8,
    pub address_high: u8,
    pub data: u8,
}

impl Default for LatchBank {
    fn default() -> Self {
        // Control lines are active low; a cleared bank strobes nothing
        LatchBank {
            control: 0xFF,
            address_low: 0,
            address_high: 0,
            data: 0,
        }
    }
}

impl LatchBank {
    /// Stores `value` in the register behind `code`. Returns false for codes
    /// that have no latch behind them.
    pub fn capture(&mut self, code: SelectCode, value: u8) -> bool {
        match self.slot(code) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn value(&self, code: SelectCode) -> Option<u8> {
        match code {
            SelectCode::LatchControl => Some(self.control),
            SelectCode::SelectAddrLow => Some(self.address_low),
            SelectCode::SelectAddrHigh => Some(self.address_high),
            SelectCode::SelectData => Some(self.data),
            _ => None,
        }
    }

    pub fn address(&self) -> Address {
        Address::from_halves(self.address_high, self.address_low)
    }

    /// The latched control byte, if it is one of the four cycle words.
    pub fn control_word(&self) -> Option<ControlWord> {
        ControlWord::from_raw(self.control)
    }

    fn slot(&mut self, code: SelectCode) -> Option<&mut u8> {
        match code {
            SelectCode::LatchControl => Some(&mut self.control),
            SelectCode::SelectAddrLow => Some(&mut self.address_low),
            SelectCode::SelectAddrHigh => Some(&mut self.address_high),
            SelectCode::SelectData => Some(&mut self.data),
            _ => None,
        }
    }
}
