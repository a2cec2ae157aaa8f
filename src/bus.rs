use std::fmt;

use crate::pin::{DriveStrength, Pin, PinValue};

/// Width of the shared conductor group.
pub const GROUP_WIDTH: usize = 8;

/// The shared 8-bit conductor group between the bridge, the far-end latches
/// and the target's data bus. Every party registers itself as a named driver
/// on the pins it drives; the settled value is resolved per pin.
#[derive(Debug, Clone)]
pub struct SignalGroup {
    name: String,
    pins: Vec<Pin>,
}

impl SignalGroup {
    pub fn new(name: String) -> Self {
        let pins = vec![Pin::default(); GROUP_WIDTH];
        SignalGroup { name, pins }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Drives every pin selected by `mask` with the matching bit of `value`.
    pub fn drive_bits(&mut self, driver: &'static str, value: u8, mask: u8, strength: DriveStrength) {
        for (i, pin) in self.pins.iter_mut().enumerate() {
            if mask & (1 << i) != 0 {
                let level = PinValue::from(value & (1 << i) != 0);
                pin.set_driver(driver, level, strength);
            }
        }
    }

    pub fn drive_byte(&mut self, driver: &'static str, value: u8, strength: DriveStrength) {
        self.drive_bits(driver, value, 0xFF, strength);
    }

    /// Withdraws `driver` from the pins selected by `mask`.
    pub fn release_bits(&mut self, driver: &'static str, mask: u8) {
        for (i, pin) in self.pins.iter_mut().enumerate() {
            if mask & (1 << i) != 0 {
                pin.remove_driver(driver);
            }
        }
    }

    pub fn release(&mut self, driver: &'static str) {
        self.release_bits(driver, 0xFF);
    }

    /// Reads the settled byte. A floating pin reads as high, the way an
    /// unloaded TTL input does.
    pub fn read_byte(&self) -> u8 {
        self.pins
            .iter()
            .enumerate()
            .filter(|(_, pin)| pin.read().level().unwrap_or(true))
            .fold(0u8, |acc, (i, _)| acc | (1 << i))
    }

    /// Bit mask of pins whose strongest drivers currently disagree.
    pub fn contention_mask(&self) -> u8 {
        self.pins
            .iter()
            .enumerate()
            .filter(|(_, pin)| pin.is_contended())
            .fold(0u8, |acc, (i, _)| acc | (1 << i))
    }

    pub fn check_contention(&self) -> Result<(), String> {
        match self.contention_mask() {
            0 => Ok(()),
            mask => Err(format!(
                "Bus contention on {}: multiple drivers conflict (mask {:08b})",
                self.name, mask
            )),
        }
    }

    pub fn is_driven_by(&self, driver: &str) -> bool {
        self.pins.iter().any(|pin| pin.drivers().contains_key(driver))
    }
}

impl fmt::Display for SignalGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.name)?;
        for pin in self.pins.iter().rev() {
            write!(f, "{}", pin.read().symbol())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_creation() {
        let group = SignalGroup::new("BUS".to_string());
        assert_eq!(group.name(), "BUS");
        assert_eq!(group.to_string(), "BUS: ZZZZZZZZ");
    }

    #[test]
    fn test_drive_and_read_byte() {
        let mut group = SignalGroup::new("BUS".to_string());
        group.drive_byte("bridge", 0xA5, DriveStrength::Standard);
        assert_eq!(group.read_byte(), 0xA5);
        assert_eq!(group.to_string(), "BUS: 10100101");

        group.release("bridge");
        assert_eq!(group.read_byte(), 0xFF);
        assert!(!group.is_driven_by("bridge"));
    }

    #[test]
    fn test_pull_ups_yield_to_target() {
        let mut group = SignalGroup::new("BUS".to_string());
        group.drive_byte("pullup", 0xFF, DriveStrength::Weak);
        group.drive_byte("target", 0x3C, DriveStrength::Standard);
        assert_eq!(group.read_byte(), 0x3C);
        assert!(group.check_contention().is_ok());
    }

    #[test]
    fn test_contention_detection() {
        let mut group = SignalGroup::new("BUS".to_string());
        group.drive_byte("bridge", 0xF0, DriveStrength::Standard);
        group.drive_byte("target", 0xFF, DriveStrength::Standard);
        assert_eq!(group.contention_mask(), 0x0F);
        assert!(group.check_contention().is_err());
    }

    #[test]
    fn test_partial_drive() {
        let mut group = SignalGroup::new("BUS".to_string());
        group.drive_bits("bridge", 0x00, 0x0F, DriveStrength::Standard);
        assert_eq!(group.read_byte(), 0xF0);
        group.release_bits("bridge", 0x03);
        assert_eq!(group.read_byte(), 0xF3);
    }
}
