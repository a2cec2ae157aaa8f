use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Level of a single conductor; `HighZ` when nothing drives it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PinValue {
    Low,
    High,
    #[default]
    HighZ,
}

impl PinValue {
    pub fn level(self) -> Option<bool> {
        match self {
            PinValue::Low => Some(false),
            PinValue::High => Some(true),
            PinValue::HighZ => None,
        }
    }

    /// Logic-analyzer style symbol: `0`, `1` or `Z`.
    pub fn symbol(self) -> char {
        match self.level() {
            Some(false) => '0',
            Some(true) => '1',
            None => 'Z',
        }
    }
}

impl From<bool> for PinValue {
    fn from(high: bool) -> Self {
        if high {
            PinValue::High
        } else {
            PinValue::Low
        }
    }
}

/// How hard a driver pulls a pin. Pull-up resistors are `Weak`, push-pull
/// outputs are `Standard`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveStrength {
    HighImpedance = 0,
    Weak = 1,
    Standard = 2,
}

impl Ord for DriveStrength {
    fn cmp(&self, other: &Self) -> Ordering {
        (*self as u8).cmp(&(*other as u8))
    }
}

impl PartialOrd for DriveStrength {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A single conductor with any number of named drivers.
#[derive(Debug, Clone, Default)]
pub struct Pin {
    drivers: BTreeMap<&'static str, (PinValue, DriveStrength)>,
    settled_value: PinValue,
    contended: bool,
}

impl Pin {
    pub fn set_driver(&mut self, driver: &'static str, value: PinValue, strength: DriveStrength) {
        if value == PinValue::HighZ || strength == DriveStrength::HighImpedance {
            self.drivers.remove(driver);
        } else {
            self.drivers.insert(driver, (value, strength));
        }
        self.recalculate_value();
    }

    pub fn remove_driver(&mut self, driver: &str) {
        self.drivers.remove(driver);
        self.recalculate_value();
    }

    pub fn read(&self) -> PinValue {
        self.settled_value
    }

    pub fn drivers(&self) -> &BTreeMap<&'static str, (PinValue, DriveStrength)> {
        &self.drivers
    }

    /// True while the strongest drivers disagree on the level.
    pub fn is_contended(&self) -> bool {
        self.contended
    }

    fn recalculate_value(&mut self) {
        self.contended = false;

        let max_strength = self
            .drivers
            .values()
            .map(|(_, strength)| *strength)
            .max()
            .unwrap_or(DriveStrength::HighImpedance);
        if max_strength == DriveStrength::HighImpedance {
            self.settled_value = PinValue::HighZ;
            return;
        }

        let strongest = || {
            self.drivers
                .values()
                .filter(move |(_, strength)| *strength == max_strength)
                .map(|(value, _)| *value)
        };
        let any_low = strongest().any(|v| v == PinValue::Low);
        let any_high = strongest().any(|v| v == PinValue::High);

        // Low dominates when equal-strength drivers fight
        self.contended = any_low && any_high;
        self.settled_value = if any_low {
            PinValue::Low
        } else if any_high {
            PinValue::High
        } else {
            PinValue::HighZ
        };
    }
}
