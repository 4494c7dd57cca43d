//! Static table of the pins the server may touch.

use std::fmt;

/// Kernel GPIO line number.
pub type PinId = u32;

/// A pin the server is allowed to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinDescriptor {
    /// Kernel line number (`bank * 32 + group * 8 + X` on Rockchip parts).
    pub id: PinId,
    /// Board label, for example `GPIO1_C6`.
    pub name: &'static str,
}

impl fmt::Display for PinDescriptor {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}({})", self.id, self.name)
    }
}

const LUCKFOX_PINS: &[PinDescriptor] = &[
    PinDescriptor {
        id: 54,
        name: "GPIO1_C6",
    },
    PinDescriptor {
        id: 55,
        name: "GPIO1_C7",
    },
];

/// Read-only, ordered set of valid pins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinTable {
    pins: Vec<PinDescriptor>,
}

impl PinTable {
    /// Builds a table from descriptors, keeping the first entry for any
    /// duplicated id.
    #[must_use]
    pub fn new(pins: impl IntoIterator<Item = PinDescriptor>) -> Self {
        let mut unique: Vec<PinDescriptor> = Vec::new();
        for pin in pins {
            if !unique.iter().any(|known| known.id == pin.id) {
                unique.push(pin);
            }
        }
        Self { pins: unique }
    }

    /// Pins broken out on the LuckFox Pico Max header.
    #[must_use]
    pub fn luckfox() -> Self {
        Self::new(LUCKFOX_PINS.iter().copied())
    }

    /// Returns `true` when `pin` is part of the table.
    #[must_use]
    pub fn contains(&self, pin: PinId) -> bool {
        self.pins.iter().any(|descriptor| descriptor.id == pin)
    }

    /// Board label for `pin`, if it is known.
    #[must_use]
    pub fn name(&self, pin: PinId) -> Option<&'static str> {
        self.pins
            .iter()
            .find(|descriptor| descriptor.id == pin)
            .map(|descriptor| descriptor.name)
    }

    /// Iterates the descriptors in table order.
    pub fn iter(&self) -> impl Iterator<Item = &PinDescriptor> {
        self.pins.iter()
    }

    /// Iterates the pin ids in table order.
    pub fn ids(&self) -> impl Iterator<Item = PinId> + '_ {
        self.pins.iter().map(|descriptor| descriptor.id)
    }

    /// Number of pins in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pins.len()
    }

    /// Returns `true` when the table has no pins.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }
}

impl Default for PinTable {
    fn default() -> Self {
        Self::luckfox()
    }
}
