use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Backend used to drive the GPIO lines.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum DriverKind {
    /// Kernel sysfs GPIO interface (`/sys/class/gpio`).
    #[default]
    Sysfs,
    /// In-memory lines for hosts without GPIO hardware.
    Simulated,
}

impl DriverKind {
    /// Returns `true` when the backend touches real hardware.
    #[must_use]
    pub const fn is_hardware(self) -> bool {
        matches!(self, Self::Sysfs)
    }
}

/// Errors encountered while parsing a [`DriverKind`] from text.
pub type DriverKindParseError = strum::ParseError;
