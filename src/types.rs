//! Range-checked types for LD2410 gate indices, sensitivities and the
//! device-defined setting tables, meant to simplify correct usage of the API.

use snafu::{ensure, OptionExt, Snafu};

use core::convert::TryInto;
use core::fmt;
use core::ops::Deref;

/// Error type for this module
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// The value isn't a valid distance gate index.
    #[snafu(display("Invalid gate index"))]
    InvalidGate,
    /// The value isn't a valid sensitivity.
    #[snafu(display("Invalid sensitivity"))]
    InvalidSensitivity,
}

const fn invalid_gate() -> InvalidGateSnafu {
    InvalidGateSnafu
}

const fn invalid_sensitivity() -> InvalidSensitivitySnafu {
    InvalidSensitivitySnafu
}

/// `Gate` is a range-checked [0, 8] integer, representing one of the sensor's
/// nine distance buckets. The physical width of a gate depends on the
/// configured [`DistanceResolution`].
///
/// ## Example
/// ```
/// use ld2410_proto::Gate;
/// let g = Gate::new(6).unwrap();
/// assert!(Gate::new(9).is_err());
/// ```
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Copy, Clone, Hash)]
#[repr(transparent)]
pub struct Gate(u8);

/// Create a new [`Gate`], panics if it is out of range.
pub const fn gate(g: u8) -> Gate {
    if g <= Gate::MAX {
        return Gate(g);
    }
    panic!("Invalid gate index.")
}

impl Gate {
    /// The highest gate index the sensor supports.
    pub const MAX: u8 = 8;

    /// Create a new gate index, checking that it is in \[0, 8\].
    /// # Errors
    /// Returns [`Error::InvalidGate`] if `gate` is out of range.
    pub fn new(gate: impl TryInto<u8>) -> Result<Self, Error> {
        let gate = gate.try_into().ok().with_context(invalid_gate)?;
        ensure!(gate <= Self::MAX, invalid_gate());
        Ok(Self(gate))
    }
}

impl Deref for Gate {
    type Target = u8;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// `Sensitivity` is a range-checked [0, 100] integer, representing a gate's
/// detection energy threshold in percent.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Copy, Clone, Hash)]
#[repr(transparent)]
pub struct Sensitivity(u8);

/// Create a new [`Sensitivity`], panics if it is out of range.
pub const fn sensitivity(s: u8) -> Sensitivity {
    if s <= Sensitivity::MAX {
        return Sensitivity(s);
    }
    panic!("Invalid sensitivity.")
}

impl Sensitivity {
    /// The highest sensitivity the sensor accepts.
    pub const MAX: u8 = 100;

    /// Create a new sensitivity, checking that it is in \[0, 100\].
    /// # Errors
    /// Returns [`Error::InvalidSensitivity`] if `sensitivity` is out of range.
    pub fn new(sensitivity: impl TryInto<u8>) -> Result<Self, Error> {
        let sensitivity = sensitivity
            .try_into()
            .ok()
            .with_context(invalid_sensitivity)?;
        ensure!(sensitivity <= Self::MAX, invalid_sensitivity());
        Ok(Self(sensitivity))
    }
}

impl Deref for Sensitivity {
    type Target = u8;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Serial baud rates from the device's setting table (command 0x00A1).
///
/// The on-wire value is a table index, not the rate itself.
#[derive(PartialEq, Eq, Debug, Copy, Clone, Hash)]
#[repr(u16)]
pub enum BaudRate {
    B9600 = 0x0001,
    B19200 = 0x0002,
    B38400 = 0x0003,
    B57600 = 0x0004,
    B115200 = 0x0005,
    B230400 = 0x0006,
    B256000 = 0x0007,
    B460800 = 0x0008,
}

impl BaudRate {
    /// The on-wire table index.
    pub const fn code(self) -> u16 {
        self as u16
    }

    /// The rate in bits per second.
    pub const fn bps(self) -> u32 {
        match self {
            Self::B9600 => 9600,
            Self::B19200 => 19_200,
            Self::B38400 => 38_400,
            Self::B57600 => 57_600,
            Self::B115200 => 115_200,
            Self::B230400 => 230_400,
            Self::B256000 => 256_000,
            Self::B460800 => 460_800,
        }
    }
}

impl Default for BaudRate {
    /// The factory default rate, 256000 bps.
    fn default() -> Self {
        Self::B256000
    }
}

impl fmt::Display for BaudRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bps", self.bps())
    }
}

/// Distance resolution per gate (commands 0x00AA and 0x00AB).
#[derive(PartialEq, Eq, Debug, Copy, Clone, Hash)]
#[repr(u16)]
pub enum DistanceResolution {
    /// 0.75 m per gate.
    Coarse = 0x0000,
    /// 0.2 m per gate.
    Fine = 0x0001,
}

impl DistanceResolution {
    /// The on-wire value.
    pub const fn code(self) -> u16 {
        self as u16
    }
}

impl fmt::Display for DistanceResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Coarse => write!(f, "0.75 m/gate"),
            Self::Fine => write!(f, "0.2 m/gate"),
        }
    }
}

#[cfg(test)]
mod gate_tests {
    use super::{gate, Gate};

    #[test]
    fn test_valid_gates() {
        for n in 0..=8u8 {
            let g = Gate::new(n).unwrap();
            assert_eq!(*g, n);
        }
    }

    #[test]
    fn test_gate_range() {
        assert_eq!(gate(8), Gate::new(8).unwrap());
        assert!(Gate::new(9).is_err());
        assert!(Gate::new(-1).is_err());
        assert!(Gate::new(1000).is_err());
    }
}
