//! Runtime configuration threaded into the device context.
//!
//! The only process-wide tunable is the quad-Bayer remosaic line correction
//! strength. It is validated here, before any register is touched, and read by
//! the mode negotiator each time a mode is activated.

use core::fmt;

use crate::registers::map::DEFAULT_I2C_ADDRESS;

/// Configuration parameter validation failures.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    OutOfDomain {
        parameter: &'static str,
        value: u32,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::OutOfDomain { parameter, value } => {
                write!(f, "{parameter}={value} is outside the accepted domain")
            }
        }
    }
}

/// Quad-Bayer broken line correction strength (`0` or `2..=5`).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RemosaicStrength(u8);

impl RemosaicStrength {
    pub const PARAMETER: &'static str = "qbc_adjust";
    pub const DISABLED: Self = Self(0);
    pub const DEFAULT: Self = Self(2);
    pub const MAX: Self = Self(5);

    /// Validates a raw strength value.
    pub const fn new(raw: u32) -> Result<Self, ConfigError> {
        match raw {
            0 => Ok(Self::DISABLED),
            2 => Ok(Self(2)),
            3 => Ok(Self(3)),
            4 => Ok(Self(4)),
            5 => Ok(Self(5)),
            value => Err(ConfigError::OutOfDomain {
                parameter: Self::PARAMETER,
                value,
            }),
        }
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    /// `false` when the low-pass filter must stay disabled.
    pub const fn is_enabled(self) -> bool {
        self.0 != 0
    }
}

impl Default for RemosaicStrength {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u8> for RemosaicStrength {
    type Error = ConfigError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Self::new(u32::from(raw))
    }
}

impl fmt::Display for RemosaicStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Construction-time configuration for a [`crate::DeviceContext`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SensorConfig {
    pub remosaic_strength: RemosaicStrength,
    pub i2c_address: u8,
}

impl SensorConfig {
    pub const fn new() -> Self {
        Self {
            remosaic_strength: RemosaicStrength::DEFAULT,
            i2c_address: DEFAULT_I2C_ADDRESS,
        }
    }

    /// Returns a copy with a validated remosaic strength.
    pub fn with_remosaic_strength(mut self, raw: u8) -> Result<Self, ConfigError> {
        self.remosaic_strength = RemosaicStrength::try_from(raw)?;
        Ok(self)
    }

    #[must_use]
    pub const fn with_i2c_address(mut self, address: u8) -> Self {
        self.i2c_address = address;
        self
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self::new()
    }
}
