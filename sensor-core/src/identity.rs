//! Chip identity check performed once per attach.

use crate::registers::RegisterTransport;
use crate::registers::map::{CHIP_ID, EXPECTED_CHIP_ID};

/// Outcome of the identity check, latched by the device context.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IdentityStatus {
    #[default]
    Unverified,
    Verified,
    /// The part on the bus is not an IMX708; the instance must not be used.
    Mismatch { found: u16 },
}

impl IdentityStatus {
    pub const fn is_verified(self) -> bool {
        matches!(self, IdentityStatus::Verified)
    }

    /// Classifies a chip id read from the sensor.
    pub const fn from_chip_id(found: u16) -> Self {
        if found == EXPECTED_CHIP_ID {
            IdentityStatus::Verified
        } else {
            IdentityStatus::Mismatch { found }
        }
    }
}

/// Reads the 16-bit chip id register.
pub fn read_chip_id<T: RegisterTransport>(transport: &mut T) -> Result<u16, T::Error> {
    transport.read_u16(CHIP_ID)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct IdBus([u8; 2]);

    impl RegisterTransport for IdBus {
        type Error = ();

        fn read(&mut self, address: u16) -> Result<u8, ()> {
            match address {
                0x0016 => Ok(self.0[0]),
                0x0017 => Ok(self.0[1]),
                _ => Err(()),
            }
        }

        fn write(&mut self, _: u16, _: u8) -> Result<(), ()> {
            Err(())
        }
    }

    #[test]
    fn imx708_id_is_verified() {
        let found = read_chip_id(&mut IdBus([0x07, 0x08])).expect("read id");
        assert_eq!(IdentityStatus::from_chip_id(found), IdentityStatus::Verified);
    }

    #[test]
    fn foreign_part_is_reported_with_found_value() {
        let found = read_chip_id(&mut IdBus([0x04, 0x77])).expect("read id");
        assert_eq!(
            IdentityStatus::from_chip_id(found),
            IdentityStatus::Mismatch { found: 0x0477 }
        );
        assert!(!IdentityStatus::from_chip_id(found).is_verified());
    }
}
