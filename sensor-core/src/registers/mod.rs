//! Register protocol shared by every component that touches the sensor.
//!
//! The sensor exposes 8-bit registers behind 16-bit addresses. Wider logical
//! registers (exposure, gains, frame length) span consecutive addresses with
//! the most significant byte at the lowest address. Bursts are ordered lists of
//! [`RegisterOp`] values applied strictly in sequence; the first failing write
//! aborts the burst and earlier writes stay applied.

use embedded_hal::i2c::{I2c, SevenBitAddress};
use heapless::Vec;

use crate::config::SensorConfig;

pub mod map;

/// Upper bound on the number of operations a control flush can produce.
pub const MAX_BURST_OPS: usize = 24;

/// Bounded burst buffer assembled by the control mapper.
pub type Burst = Vec<RegisterOp, MAX_BURST_OPS>;

/// Width of a logical register.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegisterWidth {
    Bits8,
    Bits16,
    Bits32,
}

impl RegisterWidth {
    /// Number of single-byte registers the logical value occupies.
    pub const fn byte_len(self) -> usize {
        match self {
            RegisterWidth::Bits8 => 1,
            RegisterWidth::Bits16 => 2,
            RegisterWidth::Bits32 => 4,
        }
    }
}

/// A single logical register write.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegisterOp {
    pub address: u16,
    pub width: RegisterWidth,
    pub value: u32,
}

impl RegisterOp {
    pub const fn new(address: u16, width: RegisterWidth, value: u32) -> Self {
        Self {
            address,
            width,
            value,
        }
    }

    pub const fn u8(address: u16, value: u32) -> Self {
        Self::new(address, RegisterWidth::Bits8, value)
    }

    pub const fn u16(address: u16, value: u32) -> Self {
        Self::new(address, RegisterWidth::Bits16, value)
    }

    pub const fn u32(address: u16, value: u32) -> Self {
        Self::new(address, RegisterWidth::Bits32, value)
    }

    /// Byte-level writes for this op in bus order (MSB first).
    pub fn bytes(&self) -> impl Iterator<Item = (u16, u8)> + use<> {
        let encoded = self.value.to_be_bytes();
        let len = self.width.byte_len();
        let skip = encoded.len() - len;
        let address = self.address;
        (0..len).map(move |offset| {
            (
                address.wrapping_add(offset_u16(offset)),
                encoded[skip + offset],
            )
        })
    }
}

fn offset_u16(offset: usize) -> u16 {
    u16::try_from(offset).unwrap_or(u16::MAX)
}

/// Byte-addressed register access implemented by the bus collaborator.
///
/// Implementations perform a single blocking transfer per call and report
/// transport failures without retrying.
pub trait RegisterTransport {
    type Error;

    /// Reads one byte at `address`.
    fn read(&mut self, address: u16) -> Result<u8, Self::Error>;

    /// Writes one byte at `address`.
    fn write(&mut self, address: u16, value: u8) -> Result<(), Self::Error>;

    /// Writes a logical register as consecutive big-endian bytes.
    fn write_register(&mut self, op: &RegisterOp) -> Result<(), Self::Error> {
        for (address, byte) in op.bytes() {
            self.write(address, byte)?;
        }
        Ok(())
    }

    /// Applies `ops` in order, stopping at the first failure.
    fn write_burst(&mut self, ops: &[RegisterOp]) -> Result<(), Self::Error> {
        for op in ops {
            self.write_register(op)?;
        }
        Ok(())
    }

    /// Reads a 16-bit register stored MSB first.
    fn read_u16(&mut self, address: u16) -> Result<u16, Self::Error> {
        let high = self.read(address)?;
        let low = self.read(address.wrapping_add(1))?;
        Ok(u16::from_be_bytes([high, low]))
    }
}

impl<T: RegisterTransport + ?Sized> RegisterTransport for &mut T {
    type Error = T::Error;

    fn read(&mut self, address: u16) -> Result<u8, Self::Error> {
        (**self).read(address)
    }

    fn write(&mut self, address: u16, value: u8) -> Result<(), Self::Error> {
        (**self).write(address, value)
    }
}

/// [`RegisterTransport`] over an `embedded-hal` I2C bus.
///
/// Frames follow the CCI convention: a two byte register address (MSB first)
/// followed by one data byte for writes, or a repeated-start read of one byte.
pub struct I2cTransport<I2C> {
    bus: I2C,
    address: SevenBitAddress,
}

impl<I2C> I2cTransport<I2C> {
    pub const fn new(bus: I2C, address: SevenBitAddress) -> Self {
        Self { bus, address }
    }

    /// Uses the sensor's default bus address.
    pub const fn with_default_address(bus: I2C) -> Self {
        Self::new(bus, map::DEFAULT_I2C_ADDRESS)
    }

    /// Uses the bus address carried by `config`.
    pub const fn from_config(bus: I2C, config: &SensorConfig) -> Self {
        Self::new(bus, config.i2c_address)
    }

    pub const fn address(&self) -> SevenBitAddress {
        self.address
    }

    /// Releases the underlying bus.
    pub fn into_inner(self) -> I2C {
        self.bus
    }
}

impl<I2C: I2c> RegisterTransport for I2cTransport<I2C> {
    type Error = I2C::Error;

    fn read(&mut self, address: u16) -> Result<u8, Self::Error> {
        let mut value = [0u8; 1];
        self.bus
            .write_read(self.address, &address.to_be_bytes(), &mut value)?;
        Ok(value[0])
    }

    fn write(&mut self, address: u16, value: u8) -> Result<(), Self::Error> {
        let [high, low] = address.to_be_bytes();
        self.bus.write(self.address, &[high, low, value])
    }
}
