#![allow(dead_code)]

use std::collections::BTreeMap;

use embedded_hal::delay::DelayNs;
use sensor_core::power::{PowerAction, RailId};
use sensor_core::registers::map::{CHIP_ID, EXPECTED_CHIP_ID};
use sensor_core::{DeviceContext, RegisterTransport, SensorConfig, SensorOps, SupplyDriver};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BusFault;

impl core::fmt::Display for BusFault {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("nack")
    }
}

/// Byte register file that records every write.
#[derive(Default)]
pub struct MockBus {
    pub registers: BTreeMap<u16, u8>,
    pub writes: Vec<(u16, u8)>,
    /// Writes to this address fail.
    pub fail_write_at: Option<u16>,
    pub fail_reads: bool,
}

impl MockBus {
    pub fn with_chip_id(chip_id: u16) -> Self {
        let mut bus = Self::default();
        let [high, low] = chip_id.to_be_bytes();
        bus.registers.insert(CHIP_ID, high);
        bus.registers.insert(CHIP_ID + 1, low);
        bus
    }

    pub fn imx708() -> Self {
        Self::with_chip_id(EXPECTED_CHIP_ID)
    }

    pub fn byte(&self, address: u16) -> Option<u8> {
        self.registers.get(&address).copied()
    }

    pub fn u16_at(&self, address: u16) -> Option<u16> {
        Some(u16::from_be_bytes([
            self.byte(address)?,
            self.byte(address + 1)?,
        ]))
    }

    /// Number of byte writes that landed on `address`.
    pub fn writes_to(&self, address: u16) -> usize {
        self.writes
            .iter()
            .filter(|(written, _)| *written == address)
            .count()
    }

    /// Values written to `address`, in order.
    pub fn history(&self, address: u16) -> Vec<u8> {
        self.writes
            .iter()
            .filter(|(written, _)| *written == address)
            .map(|(_, value)| *value)
            .collect()
    }

    pub fn clear_log(&mut self) {
        self.writes.clear();
    }
}

impl RegisterTransport for MockBus {
    type Error = BusFault;

    fn read(&mut self, address: u16) -> Result<u8, BusFault> {
        if self.fail_reads {
            return Err(BusFault);
        }
        Ok(self.byte(address).unwrap_or(0))
    }

    fn write(&mut self, address: u16, value: u8) -> Result<(), BusFault> {
        if self.fail_write_at == Some(address) {
            return Err(BusFault);
        }
        self.registers.insert(address, value);
        self.writes.push((address, value));
        Ok(())
    }
}

/// Supply that logs each primitive and can fail on one of them.
#[derive(Default)]
pub struct MockSupply {
    pub actions: Vec<PowerAction>,
    pub fail_on: Option<PowerAction>,
}

impl MockSupply {
    pub fn failing_on(action: PowerAction) -> Self {
        Self {
            actions: Vec::new(),
            fail_on: Some(action),
        }
    }

    fn apply(&mut self, action: PowerAction) -> Result<(), ()> {
        if self.fail_on == Some(action) {
            return Err(());
        }
        self.actions.push(action);
        Ok(())
    }

    pub fn rail_enabled(&self, rail: RailId) -> bool {
        let enables = self
            .actions
            .iter()
            .filter(|action| **action == PowerAction::EnableRail(rail))
            .count();
        let disables = self
            .actions
            .iter()
            .filter(|action| **action == PowerAction::DisableRail(rail))
            .count();
        enables > disables
    }
}

impl SupplyDriver for MockSupply {
    type Error = ();

    fn enable_rail(&mut self, rail: RailId) -> Result<(), ()> {
        self.apply(PowerAction::EnableRail(rail))
    }

    fn disable_rail(&mut self, rail: RailId) -> Result<(), ()> {
        self.apply(PowerAction::DisableRail(rail))
    }

    fn enable_clock(&mut self, _frequency_hz: u32) -> Result<(), ()> {
        self.apply(PowerAction::EnableClock)
    }

    fn disable_clock(&mut self) -> Result<(), ()> {
        self.apply(PowerAction::DisableClock)
    }

    fn set_reset(&mut self, asserted: bool) -> Result<(), ()> {
        self.apply(if asserted {
            PowerAction::AssertReset
        } else {
            PowerAction::ReleaseReset
        })
    }
}

/// Delay that accumulates the requested time instead of sleeping.
#[derive(Default)]
pub struct NoDelay {
    pub total_ns: u64,
}

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }
}

pub type TestDevice = DeviceContext<MockBus, MockSupply, NoDelay>;

pub fn device_with(bus: MockBus, supply: MockSupply) -> TestDevice {
    DeviceContext::new(bus, supply, NoDelay::default(), SensorConfig::new())
}

pub fn device() -> TestDevice {
    device_with(MockBus::imx708(), MockSupply::default())
}

/// Powered and identified, with no mode selected.
pub fn ready_device() -> TestDevice {
    let mut device = device();
    device.power_on().expect("power on");
    device.verify_identity().expect("identity");
    device
}
