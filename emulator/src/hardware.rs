//! Simulated board: sensor register file, supplies and reset line.
//!
//! The sensor and the supply share one [`Board`], so the register file only
//! answers while every rail and the input clock are up and XCLR is released.
//! Losing any of them wipes the registers back to their power-on defaults.

use std::cell::RefCell;
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, OutputPin};
use sensor_core::power::{ALL_RAILS, RailId, ResetLine};
use sensor_core::registers::map::CHIP_ID;
use sensor_core::telemetry::TelemetryInstant;
use sensor_core::{RegisterTransport, SupplyDriver};

#[derive(Debug, Default)]
struct Board {
    rails: [bool; ALL_RAILS.len()],
    clock_hz: Option<u32>,
    reset_released: bool,
    /// Bumped every time the sensor loses its register contents.
    generation: u32,
}

impl Board {
    fn alive(&self) -> bool {
        self.rails.iter().all(|enabled| *enabled) && self.clock_hz.is_some() && self.reset_released
    }

    fn brown_out(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }
}

type SharedBoard = Rc<RefCell<Board>>;

/// Builds a sensor and the supply that powers it.
pub fn board(chip_id: u16, fail_rail: Option<RailId>) -> (SimulatedSensor, SimulatedSupply) {
    let shared = SharedBoard::default();
    let sensor = SimulatedSensor::new(Rc::clone(&shared), chip_id);
    let supply = SimulatedSupply::new(shared, fail_rail);
    (sensor, supply)
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SimBusError {
    /// Access while the sensor is unpowered or held in reset.
    Nack { address: u16 },
}

impl fmt::Display for SimBusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimBusError::Nack { address } => write!(f, "nack at {address:#06x}"),
        }
    }
}

/// Byte register file standing in for the sensor on the I2C bus.
pub struct SimulatedSensor {
    board: SharedBoard,
    registers: HashMap<u16, u8>,
    chip_id: u16,
    generation: u32,
    writes: usize,
}

impl SimulatedSensor {
    fn new(board: SharedBoard, chip_id: u16) -> Self {
        let generation = board.borrow().generation;
        let mut sensor = Self {
            board,
            registers: HashMap::new(),
            chip_id,
            generation,
            writes: 0,
        };
        sensor.load_defaults();
        sensor
    }

    fn load_defaults(&mut self) {
        self.registers.clear();
        let [high, low] = self.chip_id.to_be_bytes();
        self.registers.insert(CHIP_ID, high);
        self.registers.insert(CHIP_ID + 1, low);
    }

    /// Current contents of a register, without going through the bus.
    pub fn peek(&self, address: u16) -> u8 {
        self.registers.get(&address).copied().unwrap_or(0)
    }

    /// Number of register writes accepted since the session started.
    pub fn write_count(&self) -> usize {
        self.writes
    }

    fn acknowledge(&mut self, address: u16) -> Result<(), SimBusError> {
        let board = self.board.borrow();
        if !board.alive() {
            return Err(SimBusError::Nack { address });
        }
        let generation = board.generation;
        drop(board);
        if generation != self.generation {
            self.generation = generation;
            self.load_defaults();
        }
        Ok(())
    }
}

impl RegisterTransport for SimulatedSensor {
    type Error = SimBusError;

    fn read(&mut self, address: u16) -> Result<u8, SimBusError> {
        self.acknowledge(address)?;
        Ok(self.peek(address))
    }

    fn write(&mut self, address: u16, value: u8) -> Result<(), SimBusError> {
        self.acknowledge(address)?;
        self.registers.insert(address, value);
        self.writes += 1;
        Ok(())
    }
}

/// XCLR pin wired to the shared board.
pub struct SimPin {
    board: SharedBoard,
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        let mut board = self.board.borrow_mut();
        if board.reset_released {
            board.brown_out();
        }
        board.reset_released = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.board.borrow_mut().reset_released = true;
        Ok(())
    }
}

/// Rail that refused to come up.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SupplyFault(pub RailId);

impl fmt::Display for SupplyFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rail {} did not come up", self.0)
    }
}

/// Rails, input clock and reset line of the simulated board.
pub struct SimulatedSupply {
    board: SharedBoard,
    reset: ResetLine<SimPin>,
    fail_rail: Option<RailId>,
}

impl SimulatedSupply {
    fn new(board: SharedBoard, fail_rail: Option<RailId>) -> Self {
        let reset = ResetLine::new(SimPin {
            board: Rc::clone(&board),
        });
        Self {
            board,
            reset,
            fail_rail,
        }
    }

    pub fn rail_enabled(&self, rail: RailId) -> bool {
        self.board.borrow().rails[rail.as_index()]
    }

    pub fn clock_hz(&self) -> Option<u32> {
        self.board.borrow().clock_hz
    }
}

impl SupplyDriver for SimulatedSupply {
    type Error = SupplyFault;

    fn enable_rail(&mut self, rail: RailId) -> Result<(), SupplyFault> {
        if self.fail_rail == Some(rail) {
            return Err(SupplyFault(rail));
        }
        self.board.borrow_mut().rails[rail.as_index()] = true;
        Ok(())
    }

    fn disable_rail(&mut self, rail: RailId) -> Result<(), SupplyFault> {
        let mut board = self.board.borrow_mut();
        board.rails[rail.as_index()] = false;
        board.brown_out();
        Ok(())
    }

    fn enable_clock(&mut self, frequency_hz: u32) -> Result<(), SupplyFault> {
        self.board.borrow_mut().clock_hz = Some(frequency_hz);
        Ok(())
    }

    fn disable_clock(&mut self) -> Result<(), SupplyFault> {
        self.board.borrow_mut().clock_hz = None;
        Ok(())
    }

    fn set_reset(&mut self, asserted: bool) -> Result<(), SupplyFault> {
        self.reset.set(asserted).map_err(|never| match never {})
    }
}

/// Blocking delay backed by the host scheduler.
#[derive(Clone, Copy, Debug, Default)]
pub struct HostDelay;

impl DelayNs for HostDelay {
    fn delay_ns(&mut self, ns: u32) {
        thread::sleep(Duration::from_nanos(u64::from(ns)));
    }
}

/// Host clock reading used to timestamp telemetry.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HostInstant(pub Instant);

impl HostInstant {
    pub fn now() -> Self {
        Self(Instant::now())
    }
}

impl TelemetryInstant for HostInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        self.0.saturating_duration_since(earlier.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_nacks_until_board_is_up() {
        let (mut sensor, mut supply) = board(0x0708, None);
        assert_eq!(sensor.read(CHIP_ID), Err(SimBusError::Nack { address: CHIP_ID }));

        for rail in ALL_RAILS {
            supply.enable_rail(rail).expect("rail");
        }
        supply.enable_clock(24_000_000).expect("clock");
        supply.set_reset(true).expect("reset");
        assert!(sensor.read(CHIP_ID).is_err());

        supply.set_reset(false).expect("release");
        assert_eq!(sensor.read_u16(CHIP_ID), Ok(0x0708));
        assert_eq!(supply.clock_hz(), Some(24_000_000));
    }

    #[test]
    fn registers_reset_after_power_loss() {
        let (mut sensor, mut supply) = board(0x0708, None);
        for rail in ALL_RAILS {
            supply.enable_rail(rail).expect("rail");
        }
        supply.enable_clock(24_000_000).expect("clock");
        supply.set_reset(false).expect("release");
        sensor.write(0x0202, 0x0a).expect("write");
        assert_eq!(sensor.peek(0x0202), 0x0a);

        supply.disable_rail(RailId::Vdig).expect("rail off");
        assert!(!supply.rail_enabled(RailId::Vdig));
        supply.enable_rail(RailId::Vdig).expect("rail on");
        assert_eq!(sensor.read(0x0202), Ok(0));
        assert_eq!(sensor.write_count(), 1);
    }

    #[test]
    fn configured_rail_refuses_to_start() {
        let (_, mut supply) = board(0x0708, Some(RailId::Vddl));
        supply.enable_rail(RailId::Vana).expect("vana");
        assert_eq!(
            supply.enable_rail(RailId::Vddl),
            Err(SupplyFault(RailId::Vddl))
        );
        assert!(!supply.rail_enabled(RailId::Vddl));
    }
}
