//! Power sequencing data structures and the power lifecycle state machine.
//!
//! Sequences are immutable templates of [`PowerStep`] values; the sequencer
//! walks them against a [`SupplyDriver`] and an `embedded-hal` delay so the
//! same tables drive MCU rails and the host emulator.

use core::fmt;
use core::time::Duration;

use embedded_hal::digital::OutputPin;

use crate::error::{LifecycleState, TransitionError};

pub mod sequencer;
pub mod templates;

pub use sequencer::{power_down, power_up};
pub use templates::{POWER_OFF_SEQUENCE, POWER_ON_SEQUENCE};

/// Supply rails feeding the sensor, in power-up order.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RailId {
    /// 2.8 V analog supply.
    Vana,
    /// 1.1 V digital core supply.
    Vdig,
    /// 1.8 V interface supply.
    Vddl,
}

impl RailId {
    pub const fn as_index(self) -> usize {
        match self {
            RailId::Vana => 0,
            RailId::Vdig => 1,
            RailId::Vddl => 2,
        }
    }

    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(RailId::Vana),
            1 => Some(RailId::Vdig),
            2 => Some(RailId::Vddl),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            RailId::Vana => "vana",
            RailId::Vdig => "vdig",
            RailId::Vddl => "vddl",
        }
    }
}

impl fmt::Display for RailId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Every rail in dependency order (analog before digital before interface).
pub const ALL_RAILS: [RailId; 3] = [RailId::Vana, RailId::Vdig, RailId::Vddl];

/// Primitive applied by one step of a power sequence.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerAction {
    EnableRail(RailId),
    DisableRail(RailId),
    EnableClock,
    DisableClock,
    AssertReset,
    ReleaseReset,
}

impl PowerAction {
    /// Action that undoes this one during a rollback, if any.
    pub const fn rollback(self) -> Option<PowerAction> {
        match self {
            PowerAction::EnableRail(rail) => Some(PowerAction::DisableRail(rail)),
            PowerAction::EnableClock => Some(PowerAction::DisableClock),
            PowerAction::ReleaseReset => Some(PowerAction::AssertReset),
            PowerAction::DisableRail(_) | PowerAction::DisableClock | PowerAction::AssertReset => {
                None
            }
        }
    }
}

impl fmt::Display for PowerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerAction::EnableRail(rail) => write!(f, "enable-rail {rail}"),
            PowerAction::DisableRail(rail) => write!(f, "disable-rail {rail}"),
            PowerAction::EnableClock => f.write_str("enable-clock"),
            PowerAction::DisableClock => f.write_str("disable-clock"),
            PowerAction::AssertReset => f.write_str("assert-reset"),
            PowerAction::ReleaseReset => f.write_str("release-reset"),
        }
    }
}

/// Optional timing guardrails associated with a step.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TimingConstraintSet {
    pub min_hold: Option<Duration>,
    pub max_hold: Option<Duration>,
}

impl TimingConstraintSet {
    /// Constraints with no additional limits.
    pub const fn unrestricted() -> Self {
        Self {
            min_hold: None,
            max_hold: None,
        }
    }

    pub const fn with_hold_range(min_hold: Option<Duration>, max_hold: Option<Duration>) -> Self {
        Self { min_hold, max_hold }
    }

    /// Validate that a hold duration sits within the configured range.
    pub fn allows_hold(&self, hold_for: Duration) -> bool {
        if let Some(min) = self.min_hold
            && hold_for < min
        {
            return false;
        }
        if let Some(max) = self.max_hold
            && hold_for > max
        {
            return false;
        }
        true
    }
}

/// One ordered operation in a power sequence.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PowerStep {
    pub action: PowerAction,
    /// Delay applied after the action succeeds.
    pub settle: Duration,
    pub constraints: TimingConstraintSet,
}

impl PowerStep {
    pub const fn new(
        action: PowerAction,
        settle: Duration,
        constraints: TimingConstraintSet,
    ) -> Self {
        Self {
            action,
            settle,
            constraints,
        }
    }

    /// Step without a settle delay.
    pub const fn immediate(action: PowerAction) -> Self {
        Self::new(
            action,
            Duration::ZERO,
            TimingConstraintSet::unrestricted(),
        )
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerSequenceKind {
    PowerOn,
    PowerOff,
}

/// Immutable power sequence template.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PowerSequence {
    pub kind: PowerSequenceKind,
    pub steps: &'static [PowerStep],
}

impl PowerSequence {
    pub const fn new(kind: PowerSequenceKind, steps: &'static [PowerStep]) -> Self {
        Self { kind, steps }
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Sum of every settle delay in the sequence.
    pub fn total_settle(&self) -> Duration {
        self.steps
            .iter()
            .fold(Duration::ZERO, |total, step| total + step.settle)
    }
}

/// Rail, clock and reset state of the sensor.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerState {
    #[default]
    Off,
    Powering,
    On,
    PoweringDown,
}

impl PowerState {
    /// Applies `event`, rejecting transitions the lifecycle does not allow.
    pub const fn transition(self, event: PowerEvent) -> Result<PowerState, TransitionError> {
        match (self, event) {
            (PowerState::Off, PowerEvent::PowerUpStarted) => Ok(PowerState::Powering),
            (PowerState::Powering, PowerEvent::PowerUpCompleted) => Ok(PowerState::On),
            (PowerState::Powering, PowerEvent::PowerUpAborted) => Ok(PowerState::Off),
            (PowerState::On, PowerEvent::PowerDownStarted) => Ok(PowerState::PoweringDown),
            (PowerState::PoweringDown, PowerEvent::PowerDownCompleted) => Ok(PowerState::Off),
            (from, event) => Err(TransitionError::new(
                LifecycleState::Power(from),
                LifecycleState::Power(event.target()),
            )),
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PowerState::Off => "off",
            PowerState::Powering => "powering",
            PowerState::On => "on",
            PowerState::PoweringDown => "powering-down",
        })
    }
}

/// Inputs driving [`PowerState::transition`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PowerEvent {
    PowerUpStarted,
    PowerUpCompleted,
    PowerUpAborted,
    PowerDownStarted,
    PowerDownCompleted,
}

impl PowerEvent {
    /// State the event leads to when accepted.
    pub const fn target(self) -> PowerState {
        match self {
            PowerEvent::PowerUpStarted => PowerState::Powering,
            PowerEvent::PowerUpCompleted => PowerState::On,
            PowerEvent::PowerDownStarted => PowerState::PoweringDown,
            PowerEvent::PowerUpAborted | PowerEvent::PowerDownCompleted => PowerState::Off,
        }
    }
}

/// Rail, clock and reset primitives provided by the platform.
///
/// Every call may fail; the sequencer rolls back but never retries.
pub trait SupplyDriver {
    type Error;

    fn enable_rail(&mut self, rail: RailId) -> Result<(), Self::Error>;

    fn disable_rail(&mut self, rail: RailId) -> Result<(), Self::Error>;

    /// Starts the input clock at `frequency_hz`.
    fn enable_clock(&mut self, frequency_hz: u32) -> Result<(), Self::Error>;

    fn disable_clock(&mut self) -> Result<(), Self::Error>;

    /// Drives the reset line; `true` holds the sensor in reset.
    fn set_reset(&mut self, asserted: bool) -> Result<(), Self::Error>;
}

/// Active-low XCLR line driven through an `embedded-hal` output pin.
pub struct ResetLine<P> {
    pin: P,
}

impl<P: OutputPin> ResetLine<P> {
    pub const fn new(pin: P) -> Self {
        Self { pin }
    }

    /// Holds the sensor in reset (`true`) or lets it run (`false`).
    pub fn set(&mut self, asserted: bool) -> Result<(), P::Error> {
        if asserted {
            self.pin.set_low()
        } else {
            self.pin.set_high()
        }
    }

    pub fn into_inner(self) -> P {
        self.pin
    }
}
