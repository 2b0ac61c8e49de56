//! Error taxonomy surfaced by every sensor operation.

use core::fmt;

use crate::config::ConfigError;
use crate::controls::ControlId;
use crate::power::{PowerAction, PowerState};
use crate::stream::StreamState;

/// Lifecycle position used when reporting rejected transitions.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LifecycleState {
    Power(PowerState),
    Stream(StreamState),
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Power(state) => write!(f, "power:{state}"),
            LifecycleState::Stream(state) => write!(f, "stream:{state}"),
        }
    }
}

/// Failure reported when attempting an invalid state transition.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransitionError {
    pub from: LifecycleState,
    pub to: LifecycleState,
}

impl TransitionError {
    pub const fn new(from: LifecycleState, to: LifecycleState) -> Self {
        Self { from, to }
    }
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} not allowed", self.from, self.to)
    }
}

/// Rail or clock primitive that failed during a power sequence.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PowerFault {
    pub action: PowerAction,
    /// Number of earlier steps undone before the fault was reported.
    pub rolled_back: u8,
}

impl PowerFault {
    pub const fn new(action: PowerAction, rolled_back: u8) -> Self {
        Self {
            action,
            rolled_back,
        }
    }
}

impl fmt::Display for PowerFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed ({} steps rolled back)",
            self.action, self.rolled_back
        )
    }
}

/// Errors returned by [`crate::SensorOps`], generic over the bus error `E`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorError<E> {
    /// Register transport failure; fatal for the in-flight operation only.
    Bus(E),
    /// Power-up or power-down primitive failure.
    Power(PowerFault),
    /// A power sequence is already in flight.
    Busy,
    /// The chip identity register does not hold the expected value.
    IdentityMismatch { found: u16, expected: u16 },
    /// Mode or stream operation attempted before the identity check passed.
    IdentityUnverified,
    NoMatchingMode,
    /// Out-of-domain configuration parameter.
    InvalidControlValue(ConfigError),
    InvalidStateTransition(TransitionError),
    ReadOnlyControl(ControlId),
}

impl<E> From<TransitionError> for SensorError<E> {
    fn from(error: TransitionError) -> Self {
        SensorError::InvalidStateTransition(error)
    }
}

impl<E> From<PowerFault> for SensorError<E> {
    fn from(fault: PowerFault) -> Self {
        SensorError::Power(fault)
    }
}

impl<E> From<ConfigError> for SensorError<E> {
    fn from(error: ConfigError) -> Self {
        SensorError::InvalidControlValue(error)
    }
}

impl<E: fmt::Display> fmt::Display for SensorError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorError::Bus(error) => write!(f, "bus error: {error}"),
            SensorError::Power(fault) => write!(f, "power error: {fault}"),
            SensorError::Busy => f.write_str("busy"),
            SensorError::IdentityMismatch { found, expected } => {
                write!(f, "identity mismatch: found {found:#06x}, expected {expected:#06x}")
            }
            SensorError::IdentityUnverified => f.write_str("identity not verified"),
            SensorError::NoMatchingMode => f.write_str("no matching mode"),
            SensorError::InvalidControlValue(error) => write!(f, "invalid value: {error}"),
            SensorError::InvalidStateTransition(error) => {
                write!(f, "invalid state transition: {error}")
            }
            SensorError::ReadOnlyControl(id) => write!(f, "{id} is read-only"),
        }
    }
}
