//! The owned aggregate representing one attached sensor.
//!
//! [`DeviceContext`] is driven by a single owner; every operation runs to
//! completion on the caller's thread and leaves the power and stream states
//! at a defined resting point, whether it succeeds or fails.

use embedded_hal::delay::DelayNs;
use heapless::Vec;

use crate::config::{ConfigError, RemosaicStrength, SensorConfig};
use crate::controls::mapper::orientation_of;
use crate::controls::{
    ControlId, ControlValues, EXPOSURE_MIN, control_burst, control_range, plan_exposure,
    remosaic_burst,
};
use crate::error::{LifecycleState, SensorError, TransitionError};
use crate::identity::{IdentityStatus, read_chip_id};
use crate::modes::{
    BayerOrder, FormatDescriptor, MAX_FORMATS, ModeDescriptor, ModeRequest, Orientation,
    PixelFormat, select_mode, supported_formats,
};
use crate::power::{
    POWER_OFF_SEQUENCE, POWER_ON_SEQUENCE, PowerEvent, PowerState, SupplyDriver, power_down,
    power_up,
};
use crate::registers::map::{EXPECTED_CHIP_ID, MODE_SELECT, MODE_STANDBY, MODE_STREAMING};
use crate::registers::{RegisterOp, RegisterTransport};
use crate::stream::{StreamEvent, StreamState};

/// Operations the host pipeline invokes on an attached sensor.
pub trait SensorOps {
    type BusError;

    /// Runs the power-up template; a no-op when already on.
    fn power_on(&mut self) -> Result<(), SensorError<Self::BusError>>;

    /// Runs the power-down template; a no-op when already off.
    fn power_off(&mut self) -> Result<(), SensorError<Self::BusError>>;

    /// Checks the chip id once per attach.
    fn verify_identity(&mut self) -> Result<(), SensorError<Self::BusError>>;

    /// Selects and applies the mode matching `request`.
    fn negotiate(
        &mut self,
        request: &ModeRequest,
    ) -> Result<&'static ModeDescriptor, SensorError<Self::BusError>>;

    fn current_mode(&self) -> Option<&'static ModeDescriptor>;

    fn enumerate_supported_formats(&self) -> Vec<FormatDescriptor, MAX_FORMATS>;

    /// Stores `value` (clamped) and returns the logical value kept.
    fn set_control(
        &mut self,
        id: ControlId,
        value: i64,
    ) -> Result<i64, SensorError<Self::BusError>>;

    fn get_control(&self, id: ControlId) -> i64;

    fn start_stream(&mut self) -> Result<(), SensorError<Self::BusError>>;

    /// Always leaves the stream idle; reports the standby write failure, if any.
    fn stop_stream(&mut self) -> Result<(), SensorError<Self::BusError>>;
}

/// Configuration and status access used by host tooling.
pub trait SensorAdmin {
    fn status(&self) -> SensorStatus;

    /// Validates and stores a new remosaic strength for the next mode activation.
    fn set_remosaic_strength(&mut self, raw: u8) -> Result<(), ConfigError>;
}

/// Snapshot of the lifecycle and configuration of a device.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SensorStatus {
    pub power: PowerState,
    pub stream: StreamState,
    pub identity: IdentityStatus,
    pub mode: Option<&'static ModeDescriptor>,
    pub format: PixelFormat,
    pub remosaic_strength: RemosaicStrength,
    pub exposure_shift: u8,
}

/// Collaborators handed back by [`DeviceContext::detach`].
pub struct DeviceResources<T, S, D> {
    pub transport: T,
    pub supply: S,
    pub delay: D,
}

pub struct DeviceContext<T, S, D> {
    transport: T,
    supply: S,
    delay: D,
    config: SensorConfig,
    power_state: PowerState,
    stream_state: StreamState,
    identity: IdentityStatus,
    current_mode: Option<&'static ModeDescriptor>,
    /// `false` once the sensor loses its registers, until the mode is rewritten.
    mode_applied: bool,
    controls: ControlValues,
    requested_exposure: i64,
}

impl<T, S, D> DeviceContext<T, S, D>
where
    T: RegisterTransport,
    S: SupplyDriver,
    D: DelayNs,
{
    pub fn new(transport: T, supply: S, delay: D, config: SensorConfig) -> Self {
        let controls = ControlValues::new();
        let requested_exposure = controls.get(ControlId::Exposure);
        Self {
            transport,
            supply,
            delay,
            config,
            power_state: PowerState::Off,
            stream_state: StreamState::Idle,
            identity: IdentityStatus::Unverified,
            current_mode: None,
            mode_applied: false,
            controls,
            requested_exposure,
        }
    }

    /// Attach-time check: power on, verify the chip id, power off again.
    pub fn attach_check(&mut self) -> Result<(), SensorError<T::Error>> {
        self.power_on()?;
        let verified = self.verify_identity();
        let powered_down = self.power_off();
        verified?;
        powered_down
    }

    /// Stops streaming, forces power off and returns the collaborators.
    pub fn detach(mut self) -> DeviceResources<T, S, D> {
        if self.stop_stream().is_err() {
            log_bus_fault("detach");
        }
        if self.power_off().is_err() {
            log_power_fault();
        }
        DeviceResources {
            transport: self.transport,
            supply: self.supply,
            delay: self.delay,
        }
    }

    pub fn config(&self) -> &SensorConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Direct bus access, e.g. for board bring-up register pokes.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn supply(&self) -> &S {
        &self.supply
    }

    pub fn power_state(&self) -> PowerState {
        self.power_state
    }

    pub fn stream_state(&self) -> StreamState {
        self.stream_state
    }

    pub fn identity(&self) -> IdentityStatus {
        self.identity
    }

    pub fn long_exposure_shift(&self) -> u8 {
        u8::try_from(self.controls.get(ControlId::ExposureShift)).unwrap_or(0)
    }

    pub fn orientation(&self) -> Orientation {
        orientation_of(&self.controls)
    }

    /// Output format of the active mode after flips.
    pub fn pixel_format(&self) -> PixelFormat {
        self.current_mode
            .map_or(PixelFormat::Srggb10, |mode| mode.format)
            .oriented(self.orientation())
    }

    pub fn bayer_order(&self) -> BayerOrder {
        self.pixel_format().bayer_order()
    }

    fn require_powered(&self, target: LifecycleState) -> Result<(), TransitionError> {
        if self.power_state == PowerState::On {
            Ok(())
        } else {
            Err(TransitionError::new(
                LifecycleState::Power(self.power_state),
                target,
            ))
        }
    }

    fn require_identity(&self) -> Result<(), SensorError<T::Error>> {
        match self.identity {
            IdentityStatus::Verified => Ok(()),
            IdentityStatus::Unverified => Err(SensorError::IdentityUnverified),
            IdentityStatus::Mismatch { found } => Err(SensorError::IdentityMismatch {
                found,
                expected: EXPECTED_CHIP_ID,
            }),
        }
    }

    /// Writes the mode registers and remosaic setup, then flushes controls.
    fn activate(&mut self, mode: &'static ModeDescriptor) -> Result<(), SensorError<T::Error>> {
        self.mode_applied = false;
        self.transport
            .write_burst(mode.registers)
            .map_err(bus("mode"))?;
        self.current_mode = Some(mode);
        self.reclamp();

        let remosaic = remosaic_burst(mode, self.config.remosaic_strength);
        self.transport
            .write_burst(&remosaic)
            .map_err(bus("remosaic"))?;
        self.mode_applied = true;
        log_mode(mode);

        // Exposure limits and HDR stages depend on the frame timing.
        let exposure = self.controls.get(ControlId::Exposure);
        let gain = self.controls.get(ControlId::AnalogueGain);
        self.controls.stage(ControlId::Exposure, exposure);
        self.controls.stage(ControlId::AnalogueGain, gain);
        self.flush()
    }

    /// Re-derives stored values that depend on the active mode.
    fn reclamp(&mut self) {
        let plan = plan_exposure(self.requested_exposure, self.current_mode);
        self.controls.record(ControlId::Exposure, plan.lines);
        self.controls
            .record(ControlId::ExposureShift, i64::from(plan.shift));
        for id in [ControlId::PixelRate, ControlId::LinkFrequency] {
            self.controls
                .record(id, control_range(id, self.current_mode).default);
        }
    }

    /// Writes every staged control in one grouped-hold burst.
    fn flush(&mut self) -> Result<(), SensorError<T::Error>> {
        if !self.controls.has_dirty() {
            return Ok(());
        }
        let plan = plan_exposure(self.requested_exposure, self.current_mode);
        let burst = control_burst(&self.controls, &plan, self.current_mode);
        self.transport
            .write_burst(&burst)
            .map_err(bus("controls"))?;
        self.controls.clear_dirty();
        Ok(())
    }

    fn begin_streaming(&mut self, mode: &'static ModeDescriptor) -> Result<(), SensorError<T::Error>> {
        if !self.mode_applied {
            self.activate(mode)?;
        }
        self.flush()?;
        self.transport
            .write_register(&RegisterOp::u8(MODE_SELECT, MODE_STREAMING))
            .map_err(bus("stream-on"))
    }
}

impl<T, S, D> SensorOps for DeviceContext<T, S, D>
where
    T: RegisterTransport,
    S: SupplyDriver,
    D: DelayNs,
{
    type BusError = T::Error;

    fn power_on(&mut self) -> Result<(), SensorError<T::Error>> {
        match self.power_state {
            PowerState::On => return Ok(()),
            PowerState::Powering | PowerState::PoweringDown => return Err(SensorError::Busy),
            PowerState::Off => {}
        }

        self.power_state = self.power_state.transition(PowerEvent::PowerUpStarted)?;
        match power_up(&mut self.supply, &mut self.delay, &POWER_ON_SEQUENCE) {
            Ok(()) => {
                self.power_state = self.power_state.transition(PowerEvent::PowerUpCompleted)?;
                self.mode_applied = false;
                self.controls.mark_all_dirty();
                log_power(self.power_state);
                Ok(())
            }
            Err(fault) => {
                self.power_state = self.power_state.transition(PowerEvent::PowerUpAborted)?;
                log_power(self.power_state);
                Err(fault.into())
            }
        }
    }

    fn power_off(&mut self) -> Result<(), SensorError<T::Error>> {
        match self.power_state {
            PowerState::Off => return Ok(()),
            PowerState::Powering | PowerState::PoweringDown => return Err(SensorError::Busy),
            PowerState::On => {}
        }
        if self.stream_state != StreamState::Idle {
            return Err(TransitionError::new(
                LifecycleState::Stream(self.stream_state),
                LifecycleState::Power(PowerState::PoweringDown),
            )
            .into());
        }

        self.power_state = self.power_state.transition(PowerEvent::PowerDownStarted)?;
        let result = power_down(&mut self.supply, &mut self.delay, &POWER_OFF_SEQUENCE);
        self.power_state = self.power_state.transition(PowerEvent::PowerDownCompleted)?;
        self.mode_applied = false;
        log_power(self.power_state);
        result.map_err(SensorError::from)
    }

    fn verify_identity(&mut self) -> Result<(), SensorError<T::Error>> {
        self.require_powered(LifecycleState::Power(PowerState::On))?;
        if self.identity == IdentityStatus::Unverified {
            let found = read_chip_id(&mut self.transport).map_err(bus("identity"))?;
            self.identity = IdentityStatus::from_chip_id(found);
            log_identity(found, self.identity.is_verified());
        }
        self.require_identity()
    }

    fn negotiate(
        &mut self,
        request: &ModeRequest,
    ) -> Result<&'static ModeDescriptor, SensorError<T::Error>> {
        let configuring = LifecycleState::Stream(StreamState::Configuring);
        self.require_powered(configuring)?;
        if self.stream_state != StreamState::Idle {
            return Err(
                TransitionError::new(LifecycleState::Stream(self.stream_state), configuring).into(),
            );
        }
        self.require_identity()?;

        let mode = select_mode(request, self.orientation()).ok_or(SensorError::NoMatchingMode)?;
        self.activate(mode)?;
        Ok(mode)
    }

    fn current_mode(&self) -> Option<&'static ModeDescriptor> {
        self.current_mode
    }

    fn enumerate_supported_formats(&self) -> Vec<FormatDescriptor, MAX_FORMATS> {
        supported_formats(self.orientation())
    }

    fn set_control(&mut self, id: ControlId, value: i64) -> Result<i64, SensorError<T::Error>> {
        if id.is_read_only() {
            return Err(SensorError::ReadOnlyControl(id));
        }
        if id.modifies_layout() && self.stream_state != StreamState::Idle {
            return Err(TransitionError::new(
                LifecycleState::Stream(self.stream_state),
                LifecycleState::Stream(StreamState::Configuring),
            )
            .into());
        }

        let stored = if id == ControlId::Exposure {
            self.requested_exposure = value.max(EXPOSURE_MIN);
            let plan = plan_exposure(self.requested_exposure, self.current_mode);
            self.controls
                .record(ControlId::ExposureShift, i64::from(plan.shift));
            plan.lines
        } else {
            control_range(id, self.current_mode).clamp(value)
        };
        self.controls.stage(id, stored);

        if self.stream_state.is_streaming() {
            self.flush()?;
        }
        Ok(stored)
    }

    fn get_control(&self, id: ControlId) -> i64 {
        self.controls.get(id)
    }

    fn start_stream(&mut self) -> Result<(), SensorError<T::Error>> {
        match self.stream_state {
            StreamState::Streaming => return Ok(()),
            // A start already in flight is rejected by the stream transition below.
            StreamState::Configuring | StreamState::Idle => {}
        }
        let streaming = LifecycleState::Stream(StreamState::Streaming);
        let Some(mode) = self.current_mode else {
            return Err(TransitionError::new(LifecycleState::Stream(self.stream_state), streaming).into());
        };
        self.require_powered(streaming)?;
        self.require_identity()?;

        self.stream_state = self.stream_state.transition(StreamEvent::StartRequested)?;
        match self.begin_streaming(mode) {
            Ok(()) => {
                self.stream_state = self.stream_state.transition(StreamEvent::StartCompleted)?;
                log_stream(self.stream_state);
                Ok(())
            }
            Err(error) => {
                self.stream_state = self.stream_state.transition(StreamEvent::StartAborted)?;
                Err(error)
            }
        }
    }

    fn stop_stream(&mut self) -> Result<(), SensorError<T::Error>> {
        if self.stream_state == StreamState::Idle {
            return Ok(());
        }
        let result = self
            .transport
            .write_register(&RegisterOp::u8(MODE_SELECT, MODE_STANDBY))
            .map_err(bus("stream-off"));
        self.stream_state = self
            .stream_state
            .transition(StreamEvent::Stopped)
            .unwrap_or(StreamState::Idle);
        log_stream(self.stream_state);
        result
    }
}

impl<T, S, D> SensorAdmin for DeviceContext<T, S, D>
where
    T: RegisterTransport,
    S: SupplyDriver,
    D: DelayNs,
{
    fn status(&self) -> SensorStatus {
        SensorStatus {
            power: self.power_state,
            stream: self.stream_state,
            identity: self.identity,
            mode: self.current_mode,
            format: self.pixel_format(),
            remosaic_strength: self.config.remosaic_strength,
            exposure_shift: self.long_exposure_shift(),
        }
    }

    fn set_remosaic_strength(&mut self, raw: u8) -> Result<(), ConfigError> {
        self.config.remosaic_strength = RemosaicStrength::try_from(raw)?;
        Ok(())
    }
}

fn bus<E>(operation: &'static str) -> impl FnOnce(E) -> SensorError<E> {
    move |error| {
        log_bus_fault(operation);
        SensorError::Bus(error)
    }
}

#[cfg(feature = "defmt")]
fn log_power(state: PowerState) {
    defmt::info!("sensor: power {}", state);
}

#[cfg(not(feature = "defmt"))]
fn log_power(_: PowerState) {}

#[cfg(feature = "defmt")]
fn log_power_fault() {
    defmt::warn!("sensor: power-down fault during detach");
}

#[cfg(not(feature = "defmt"))]
fn log_power_fault() {}

#[cfg(feature = "defmt")]
fn log_identity(found: u16, verified: bool) {
    if verified {
        defmt::info!("sensor: chip id {=u16:#06x}", found);
    } else {
        defmt::warn!("sensor: unexpected chip id {=u16:#06x}", found);
    }
}

#[cfg(not(feature = "defmt"))]
fn log_identity(_: u16, _: bool) {}

#[cfg(feature = "defmt")]
fn log_mode(mode: &ModeDescriptor) {
    defmt::info!("sensor: mode {=str}", mode.name);
}

#[cfg(not(feature = "defmt"))]
fn log_mode(_: &ModeDescriptor) {}

#[cfg(feature = "defmt")]
fn log_stream(state: StreamState) {
    defmt::info!("sensor: stream {}", state);
}

#[cfg(not(feature = "defmt"))]
fn log_stream(_: StreamState) {}

#[cfg(feature = "defmt")]
fn log_bus_fault(operation: &'static str) {
    defmt::warn!("sensor: bus fault during {=str}", operation);
}

#[cfg(not(feature = "defmt"))]
fn log_bus_fault(_: &'static str) {}
