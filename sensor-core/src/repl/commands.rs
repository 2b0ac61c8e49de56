//! REPL command dispatcher.
//!
//! Parsed commands are turned into calls on a [`SensorOps`] implementation so
//! the emulator and any firmware console drive the same code paths as the
//! host pipeline.

use core::fmt;

use heapless::Vec as HeaplessVec;

use crate::config::{ConfigError, RemosaicStrength};
use crate::controls::ControlId;
use crate::device::{SensorAdmin, SensorOps, SensorStatus};
use crate::error::SensorError;
use crate::identity::IdentityStatus;
use crate::modes::{DynamicRange, FormatDescriptor, MAX_FORMATS, ModeDescriptor, ModeRequest};
use crate::power::PowerState;
use crate::stream::StreamState;

use super::grammar::{
    self, Command, ConfigCommand, ModeCommand, ModeSetCommand, PowerCommand, SetCommand,
    StreamCommand,
};

/// Command execution successes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    Power(PowerState),
    Identity(IdentityStatus),
    Modes(HeaplessVec<FormatDescriptor, MAX_FORMATS>),
    ModeSet(&'static ModeDescriptor),
    Control { id: ControlId, value: i64 },
    Stream(StreamState),
    Config(RemosaicStrength),
    Status(SensorStatus),
}

/// Errors surfaced while executing a command.
#[derive(Debug, PartialEq, Eq)]
pub enum CommandError<'a, E> {
    Parse(grammar::ParseError<'a>),
    Unsupported(&'static str),
    Config(ConfigError),
    Sensor(SensorError<E>),
}

impl<'a, E> From<grammar::ParseError<'a>> for CommandError<'a, E> {
    fn from(error: grammar::ParseError<'a>) -> Self {
        Self::Parse(error)
    }
}

impl<E> From<SensorError<E>> for CommandError<'_, E> {
    fn from(error: SensorError<E>) -> Self {
        Self::Sensor(error)
    }
}

impl<E> From<ConfigError> for CommandError<'_, E> {
    fn from(error: ConfigError) -> Self {
        Self::Config(error)
    }
}

impl<E: fmt::Display> fmt::Display for CommandError<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Parse(error) => write!(f, "parse error: {error}"),
            CommandError::Unsupported(what) => write!(f, "unsupported: {what}"),
            CommandError::Config(error) => error.fmt(f),
            CommandError::Sensor(error) => error.fmt(f),
        }
    }
}

type CommandResult<'a, S> = Result<CommandOutcome, CommandError<'a, <S as SensorOps>::BusError>>;

/// Dispatches REPL commands onto a sensor.
pub struct CommandExecutor<S> {
    sensor: S,
}

impl<S> CommandExecutor<S> {
    pub const fn new(sensor: S) -> Self {
        Self { sensor }
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    /// Consumes the executor and yields the inner sensor.
    pub fn into_inner(self) -> S {
        self.sensor
    }
}

impl<S> CommandExecutor<S>
where
    S: SensorOps + SensorAdmin,
{
    /// Parses and executes a REPL command.
    pub fn execute<'a>(&mut self, line: &'a str) -> CommandResult<'a, S> {
        let command = grammar::parse(line)?;
        self.dispatch(command)
    }

    fn dispatch<'a>(&mut self, command: Command<'a>) -> CommandResult<'a, S> {
        match command {
            Command::Power(action) => self.handle_power(action),
            Command::Identify => {
                self.sensor.verify_identity()?;
                Ok(CommandOutcome::Identity(self.sensor.status().identity))
            }
            Command::Mode(ModeCommand::List) => Ok(CommandOutcome::Modes(
                self.sensor.enumerate_supported_formats(),
            )),
            Command::Mode(ModeCommand::Set(request)) => self.handle_mode_set(request),
            Command::Set(SetCommand { control, value }) => {
                let stored = self.sensor.set_control(control, i64::from(value))?;
                Ok(CommandOutcome::Control {
                    id: control,
                    value: stored,
                })
            }
            Command::Get(id) => Ok(CommandOutcome::Control {
                id,
                value: self.sensor.get_control(id),
            }),
            Command::Stream(action) => self.handle_stream(action),
            Command::Config(ConfigCommand { qbc }) => self.handle_config(qbc),
            Command::Status => Ok(CommandOutcome::Status(self.sensor.status())),
            Command::Help(_) => Err(CommandError::Unsupported("help")),
        }
    }

    fn handle_power<'a>(&mut self, action: PowerCommand) -> CommandResult<'a, S> {
        match action {
            PowerCommand::On => self.sensor.power_on()?,
            PowerCommand::Off => self.sensor.power_off()?,
            PowerCommand::Query => {}
        }
        Ok(CommandOutcome::Power(self.sensor.status().power))
    }

    fn handle_stream<'a>(&mut self, action: StreamCommand) -> CommandResult<'a, S> {
        match action {
            StreamCommand::Start => self.sensor.start_stream()?,
            StreamCommand::Stop => self.sensor.stop_stream()?,
            StreamCommand::Query => {}
        }
        Ok(CommandOutcome::Stream(self.sensor.status().stream))
    }

    fn handle_mode_set<'a>(&mut self, request: ModeSetCommand) -> CommandResult<'a, S> {
        let dynamic_range = match request.hdr {
            None | Some(0) => DynamicRange::Standard,
            Some(1) => DynamicRange::Hdr,
            Some(_) => return Err(CommandError::Unsupported("hdr must be 0 or 1")),
        };
        let format = self.sensor.status().format;
        let mode_request = ModeRequest::new(
            request.width,
            request.height,
            format,
            request.fps.unwrap_or(0),
        )
        .with_dynamic_range(dynamic_range);

        let mode = self.sensor.negotiate(&mode_request)?;
        Ok(CommandOutcome::ModeSet(mode))
    }

    fn handle_config<'a>(&mut self, qbc: Option<u32>) -> CommandResult<'a, S> {
        if let Some(raw) = qbc {
            let strength = RemosaicStrength::new(raw)?;
            self.sensor.set_remosaic_strength(strength.get())?;
        }
        Ok(CommandOutcome::Config(self.sensor.status().remosaic_strength))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::{MODES, Orientation, PixelFormat, select_mode, supported_formats};

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum Call {
        PowerOn,
        PowerOff,
        Verify,
        Negotiate(ModeRequest),
        SetControl(ControlId, i64),
        Start,
        Stop,
    }

    struct MockSensor {
        calls: HeaplessVec<Call, 16>,
        power: PowerState,
        stream: StreamState,
        mode: Option<&'static ModeDescriptor>,
        strength: RemosaicStrength,
        fail_start: bool,
    }

    impl MockSensor {
        fn new() -> Self {
            Self {
                calls: HeaplessVec::new(),
                power: PowerState::Off,
                stream: StreamState::Idle,
                mode: None,
                strength: RemosaicStrength::DEFAULT,
                fail_start: false,
            }
        }

        fn log(&mut self, call: Call) {
            self.calls.push(call).expect("call log full");
        }
    }

    impl SensorOps for MockSensor {
        type BusError = ();

        fn power_on(&mut self) -> Result<(), SensorError<()>> {
            self.log(Call::PowerOn);
            self.power = PowerState::On;
            Ok(())
        }

        fn power_off(&mut self) -> Result<(), SensorError<()>> {
            self.log(Call::PowerOff);
            self.power = PowerState::Off;
            Ok(())
        }

        fn verify_identity(&mut self) -> Result<(), SensorError<()>> {
            self.log(Call::Verify);
            Ok(())
        }

        fn negotiate(
            &mut self,
            request: &ModeRequest,
        ) -> Result<&'static ModeDescriptor, SensorError<()>> {
            self.log(Call::Negotiate(*request));
            let mode =
                select_mode(request, Orientation::default()).ok_or(SensorError::NoMatchingMode)?;
            self.mode = Some(mode);
            Ok(mode)
        }

        fn current_mode(&self) -> Option<&'static ModeDescriptor> {
            self.mode
        }

        fn enumerate_supported_formats(&self) -> HeaplessVec<FormatDescriptor, MAX_FORMATS> {
            supported_formats(Orientation::default())
        }

        fn set_control(&mut self, id: ControlId, value: i64) -> Result<i64, SensorError<()>> {
            self.log(Call::SetControl(id, value));
            if id.is_read_only() {
                return Err(SensorError::ReadOnlyControl(id));
            }
            Ok(value.min(960))
        }

        fn get_control(&self, id: ControlId) -> i64 {
            i64::try_from(id.as_index()).unwrap_or_default()
        }

        fn start_stream(&mut self) -> Result<(), SensorError<()>> {
            self.log(Call::Start);
            if self.fail_start {
                return Err(SensorError::Bus(()));
            }
            self.stream = StreamState::Streaming;
            Ok(())
        }

        fn stop_stream(&mut self) -> Result<(), SensorError<()>> {
            self.log(Call::Stop);
            self.stream = StreamState::Idle;
            Ok(())
        }
    }

    impl SensorAdmin for MockSensor {
        fn status(&self) -> SensorStatus {
            SensorStatus {
                power: self.power,
                stream: self.stream,
                identity: IdentityStatus::Verified,
                mode: self.mode,
                format: PixelFormat::Srggb10,
                remosaic_strength: self.strength,
                exposure_shift: 0,
            }
        }

        fn set_remosaic_strength(&mut self, raw: u8) -> Result<(), ConfigError> {
            self.strength = RemosaicStrength::try_from(raw)?;
            Ok(())
        }
    }

    #[test]
    fn power_commands_drive_sensor() {
        let mut executor = CommandExecutor::new(MockSensor::new());
        let outcome = executor.execute("power on").expect("power on should succeed");
        assert_eq!(outcome, CommandOutcome::Power(PowerState::On));

        let outcome = executor.execute("power").expect("query should succeed");
        assert_eq!(outcome, CommandOutcome::Power(PowerState::On));
        assert_eq!(executor.sensor().calls.as_slice(), [Call::PowerOn]);
    }

    #[test]
    fn mode_set_builds_request_from_current_format() {
        let mut executor = CommandExecutor::new(MockSensor::new());
        let outcome = executor
            .execute("mode set width=2304 height=1296 hdr=1")
            .expect("hdr mode should negotiate");
        assert_eq!(outcome, CommandOutcome::ModeSet(&MODES[6]));

        let expected = ModeRequest::new(2304, 1296, PixelFormat::Srggb10, 0)
            .with_dynamic_range(DynamicRange::Hdr);
        assert_eq!(executor.sensor().calls.as_slice(), [Call::Negotiate(expected)]);
    }

    #[test]
    fn mode_set_rejects_unknown_hdr_value() {
        let mut executor = CommandExecutor::new(MockSensor::new());
        let error = executor
            .execute("mode set width=2304 height=1296 hdr=2")
            .expect_err("hdr=2 should be rejected");
        assert_eq!(error, CommandError::Unsupported("hdr must be 0 or 1"));
        assert!(executor.sensor().calls.is_empty());
    }

    #[test]
    fn mode_set_reports_no_match() {
        let mut executor = CommandExecutor::new(MockSensor::new());
        let error = executor
            .execute("mode set width=640 height=480")
            .expect_err("no 640x480 mode exists");
        assert_eq!(error, CommandError::Sensor(SensorError::NoMatchingMode));
    }

    #[test]
    fn set_returns_stored_value() {
        let mut executor = CommandExecutor::new(MockSensor::new());
        let outcome = executor
            .execute("set analogue-gain=2000")
            .expect("set should succeed");
        assert_eq!(
            outcome,
            CommandOutcome::Control {
                id: ControlId::AnalogueGain,
                value: 960,
            }
        );
    }

    #[test]
    fn read_only_control_error_propagates() {
        let mut executor = CommandExecutor::new(MockSensor::new());
        let error = executor
            .execute("set pixel-rate=1")
            .expect_err("pixel rate is read only");
        assert_eq!(
            error,
            CommandError::Sensor(SensorError::ReadOnlyControl(ControlId::PixelRate))
        );
    }

    #[test]
    fn config_validates_before_touching_sensor() {
        let mut executor = CommandExecutor::new(MockSensor::new());
        let error = executor
            .execute("config qbc=1")
            .expect_err("qbc=1 is outside the domain");
        assert!(matches!(error, CommandError::Config(ConfigError::OutOfDomain { value: 1, .. })));

        let outcome = executor.execute("config qbc=5").expect("qbc=5 is valid");
        assert_eq!(outcome, CommandOutcome::Config(RemosaicStrength::MAX));
    }

    #[test]
    fn stream_failure_surfaces_sensor_error() {
        let mut sensor = MockSensor::new();
        sensor.fail_start = true;
        let mut executor = CommandExecutor::new(sensor);
        let error = executor
            .execute("stream start")
            .expect_err("start should fail");
        assert_eq!(error, CommandError::Sensor(SensorError::Bus(())));

        let outcome = executor.execute("stream").expect("query should succeed");
        assert_eq!(outcome, CommandOutcome::Stream(StreamState::Idle));
    }

    #[test]
    fn help_is_left_to_the_console() {
        let mut executor = CommandExecutor::new(MockSensor::new());
        let error = executor.execute("help").expect_err("help is unsupported");
        assert_eq!(error, CommandError::Unsupported("help"));
    }

    #[test]
    fn parse_error_is_returned() {
        let mut executor = CommandExecutor::new(MockSensor::new());
        let error = executor
            .execute("power sideways")
            .expect_err("parse should fail");
        assert!(matches!(error, CommandError::Parse(_)));
    }
}
