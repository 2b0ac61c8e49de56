use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use sensor_core::device::DeviceContext;
use sensor_core::identity::IdentityStatus;
use sensor_core::modes::{DynamicRange, FormatDescriptor};
use sensor_core::power::{ALL_RAILS, RailId};
use sensor_core::registers::map::{EXPECTED_CHIP_ID, MODE_SELECT};
use sensor_core::repl::catalog::{self, CommandTag};
use sensor_core::repl::commands::{CommandError, CommandExecutor, CommandOutcome};
use sensor_core::repl::completion::{CompletionEngine, Replacement};
use sensor_core::telemetry::{TelemetryEventKind, TelemetryPayload, TelemetryRecorder};
use sensor_core::{SensorAdmin, SensorConfig, SensorError, SensorStatus, StreamState};

use crate::hardware::{self, HostDelay, HostInstant, SimBusError, SimulatedSensor, SimulatedSupply};

type SimDevice = DeviceContext<SimulatedSensor, SimulatedSupply, HostDelay>;

const DEFAULT_TRANSCRIPT: &str = "transcripts/emulator-session.log";
const TELEMETRY_SUMMARY: &str = "telemetry";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TranscriptProfile {
    BringUp,
    Hdr,
    Fault,
}

impl TranscriptProfile {
    pub fn log_path(self) -> &'static str {
        match self {
            TranscriptProfile::BringUp => "transcripts/emulator-bring-up.log",
            TranscriptProfile::Hdr => "transcripts/emulator-hdr.log",
            TranscriptProfile::Fault => "transcripts/emulator-fault.log",
        }
    }

    pub fn header(self) -> &'static str {
        match self {
            TranscriptProfile::BringUp => "IMX708 emulator bring-up transcript",
            TranscriptProfile::Hdr => "IMX708 emulator HDR transcript",
            TranscriptProfile::Fault => "IMX708 emulator fault transcript",
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, String> {
        if tag.eq_ignore_ascii_case("bring-up") {
            Ok(Self::BringUp)
        } else if tag.eq_ignore_ascii_case("hdr") {
            Ok(Self::Hdr)
        } else if tag.eq_ignore_ascii_case("fault") {
            Ok(Self::Fault)
        } else {
            Err(format!("Unknown transcript profile `{tag}`"))
        }
    }

    /// Session settings used when recording this profile.
    pub fn options(self) -> SessionOptions {
        let mut options = SessionOptions {
            transcript: PathBuf::from(self.log_path()),
            header: self.header().to_string(),
            ..SessionOptions::default()
        };
        if self == TranscriptProfile::Fault {
            options.fail_rail = Some(RailId::Vddl);
        }
        options
    }
}

/// Knobs for one emulator session.
#[derive(Clone, Debug)]
pub struct SessionOptions {
    pub transcript: PathBuf,
    pub header: String,
    /// Raw remosaic strength applied at attach.
    pub qbc: u8,
    /// Chip id the simulated part reports.
    pub chip_id: u16,
    pub fail_rail: Option<RailId>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            transcript: PathBuf::from(DEFAULT_TRANSCRIPT),
            header: "IMX708 emulator transcript".to_string(),
            qbc: 2,
            chip_id: EXPECTED_CHIP_ID,
            fail_rail: None,
        }
    }
}

#[derive(Debug)]
pub enum CompletionResponse {
    NoMatches,
    Applied { replacement: Replacement },
    Suggestions { options: Vec<&'static str> },
}

pub struct Session {
    executor: CommandExecutor<SimDevice>,
    transcript: TranscriptLogger,
    telemetry: TelemetryRecorder<HostInstant>,
    started_at: HostInstant,
    completion: CompletionEngine,
}

impl Session {
    pub fn new(options: &SessionOptions) -> io::Result<Self> {
        let config = SensorConfig::new()
            .with_remosaic_strength(options.qbc)
            .map_err(|error| io::Error::new(io::ErrorKind::InvalidInput, error.to_string()))?;
        let transcript = TranscriptLogger::new(&options.transcript, &options.header)?;
        let (sensor, supply) = hardware::board(options.chip_id, options.fail_rail);
        let device = DeviceContext::new(sensor, supply, HostDelay, config);

        Ok(Self {
            executor: CommandExecutor::new(device),
            transcript,
            telemetry: TelemetryRecorder::new(),
            started_at: HostInstant::now(),
            completion: CompletionEngine::new(),
        })
    }

    fn elapsed(&self) -> Duration {
        HostInstant::now().0.saturating_duration_since(self.started_at.0)
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let elapsed = self.elapsed();
        self.transcript
            .append_line(elapsed, TranscriptRole::Host, trimmed)?;

        let mut words = trimmed.split_whitespace();
        let head = words.next().unwrap_or_default();
        let lines = if head.eq_ignore_ascii_case("help") {
            help_lines(words.next())
        } else if head.eq_ignore_ascii_case(TELEMETRY_SUMMARY) {
            self.telemetry_lines()
        } else {
            self.execute(trimmed, head)
        };

        self.record_output(elapsed, &lines)?;
        Ok(lines)
    }

    fn execute(&mut self, line: &str, head: &str) -> Vec<String> {
        let before = self.executor.sensor().status();
        let result = self.executor.execute(line);
        let now = HostInstant::now();
        let after = self.executor.sensor().status();
        self.record_transitions(&before, &after, now);

        match result {
            Ok(outcome) => {
                match &outcome {
                    CommandOutcome::ModeSet(mode) => {
                        self.telemetry.record_mode_activated(mode, now);
                    }
                    CommandOutcome::Control { id, value }
                        if catalog::find(head).map(|spec| spec.tag) == Some(CommandTag::Set) =>
                    {
                        self.telemetry.record_control(*id, *value, now);
                    }
                    _ => {}
                }
                self.describe_outcome(&outcome)
            }
            Err(error) => {
                if matches!(error, CommandError::Sensor(SensorError::Bus(_))) {
                    self.telemetry
                        .record(TelemetryEventKind::BusFault, TelemetryPayload::none(), now);
                }
                vec![describe_error(&error)]
            }
        }
    }

    /// Records the lifecycle changes a command caused, failed or not.
    fn record_transitions(&mut self, before: &SensorStatus, after: &SensorStatus, now: HostInstant) {
        if before.power != after.power {
            self.telemetry.record_power_change(after.power, now);
        }
        if before.identity != after.identity {
            match after.identity {
                IdentityStatus::Verified => {
                    self.telemetry.record_identity(EXPECTED_CHIP_ID, true, now);
                }
                IdentityStatus::Mismatch { found } => {
                    self.telemetry.record_identity(found, false, now);
                }
                IdentityStatus::Unverified => {}
            }
        }
        if before.stream != after.stream {
            let event = match after.stream {
                StreamState::Streaming => Some(TelemetryEventKind::StreamStarted),
                StreamState::Idle if before.stream == StreamState::Streaming => {
                    Some(TelemetryEventKind::StreamStopped)
                }
                _ => None,
            };
            if let Some(event) = event {
                self.telemetry.record(event, TelemetryPayload::none(), now);
            }
        }
    }

    fn describe_outcome(&self, outcome: &CommandOutcome) -> Vec<String> {
        match outcome {
            CommandOutcome::Power(state) => vec![format!("OK power {state}")],
            CommandOutcome::Identity(status) => {
                vec![format!("OK identity {}", identity_label(*status))]
            }
            CommandOutcome::Modes(formats) => {
                let mut lines = vec![format!("OK {} formats", formats.len())];
                lines.extend(formats.iter().map(describe_format));
                lines
            }
            CommandOutcome::ModeSet(mode) => {
                let millihz = mode.frame_rate_millihz();
                vec![format!(
                    "OK mode {} {}x{} {} {}.{:03} fps",
                    mode.name,
                    mode.width,
                    mode.height,
                    self.executor.sensor().pixel_format(),
                    millihz / 1000,
                    millihz % 1000
                )]
            }
            CommandOutcome::Control { id, value } => vec![format!("OK {id}={value}")],
            CommandOutcome::Stream(state) => vec![format!("OK stream {state}")],
            CommandOutcome::Config(strength) => vec![format!("OK qbc={strength}")],
            CommandOutcome::Status(status) => self.describe_status(status),
        }
    }

    fn describe_status(&self, status: &SensorStatus) -> Vec<String> {
        let device = self.executor.sensor();
        let mode = status.mode.map_or("none", |mode| mode.name);
        let mut rails = String::new();
        for rail in ALL_RAILS {
            let level = if device.supply().rail_enabled(rail) {
                "on"
            } else {
                "off"
            };
            let _ = write!(rails, " {rail}={level}");
        }
        let clock = device
            .supply()
            .clock_hz()
            .map_or_else(|| "off".to_string(), |hz| format!("{hz}Hz"));

        vec![
            format!(
                "OK power={} stream={} identity={}",
                status.power,
                status.stream,
                identity_label(status.identity)
            ),
            format!(
                "  mode={mode} format={} qbc={} exposure-shift={}",
                status.format, status.remosaic_strength, status.exposure_shift
            ),
            format!(
                " {rails} clock={clock} mode-select={:#04x} bus-writes={}",
                device.transport().peek(MODE_SELECT),
                device.transport().write_count()
            ),
        ]
    }

    fn telemetry_lines(&self) -> Vec<String> {
        let mut lines = vec![format!("OK {} events", self.telemetry.len())];
        for record in self.telemetry.oldest_first() {
            let offset = record.timestamp.0.saturating_duration_since(self.started_at.0);
            let mut line = format!(
                "  #{} +{}ms {} (code {:#06x})",
                record.id,
                offset.as_millis(),
                record.event,
                record.event.to_raw()
            );
            if let Some(detail) = describe_payload(record.details) {
                line.push(' ');
                line.push_str(&detail);
            }
            lines.push(line);
        }
        lines
    }

    pub fn handle_completion(
        &mut self,
        buffer: &str,
        cursor: usize,
    ) -> io::Result<CompletionResponse> {
        let cursor = cursor.min(buffer.len());
        let (prefix, suffix) = buffer.split_at(cursor);
        let elapsed = self.elapsed();
        self.transcript
            .log_completion_request(elapsed, prefix, suffix, cursor)?;

        let result = self.completion.complete(buffer, cursor);
        if result.options.is_empty() {
            self.transcript.log_completion_none(elapsed)?;
            return Ok(CompletionResponse::NoMatches);
        }

        let options: Vec<&'static str> = result.options.iter().copied().collect();
        if let [candidate] = options.as_slice() {
            self.transcript
                .log_completion_applied(elapsed, candidate, result.replacement.as_ref())?;
            return Ok(match result.replacement {
                Some(replacement) => CompletionResponse::Applied { replacement },
                None => CompletionResponse::NoMatches,
            });
        }

        self.transcript.log_completion_options(elapsed, &options)?;
        Ok(CompletionResponse::Suggestions { options })
    }

    fn record_output(&mut self, elapsed: Duration, lines: &[String]) -> io::Result<()> {
        for line in lines {
            self.transcript
                .append_line(elapsed, TranscriptRole::Emulator, line)?;
        }
        Ok(())
    }
}

fn help_lines(topic: Option<&str>) -> Vec<String> {
    match topic {
        Some(target) => match catalog::find(target) {
            Some(spec) => vec![spec.summary.to_string()],
            None if target.eq_ignore_ascii_case(TELEMETRY_SUMMARY) => {
                vec![TELEMETRY_SUMMARY.to_string()]
            }
            None => {
                let names: Vec<&str> = catalog::commands().iter().map(|spec| spec.name).collect();
                vec![
                    format!("No help available for `{target}`."),
                    format!("Available topics: {}", names.join(", ")),
                ]
            }
        },
        None => {
            let mut lines = vec!["Available commands:".to_string()];
            lines.extend(
                catalog::commands()
                    .iter()
                    .map(|spec| format!("  {}", spec.summary)),
            );
            lines.push(format!("  {TELEMETRY_SUMMARY}"));
            lines.push("Type `help <command>` for a specific command.".to_string());
            lines
        }
    }
}

fn describe_error(error: &CommandError<'_, SimBusError>) -> String {
    match error {
        CommandError::Parse(error) => format!("ERR syntax {error}"),
        other => format!("ERR {other}"),
    }
}

fn identity_label(status: IdentityStatus) -> String {
    match status {
        IdentityStatus::Unverified => "unverified".to_string(),
        IdentityStatus::Verified => "verified".to_string(),
        IdentityStatus::Mismatch { found } => format!("mismatch found={found:#06x}"),
    }
}

fn describe_format(format: &FormatDescriptor) -> String {
    let range = match format.dynamic_range {
        DynamicRange::Standard => "sdr",
        DynamicRange::Hdr => "hdr",
    };
    format!(
        "  {}x{} {} {range} max {} fps",
        format.width, format.height, format.format, format.max_frame_rate
    )
}

fn describe_payload(payload: TelemetryPayload) -> Option<String> {
    match payload {
        TelemetryPayload::None => None,
        TelemetryPayload::Power {
            elapsed_since_previous,
        } => elapsed_since_previous.map(|elapsed| format!("after {}ms", elapsed.as_millis())),
        TelemetryPayload::Identity { found } => Some(format!("chip-id={found:#06x}")),
        TelemetryPayload::Mode { frame_rate_millihz } => {
            Some(format!("{frame_rate_millihz} mHz"))
        }
        TelemetryPayload::Control { value } => Some(format!("value={value}")),
    }
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new(path: &Path, header: &str) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };
        logger.write_header(header)?;
        Ok(logger)
    }

    fn write_header(&mut self, header: &str) -> io::Result<()> {
        writeln!(self.writer, "# {header}")?;
        writeln!(
            self.writer,
            "# Timestamps are milliseconds since session start"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }

    fn log_completion_request(
        &mut self,
        elapsed: Duration,
        prefix: &str,
        suffix: &str,
        cursor: usize,
    ) -> io::Result<()> {
        let message = format!("[TAB] prefix={prefix:?} suffix={suffix:?} cursor={cursor}");
        self.append_line(elapsed, TranscriptRole::Host, &message)
    }

    fn log_completion_none(&mut self, elapsed: Duration) -> io::Result<()> {
        self.append_line(elapsed, TranscriptRole::Emulator, "completion: no matches")
    }

    fn log_completion_applied(
        &mut self,
        elapsed: Duration,
        candidate: &str,
        replacement: Option<&Replacement>,
    ) -> io::Result<()> {
        let message = match replacement {
            Some(rep) => format!(
                "completion applied: {candidate} (range={}..{})",
                rep.start, rep.end
            ),
            None => format!("completion candidate: {candidate} (no replacement applied)"),
        };
        self.append_line(elapsed, TranscriptRole::Emulator, &message)
    }

    fn log_completion_options(
        &mut self,
        elapsed: Duration,
        options: &[&'static str],
    ) -> io::Result<()> {
        let summary = format!("completion options ({})", options.len());
        self.append_line(elapsed, TranscriptRole::Emulator, &summary)?;
        for option in options {
            self.append_line(elapsed, TranscriptRole::Emulator, &format!("  {option}"))?;
        }
        Ok(())
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}
