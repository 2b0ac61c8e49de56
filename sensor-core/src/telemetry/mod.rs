//! Telemetry event catalog and the bounded history recorder.
//!
//! Events encode to compact numeric codes so firmware can forward them over
//! a diagnostics channel; host tooling decodes them back for transcripts.
//! The recorder keeps the most recent events in a fixed ring and never
//! allocates.

use core::{fmt, time::Duration};

use heapless::{HistoryBuf, OldestOrdered};

use crate::controls::{ALL_CONTROLS, ControlId};
use crate::modes::ModeDescriptor;
use crate::power::PowerState;

/// Identifier assigned to each recorded event.
pub type EventId = u32;

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 64;

/// Discriminated sensor events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TelemetryEventKind {
    PowerStateChanged(PowerState),
    IdentityVerified,
    IdentityMismatch,
    /// Index into the mode table.
    ModeActivated(u8),
    ControlApplied(ControlId),
    StreamStarted,
    StreamStopped,
    BusFault,
    Custom(u16),
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::PowerStateChanged(state) => write!(f, "power {state}"),
            TelemetryEventKind::IdentityVerified => f.write_str("identity-verified"),
            TelemetryEventKind::IdentityMismatch => f.write_str("identity-mismatch"),
            TelemetryEventKind::ModeActivated(index) => write!(f, "mode-activated {index}"),
            TelemetryEventKind::ControlApplied(id) => write!(f, "control-applied {id}"),
            TelemetryEventKind::StreamStarted => f.write_str("stream-started"),
            TelemetryEventKind::StreamStopped => f.write_str("stream-stopped"),
            TelemetryEventKind::BusFault => f.write_str("bus-fault"),
            TelemetryEventKind::Custom(code) => write!(f, "custom({code})"),
        }
    }
}

impl TelemetryEventKind {
    const POWER_STATE_BASE: u16 = 0x0000;
    const IDENTITY_VERIFIED_CODE: u16 = 0x0008;
    const IDENTITY_MISMATCH_CODE: u16 = 0x0009;
    const STREAM_STARTED_CODE: u16 = 0x000A;
    const STREAM_STOPPED_CODE: u16 = 0x000B;
    const BUS_FAULT_CODE: u16 = 0x000C;
    const MODE_ACTIVATED_BASE: u16 = 0x0010;
    const CONTROL_APPLIED_BASE: u16 = 0x0020;
    const CONTROL_APPLIED_END: u16 = 0x0030;

    /// Encodes the event into a compact transport-friendly discriminant.
    #[must_use]
    pub fn to_raw(self) -> u16 {
        match self {
            TelemetryEventKind::PowerStateChanged(state) => {
                Self::POWER_STATE_BASE + power_index(state)
            }
            TelemetryEventKind::IdentityVerified => Self::IDENTITY_VERIFIED_CODE,
            TelemetryEventKind::IdentityMismatch => Self::IDENTITY_MISMATCH_CODE,
            TelemetryEventKind::ModeActivated(index) => {
                Self::MODE_ACTIVATED_BASE + u16::from(index)
            }
            TelemetryEventKind::ControlApplied(id) => {
                let offset = u16::try_from(id.as_index()).unwrap_or(u16::MAX);
                Self::CONTROL_APPLIED_BASE.saturating_add(offset)
            }
            TelemetryEventKind::StreamStarted => Self::STREAM_STARTED_CODE,
            TelemetryEventKind::StreamStopped => Self::STREAM_STOPPED_CODE,
            TelemetryEventKind::BusFault => Self::BUS_FAULT_CODE,
            TelemetryEventKind::Custom(code) => code,
        }
    }

    /// Decodes a raw discriminant, falling back to [`TelemetryEventKind::Custom`].
    #[must_use]
    pub fn from_raw(code: u16) -> Self {
        match code {
            Self::IDENTITY_VERIFIED_CODE => TelemetryEventKind::IdentityVerified,
            Self::IDENTITY_MISMATCH_CODE => TelemetryEventKind::IdentityMismatch,
            Self::STREAM_STARTED_CODE => TelemetryEventKind::StreamStarted,
            Self::STREAM_STOPPED_CODE => TelemetryEventKind::StreamStopped,
            Self::BUS_FAULT_CODE => TelemetryEventKind::BusFault,
            value if value < Self::IDENTITY_VERIFIED_CODE => power_from_index(value)
                .map_or(TelemetryEventKind::Custom(value), |state| {
                    TelemetryEventKind::PowerStateChanged(state)
                }),
            value if (Self::MODE_ACTIVATED_BASE..Self::CONTROL_APPLIED_BASE).contains(&value) => {
                let offset = value - Self::MODE_ACTIVATED_BASE;
                u8::try_from(offset).map_or(TelemetryEventKind::Custom(value), |index| {
                    TelemetryEventKind::ModeActivated(index)
                })
            }
            value if (Self::CONTROL_APPLIED_BASE..Self::CONTROL_APPLIED_END).contains(&value) => {
                let offset = usize::from(value - Self::CONTROL_APPLIED_BASE);
                ControlId::from_index(offset).map_or(TelemetryEventKind::Custom(value), |id| {
                    TelemetryEventKind::ControlApplied(id)
                })
            }
            other => TelemetryEventKind::Custom(other),
        }
    }
}

/// Payloads carried alongside telemetry events.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TelemetryPayload {
    None,
    /// Time spent in the previous power state.
    Power { elapsed_since_previous: Option<Duration> },
    /// Chip id read during the identity check.
    Identity { found: u16 },
    /// Achieved frame rate of the activated mode.
    Mode { frame_rate_millihz: u32 },
    /// Logical value after clamping.
    Control { value: i64 },
}

impl TelemetryPayload {
    #[must_use]
    pub const fn none() -> Self {
        TelemetryPayload::None
    }
}

/// Monotonic instant wrapper used for telemetry timestamps.
pub trait TelemetryInstant: Copy {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord<TInstant>
where
    TInstant: Copy,
{
    pub id: EventId,
    pub timestamp: TInstant,
    pub event: TelemetryEventKind,
    pub details: TelemetryPayload,
}

pub type TelemetryRing<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<TelemetryRecord<TInstant>, CAPACITY>;

/// Records telemetry events into a fixed-size ring buffer.
pub struct TelemetryRecorder<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY>
where
    TInstant: Copy,
{
    ring: TelemetryRing<TInstant, CAPACITY>,
    last_power_change_at: Option<TInstant>,
    next_event_id: EventId,
}

impl<TInstant, const CAPACITY: usize> TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy + TelemetryInstant,
{
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            last_power_change_at: None,
            next_event_id: 0,
        }
    }

    /// Recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord<TInstant>> {
        self.ring.oldest_ordered()
    }

    pub fn latest(&self) -> Option<&TelemetryRecord<TInstant>> {
        self.ring.recent()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Records a power state change and the time spent in the previous state.
    pub fn record_power_change(&mut self, state: PowerState, timestamp: TInstant) -> EventId {
        let elapsed = self
            .last_power_change_at
            .map(|previous| timestamp.saturating_duration_since(previous));
        self.last_power_change_at = Some(timestamp);

        self.record(
            TelemetryEventKind::PowerStateChanged(state),
            TelemetryPayload::Power {
                elapsed_since_previous: elapsed,
            },
            timestamp,
        )
    }

    /// Records the outcome of an identity check.
    pub fn record_identity(&mut self, found: u16, verified: bool, timestamp: TInstant) -> EventId {
        let event = if verified {
            TelemetryEventKind::IdentityVerified
        } else {
            TelemetryEventKind::IdentityMismatch
        };
        self.record(event, TelemetryPayload::Identity { found }, timestamp)
    }

    /// Records activation of a mode from the static table.
    pub fn record_mode_activated(&mut self, mode: &ModeDescriptor, timestamp: TInstant) -> EventId {
        let index = mode
            .index()
            .and_then(|index| u8::try_from(index).ok())
            .unwrap_or(u8::MAX);
        self.record(
            TelemetryEventKind::ModeActivated(index),
            TelemetryPayload::Mode {
                frame_rate_millihz: mode.frame_rate_millihz(),
            },
            timestamp,
        )
    }

    /// Records a control value accepted by the device.
    pub fn record_control(&mut self, id: ControlId, value: i64, timestamp: TInstant) -> EventId {
        self.record(
            TelemetryEventKind::ControlApplied(id),
            TelemetryPayload::Control { value },
            timestamp,
        )
    }

    /// Records an arbitrary telemetry event with the supplied payload.
    pub fn record(
        &mut self,
        event: TelemetryEventKind,
        payload: TelemetryPayload,
        timestamp: TInstant,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
            details: payload,
        });

        id
    }
}

impl<TInstant, const CAPACITY: usize> Default for TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy + TelemetryInstant,
{
    fn default() -> Self {
        Self::new()
    }
}

const fn power_index(state: PowerState) -> u16 {
    match state {
        PowerState::Off => 0,
        PowerState::Powering => 1,
        PowerState::On => 2,
        PowerState::PoweringDown => 3,
    }
}

fn power_from_index(index: u16) -> Option<PowerState> {
    match index {
        0 => Some(PowerState::Off),
        1 => Some(PowerState::Powering),
        2 => Some(PowerState::On),
        3 => Some(PowerState::PoweringDown),
        _ => None,
    }
}

// Control codes must fit below the end of their block.
const _: () = assert!(ALL_CONTROLS.len() <= 16);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::MODES;

    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
    struct MicrosInstant(u64);

    impl TelemetryInstant for MicrosInstant {
        fn saturating_duration_since(&self, earlier: Self) -> Duration {
            Duration::from_micros(self.0.saturating_sub(earlier.0))
        }
    }

    #[test]
    fn event_codes_decode_to_same_event() {
        let fixtures = [
            (TelemetryEventKind::PowerStateChanged(PowerState::On), 0x0002),
            (TelemetryEventKind::IdentityMismatch, 0x0009),
            (TelemetryEventKind::ModeActivated(6), 0x0016),
            (TelemetryEventKind::ControlApplied(ControlId::VerticalFlip), 0x002B),
            (TelemetryEventKind::BusFault, 0x000C),
        ];
        for (event, code) in fixtures {
            assert_eq!(event.to_raw(), code);
            assert_eq!(TelemetryEventKind::from_raw(code), event);
        }
    }

    #[test]
    fn unknown_codes_stay_custom() {
        assert_eq!(
            TelemetryEventKind::from_raw(0x0004),
            TelemetryEventKind::Custom(0x0004)
        );
        assert_eq!(
            TelemetryEventKind::from_raw(0x002F),
            TelemetryEventKind::Custom(0x002F)
        );
        assert_eq!(
            TelemetryEventKind::from_raw(0x8000),
            TelemetryEventKind::Custom(0x8000)
        );
    }

    #[test]
    fn power_changes_carry_elapsed_time() {
        let mut recorder = TelemetryRecorder::<MicrosInstant>::new();
        let first = recorder.record_power_change(PowerState::On, MicrosInstant(100));
        assert_eq!(first, 0);
        match recorder.latest().map(|record| record.details) {
            Some(TelemetryPayload::Power {
                elapsed_since_previous,
            }) => assert_eq!(elapsed_since_previous, None),
            other => panic!("unexpected payload: {other:?}"),
        }

        let second = recorder.record_power_change(PowerState::Off, MicrosInstant(1_600));
        assert_eq!(second, 1);
        match recorder.latest().map(|record| record.details) {
            Some(TelemetryPayload::Power {
                elapsed_since_previous: Some(elapsed),
            }) => assert_eq!(elapsed.as_micros(), 1_500),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn mode_activation_records_table_index() {
        let mut recorder = TelemetryRecorder::<MicrosInstant>::new();
        recorder.record_mode_activated(&MODES[3], MicrosInstant(0));
        let record = recorder.latest().copied().expect("recorded");
        assert_eq!(record.event, TelemetryEventKind::ModeActivated(3));
        match record.details {
            TelemetryPayload::Mode { frame_rate_millihz } => {
                assert!(frame_rate_millihz.abs_diff(30_000) < 50);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn ring_keeps_most_recent_events() {
        let mut recorder = TelemetryRecorder::<MicrosInstant, 4>::new();
        for tick in 0..6 {
            recorder.record(
                TelemetryEventKind::StreamStarted,
                TelemetryPayload::none(),
                MicrosInstant(tick),
            );
        }
        assert_eq!(recorder.len(), 4);
        let ids: heapless::Vec<EventId, 4> =
            recorder.oldest_first().map(|record| record.id).collect();
        assert_eq!(ids.as_slice(), &[2, 3, 4, 5]);
    }
}
