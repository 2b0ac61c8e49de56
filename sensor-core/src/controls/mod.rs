//! Imaging controls, their ranges and the staged value store.
//!
//! Ordinary control values are clamped into range, never rejected. Values
//! written while the sensor is not streaming are only staged here; the
//! device context flushes the dirty set on mode activation or stream start.

use core::fmt;

use crate::modes::ModeDescriptor;
use crate::modes::table::LINK_FREQUENCY_HZ;

pub mod mapper;

pub use mapper::{ExposurePlan, control_burst, plan_exposure, remosaic_burst};

pub const EXPOSURE_MIN: i64 = 1;
pub const EXPOSURE_DEFAULT: i64 = 0x640;
/// Exposure ceiling before a mode is selected (frame length max minus offset).
pub const EXPOSURE_MAX: i64 = 0xffff - 48;
pub const LONG_EXPOSURE_SHIFT_MAX: u8 = 7;

pub const ANA_GAIN_MIN: i64 = 112;
pub const ANA_GAIN_MAX: i64 = 960;
pub const ANA_GAIN_DEFAULT: i64 = ANA_GAIN_MIN;

pub const DGTL_GAIN_MIN: i64 = 0x0100;
pub const DGTL_GAIN_MAX: i64 = 0xffff;
pub const DGTL_GAIN_DEFAULT: i64 = 0x0100;

pub const COLOUR_BALANCE_MIN: i64 = 0x01;
pub const COLOUR_BALANCE_MAX: i64 = 0xffff;
pub const COLOUR_BALANCE_DEFAULT: i64 = 0x100;

pub const TEST_PATTERN_COLOUR_MIN: i64 = 0;
pub const TEST_PATTERN_COLOUR_MAX: i64 = 0x0fff;

/// Pixel rate reported until the first mode is activated.
pub const INITIAL_PIXEL_RATE: i64 = 590_000_000;

/// Ratio between consecutive HDR exposure stages (long:mid == mid:short).
pub const HDR_EXPOSURE_RATIO: i64 = 4;

pub const CONTROL_COUNT: usize = 15;

/// Controls exposed to the host pipeline.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlId {
    /// Exposure time in lines.
    Exposure,
    AnalogueGain,
    DigitalGain,
    RedBalance,
    BlueBalance,
    TestPattern,
    TestPatternRed,
    TestPatternGreenRed,
    TestPatternBlue,
    TestPatternGreenBlue,
    HorizontalFlip,
    VerticalFlip,
    PixelRate,
    LinkFrequency,
    /// Long exposure multiplier currently applied (power of two).
    ExposureShift,
}

/// Every control in index order.
pub const ALL_CONTROLS: [ControlId; CONTROL_COUNT] = [
    ControlId::Exposure,
    ControlId::AnalogueGain,
    ControlId::DigitalGain,
    ControlId::RedBalance,
    ControlId::BlueBalance,
    ControlId::TestPattern,
    ControlId::TestPatternRed,
    ControlId::TestPatternGreenRed,
    ControlId::TestPatternBlue,
    ControlId::TestPatternGreenBlue,
    ControlId::HorizontalFlip,
    ControlId::VerticalFlip,
    ControlId::PixelRate,
    ControlId::LinkFrequency,
    ControlId::ExposureShift,
];

impl ControlId {
    pub const fn as_index(self) -> usize {
        match self {
            ControlId::Exposure => 0,
            ControlId::AnalogueGain => 1,
            ControlId::DigitalGain => 2,
            ControlId::RedBalance => 3,
            ControlId::BlueBalance => 4,
            ControlId::TestPattern => 5,
            ControlId::TestPatternRed => 6,
            ControlId::TestPatternGreenRed => 7,
            ControlId::TestPatternBlue => 8,
            ControlId::TestPatternGreenBlue => 9,
            ControlId::HorizontalFlip => 10,
            ControlId::VerticalFlip => 11,
            ControlId::PixelRate => 12,
            ControlId::LinkFrequency => 13,
            ControlId::ExposureShift => 14,
        }
    }

    pub const fn from_index(index: usize) -> Option<Self> {
        if index < CONTROL_COUNT {
            Some(ALL_CONTROLS[index])
        } else {
            None
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ControlId::Exposure => "exposure",
            ControlId::AnalogueGain => "analogue-gain",
            ControlId::DigitalGain => "digital-gain",
            ControlId::RedBalance => "red-balance",
            ControlId::BlueBalance => "blue-balance",
            ControlId::TestPattern => "test-pattern",
            ControlId::TestPatternRed => "test-pattern-red",
            ControlId::TestPatternGreenRed => "test-pattern-green-red",
            ControlId::TestPatternBlue => "test-pattern-blue",
            ControlId::TestPatternGreenBlue => "test-pattern-green-blue",
            ControlId::HorizontalFlip => "hflip",
            ControlId::VerticalFlip => "vflip",
            ControlId::PixelRate => "pixel-rate",
            ControlId::LinkFrequency => "link-frequency",
            ControlId::ExposureShift => "exposure-shift",
        }
    }

    /// Case-insensitive lookup by control name.
    pub fn from_name(name: &str) -> Option<Self> {
        ALL_CONTROLS
            .into_iter()
            .find(|id| id.name().eq_ignore_ascii_case(name))
    }

    pub const fn is_read_only(self) -> bool {
        matches!(
            self,
            ControlId::PixelRate | ControlId::LinkFrequency | ControlId::ExposureShift
        )
    }

    /// Flips change the Bayer order and are locked while streaming.
    pub const fn modifies_layout(self) -> bool {
        matches!(self, ControlId::HorizontalFlip | ControlId::VerticalFlip)
    }

    const fn mask(self) -> u16 {
        1 << self.as_index()
    }
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Test pattern selector values.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TestPattern {
    Disabled,
    SolidColor,
    ColorBars,
    GreyColor,
    Pn9,
}

impl TestPattern {
    pub const fn to_raw(self) -> i64 {
        match self {
            TestPattern::Disabled => 0,
            TestPattern::SolidColor => 1,
            TestPattern::ColorBars => 2,
            TestPattern::GreyColor => 3,
            TestPattern::Pn9 => 4,
        }
    }

    pub const fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            0 => Some(TestPattern::Disabled),
            1 => Some(TestPattern::SolidColor),
            2 => Some(TestPattern::ColorBars),
            3 => Some(TestPattern::GreyColor),
            4 => Some(TestPattern::Pn9),
            _ => None,
        }
    }
}

/// Bounds and default of one control.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ControlRange {
    pub min: i64,
    pub max: i64,
    pub step: i64,
    pub default: i64,
}

impl ControlRange {
    pub const fn new(min: i64, max: i64, default: i64) -> Self {
        Self {
            min,
            max,
            step: 1,
            default,
        }
    }

    /// Range collapsed to a single reported value.
    pub const fn fixed(value: i64) -> Self {
        Self::new(value, value, value)
    }

    pub fn clamp(&self, value: i64) -> i64 {
        value.clamp(self.min, self.max)
    }
}

/// Longest single-frame exposure allowed by `mode`.
pub fn max_exposure(mode: Option<&ModeDescriptor>) -> i64 {
    mode.map_or(EXPOSURE_MAX, |mode| i64::from(mode.max_exposure()))
}

/// Range of `id` under the active `mode`.
pub fn control_range(id: ControlId, mode: Option<&ModeDescriptor>) -> ControlRange {
    match id {
        ControlId::Exposure => {
            let max = max_exposure(mode);
            ControlRange::new(EXPOSURE_MIN, max, EXPOSURE_DEFAULT.min(max))
        }
        ControlId::AnalogueGain => ControlRange::new(ANA_GAIN_MIN, ANA_GAIN_MAX, ANA_GAIN_DEFAULT),
        ControlId::DigitalGain => {
            ControlRange::new(DGTL_GAIN_MIN, DGTL_GAIN_MAX, DGTL_GAIN_DEFAULT)
        }
        ControlId::RedBalance | ControlId::BlueBalance => ControlRange::new(
            COLOUR_BALANCE_MIN,
            COLOUR_BALANCE_MAX,
            COLOUR_BALANCE_DEFAULT,
        ),
        ControlId::TestPattern => ControlRange::new(
            TestPattern::Disabled.to_raw(),
            TestPattern::Pn9.to_raw(),
            TestPattern::Disabled.to_raw(),
        ),
        ControlId::TestPatternRed
        | ControlId::TestPatternGreenRed
        | ControlId::TestPatternBlue
        | ControlId::TestPatternGreenBlue => ControlRange::new(
            TEST_PATTERN_COLOUR_MIN,
            TEST_PATTERN_COLOUR_MAX,
            TEST_PATTERN_COLOUR_MAX,
        ),
        ControlId::HorizontalFlip | ControlId::VerticalFlip => ControlRange::new(0, 1, 0),
        ControlId::PixelRate => ControlRange::fixed(mode.map_or(INITIAL_PIXEL_RATE, |mode| {
            i64::try_from(mode.pixel_rate).unwrap_or(i64::MAX)
        })),
        ControlId::LinkFrequency => ControlRange::fixed(mode.map_or(
            i64::try_from(LINK_FREQUENCY_HZ).unwrap_or(i64::MAX),
            |mode| i64::try_from(mode.link_frequency).unwrap_or(i64::MAX),
        )),
        ControlId::ExposureShift => {
            ControlRange::new(0, i64::from(LONG_EXPOSURE_SHIFT_MAX), 0)
        }
    }
}

/// Current logical value of every control plus the set awaiting a flush.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ControlValues {
    values: [i64; CONTROL_COUNT],
    dirty: u16,
}

impl ControlValues {
    /// Defaults for every control, all writable ones marked dirty.
    pub fn new() -> Self {
        let mut values = [0; CONTROL_COUNT];
        for id in ALL_CONTROLS {
            values[id.as_index()] = control_range(id, None).default;
        }
        let mut store = Self { values, dirty: 0 };
        store.mark_all_dirty();
        store
    }

    pub fn get(&self, id: ControlId) -> i64 {
        self.values[id.as_index()]
    }

    /// Stores `value` and stages it for the next flush.
    pub fn stage(&mut self, id: ControlId, value: i64) {
        self.values[id.as_index()] = value;
        self.dirty |= id.mask();
    }

    /// Updates a value without staging a register write.
    pub fn record(&mut self, id: ControlId, value: i64) {
        self.values[id.as_index()] = value;
    }

    pub fn is_dirty(&self, id: ControlId) -> bool {
        self.dirty & id.mask() != 0
    }

    pub fn has_dirty(&self) -> bool {
        self.dirty != 0
    }

    /// Stages every writable control, used after the sensor loses its registers.
    pub fn mark_all_dirty(&mut self) {
        for id in ALL_CONTROLS {
            if !id.is_read_only() {
                self.dirty |= id.mask();
            }
        }
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = 0;
    }
}

impl Default for ControlValues {
    fn default() -> Self {
        Self::new()
    }
}
