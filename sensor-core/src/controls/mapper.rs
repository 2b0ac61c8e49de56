//! Translation of staged control values into register bursts.

use super::{
    ANA_GAIN_MIN, ControlId, ControlValues, EXPOSURE_MIN, HDR_EXPOSURE_RATIO,
    LONG_EXPOSURE_SHIFT_MAX, TestPattern, max_exposure,
};
use crate::config::RemosaicStrength;
use crate::modes::{EXPOSURE_OFFSET, ModeDescriptor, Orientation};
use crate::registers::map::{
    ANALOG_GAIN, COLOUR_BALANCE_BLUE, COLOUR_BALANCE_RED, DIGITAL_GAIN, EXPOSURE,
    GROUPED_PARAMETER_HOLD, LONG_EXPOSURE_SHIFT, LPF_INTENSITY, LPF_INTENSITY_DISABLED,
    LPF_INTENSITY_EN, LPF_INTENSITY_ENABLED, MID_ANALOG_GAIN, MID_EXPOSURE, ORIENTATION,
    SHORT_ANALOG_GAIN, SHORT_EXPOSURE, TEST_PATTERN, TEST_PATTERN_BLUE, TEST_PATTERN_GREEN_BLUE,
    TEST_PATTERN_GREEN_RED, TEST_PATTERN_RED,
};
use crate::registers::{Burst, RegisterOp};

const TEST_PATTERN_COLOURS: [(ControlId, u16); 4] = [
    (ControlId::TestPatternRed, TEST_PATTERN_RED),
    (ControlId::TestPatternGreenRed, TEST_PATTERN_GREEN_RED),
    (ControlId::TestPatternBlue, TEST_PATTERN_BLUE),
    (ControlId::TestPatternGreenBlue, TEST_PATTERN_GREEN_BLUE),
];

/// Register form of a requested exposure.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ExposurePlan {
    /// Logical exposure reported back to the host, clamped to the frame.
    pub lines: i64,
    /// Power-of-two multiplier for exposures longer than one frame.
    pub shift: u8,
    /// Value written to the coarse integration time register.
    pub register: u32,
}

/// Computes the exposure registers for `requested` lines under `mode`.
///
/// Requests beyond the frame ceiling select the smallest long exposure shift
/// that brings the scaled value back into range. The register holds the
/// scaled value less [`EXPOSURE_OFFSET`], aligned to the mode's minimum line
/// count and step.
pub fn plan_exposure(requested: i64, mode: Option<&ModeDescriptor>) -> ExposurePlan {
    let max = max_exposure(mode);
    let lines = requested.clamp(EXPOSURE_MIN, max);

    let mut shift = 0;
    let mut scaled = lines;
    if requested > max {
        shift = 1;
        scaled = requested >> shift;
        while scaled > max && shift < LONG_EXPOSURE_SHIFT_MAX {
            shift += 1;
            scaled = requested >> shift;
        }
        scaled = scaled.min(max);
    }

    let encoded = (scaled - i64::from(EXPOSURE_OFFSET)).clamp(EXPOSURE_MIN, max);

    ExposurePlan {
        lines,
        shift,
        register: raw(align_lines(encoded, mode)),
    }
}

/// Rounds `value` down onto the mode's line grid, never below its minimum.
fn align_lines(value: i64, mode: Option<&ModeDescriptor>) -> i64 {
    let (min, step) = mode.map_or((EXPOSURE_MIN, 1), |mode| {
        (
            i64::from(mode.exposure_lines_min),
            i64::from(mode.exposure_lines_step.max(1)),
        )
    });
    let value = value.max(min);
    (value - (value - min) % step).min(max_exposure(mode))
}

/// Builds the burst for every dirty control, wrapped in a grouped hold.
///
/// In HDR modes the long, mid and short exposure and gain stages are always
/// written together so the sensor never latches a mixed set.
pub fn control_burst(
    values: &ControlValues,
    exposure: &ExposurePlan,
    mode: Option<&ModeDescriptor>,
) -> Burst {
    let mut burst = Burst::new();
    if !values.has_dirty() {
        return burst;
    }

    let hdr = mode.is_some_and(ModeDescriptor::is_hdr);
    let hdr_group = hdr
        && (values.is_dirty(ControlId::Exposure) || values.is_dirty(ControlId::AnalogueGain));

    push(&mut burst, RegisterOp::u8(GROUPED_PARAMETER_HOLD, 1));

    if hdr_group || values.is_dirty(ControlId::Exposure) {
        push(
            &mut burst,
            RegisterOp::u8(LONG_EXPOSURE_SHIFT, u32::from(exposure.shift)),
        );
        push(&mut burst, RegisterOp::u16(EXPOSURE, exposure.register));
        if hdr {
            let long = i64::from(exposure.register);
            let mid = align_lines(long / HDR_EXPOSURE_RATIO, mode);
            let short = align_lines(long / (HDR_EXPOSURE_RATIO * HDR_EXPOSURE_RATIO), mode);
            push(&mut burst, RegisterOp::u16(MID_EXPOSURE, raw(mid)));
            push(&mut burst, RegisterOp::u16(SHORT_EXPOSURE, raw(short)));
        }
    }

    if hdr_group || values.is_dirty(ControlId::AnalogueGain) {
        let gain = values.get(ControlId::AnalogueGain);
        push(&mut burst, RegisterOp::u16(ANALOG_GAIN, raw(gain)));
        if hdr {
            let mid = (gain / HDR_EXPOSURE_RATIO).max(ANA_GAIN_MIN);
            let short = (gain / (HDR_EXPOSURE_RATIO * HDR_EXPOSURE_RATIO)).max(ANA_GAIN_MIN);
            push(&mut burst, RegisterOp::u16(MID_ANALOG_GAIN, raw(mid)));
            push(&mut burst, RegisterOp::u16(SHORT_ANALOG_GAIN, raw(short)));
        }
    }

    for (id, address) in [
        (ControlId::DigitalGain, DIGITAL_GAIN),
        (ControlId::RedBalance, COLOUR_BALANCE_RED),
        (ControlId::BlueBalance, COLOUR_BALANCE_BLUE),
    ] {
        if values.is_dirty(id) {
            push(&mut burst, RegisterOp::u16(address, raw(values.get(id))));
        }
    }

    let pattern = values.get(ControlId::TestPattern);
    if values.is_dirty(ControlId::TestPattern) {
        push(&mut burst, RegisterOp::u16(TEST_PATTERN, raw(pattern)));
    }
    if pattern == TestPattern::SolidColor.to_raw() {
        let selector_dirty = values.is_dirty(ControlId::TestPattern);
        for (id, address) in TEST_PATTERN_COLOURS {
            if selector_dirty || values.is_dirty(id) {
                push(&mut burst, RegisterOp::u16(address, raw(values.get(id))));
            }
        }
    }

    if values.is_dirty(ControlId::HorizontalFlip) || values.is_dirty(ControlId::VerticalFlip) {
        let orientation = orientation_of(values);
        push(
            &mut burst,
            RegisterOp::u8(ORIENTATION, orientation.register_value()),
        );
    }

    push(&mut burst, RegisterOp::u8(GROUPED_PARAMETER_HOLD, 0));
    burst
}

/// Quad Bayer re-mosaic filter setup for a freshly activated mode.
pub fn remosaic_burst(mode: &ModeDescriptor, strength: RemosaicStrength) -> Burst {
    let mut burst = Burst::new();
    if mode.remosaic && strength.is_enabled() {
        push(
            &mut burst,
            RegisterOp::u8(LPF_INTENSITY, u32::from(strength.get())),
        );
        push(
            &mut burst,
            RegisterOp::u8(LPF_INTENSITY_EN, LPF_INTENSITY_ENABLED),
        );
    } else {
        push(
            &mut burst,
            RegisterOp::u8(LPF_INTENSITY_EN, LPF_INTENSITY_DISABLED),
        );
    }
    burst
}

/// Readout orientation implied by the flip controls.
pub fn orientation_of(values: &ControlValues) -> Orientation {
    Orientation {
        hflip: values.get(ControlId::HorizontalFlip) != 0,
        vflip: values.get(ControlId::VerticalFlip) != 0,
    }
}

fn push(burst: &mut Burst, op: RegisterOp) {
    let pushed = burst.push(op).is_ok();
    debug_assert!(pushed, "control burst exceeds capacity");
}

fn raw(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}
