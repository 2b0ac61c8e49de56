//! Mode descriptors, format negotiation and timing helpers.
//!
//! A request must match a mode's resolution, pixel format and dynamic range
//! exactly. The frame rate picks the nearest frame-rate class for that
//! resolution, capped at the fastest class the sensor offers.

use core::cmp::Reverse;
use core::fmt;

use heapless::Vec;

use crate::registers::RegisterOp;

pub mod table;

pub use table::{LINK_FREQUENCY_HZ, MODES};

/// Margin between frame length and the longest single-frame exposure.
pub const EXPOSURE_OFFSET: u32 = 48;

/// Upper bound on distinct (resolution, format, range) entries.
pub const MAX_FORMATS: usize = 8;

/// Colour filter order of the first two rows of the output.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BayerOrder {
    Rggb,
    Grbg,
    Gbrg,
    Bggr,
}

impl BayerOrder {
    const fn mirrored(self) -> Self {
        match self {
            BayerOrder::Rggb => BayerOrder::Grbg,
            BayerOrder::Grbg => BayerOrder::Rggb,
            BayerOrder::Gbrg => BayerOrder::Bggr,
            BayerOrder::Bggr => BayerOrder::Gbrg,
        }
    }

    const fn flipped(self) -> Self {
        match self {
            BayerOrder::Rggb => BayerOrder::Gbrg,
            BayerOrder::Gbrg => BayerOrder::Rggb,
            BayerOrder::Grbg => BayerOrder::Bggr,
            BayerOrder::Bggr => BayerOrder::Grbg,
        }
    }
}

/// Readout orientation set through the flip controls.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Orientation {
    pub hflip: bool,
    pub vflip: bool,
}

impl Orientation {
    pub const NORMAL: Self = Self {
        hflip: false,
        vflip: false,
    };

    /// Value of the orientation register.
    pub const fn register_value(self) -> u32 {
        let mirror = if self.hflip { 0x01 } else { 0x00 };
        let flip = if self.vflip { 0x02 } else { 0x00 };
        mirror | flip
    }
}

/// 10-bit raw Bayer media bus formats.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PixelFormat {
    Srggb10,
    Sgrbg10,
    Sgbrg10,
    Sbggr10,
}

impl PixelFormat {
    pub const fn bayer_order(self) -> BayerOrder {
        match self {
            PixelFormat::Srggb10 => BayerOrder::Rggb,
            PixelFormat::Sgrbg10 => BayerOrder::Grbg,
            PixelFormat::Sgbrg10 => BayerOrder::Gbrg,
            PixelFormat::Sbggr10 => BayerOrder::Bggr,
        }
    }

    pub const fn from_bayer_order(order: BayerOrder) -> Self {
        match order {
            BayerOrder::Rggb => PixelFormat::Srggb10,
            BayerOrder::Grbg => PixelFormat::Sgrbg10,
            BayerOrder::Gbrg => PixelFormat::Sgbrg10,
            BayerOrder::Bggr => PixelFormat::Sbggr10,
        }
    }

    /// Format produced once `orientation` is applied to this native format.
    pub const fn oriented(self, orientation: Orientation) -> Self {
        let mut order = self.bayer_order();
        if orientation.hflip {
            order = order.mirrored();
        }
        if orientation.vflip {
            order = order.flipped();
        }
        Self::from_bayer_order(order)
    }

    pub const fn name(self) -> &'static str {
        match self {
            PixelFormat::Srggb10 => "SRGGB10",
            PixelFormat::Sgrbg10 => "SGRBG10",
            PixelFormat::Sgbrg10 => "SGBRG10",
            PixelFormat::Sbggr10 => "SBGGR10",
        }
    }

    /// Case-insensitive lookup by media bus name.
    pub fn from_name(name: &str) -> Option<Self> {
        [
            PixelFormat::Srggb10,
            PixelFormat::Sgrbg10,
            PixelFormat::Sgbrg10,
            PixelFormat::Sbggr10,
        ]
        .into_iter()
        .find(|format| format.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DynamicRange {
    #[default]
    Standard,
    /// Three-exposure HDR readout.
    Hdr,
}

/// Immutable description of one (resolution, format, frame-rate class).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ModeDescriptor {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
    /// Native (unflipped) output format.
    pub format: PixelFormat,
    pub dynamic_range: DynamicRange,
    /// Nominal frame-rate class in frames per second.
    pub frame_rate: u32,
    pub line_length_pix: u32,
    pub frame_length: u32,
    pub pixel_rate: u64,
    pub link_frequency: u64,
    pub exposure_lines_min: u32,
    pub exposure_lines_step: u32,
    /// Sensor-side quad-Bayer remosaic is active in this mode.
    pub remosaic: bool,
    pub registers: &'static [RegisterOp],
}

impl ModeDescriptor {
    /// Longest exposure that fits within one frame, in lines.
    pub const fn max_exposure(&self) -> u32 {
        self.frame_length - EXPOSURE_OFFSET
    }

    pub const fn is_hdr(&self) -> bool {
        matches!(self.dynamic_range, DynamicRange::Hdr)
    }

    /// Actual frame rate in millihertz.
    pub fn frame_rate_millihz(&self) -> u32 {
        let pixels_per_frame = u64::from(self.line_length_pix) * u64::from(self.frame_length);
        let millihz = self.pixel_rate * 1_000 / pixels_per_frame;
        u32::try_from(millihz).unwrap_or(u32::MAX)
    }

    /// Duration of one line in nanoseconds.
    pub fn line_time_ns(&self) -> u32 {
        let nanos = u64::from(self.line_length_pix) * 1_000_000_000 / self.pixel_rate;
        u32::try_from(nanos).unwrap_or(u32::MAX)
    }

    /// Whole lines covered by `micros`, rounded down.
    pub fn lines_for_micros(&self, micros: u32) -> u32 {
        let lines = u64::from(micros) * self.pixel_rate
            / (u64::from(self.line_length_pix) * 1_000_000);
        u32::try_from(lines).unwrap_or(u32::MAX)
    }

    /// Exposure duration of `lines`, in microseconds.
    pub fn micros_for_lines(&self, lines: u32) -> u64 {
        u64::from(lines) * u64::from(self.line_length_pix) * 1_000_000 / self.pixel_rate
    }

    /// Output format after applying `orientation`.
    pub const fn format_for(&self, orientation: Orientation) -> PixelFormat {
        self.format.oriented(orientation)
    }

    /// Position of this descriptor in [`MODES`].
    pub fn index(&self) -> Option<usize> {
        MODES.iter().position(|mode| core::ptr::eq(mode, self))
    }
}

/// Format request issued by the host pipeline.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ModeRequest {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    /// Requested frames per second; `0` selects the fastest class.
    pub frame_rate: u32,
    pub dynamic_range: DynamicRange,
}

impl ModeRequest {
    pub const fn new(width: u32, height: u32, pixel_format: PixelFormat, frame_rate: u32) -> Self {
        Self {
            width,
            height,
            pixel_format,
            frame_rate,
            dynamic_range: DynamicRange::Standard,
        }
    }

    #[must_use]
    pub const fn with_dynamic_range(mut self, dynamic_range: DynamicRange) -> Self {
        self.dynamic_range = dynamic_range;
        self
    }
}

/// Picks the mode satisfying `request` under the current `orientation`.
pub fn select_mode(
    request: &ModeRequest,
    orientation: Orientation,
) -> Option<&'static ModeDescriptor> {
    let candidates = || {
        MODES.iter().filter(move |mode| {
            mode.width == request.width
                && mode.height == request.height
                && mode.dynamic_range == request.dynamic_range
                && mode.format_for(orientation) == request.pixel_format
        })
    };

    let fastest = candidates().map(|mode| mode.frame_rate).max()?;
    let target = match request.frame_rate {
        0 => fastest,
        requested => requested.min(fastest),
    };

    candidates().min_by_key(|mode| (mode.frame_rate.abs_diff(target), Reverse(mode.frame_rate)))
}

/// One enumerable output format.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FormatDescriptor {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub dynamic_range: DynamicRange,
    pub max_frame_rate: u32,
}

/// Lists the distinct formats in table order.
pub fn supported_formats(orientation: Orientation) -> Vec<FormatDescriptor, MAX_FORMATS> {
    let mut formats: Vec<FormatDescriptor, MAX_FORMATS> = Vec::new();
    for mode in &MODES {
        let format = mode.format_for(orientation);
        if let Some(existing) = formats.iter_mut().find(|entry| {
            entry.width == mode.width
                && entry.height == mode.height
                && entry.format == format
                && entry.dynamic_range == mode.dynamic_range
        }) {
            existing.max_frame_rate = existing.max_frame_rate.max(mode.frame_rate);
            continue;
        }

        let pushed = formats
            .push(FormatDescriptor {
                width: mode.width,
                height: mode.height,
                format,
                dynamic_range: mode.dynamic_range,
                max_frame_rate: mode.frame_rate,
            })
            .is_ok();
        debug_assert!(pushed, "format list exceeds capacity");
    }
    formats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::map::{FRAME_LENGTH, LINE_LENGTH};

    fn request(width: u32, height: u32, fps: u32) -> ModeRequest {
        ModeRequest::new(width, height, PixelFormat::Srggb10, fps)
    }

    #[test]
    fn exact_resolution_and_format_are_required() {
        assert!(select_mode(&request(4608, 2592, 10), Orientation::NORMAL).is_some());
        assert!(select_mode(&request(4608, 2590, 10), Orientation::NORMAL).is_none());

        let wrong_format = ModeRequest::new(4608, 2592, PixelFormat::Sbggr10, 10);
        assert!(select_mode(&wrong_format, Orientation::NORMAL).is_none());
    }

    #[test]
    fn frame_rate_is_capped_at_fastest_class() {
        let mode = select_mode(&request(4608, 2592, 30), Orientation::NORMAL).expect("mode");
        assert_eq!(mode.frame_rate, 14);

        let mode = select_mode(&request(1536, 864, 0), Orientation::NORMAL).expect("mode");
        assert_eq!(mode.frame_rate, 120);
    }

    #[test]
    fn frame_rate_picks_nearest_class_preferring_faster_on_tie() {
        let mode = select_mode(&request(2304, 1296, 35), Orientation::NORMAL).expect("mode");
        assert_eq!(mode.frame_rate, 30);

        let mode = select_mode(&request(2304, 1296, 43), Orientation::NORMAL).expect("mode");
        assert_eq!(mode.frame_rate, 56);

        let mode = select_mode(&request(1536, 864, 90), Orientation::NORMAL).expect("mode");
        assert_eq!(mode.frame_rate, 120);

        let mode = select_mode(&request(1536, 864, 1), Orientation::NORMAL).expect("mode");
        assert_eq!(mode.frame_rate, 60);
    }

    #[test]
    fn hdr_requests_only_match_hdr_modes() {
        let hdr = request(2304, 1296, 30).with_dynamic_range(DynamicRange::Hdr);
        let mode = select_mode(&hdr, Orientation::NORMAL).expect("hdr mode");
        assert!(mode.is_hdr());

        let no_hdr = request(4608, 2592, 10).with_dynamic_range(DynamicRange::Hdr);
        assert!(select_mode(&no_hdr, Orientation::NORMAL).is_none());
    }

    #[test]
    fn flips_change_the_negotiable_bayer_order() {
        let flipped = Orientation {
            hflip: true,
            vflip: true,
        };
        assert!(select_mode(&request(4608, 2592, 10), flipped).is_none());

        let bggr = ModeRequest::new(4608, 2592, PixelFormat::Sbggr10, 10);
        assert!(select_mode(&bggr, flipped).is_some());

        let mirrored = Orientation {
            hflip: true,
            vflip: false,
        };
        assert_eq!(
            PixelFormat::Srggb10.oriented(mirrored),
            PixelFormat::Sgrbg10
        );
        assert_eq!(mirrored.register_value(), 0x01);
    }

    #[test]
    fn mode_registers_match_descriptor_timing() {
        for mode in &MODES {
            let frame_length = mode
                .registers
                .iter()
                .find(|op| op.address == FRAME_LENGTH)
                .expect("frame length register");
            let line_length = mode
                .registers
                .iter()
                .find(|op| op.address == LINE_LENGTH)
                .expect("line length register");
            assert_eq!(frame_length.value, mode.frame_length, "{}", mode.name);
            assert_eq!(line_length.value, mode.line_length_pix, "{}", mode.name);
            assert!(mode.frame_length > mode.height, "{}", mode.name);
        }
    }

    #[test]
    fn frame_rate_classes_are_met_without_exceeding_nominal() {
        for mode in &MODES {
            let nominal = mode.frame_rate * 1_000;
            let actual = mode.frame_rate_millihz();
            assert!(actual <= nominal, "{} runs too fast", mode.name);
            assert!(nominal - actual < 50, "{} runs too slow", mode.name);
        }
    }

    #[test]
    fn exposure_limits_and_conversions() {
        let mode = select_mode(&request(4608, 2592, 14), Orientation::NORMAL).expect("mode");
        assert_eq!(mode.max_exposure(), 2717 - 48);
        assert_eq!(mode.line_time_ns(), 26_290);

        let lines = mode.lines_for_micros(10_000);
        assert_eq!(lines, 380);
        let micros = mode.micros_for_lines(lines);
        assert!(micros <= 10_000 && micros > 9_970);
    }

    #[test]
    fn enumeration_lists_each_format_once() {
        let formats = supported_formats(Orientation::NORMAL);
        assert_eq!(formats.len(), 4);
        assert_eq!(formats[0].width, 4608);
        assert_eq!(formats[0].max_frame_rate, 14);
        assert_eq!(formats[1].max_frame_rate, 56);
        assert_eq!(formats[2].max_frame_rate, 120);
        assert_eq!(formats[3].dynamic_range, DynamicRange::Hdr);
        assert!(
            formats
                .iter()
                .all(|entry| entry.format == PixelFormat::Srggb10)
        );
    }

    #[test]
    fn every_orientation_enumerates_within_capacity() {
        for (hflip, vflip) in [(false, false), (true, false), (false, true), (true, true)] {
            let orientation = Orientation { hflip, vflip };
            let formats = supported_formats(orientation);
            assert_eq!(formats.len(), 4);
            assert!(formats.len() < MAX_FORMATS);
            assert!(
                formats
                    .iter()
                    .all(|entry| entry.format == MODES[0].format_for(orientation))
            );
        }
    }
}
