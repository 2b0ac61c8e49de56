//! Static mode table.
//!
//! Register lists carry the output size and frame timing registers for each
//! frame-rate class; the bulk vendor initialisation tables live with the
//! platform integration.

use super::{DynamicRange, ModeDescriptor, PixelFormat};
use crate::registers::RegisterOp;
use crate::registers::map::{
    BINNING_MODE, BINNING_TYPE, FRAME_LENGTH, HDR_MODE, LINE_LENGTH, X_OUTPUT_SIZE, Y_OUTPUT_SIZE,
};

/// MIPI CSI-2 link frequency shared by every mode.
pub const LINK_FREQUENCY_HZ: u64 = 450_000_000;

const FULL_LINE_LENGTH: u32 = 0x3d20;
const BINNED_LINE_LENGTH: u32 = 0x1e90;
const SHORT_LINE_LENGTH: u32 = 0x1460;

const FULL_PIXEL_RATE: u64 = 595_200_000;
const CROPPED_PIXEL_RATE: u64 = 566_400_000;
const HDR_PIXEL_RATE: u64 = 777_600_000;

const FULL_RES_14FPS: [RegisterOp; 6] = [
    RegisterOp::u16(FRAME_LENGTH, 2717),
    RegisterOp::u16(LINE_LENGTH, FULL_LINE_LENGTH),
    RegisterOp::u16(X_OUTPUT_SIZE, 4608),
    RegisterOp::u16(Y_OUTPUT_SIZE, 2592),
    RegisterOp::u8(BINNING_MODE, 0x00),
    RegisterOp::u8(HDR_MODE, 0x00),
];

const FULL_RES_10FPS: [RegisterOp; 6] = [
    RegisterOp::u16(FRAME_LENGTH, 3804),
    RegisterOp::u16(LINE_LENGTH, FULL_LINE_LENGTH),
    RegisterOp::u16(X_OUTPUT_SIZE, 4608),
    RegisterOp::u16(Y_OUTPUT_SIZE, 2592),
    RegisterOp::u8(BINNING_MODE, 0x00),
    RegisterOp::u8(HDR_MODE, 0x00),
];

const BINNED_56FPS: [RegisterOp; 7] = [
    RegisterOp::u16(FRAME_LENGTH, 1359),
    RegisterOp::u16(LINE_LENGTH, BINNED_LINE_LENGTH),
    RegisterOp::u16(X_OUTPUT_SIZE, 2304),
    RegisterOp::u16(Y_OUTPUT_SIZE, 1296),
    RegisterOp::u8(BINNING_MODE, 0x01),
    RegisterOp::u8(BINNING_TYPE, 0x22),
    RegisterOp::u8(HDR_MODE, 0x00),
];

const BINNED_30FPS: [RegisterOp; 7] = [
    RegisterOp::u16(FRAME_LENGTH, 2536),
    RegisterOp::u16(LINE_LENGTH, BINNED_LINE_LENGTH),
    RegisterOp::u16(X_OUTPUT_SIZE, 2304),
    RegisterOp::u16(Y_OUTPUT_SIZE, 1296),
    RegisterOp::u8(BINNING_MODE, 0x01),
    RegisterOp::u8(BINNING_TYPE, 0x22),
    RegisterOp::u8(HDR_MODE, 0x00),
];

const CROPPED_120FPS: [RegisterOp; 7] = [
    RegisterOp::u16(FRAME_LENGTH, 905),
    RegisterOp::u16(LINE_LENGTH, SHORT_LINE_LENGTH),
    RegisterOp::u16(X_OUTPUT_SIZE, 1536),
    RegisterOp::u16(Y_OUTPUT_SIZE, 864),
    RegisterOp::u8(BINNING_MODE, 0x01),
    RegisterOp::u8(BINNING_TYPE, 0x22),
    RegisterOp::u8(HDR_MODE, 0x00),
];

const CROPPED_60FPS: [RegisterOp; 7] = [
    RegisterOp::u16(FRAME_LENGTH, 1810),
    RegisterOp::u16(LINE_LENGTH, SHORT_LINE_LENGTH),
    RegisterOp::u16(X_OUTPUT_SIZE, 1536),
    RegisterOp::u16(Y_OUTPUT_SIZE, 864),
    RegisterOp::u8(BINNING_MODE, 0x01),
    RegisterOp::u8(BINNING_TYPE, 0x22),
    RegisterOp::u8(HDR_MODE, 0x00),
];

const HDR_30FPS: [RegisterOp; 7] = [
    RegisterOp::u16(FRAME_LENGTH, 4970),
    RegisterOp::u16(LINE_LENGTH, SHORT_LINE_LENGTH),
    RegisterOp::u16(X_OUTPUT_SIZE, 2304),
    RegisterOp::u16(Y_OUTPUT_SIZE, 1296),
    RegisterOp::u8(BINNING_MODE, 0x01),
    RegisterOp::u8(BINNING_TYPE, 0x22),
    RegisterOp::u8(HDR_MODE, 0x01),
];

/// Every supported mode, grouped by resolution with the fastest class first.
pub static MODES: [ModeDescriptor; 7] = [
    ModeDescriptor {
        name: "4608x2592-14",
        width: 4608,
        height: 2592,
        format: PixelFormat::Srggb10,
        dynamic_range: DynamicRange::Standard,
        frame_rate: 14,
        line_length_pix: FULL_LINE_LENGTH,
        frame_length: 2717,
        pixel_rate: FULL_PIXEL_RATE,
        link_frequency: LINK_FREQUENCY_HZ,
        exposure_lines_min: 8,
        exposure_lines_step: 1,
        remosaic: true,
        registers: &FULL_RES_14FPS,
    },
    ModeDescriptor {
        name: "4608x2592-10",
        width: 4608,
        height: 2592,
        format: PixelFormat::Srggb10,
        dynamic_range: DynamicRange::Standard,
        frame_rate: 10,
        line_length_pix: FULL_LINE_LENGTH,
        frame_length: 3804,
        pixel_rate: FULL_PIXEL_RATE,
        link_frequency: LINK_FREQUENCY_HZ,
        exposure_lines_min: 8,
        exposure_lines_step: 1,
        remosaic: true,
        registers: &FULL_RES_10FPS,
    },
    ModeDescriptor {
        name: "2304x1296-56",
        width: 2304,
        height: 1296,
        format: PixelFormat::Srggb10,
        dynamic_range: DynamicRange::Standard,
        frame_rate: 56,
        line_length_pix: BINNED_LINE_LENGTH,
        frame_length: 1359,
        pixel_rate: FULL_PIXEL_RATE,
        link_frequency: LINK_FREQUENCY_HZ,
        exposure_lines_min: 4,
        exposure_lines_step: 2,
        remosaic: false,
        registers: &BINNED_56FPS,
    },
    ModeDescriptor {
        name: "2304x1296-30",
        width: 2304,
        height: 1296,
        format: PixelFormat::Srggb10,
        dynamic_range: DynamicRange::Standard,
        frame_rate: 30,
        line_length_pix: BINNED_LINE_LENGTH,
        frame_length: 2536,
        pixel_rate: FULL_PIXEL_RATE,
        link_frequency: LINK_FREQUENCY_HZ,
        exposure_lines_min: 4,
        exposure_lines_step: 2,
        remosaic: false,
        registers: &BINNED_30FPS,
    },
    ModeDescriptor {
        name: "1536x864-120",
        width: 1536,
        height: 864,
        format: PixelFormat::Srggb10,
        dynamic_range: DynamicRange::Standard,
        frame_rate: 120,
        line_length_pix: SHORT_LINE_LENGTH,
        frame_length: 905,
        pixel_rate: CROPPED_PIXEL_RATE,
        link_frequency: LINK_FREQUENCY_HZ,
        exposure_lines_min: 4,
        exposure_lines_step: 2,
        remosaic: false,
        registers: &CROPPED_120FPS,
    },
    ModeDescriptor {
        name: "1536x864-60",
        width: 1536,
        height: 864,
        format: PixelFormat::Srggb10,
        dynamic_range: DynamicRange::Standard,
        frame_rate: 60,
        line_length_pix: SHORT_LINE_LENGTH,
        frame_length: 1810,
        pixel_rate: CROPPED_PIXEL_RATE,
        link_frequency: LINK_FREQUENCY_HZ,
        exposure_lines_min: 4,
        exposure_lines_step: 2,
        remosaic: false,
        registers: &CROPPED_60FPS,
    },
    ModeDescriptor {
        name: "2304x1296-hdr-30",
        width: 2304,
        height: 1296,
        format: PixelFormat::Srggb10,
        dynamic_range: DynamicRange::Hdr,
        frame_rate: 30,
        line_length_pix: SHORT_LINE_LENGTH,
        frame_length: 4970,
        pixel_rate: HDR_PIXEL_RATE,
        link_frequency: LINK_FREQUENCY_HZ,
        exposure_lines_min: 8,
        exposure_lines_step: 2,
        remosaic: false,
        registers: &HDR_30FPS,
    },
];
