//! IMX708 register addresses and fixed encodings.

/// Default 7-bit I2C address of the sensor.
pub const DEFAULT_I2C_ADDRESS: u8 = 0x1a;

pub const CHIP_ID: u16 = 0x0016;
pub const EXPECTED_CHIP_ID: u16 = 0x0708;

pub const MODE_SELECT: u16 = 0x0100;
pub const MODE_STANDBY: u32 = 0x00;
pub const MODE_STREAMING: u32 = 0x01;

/// Bit 0 mirrors horizontally, bit 1 flips vertically.
pub const ORIENTATION: u16 = 0x0101;

/// Latches exposure and gain writes together at the next frame boundary.
pub const GROUPED_PARAMETER_HOLD: u16 = 0x0104;

pub const FRAME_LENGTH: u16 = 0x0340;
pub const LINE_LENGTH: u16 = 0x0342;
pub const X_OUTPUT_SIZE: u16 = 0x034c;
pub const Y_OUTPUT_SIZE: u16 = 0x034e;
pub const BINNING_MODE: u16 = 0x0900;
pub const BINNING_TYPE: u16 = 0x0901;
pub const HDR_MODE: u16 = 0x0220;

pub const LONG_EXPOSURE_SHIFT: u16 = 0x3100;

pub const EXPOSURE: u16 = 0x0202;
pub const ANALOG_GAIN: u16 = 0x0204;
pub const DIGITAL_GAIN: u16 = 0x020e;

pub const MID_EXPOSURE: u16 = 0x3116;
pub const SHORT_EXPOSURE: u16 = 0x0224;
pub const MID_ANALOG_GAIN: u16 = 0x3118;
pub const SHORT_ANALOG_GAIN: u16 = 0x0216;

pub const COLOUR_BALANCE_RED: u16 = 0x0b90;
pub const COLOUR_BALANCE_BLUE: u16 = 0x0b92;

pub const TEST_PATTERN: u16 = 0x0600;
pub const TEST_PATTERN_RED: u16 = 0x0602;
pub const TEST_PATTERN_GREEN_RED: u16 = 0x0604;
pub const TEST_PATTERN_BLUE: u16 = 0x0606;
pub const TEST_PATTERN_GREEN_BLUE: u16 = 0x0608;

pub const LPF_INTENSITY_EN: u16 = 0xc428;
pub const LPF_INTENSITY_ENABLED: u32 = 0x00;
pub const LPF_INTENSITY_DISABLED: u32 = 0x01;
pub const LPF_INTENSITY: u16 = 0xc429;
