mod support;

use sensor_core::modes::{MODES, Orientation};
use sensor_core::registers::map::{
    FRAME_LENGTH, LPF_INTENSITY, LPF_INTENSITY_EN, X_OUTPUT_SIZE, Y_OUTPUT_SIZE,
};
use sensor_core::{
    ControlId, DynamicRange, LifecycleState, ModeRequest, PixelFormat, PowerState, SensorAdmin,
    SensorConfig, SensorError, SensorOps, StreamState, TransitionError,
};
use support::{MockBus, MockSupply, NoDelay, device, ready_device};

fn request(width: u32, height: u32, frame_rate: u32) -> ModeRequest {
    ModeRequest::new(width, height, PixelFormat::Srggb10, frame_rate)
}

#[test]
fn picks_fastest_class_when_rate_is_zero() {
    let mut device = ready_device();
    let mode = device
        .negotiate(&request(1536, 864, 0))
        .expect("cropped mode exists");
    assert!(core::ptr::eq(mode, &MODES[4]));
    assert_eq!(device.current_mode().map(|mode| mode.frame_rate), Some(120));

    let bus = device.transport();
    assert_eq!(bus.u16_at(FRAME_LENGTH), Some(905));
    assert_eq!(bus.u16_at(X_OUTPUT_SIZE), Some(1536));
    assert_eq!(bus.u16_at(Y_OUTPUT_SIZE), Some(864));
}

#[test]
fn picks_nearest_rate_class() {
    let mut device = ready_device();
    let mode = device
        .negotiate(&request(2304, 1296, 25))
        .expect("binned mode exists");
    assert_eq!(mode.frame_rate, 30);

    let mode = device
        .negotiate(&request(2304, 1296, 200))
        .expect("binned mode exists");
    assert_eq!(mode.frame_rate, 56);
}

#[test]
fn unknown_resolution_keeps_previous_mode() {
    let mut device = ready_device();
    device
        .negotiate(&request(4608, 2592, 0))
        .expect("full resolution");

    let error = device
        .negotiate(&request(640, 480, 30))
        .expect_err("no VGA mode");
    assert_eq!(error, SensorError::NoMatchingMode);
    assert!(core::ptr::eq(
        device.current_mode().expect("mode kept"),
        &MODES[0]
    ));
}

#[test]
fn hdr_is_only_selected_on_request() {
    let mut device = ready_device();
    let standard = device
        .negotiate(&request(2304, 1296, 30))
        .expect("standard binned");
    assert!(!standard.is_hdr());

    let hdr = device
        .negotiate(&request(2304, 1296, 30).with_dynamic_range(DynamicRange::Hdr))
        .expect("hdr binned");
    assert!(hdr.is_hdr());

    let error = device
        .negotiate(&request(4608, 2592, 0).with_dynamic_range(DynamicRange::Hdr))
        .expect_err("no full resolution HDR");
    assert_eq!(error, SensorError::NoMatchingMode);
}

#[test]
fn format_must_match_flipped_bayer_order() {
    let mut device = ready_device();
    device
        .set_control(ControlId::HorizontalFlip, 1)
        .expect("flip while idle");

    let error = device
        .negotiate(&request(2304, 1296, 30))
        .expect_err("rggb no longer produced");
    assert_eq!(error, SensorError::NoMatchingMode);

    let flipped = PixelFormat::Srggb10.oriented(Orientation {
        hflip: true,
        vflip: false,
    });
    device
        .negotiate(&ModeRequest::new(2304, 1296, flipped, 30))
        .expect("flipped format matches");
    assert_eq!(device.pixel_format(), flipped);
}

#[test]
fn negotiation_requires_verified_power_on() {
    let mut device = device();
    let error = device
        .negotiate(&request(2304, 1296, 30))
        .expect_err("powered off");
    assert_eq!(
        error,
        SensorError::InvalidStateTransition(TransitionError::new(
            LifecycleState::Power(PowerState::Off),
            LifecycleState::Stream(StreamState::Configuring),
        ))
    );

    device.power_on().expect("power on");
    let error = device
        .negotiate(&request(2304, 1296, 30))
        .expect_err("identity not checked yet");
    assert_eq!(error, SensorError::IdentityUnverified);
}

#[test]
fn negotiation_refused_while_streaming() {
    let mut device = ready_device();
    device
        .negotiate(&request(2304, 1296, 30))
        .expect("binned mode");
    device.start_stream().expect("start");

    let error = device
        .negotiate(&request(1536, 864, 0))
        .expect_err("streaming");
    assert_eq!(
        error,
        SensorError::InvalidStateTransition(TransitionError::new(
            LifecycleState::Stream(StreamState::Streaming),
            LifecycleState::Stream(StreamState::Configuring),
        ))
    );
}

#[test]
fn renegotiating_same_mode_rewrites_same_registers() {
    let mut device = ready_device();
    let first = device
        .negotiate(&request(4608, 2592, 14))
        .expect("first negotiation");
    assert_eq!(device.transport().writes_to(FRAME_LENGTH), 1);
    let first_writes = device.transport().writes.clone();

    let second = device
        .negotiate(&request(4608, 2592, 14))
        .expect("second negotiation");
    assert!(core::ptr::eq(first, second));
    assert!(device.current_mode().is_some_and(|mode| core::ptr::eq(mode, first)));
    assert_eq!(device.transport().writes_to(FRAME_LENGTH), 2);

    let writes = &device.transport().writes;
    let second_writes = &writes[first_writes.len()..];
    let mode_writes = first_writes
        .iter()
        .take_while(|(address, _)| *address != LPF_INTENSITY && *address != LPF_INTENSITY_EN)
        .count();
    assert_eq!(&first_writes[..mode_writes], &second_writes[..mode_writes]);
    assert_eq!(
        device.transport().u16_at(FRAME_LENGTH).map(u32::from),
        Some(first.frame_length)
    );
}

#[test]
fn remosaic_filter_follows_configured_strength() {
    let config = SensorConfig::new()
        .with_remosaic_strength(4)
        .expect("4 is a valid strength");
    let mut device = sensor_core::DeviceContext::new(
        MockBus::imx708(),
        MockSupply::default(),
        NoDelay::default(),
        config,
    );
    device.power_on().expect("power on");
    device.verify_identity().expect("identity");

    device
        .negotiate(&request(4608, 2592, 0))
        .expect("full resolution");
    assert_eq!(device.transport().byte(LPF_INTENSITY), Some(4));
    assert_eq!(device.transport().byte(LPF_INTENSITY_EN), Some(0x00));

    device
        .negotiate(&request(2304, 1296, 0))
        .expect("binned");
    assert_eq!(device.transport().byte(LPF_INTENSITY_EN), Some(0x01));
}

#[test]
fn disabled_strength_keeps_filter_off() {
    let mut device = ready_device();
    device
        .set_remosaic_strength(0)
        .expect("0 disables the filter");
    device
        .negotiate(&request(4608, 2592, 0))
        .expect("full resolution");
    assert_eq!(device.transport().byte(LPF_INTENSITY_EN), Some(0x01));
    assert_eq!(device.transport().writes_to(LPF_INTENSITY), 0);
}

#[test]
fn invalid_strength_is_rejected_without_change() {
    let mut device = ready_device();
    assert!(device.set_remosaic_strength(1).is_err());
    assert!(device.set_remosaic_strength(6).is_err());
    assert_eq!(device.status().remosaic_strength.get(), 2);
}

#[test]
fn enumeration_lists_each_format_once() {
    let device = ready_device();
    let formats = device.enumerate_supported_formats();
    assert_eq!(formats.len(), 4);
    assert!(formats.iter().all(|format| format.format == PixelFormat::Srggb10));
    let hdr: Vec<_> = formats
        .iter()
        .filter(|format| format.dynamic_range == DynamicRange::Hdr)
        .collect();
    assert_eq!(hdr.len(), 1);
    assert_eq!(hdr[0].max_frame_rate, 30);
}
