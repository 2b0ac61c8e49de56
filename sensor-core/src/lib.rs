#![no_std]

#[cfg(feature = "alloc")]
extern crate alloc;

// Control plane for the IMX708 image sensor.
//
// The crate owns power sequencing, identity checks, mode negotiation and the
// mapping of imaging controls onto sensor registers. It avoids the Rust
// standard library so the same logic runs on MCU firmware and host tooling.

pub mod config;
pub mod controls;
pub mod device;
pub mod error;
pub mod identity;
pub mod modes;
pub mod power;
pub mod registers;
pub mod repl;
pub mod stream;
pub mod telemetry;

pub use config::{ConfigError, RemosaicStrength, SensorConfig};
pub use controls::{ControlId, ControlRange};
pub use device::{DeviceContext, DeviceResources, SensorAdmin, SensorOps, SensorStatus};
pub use error::{LifecycleState, PowerFault, SensorError, TransitionError};
pub use modes::{DynamicRange, ModeDescriptor, ModeRequest, PixelFormat};
pub use power::{PowerState, SupplyDriver};
pub use registers::{I2cTransport, RegisterOp, RegisterTransport, RegisterWidth};
pub use stream::StreamState;
