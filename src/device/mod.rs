//! Device Facade Module
//!
//! The actuator/audio/lighting capability set the bridge drives. Calls may block
//! for as long as the physical action takes, so they are only made from handler
//! tasks, never from the poll loop.

mod diagnostics;
mod facade;
mod lock;
mod simulated;

pub use diagnostics::{run_self_test, SelfTestConfig};
pub use facade::{Device, DeviceError, DeviceResult, HandPhase};
pub use lock::DeviceHandle;
pub use simulated::{SimulatedDevice, SimulatedTimings};

#[cfg(test)]
pub use facade::{Capability, Rgb};
#[cfg(test)]
pub use simulated::DeviceCall;
