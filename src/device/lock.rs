//! Exclusive access to the physical device
//!
//! Only one handler may actuate the robot at a time. A handler takes a
//! `DeviceGuard` before its first device call and keeps it until its last one,
//! so multi-call sequences such as extend/retract never interleave.

use super::facade::Device;
use std::ops::Deref;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Shared handle to the device and its access lock
#[derive(Clone)]
pub struct DeviceHandle {
    device: Arc<dyn Device>,
    lock: Arc<Mutex<()>>,
}

impl DeviceHandle {
    pub fn new(device: Arc<dyn Device>) -> Self {
        Self {
            device,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Wait for exclusive access to the device
    pub async fn acquire(&self) -> DeviceGuard {
        let permit = self.lock.clone().lock_owned().await;
        DeviceGuard {
            device: self.device.clone(),
            _permit: permit,
        }
    }

    /// Whether another handler currently owns the device
    pub fn is_busy(&self) -> bool {
        self.lock.try_lock().is_err()
    }

    pub fn name(&self) -> &str {
        self.device.name()
    }
}

/// Exclusive access to the device; released on drop
pub struct DeviceGuard {
    device: Arc<dyn Device>,
    _permit: OwnedMutexGuard<()>,
}

impl Deref for DeviceGuard {
    type Target = dyn Device;

    fn deref(&self) -> &Self::Target {
        self.device.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{SimulatedDevice, SimulatedTimings};

    #[tokio::test]
    async fn test_guard_excludes_second_holder() {
        let handle = DeviceHandle::new(Arc::new(SimulatedDevice::new(
            "lo",
            SimulatedTimings::instant(),
        )));
        assert!(!handle.is_busy());

        let guard = handle.acquire().await;
        assert!(handle.is_busy());
        guard.wave_gesture().await.unwrap();

        drop(guard);
        assert!(!handle.is_busy());
        assert_eq!(handle.name(), "Simulated");
    }
}
