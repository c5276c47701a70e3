//! Simulated device
//!
//! Stands in for the robot when no hardware link is available. Each capability
//! sleeps for the time the real action takes and the most recent calls are
//! journaled. Tests can inject faults per capability.

use super::facade::{Capability, Device, DeviceError, DeviceResult, HandPhase, Rgb};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Calls kept in the journal; older ones are dropped
pub const JOURNAL_CAPACITY: usize = 256;

/// How long each simulated action takes
#[derive(Debug, Clone)]
pub struct SimulatedTimings {
    pub get_volume: Duration,
    pub set_volume: Duration,
    pub speech: Duration,
    pub indicator: Duration,
    pub wave: Duration,
    pub extend: Duration,
    pub retract: Duration,
    pub movement: Duration,
    pub damp: Duration,
}

impl Default for SimulatedTimings {
    fn default() -> Self {
        Self {
            get_volume: Duration::ZERO,
            set_volume: Duration::from_millis(500),
            speech: Duration::from_secs(4),
            indicator: Duration::ZERO,
            wave: Duration::from_secs(5),
            extend: Duration::from_secs(2),
            retract: Duration::from_secs(1),
            movement: Duration::ZERO,
            damp: Duration::ZERO,
        }
    }
}

#[cfg(test)]
impl SimulatedTimings {
    /// Every action completes immediately
    pub fn instant() -> Self {
        Self {
            get_volume: Duration::ZERO,
            set_volume: Duration::ZERO,
            speech: Duration::ZERO,
            indicator: Duration::ZERO,
            wave: Duration::ZERO,
            extend: Duration::ZERO,
            retract: Duration::ZERO,
            movement: Duration::ZERO,
            damp: Duration::ZERO,
        }
    }
}

/// A call recorded by the simulated device
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    GetVolume,
    SetVolume(u8),
    Speak(String),
    IndicatorColor(Rgb),
    WaveGesture,
    ShakeHand(HandPhase),
    Move { vx: f32, vy: f32, omega: f32 },
    StopMove,
    DampMode,
}

#[derive(Debug, Default)]
struct SimState {
    volume: u8,
    journal: VecDeque<DeviceCall>,
    calls: HashMap<Capability, usize>,
    /// capability -> number of calls that still succeed before it fails
    faults: HashMap<Capability, usize>,
}

pub struct SimulatedDevice {
    interface: String,
    timings: SimulatedTimings,
    state: Mutex<SimState>,
}

impl SimulatedDevice {
    /// Create a simulated device attached to the named network interface
    pub fn new(interface: impl Into<String>, timings: SimulatedTimings) -> Self {
        Self {
            interface: interface.into(),
            timings,
            state: Mutex::new(SimState {
                volume: 50,
                ..Default::default()
            }),
        }
    }

    /// Make `capability` fail once it has succeeded `after_calls` times
    #[cfg(test)]
    pub async fn inject_fault(&self, capability: Capability, after_calls: usize) {
        self.state.lock().await.faults.insert(capability, after_calls);
    }

    /// The last `JOURNAL_CAPACITY` calls, oldest first
    pub async fn journal(&self) -> Vec<DeviceCall> {
        self.state.lock().await.journal.iter().cloned().collect()
    }

    async fn invoke(
        &self,
        capability: Capability,
        call: DeviceCall,
        latency: Duration,
    ) -> DeviceResult<()> {
        if self.interface.is_empty() {
            return Err(DeviceError::Unavailable("no network interface".into()));
        }

        let should_fail = {
            let mut state = self.state.lock().await;
            debug!("[DEVICE] {} {:?}", self.interface, call);
            if state.journal.len() == JOURNAL_CAPACITY {
                state.journal.pop_front();
            }
            state.journal.push_back(call);

            let count = state.calls.entry(capability).or_insert(0);
            *count += 1;
            let made = *count;
            matches!(state.faults.get(&capability), Some(&after) if made > after)
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if should_fail {
            return Err(DeviceError::Rejected {
                capability,
                code: -1,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Device for SimulatedDevice {
    async fn get_volume(&self) -> DeviceResult<(i32, u8)> {
        self.invoke(
            Capability::GetVolume,
            DeviceCall::GetVolume,
            self.timings.get_volume,
        )
        .await?;
        Ok((0, self.state.lock().await.volume))
    }

    async fn set_volume(&self, volume: u8) -> DeviceResult<()> {
        self.invoke(
            Capability::SetVolume,
            DeviceCall::SetVolume(volume),
            self.timings.set_volume,
        )
        .await?;
        self.state.lock().await.volume = volume.min(100);
        Ok(())
    }

    async fn speak(&self, text: &str) -> DeviceResult<()> {
        self.invoke(
            Capability::Speak,
            DeviceCall::Speak(text.to_string()),
            self.timings.speech,
        )
        .await
    }

    async fn set_indicator_color(&self, color: Rgb) -> DeviceResult<()> {
        self.invoke(
            Capability::IndicatorColor,
            DeviceCall::IndicatorColor(color),
            self.timings.indicator,
        )
        .await
    }

    async fn wave_gesture(&self) -> DeviceResult<()> {
        self.invoke(
            Capability::WaveGesture,
            DeviceCall::WaveGesture,
            self.timings.wave,
        )
        .await
    }

    async fn shake_hand_gesture(&self, phase: HandPhase) -> DeviceResult<()> {
        let latency = match phase {
            HandPhase::Extend => self.timings.extend,
            HandPhase::Retract => self.timings.retract,
        };
        debug!("[DEVICE] Shake hand stage {}", phase.stage());
        self.invoke(
            Capability::ShakeHandGesture,
            DeviceCall::ShakeHand(phase),
            latency,
        )
        .await
    }

    async fn move_velocity(&self, vx: f32, vy: f32, omega: f32) -> DeviceResult<()> {
        self.invoke(
            Capability::Move,
            DeviceCall::Move { vx, vy, omega },
            self.timings.movement,
        )
        .await
    }

    async fn stop_move(&self) -> DeviceResult<()> {
        self.invoke(
            Capability::StopMove,
            DeviceCall::StopMove,
            self.timings.movement,
        )
        .await
    }

    async fn damp_mode(&self) -> DeviceResult<()> {
        self.invoke(Capability::DampMode, DeviceCall::DampMode, self.timings.damp)
            .await
    }

    fn name(&self) -> &str {
        "Simulated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[test]
    fn test_default_timings() {
        let timings = SimulatedTimings::default();
        assert_eq!(timings.extend, Duration::from_secs(2));
        assert_eq!(timings.retract, Duration::from_secs(1));
        assert_eq!(timings.speech, Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_volume_round_trip() {
        let device = SimulatedDevice::new("lo", SimulatedTimings::instant());
        device.set_volume(85).await.unwrap();
        assert_eq!(device.get_volume().await.unwrap(), (0, 85));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gesture_takes_configured_time() {
        let device = SimulatedDevice::new("lo", SimulatedTimings::default());
        let start = Instant::now();
        device.shake_hand_gesture(HandPhase::Extend).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_fault_after_calls() {
        let device = SimulatedDevice::new("lo", SimulatedTimings::instant());
        device.inject_fault(Capability::ShakeHandGesture, 1).await;

        assert!(device.shake_hand_gesture(HandPhase::Extend).await.is_ok());
        let err = device
            .shake_hand_gesture(HandPhase::Retract)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DeviceError::Rejected {
                capability: Capability::ShakeHandGesture,
                ..
            }
        ));

        // Other capabilities are unaffected
        assert!(device.wave_gesture().await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_interface_is_unavailable() {
        let device = SimulatedDevice::new("", SimulatedTimings::instant());
        assert!(matches!(
            device.wave_gesture().await,
            Err(DeviceError::Unavailable(_))
        ));
        assert!(device.journal().await.is_empty());
    }

    #[tokio::test]
    async fn test_journal_records_order() {
        let device = SimulatedDevice::new("lo", SimulatedTimings::instant());
        device.speak("hello").await.unwrap();
        device.set_indicator_color(Rgb::GREEN).await.unwrap();
        device.damp_mode().await.unwrap();

        assert_eq!(
            device.journal().await,
            vec![
                DeviceCall::Speak("hello".into()),
                DeviceCall::IndicatorColor(Rgb::GREEN),
                DeviceCall::DampMode,
            ]
        );
    }

    #[tokio::test]
    async fn test_journal_keeps_latest_calls() {
        let device = SimulatedDevice::new("lo", SimulatedTimings::instant());
        for volume in 0..JOURNAL_CAPACITY + 10 {
            device.set_volume((volume % 100) as u8).await.unwrap();
        }
        device.stop_move().await.unwrap();

        let journal = device.journal().await;
        assert_eq!(journal.len(), JOURNAL_CAPACITY);
        // 11 oldest calls were dropped
        assert_eq!(journal[0], DeviceCall::SetVolume(11));
        assert_eq!(journal.last(), Some(&DeviceCall::StopMove));
    }
}
