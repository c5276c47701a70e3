//! Device facade contract

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Capabilities exposed by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    GetVolume,
    SetVolume,
    Speak,
    IndicatorColor,
    WaveGesture,
    ShakeHandGesture,
    Move,
    StopMove,
    DampMode,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::GetVolume => "get_volume",
            Capability::SetVolume => "set_volume",
            Capability::Speak => "speak",
            Capability::IndicatorColor => "indicator_color",
            Capability::WaveGesture => "wave_gesture",
            Capability::ShakeHandGesture => "shake_hand_gesture",
            Capability::Move => "move",
            Capability::StopMove => "stop_move",
            Capability::DampMode => "damp_mode",
        };
        f.write_str(name)
    }
}

/// Errors reported by the device
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    #[error("{capability} rejected by device (code {code})")]
    Rejected { capability: Capability, code: i32 },

    #[error("Device unavailable: {0}")]
    Unavailable(String),
}

pub type DeviceResult<T> = Result<T, DeviceError>;

/// Stage of the handshake arm motion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandPhase {
    /// Arm out, hand offered
    Extend,
    /// Arm back to rest
    Retract,
}

impl HandPhase {
    /// Stage number used by the locomotion controller
    pub fn stage(self) -> u8 {
        match self {
            HandPhase::Extend => 0,
            HandPhase::Retract => 1,
        }
    }
}

/// Indicator light colour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const OFF: Rgb = Rgb::new(0, 0, 0);
    pub const RED: Rgb = Rgb::new(255, 0, 0);
    pub const GREEN: Rgb = Rgb::new(0, 255, 0);
    pub const BLUE: Rgb = Rgb::new(0, 0, 255);
    pub const YELLOW: Rgb = Rgb::new(255, 255, 0);
    pub const CYAN: Rgb = Rgb::new(0, 255, 255);
    pub const MAGENTA: Rgb = Rgb::new(255, 0, 255);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R:{} G:{} B:{}", self.r, self.g, self.b)
    }
}

/// The physical device as seen by the bridge
///
/// Every call may block for the duration of the physical action.
#[async_trait]
pub trait Device: Send + Sync {
    /// Read the speaker volume as `(status code, volume)`; code 0 means success
    async fn get_volume(&self) -> DeviceResult<(i32, u8)>;

    async fn set_volume(&self, volume: u8) -> DeviceResult<()>;

    /// Text-to-speech; returns once the utterance has been played
    async fn speak(&self, text: &str) -> DeviceResult<()>;

    async fn set_indicator_color(&self, color: Rgb) -> DeviceResult<()>;

    async fn wave_gesture(&self) -> DeviceResult<()>;

    async fn shake_hand_gesture(&self, phase: HandPhase) -> DeviceResult<()>;

    /// Velocity command: forward, lateral, yaw rate
    async fn move_velocity(&self, vx: f32, vy: f32, omega: f32) -> DeviceResult<()>;

    async fn stop_move(&self) -> DeviceResult<()>;

    /// Relax all joints
    async fn damp_mode(&self) -> DeviceResult<()>;

    /// Human-readable name for this device
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hand_phase_stages() {
        assert_eq!(HandPhase::Extend.stage(), 0);
        assert_eq!(HandPhase::Retract.stage(), 1);
    }

    #[test]
    fn test_error_messages_name_capability() {
        let err = DeviceError::Rejected {
            capability: Capability::ShakeHandGesture,
            code: 3104,
        };
        assert_eq!(
            err.to_string(),
            "shake_hand_gesture rejected by device (code 3104)"
        );
        let err = DeviceError::Unavailable("no link on eth9".into());
        assert_eq!(err.to_string(), "Device unavailable: no link on eth9");
    }
}
