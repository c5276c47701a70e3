//! Device self-test
//!
//! Walks every capability once in a fixed order: audio, indicator light,
//! gestures, balance, a short polling burst, then a safe-state cleanup. On the
//! first failure the robot announces it, turns the indicator red and the test
//! stops.

use super::facade::{Device, DeviceError, DeviceResult, HandPhase, Rgb};
use anyhow::{anyhow, Result};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

const TEST_COLORS: [(&str, Rgb); 7] = [
    ("RED", Rgb::RED),
    ("GREEN", Rgb::GREEN),
    ("BLUE", Rgb::BLUE),
    ("YELLOW", Rgb::YELLOW),
    ("CYAN", Rgb::CYAN),
    ("MAGENTA", Rgb::MAGENTA),
    ("WHITE", Rgb::WHITE),
];

/// Self-test parameters
#[derive(Debug, Clone)]
pub struct SelfTestConfig {
    /// Volume set during the audio stage
    pub target_volume: u8,
    /// Pause between visible steps (colours, balance moves)
    pub step_pause: Duration,
    /// Volume reads in the polling burst
    pub poll_count: usize,
    pub poll_interval: Duration,
    /// Yaw rate used by the balance stage
    pub balance_yaw_rate: f32,
}

impl Default for SelfTestConfig {
    fn default() -> Self {
        Self {
            target_volume: 70,
            step_pause: Duration::from_secs(1),
            poll_count: 20,
            poll_interval: Duration::from_millis(100),
            balance_yaw_rate: 0.1,
        }
    }
}

/// What a passing self-test observed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelfTestReport {
    pub stages_passed: Vec<&'static str>,
    pub initial_volume: Option<u8>,
    pub final_volume: Option<u8>,
    /// Successful reads in the polling burst
    pub polls_ok: usize,
}

/// Run the full self-test against `device`
pub async fn run_self_test(device: &dyn Device, config: &SelfTestConfig) -> Result<SelfTestReport> {
    let mut report = SelfTestReport::default();

    match run_stages(device, config, &mut report).await {
        Ok(()) => {
            info!("[SELF-TEST] All stages passed on {}", device.name());
            Ok(report)
        }
        Err((stage, e)) => {
            error!("[SELF-TEST] Stage '{}' failed: {}", stage, e);
            if let Err(e) = device.speak("Test failed. Please check connection.").await {
                warn!("[SELF-TEST] Could not announce failure: {}", e);
            }
            if let Err(e) = device.set_indicator_color(Rgb::RED).await {
                warn!("[SELF-TEST] Could not set failure colour: {}", e);
            }
            Err(anyhow!("self-test stage '{}' failed: {}", stage, e))
        }
    }
}

async fn run_stages(
    device: &dyn Device,
    config: &SelfTestConfig,
    report: &mut SelfTestReport,
) -> std::result::Result<(), (&'static str, DeviceError)> {
    let stage = "audio";
    test_audio(device, config, report).await.map_err(|e| (stage, e))?;
    report.stages_passed.push(stage);

    let stage = "indicator";
    test_indicator(device, config).await.map_err(|e| (stage, e))?;
    report.stages_passed.push(stage);

    let stage = "gestures";
    test_gestures(device).await.map_err(|e| (stage, e))?;
    report.stages_passed.push(stage);

    let stage = "balance";
    test_balance(device, config).await.map_err(|e| (stage, e))?;
    report.stages_passed.push(stage);

    let stage = "polling";
    test_polling(device, config, report).await.map_err(|e| (stage, e))?;
    report.stages_passed.push(stage);

    let stage = "cleanup";
    cleanup(device, config).await.map_err(|e| (stage, e))?;
    report.stages_passed.push(stage);

    Ok(())
}

async fn test_audio(
    device: &dyn Device,
    config: &SelfTestConfig,
    report: &mut SelfTestReport,
) -> DeviceResult<()> {
    info!("[SELF-TEST] Audio");

    let (code, volume) = device.get_volume().await?;
    if code == 0 {
        info!("[SELF-TEST] Current volume: {}", volume);
        report.initial_volume = Some(volume);
    } else {
        warn!("[SELF-TEST] Failed to get volume, error code: {}", code);
    }

    device.set_volume(config.target_volume).await?;

    let (code, volume) = device.get_volume().await?;
    if code == 0 {
        info!("[SELF-TEST] New volume: {}", volume);
        report.final_volume = Some(volume);
    } else {
        warn!("[SELF-TEST] Failed to get volume, error code: {}", code);
    }

    device
        .speak("Hello! Connection test in progress.")
        .await
}

async fn test_indicator(device: &dyn Device, config: &SelfTestConfig) -> DeviceResult<()> {
    info!("[SELF-TEST] Indicator light");
    device.speak("Testing LED system").await?;

    for (name, color) in TEST_COLORS {
        info!("[SELF-TEST] Setting color to {} ({})", name, color);
        device.set_indicator_color(color).await?;
        sleep(config.step_pause).await;
    }

    device.set_indicator_color(Rgb::OFF).await
}

async fn test_gestures(device: &dyn Device) -> DeviceResult<()> {
    info!("[SELF-TEST] Gestures");

    device.speak("Executing Wave Hand").await?;
    device.wave_gesture().await?;

    device.speak("Executing Shake Hand").await?;
    device.shake_hand_gesture(HandPhase::Extend).await?;
    device.shake_hand_gesture(HandPhase::Retract).await
}

async fn test_balance(device: &dyn Device, config: &SelfTestConfig) -> DeviceResult<()> {
    info!("[SELF-TEST] Balance stand");
    device.speak("Testing balance stand").await?;

    device.move_velocity(0.0, 0.0, config.balance_yaw_rate).await?;
    sleep(config.step_pause).await;
    device.move_velocity(0.0, 0.0, -config.balance_yaw_rate).await?;
    sleep(config.step_pause).await;
    device.stop_move().await
}

async fn test_polling(
    device: &dyn Device,
    config: &SelfTestConfig,
    report: &mut SelfTestReport,
) -> DeviceResult<()> {
    info!("[SELF-TEST] Polling burst ({} reads)", config.poll_count);

    for n in 1..=config.poll_count {
        let (code, _) = device.get_volume().await?;
        if code == 0 {
            report.polls_ok += 1;
        }
        if n % 10 == 0 {
            info!("[SELF-TEST] Reads: {}, status code: {}", n, code);
        }
        sleep(config.poll_interval).await;
    }
    Ok(())
}

async fn cleanup(device: &dyn Device, config: &SelfTestConfig) -> DeviceResult<()> {
    info!("[SELF-TEST] Returning to safe state");
    device
        .speak("All tests completed successfully! Connection is stable.")
        .await?;
    device.damp_mode().await?;
    device.set_indicator_color(Rgb::GREEN).await?;
    sleep(config.step_pause).await;
    device.set_indicator_color(Rgb::OFF).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Capability, DeviceCall, SimulatedDevice, SimulatedTimings};

    fn fast_config() -> SelfTestConfig {
        SelfTestConfig {
            poll_count: 10,
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_self_test_passes_on_healthy_device() {
        let device = SimulatedDevice::new("lo", SimulatedTimings::default());

        let report = run_self_test(&device, &fast_config()).await.expect("self-test failed");

        assert_eq!(
            report.stages_passed,
            vec!["audio", "indicator", "gestures", "balance", "polling", "cleanup"]
        );
        assert_eq!(report.initial_volume, Some(50));
        assert_eq!(report.final_volume, Some(70));
        assert_eq!(report.polls_ok, 10);

        let journal = device.journal().await;
        assert_eq!(journal.last(), Some(&DeviceCall::IndicatorColor(Rgb::OFF)));
        assert!(journal.contains(&DeviceCall::DampMode));
        let colours = journal
            .iter()
            .filter(|c| matches!(c, DeviceCall::IndicatorColor(_)))
            .count();
        // seven colours, off, green, off
        assert_eq!(colours, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_self_test_failure_turns_indicator_red() {
        let device = SimulatedDevice::new("lo", SimulatedTimings::instant());
        device.inject_fault(Capability::WaveGesture, 0).await;

        let err = run_self_test(&device, &fast_config()).await.unwrap_err();
        assert!(err.to_string().contains("gestures"));

        let journal = device.journal().await;
        assert_eq!(journal.last(), Some(&DeviceCall::IndicatorColor(Rgb::RED)));
        assert!(journal.contains(&DeviceCall::Speak(
            "Test failed. Please check connection.".into()
        )));
        assert!(!journal.contains(&DeviceCall::DampMode));
    }
}
