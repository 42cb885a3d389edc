//! Playing a finished job: audio, reactive LED and breathing motion together.
//!
//! ```text
//! TaskRecord payload ──decode──▶ AudioClip ──▶ PlaybackDevice::play
//!                                   │
//!                                   └─▶ AmplitudeMapper::colors (precomputed)
//!
//! while playing, every LED tick:
//!     elapsed / chunk ──▶ LED color
//!     each profile period (from t = 0) ──▶ breathing profile ──▶ vertical actuators
//! afterwards: LED off, every actuator back to rest
//! ```
//!
//! [`Playback::play`] blocks until the clip has finished, so the orchestrator
//! runs it on the blocking pool.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use thiserror::Error;

use crate::audio::{decode_clip, AudioClip, DecodeError, PlaybackDevice};
use crate::config::{ActuatorRole, AppConfig};
use crate::hardware::{DeviceError, Led};
use crate::light::AmplitudeMapper;
use crate::motion::{beat_period, ActuatorController, BreathingCurve, MotionProfile};
use crate::tasks::TaskRecord;

/// Extra time allowed past the clip's length before playback is abandoned.
const OVERRUN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("task has no audio to play")]
    EmptyPayload,

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Anything that can perform a finished task.
pub trait Playback: Send + Sync {
    /// Blocks until playback is over.
    fn play(&self, task: &TaskRecord) -> Result<(), PlaybackError>;
}

// ---------------------------------------------------------------------------
// PlaybackCoordinator
// ---------------------------------------------------------------------------

pub struct PlaybackCoordinator {
    device: Arc<dyn PlaybackDevice>,
    led: Mutex<Box<dyn Led>>,
    actuators: Vec<ActuatorController>,
    mapper: AmplitudeMapper,
    /// Breathing profile and how often it is re-issued.
    breath: Option<(MotionProfile, Duration)>,
    led_tick: Duration,
}

impl PlaybackCoordinator {
    pub fn from_config(
        config: &AppConfig,
        device: Arc<dyn PlaybackDevice>,
        led: Box<dyn Led>,
        actuators: Vec<ActuatorController>,
    ) -> Self {
        let motion = &config.motion;
        let beats = motion.beats_per_profile.max(1);
        let breath = beat_period(motion.bpm, 1).and_then(|beat| {
            let period = beat.checked_mul(beats)?;
            if period.is_zero() {
                return None;
            }
            match BreathingCurve::from_config(motion).profile(beat, beats) {
                Ok(profile) => Some((profile, period)),
                Err(e) => {
                    warn!("playback: breathing motion disabled: {e}");
                    None
                }
            }
        });

        Self {
            device,
            led: Mutex::new(led),
            actuators,
            mapper: AmplitudeMapper::from_config(&config.light),
            breath,
            led_tick: Duration::from_millis(config.light.tick_ms.max(1)),
        }
    }

    pub fn actuators(&self) -> &[ActuatorController] {
        &self.actuators
    }

    fn lock_led(&self) -> MutexGuard<'_, Box<dyn Led>> {
        self.led.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn breathe(&self, profile: &MotionProfile) {
        for actuator in self
            .actuators
            .iter()
            .filter(|a| a.role() == ActuatorRole::Vertical)
        {
            if let Err(e) = actuator.submit_profile(profile) {
                warn!("{}: breathing profile rejected: {e}", actuator.name());
            }
        }
    }

    fn perform(&self, clip: &AudioClip, led: &mut dyn Led) -> Result<(), PlaybackError> {
        let colors = self.mapper.colors(clip);
        let chunk_nanos = self.mapper.chunk_duration().as_nanos().max(1);
        let deadline = Duration::from_secs_f64(clip.duration_secs()) + OVERRUN_GRACE;

        let mut handle = self.device.play(clip)?;
        let started = Instant::now();
        let mut next_breath = Duration::ZERO;
        let mut led_failing = false;

        while handle.is_playing() {
            let elapsed = started.elapsed();
            if elapsed > deadline {
                warn!("playback: device still busy {elapsed:?} in; stopping");
                break;
            }

            if let Some((profile, period)) = &self.breath {
                if elapsed >= next_breath {
                    self.breathe(profile);
                    while next_breath <= elapsed {
                        next_breath += *period;
                    }
                }
            }

            let index = (elapsed.as_nanos() / chunk_nanos) as usize;
            if let Some(&color) = colors.get(index).or(colors.last()) {
                match led.set_color(color) {
                    Ok(()) => led_failing = false,
                    Err(e) if !led_failing => {
                        warn!("playback: LED write failed: {e}");
                        led_failing = true;
                    }
                    Err(_) => {}
                }
            }

            std::thread::sleep(self.led_tick);
        }

        handle.stop();
        Ok(())
    }

    fn settle(&self, led: &mut dyn Led) {
        if let Err(e) = led.off() {
            warn!("playback: could not switch LED off: {e}");
        }
        for actuator in &self.actuators {
            actuator.return_to_rest();
        }
        debug!("playback: LED off, actuators returning to rest");
    }
}

impl Playback for PlaybackCoordinator {
    fn play(&self, task: &TaskRecord) -> Result<(), PlaybackError> {
        let result = task
            .payload
            .as_ref()
            .filter(|p| !p.audio.is_empty())
            .ok_or(PlaybackError::EmptyPayload)?;
        let clip = decode_clip(&result.audio, result.format.as_deref())?;
        info!(
            "playback: task {} ({:.1} s at {} Hz)",
            task.id,
            clip.duration_secs(),
            clip.sample_rate
        );

        let mut led = self.lock_led();
        let outcome = self.perform(&clip, &mut **led);
        self.settle(&mut **led);
        outcome
    }
}

impl Drop for PlaybackCoordinator {
    fn drop(&mut self) {
        let led = self.led.get_mut().unwrap_or_else(PoisonError::into_inner);
        let _ = led.off();
    }
}

#[cfg(test)]
pub use mock::MockPlayback;


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{encode_wav, PlaybackHandle};
    use crate::config::ActuatorConfig;
    use crate::hardware::AngularActuator;
    use crate::light::Rgb;
    use crate::tasks::{JobResult, TaskId, TaskStatus};

    /// Output device that "plays" for the clip's real duration.
    #[derive(Default)]
    struct TimedDevice {
        fail: bool,
    }

    struct TimedHandle {
        until: Instant,
        stopped: bool,
    }

    impl PlaybackHandle for TimedHandle {
        fn is_playing(&self) -> bool {
            !self.stopped && Instant::now() < self.until
        }

        fn stop(&mut self) {
            self.stopped = true;
        }
    }

    impl PlaybackDevice for TimedDevice {
        fn play(&self, clip: &AudioClip) -> Result<Box<dyn PlaybackHandle>, DeviceError> {
            if self.fail {
                return Err(DeviceError::Unavailable("audio output".into()));
            }
            Ok(Box::new(TimedHandle {
                until: Instant::now() + Duration::from_secs_f64(clip.duration_secs()),
                stopped: false,
            }))
        }
    }

    #[derive(Clone, Default)]
    struct RecordingLed(Arc<Mutex<Vec<Rgb>>>);

    impl Led for RecordingLed {
        fn set_color(&mut self, color: Rgb) -> Result<(), DeviceError> {
            self.0.lock().unwrap().push(color);
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct RecordingServo(Arc<Mutex<Vec<f64>>>);

    impl AngularActuator for RecordingServo {
        fn set_angle(&mut self, degrees: f64) -> Result<(), DeviceError> {
            self.0.lock().unwrap().push(degrees);
            Ok(())
        }
    }

    fn servo(name: &str, role: ActuatorRole) -> ActuatorConfig {
        ActuatorConfig {
            name: name.into(),
            role,
            min_angle: -90.0,
            max_angle: 90.0,
            rest_angle: 0.0,
            speed_limit: 2_000.0,
        }
    }

    fn task_with_audio(audio: Vec<u8>) -> TaskRecord {
        TaskRecord {
            id: TaskId::new("task-1"),
            status: TaskStatus::Completed,
            payload: Some(JobResult {
                audio,
                format: Some("wav".into()),
                metadata: Default::default(),
            }),
            submitted_at: Instant::now(),
        }
    }

    /// 300 ms at 8 kHz: first half silent, second half loud.
    fn half_loud_wav() -> Vec<u8> {
        let mut pcm = vec![0_i16; 1_200];
        pcm.extend(std::iter::repeat(16_000_i16).take(1_200));
        encode_wav(&pcm, 1, 8_000).unwrap()
    }

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.light.min_color = Rgb::BLACK;
        config.light.max_color = Rgb::new(1.0, 0.0, 0.0);
        // One breath every 100 ms.
        config.motion.bpm = 600.0;
        config.motion.beats_per_profile = 1;
        config
    }

    #[test]
    fn plays_with_led_envelope_and_breathing_then_settles() {
        let led = RecordingLed::default();
        let vertical = RecordingServo::default();
        let horizontal = RecordingServo::default();
        let actuators = vec![
            ActuatorController::spawn(
                &servo("v", ActuatorRole::Vertical),
                200.0,
                Box::new(vertical.clone()),
            )
            .unwrap(),
            ActuatorController::spawn(
                &servo("h", ActuatorRole::Horizontal),
                200.0,
                Box::new(horizontal.clone()),
            )
            .unwrap(),
        ];
        let coordinator = PlaybackCoordinator::from_config(
            &config(),
            Arc::new(TimedDevice::default()),
            Box::new(led.clone()),
            actuators,
        );

        coordinator.play(&task_with_audio(half_loud_wav())).unwrap();

        let colors = led.0.lock().unwrap().clone();
        assert!(colors.len() > 10);
        assert_eq!(colors.first(), Some(&Rgb::BLACK));
        assert!(colors.contains(&Rgb::new(1.0, 0.0, 0.0)));
        assert_eq!(colors.last(), Some(&Rgb::BLACK), "LED must end off");

        assert!(vertical.0.lock().unwrap().iter().any(|a| *a < -1.0));
        assert!(horizontal.0.lock().unwrap().iter().all(|a| *a == 0.0));

        let deadline = Instant::now() + Duration::from_secs(2);
        while coordinator.actuators()[0].current_angle() != 0.0 {
            assert!(Instant::now() < deadline, "vertical actuator never rested");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn empty_payload_is_rejected() {
        let coordinator = PlaybackCoordinator::from_config(
            &config(),
            Arc::new(TimedDevice::default()),
            Box::new(RecordingLed::default()),
            Vec::new(),
        );
        assert!(matches!(
            coordinator.play(&task_with_audio(Vec::new())),
            Err(PlaybackError::EmptyPayload)
        ));

        let mut pending = task_with_audio(Vec::new());
        pending.payload = None;
        assert!(matches!(
            coordinator.play(&pending),
            Err(PlaybackError::EmptyPayload)
        ));
    }

    #[test]
    fn undecodable_payload_is_a_decode_error() {
        let coordinator = PlaybackCoordinator::from_config(
            &config(),
            Arc::new(TimedDevice::default()),
            Box::new(RecordingLed::default()),
            Vec::new(),
        );
        let result = coordinator.play(&task_with_audio(b"definitely not audio".to_vec()));
        assert!(matches!(result, Err(PlaybackError::Decode(_))));
    }

    #[test]
    fn device_failure_still_switches_led_off() {
        let led = RecordingLed::default();
        let coordinator = PlaybackCoordinator::from_config(
            &config(),
            Arc::new(TimedDevice { fail: true }),
            Box::new(led.clone()),
            Vec::new(),
        );

        let result = coordinator.play(&task_with_audio(half_loud_wav()));

        assert!(matches!(result, Err(PlaybackError::Device(_))));
        assert_eq!(led.0.lock().unwrap().last(), Some(&Rgb::BLACK));
    }

    #[test]
    fn unusable_tempo_disables_breathing() {
        for (bpm, beats) in [(0.0, 1), (f64::NAN, 1), (1e-300, 1), (1e-9, u32::MAX)] {
            let mut config = config();
            config.motion.bpm = bpm;
            config.motion.beats_per_profile = beats;
            let coordinator = PlaybackCoordinator::from_config(
                &config,
                Arc::new(TimedDevice::default()),
                Box::new(RecordingLed::default()),
                Vec::new(),
            );
            assert!(coordinator.breath.is_none(), "bpm = {bpm}, beats = {beats}");
        }
    }
}
