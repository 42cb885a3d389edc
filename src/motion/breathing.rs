//! Beat-synchronised "breathing" profile for the vertical actuator.
//!
//! One breath per beat: an ease-out rise from `low` to `high` over
//! `rise_fraction` of the beat, then an ease-in fall back to `low`.  Each
//! half is sampled into `points_per_segment` keyframes so the resulting
//! [`MotionProfile`] stays piecewise linear.

use std::time::Duration;

use super::profile::{Keyframe, MotionProfile, ProfileError};
use crate::config::MotionConfig;

const DEFAULT_POINTS_PER_SEGMENT: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct BreathingCurve {
    pub low: f64,
    pub high: f64,
    pub rise_fraction: f64,
    pub points_per_segment: usize,
}

impl BreathingCurve {
    pub fn from_config(config: &MotionConfig) -> Self {
        Self {
            low: config.low_angle,
            high: config.high_angle,
            rise_fraction: config.rise_fraction,
            points_per_segment: DEFAULT_POINTS_PER_SEGMENT,
        }
    }

    /// Keyframes for `beats` consecutive breaths of `beat` length each.
    ///
    /// # Errors
    ///
    /// [`ProfileError::NonPositiveDuration`] for a zero beat, or whatever
    /// [`MotionProfile::new`] reports when `rise_fraction` is outside
    /// `(0, 1)`.
    pub fn profile(&self, beat: Duration, beats: u32) -> Result<MotionProfile, ProfileError> {
        let period = beat.as_secs_f64();
        if period <= 0.0 {
            return Err(ProfileError::NonPositiveDuration(period));
        }

        let n = self.points_per_segment.max(1);
        let rise = period * self.rise_fraction;
        let fall = period - rise;
        let span = self.high - self.low;

        let mut keyframes = Vec::with_capacity(beats.max(1) as usize * 2 * n + 1);
        keyframes.push(Keyframe::new(0.0, self.low));

        for b in 0..beats.max(1) {
            let origin = b as f64 * period;
            for i in 1..=n {
                let u = i as f64 / n as f64;
                let eased = 1.0 - (1.0 - u) * (1.0 - u);
                keyframes.push(Keyframe::new(origin + rise * u, self.low + span * eased));
            }
            for i in 1..=n {
                let u = i as f64 / n as f64;
                let eased = u * u;
                keyframes.push(Keyframe::new(origin + rise + fall * u, self.high - span * eased));
            }
        }

        let (min, max) = if self.low <= self.high {
            (self.low, self.high)
        } else {
            (self.high, self.low)
        };
        MotionProfile::new(keyframes)?.with_clamp(min, max)
    }
}

/// Length of `beats` beats at `bpm`; `None` for a non-positive tempo or
/// one so slow the period does not fit a [`Duration`].
pub fn beat_period(bpm: f64, beats: u32) -> Option<Duration> {
    if !bpm.is_finite() || bpm <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(beats as f64 * 60.0 / bpm).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::ResampleOptions;

    fn curve() -> BreathingCurve {
        BreathingCurve {
            low: -60.0,
            high: 60.0,
            rise_fraction: 0.3,
            points_per_segment: 8,
        }
    }

    #[test]
    fn beat_period_from_tempo() {
        assert_eq!(beat_period(120.0, 1), Some(Duration::from_millis(500)));
        assert_eq!(beat_period(120.0, 16), Some(Duration::from_secs(8)));
        assert_eq!(beat_period(0.0, 4), None);
        assert_eq!(beat_period(-10.0, 4), None);
        assert_eq!(beat_period(f64::NAN, 4), None);
        assert_eq!(beat_period(1e-300, 1), None);
        assert_eq!(beat_period(f64::MIN_POSITIVE, 16), None);
    }

    #[test]
    fn one_breath_starts_low_peaks_high_ends_low() {
        let p = curve().profile(Duration::from_secs(1), 1).unwrap();
        assert_eq!(p.start(), 0.0);
        assert!((p.end() - 1.0).abs() < 1e-12);
        assert_eq!(p.sample_at(0.0).unwrap(), -60.0);
        assert!((p.sample_at(0.3).unwrap() - 60.0).abs() < 1e-9);
        assert!((p.sample_at(1.0).unwrap() - -60.0).abs() < 1e-9);
    }

    #[test]
    fn breaths_repeat_per_beat() {
        let p = curve().profile(Duration::from_millis(500), 4).unwrap();
        assert!((p.end() - 2.0).abs() < 1e-9);
        for b in 0..4 {
            let peak = b as f64 * 0.5 + 0.15;
            assert!((p.sample_at(peak).unwrap() - 60.0).abs() < 1e-9, "beat {b}");
        }
    }

    #[test]
    fn resampled_values_stay_within_low_and_high() {
        let p = curve().profile(Duration::from_millis(500), 2).unwrap();
        let out = p.resample(&ResampleOptions::every(0.005)).unwrap();
        assert!(out.iter().all(|v| (-60.0..=60.0).contains(v)));
    }

    #[test]
    fn invalid_rise_fraction_is_rejected() {
        let mut c = curve();
        c.rise_fraction = 0.0;
        assert!(c.profile(Duration::from_secs(1), 1).is_err());
        c.rise_fraction = 1.0;
        assert!(c.profile(Duration::from_secs(1), 1).is_err());
    }

    #[test]
    fn zero_beat_is_rejected() {
        let err = curve().profile(Duration::ZERO, 4).unwrap_err();
        assert!(matches!(err, ProfileError::NonPositiveDuration(_)));
    }
}
