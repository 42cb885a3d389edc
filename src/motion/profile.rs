//! Keyframed motion profiles and fixed-rate resampling.
//!
//! A [`MotionProfile`] is a validated, immutable list of `(time, angle)`
//! keyframes plus a boundary policy for each side and an optional clamp
//! range.  [`MotionProfile::resample`] turns it into the fixed-rate angle
//! sequence an [`ActuatorController`](super::ActuatorController) consumes one
//! sample per tick.
//!
//! # Example
//!
//! ```rust
//! use jellyfish::motion::{MotionProfile, ResampleOptions};
//!
//! let profile = MotionProfile::from_pairs(&[(0.0, 90.0), (2.0, -75.0), (4.0, 90.0)]).unwrap();
//! let angles = profile.resample(&ResampleOptions::every(1.0)).unwrap();
//! assert_eq!(angles, vec![90.0, 7.5, -75.0, 7.5, 90.0]);
//! ```

use thiserror::Error;

/// Timestamps closer than this to a profile boundary count as on it, so that
/// `t0 + n * dt` drifting past the last keyframe does not trip a policy.
const TIME_EPSILON: f64 = 1e-9;

/// Upper bound on the samples a single resample may produce.  At a 50 Hz
/// tick this is well over a day of motion.
pub const MAX_SAMPLES: usize = 10_000_000;

// ---------------------------------------------------------------------------
// ProfileError
// ---------------------------------------------------------------------------

/// Reasons a profile or a resampling request is rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProfileError {
    #[error("a motion profile needs at least two keyframes (got {0})")]
    TooFewKeyframes(usize),

    #[error("keyframe {index} at t={time} does not come after the previous keyframe")]
    NonIncreasingTime { index: usize, time: f64 },

    #[error("keyframe {index} has a non-finite time or angle")]
    NonFinite { index: usize },

    #[error("invalid clamp range [{min}, {max}]")]
    InvalidClamp { min: f64, max: f64 },

    #[error("tick period must be positive and finite (got {0})")]
    NonPositiveTick(f64),

    #[error("profile duration must be positive and finite (got {0})")]
    NonPositiveDuration(f64),

    #[error("resample window [{start}, {end}] is not finite")]
    InvalidWindow { start: f64, end: f64 },

    #[error("resampling would produce more than {max} samples (span / dt = {steps})")]
    TooManySamples { steps: f64, max: usize },

    #[error("t={time} lies outside [{start}, {end}] and the boundary policy is Error")]
    OutOfRange { time: f64, start: f64, end: f64 },
}

// ---------------------------------------------------------------------------
// Keyframe / BoundaryPolicy
// ---------------------------------------------------------------------------

/// One control point: an angle in degrees at a time offset in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe {
    pub time: f64,
    pub angle: f64,
}

impl Keyframe {
    pub fn new(time: f64, angle: f64) -> Self {
        Self { time, angle }
    }
}

/// What to do with a query time that falls outside the keyframes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoundaryPolicy {
    /// Repeat the nearest keyframe's angle.
    #[default]
    Hold,
    /// Continue the line through the two outermost keyframes on that side.
    Extrapolate,
    /// Reject the whole request.
    Error,
}

// ---------------------------------------------------------------------------
// ResampleOptions
// ---------------------------------------------------------------------------

/// Output grid for [`MotionProfile::resample`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResampleOptions {
    /// Sample spacing in seconds.
    pub dt: f64,
    /// First output time; defaults to the first keyframe.
    pub start: Option<f64>,
    /// Last output time; defaults to the last keyframe.
    pub end: Option<f64>,
    /// Whether `end` itself is emitted when it lands on the grid.
    pub include_endpoint: bool,
}

impl ResampleOptions {
    /// Sample every `dt` seconds across the whole profile, endpoint included.
    pub fn every(dt: f64) -> Self {
        Self {
            dt,
            start: None,
            end: None,
            include_endpoint: true,
        }
    }

    pub fn from(mut self, start: f64) -> Self {
        self.start = Some(start);
        self
    }

    pub fn until(mut self, end: f64) -> Self {
        self.end = Some(end);
        self
    }

    pub fn exclusive(mut self) -> Self {
        self.include_endpoint = false;
        self
    }
}

// ---------------------------------------------------------------------------
// MotionProfile
// ---------------------------------------------------------------------------

/// Validated keyframe sequence with per-side boundary policies.
///
/// Construction checks every invariant up front; once built a profile is
/// never modified, so resampling can only fail on request parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionProfile {
    keyframes: Vec<Keyframe>,
    before: BoundaryPolicy,
    after: BoundaryPolicy,
    clamp: Option<(f64, f64)>,
}

impl MotionProfile {
    /// Build a profile from keyframes with strictly increasing times.
    ///
    /// # Errors
    ///
    /// [`ProfileError::TooFewKeyframes`], [`ProfileError::NonFinite`] or
    /// [`ProfileError::NonIncreasingTime`].
    pub fn new(keyframes: Vec<Keyframe>) -> Result<Self, ProfileError> {
        if keyframes.len() < 2 {
            return Err(ProfileError::TooFewKeyframes(keyframes.len()));
        }

        for (index, kf) in keyframes.iter().enumerate() {
            if !kf.time.is_finite() || !kf.angle.is_finite() {
                return Err(ProfileError::NonFinite { index });
            }
            if index > 0 && kf.time <= keyframes[index - 1].time {
                return Err(ProfileError::NonIncreasingTime {
                    index,
                    time: kf.time,
                });
            }
        }

        Ok(Self {
            keyframes,
            before: BoundaryPolicy::Hold,
            after: BoundaryPolicy::Hold,
            clamp: None,
        })
    }

    /// Convenience constructor from `(time, angle)` pairs.
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Result<Self, ProfileError> {
        Self::new(pairs.iter().map(|&(t, a)| Keyframe::new(t, a)).collect())
    }

    /// Set the policies applied before the first and after the last keyframe.
    pub fn with_boundaries(mut self, before: BoundaryPolicy, after: BoundaryPolicy) -> Self {
        self.before = before;
        self.after = after;
        self
    }

    /// Clamp every resampled value into `[min, max]`.
    pub fn with_clamp(mut self, min: f64, max: f64) -> Result<Self, ProfileError> {
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(ProfileError::InvalidClamp { min, max });
        }
        self.clamp = Some((min, max));
        Ok(self)
    }

    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    pub fn clamp_range(&self) -> Option<(f64, f64)> {
        self.clamp
    }

    /// Time of the first keyframe.
    pub fn start(&self) -> f64 {
        self.keyframes[0].time
    }

    /// Time of the last keyframe.
    pub fn end(&self) -> f64 {
        self.keyframes[self.keyframes.len() - 1].time
    }

    pub fn duration(&self) -> f64 {
        self.end() - self.start()
    }

    /// Evaluate the profile at a single time (clamped).
    pub fn sample_at(&self, time: f64) -> Result<f64, ProfileError> {
        let mut cursor = 0;
        self.value_at(time, &mut cursor).map(|v| self.apply_clamp(v))
    }

    /// Resample onto a fixed grid.
    ///
    /// Emits `floor((end - start) / dt) + 1` samples when the endpoint is
    /// included and `ceil((end - start) / dt)` otherwise.  A window that
    /// would produce nothing still yields exactly one sample, the value at
    /// `start`.
    ///
    /// Query times only ever increase, so the bracketing keyframe pair is
    /// found by advancing a cursor rather than searching from the start.
    pub fn resample(&self, options: &ResampleOptions) -> Result<Vec<f64>, ProfileError> {
        let dt = options.dt;
        if !dt.is_finite() || dt <= 0.0 {
            return Err(ProfileError::NonPositiveTick(dt));
        }

        let start = options.start.unwrap_or_else(|| self.start());
        let end = options.end.unwrap_or_else(|| self.end());
        if !start.is_finite() || !end.is_finite() {
            return Err(ProfileError::InvalidWindow { start, end });
        }

        let count = sample_count(start, end, dt, options.include_endpoint)?;
        let mut samples = Vec::with_capacity(count);
        let mut cursor = 0;

        for i in 0..count {
            let t = start + i as f64 * dt;
            let value = self.value_at(t, &mut cursor)?;
            samples.push(self.apply_clamp(value));
        }

        Ok(samples)
    }

    fn value_at(&self, t: f64, cursor: &mut usize) -> Result<f64, ProfileError> {
        let kf = &self.keyframes;
        let n = kf.len();
        let (first, last) = (kf[0], kf[n - 1]);

        if t < first.time - TIME_EPSILON {
            return match self.before {
                BoundaryPolicy::Hold => Ok(first.angle),
                BoundaryPolicy::Extrapolate => Ok(lerp_through(kf[0], kf[1], t)),
                BoundaryPolicy::Error => Err(self.out_of_range(t)),
            };
        }

        if t > last.time + TIME_EPSILON {
            return match self.after {
                BoundaryPolicy::Hold => Ok(last.angle),
                BoundaryPolicy::Extrapolate => Ok(lerp_through(kf[n - 2], kf[n - 1], t)),
                BoundaryPolicy::Error => Err(self.out_of_range(t)),
            };
        }

        if t <= first.time {
            return Ok(first.angle);
        }
        if t >= last.time {
            return Ok(last.angle);
        }

        while *cursor + 2 < n && t > kf[*cursor + 1].time {
            *cursor += 1;
        }

        Ok(lerp_through(kf[*cursor], kf[*cursor + 1], t))
    }

    fn apply_clamp(&self, value: f64) -> f64 {
        match self.clamp {
            Some((min, max)) => value.clamp(min, max),
            None => value,
        }
    }

    fn out_of_range(&self, time: f64) -> ProfileError {
        ProfileError::OutOfRange {
            time,
            start: self.start(),
            end: self.end(),
        }
    }
}

/// Number of grid points in `[start, end]` (or `[start, end)`), never zero
/// and never above [`MAX_SAMPLES`].
fn sample_count(
    start: f64,
    end: f64,
    dt: f64,
    include_endpoint: bool,
) -> Result<usize, ProfileError> {
    let span = end - start;
    if span <= 0.0 {
        return Ok(1);
    }

    let steps = span / dt;
    let too_many = ProfileError::TooManySamples {
        steps,
        max: MAX_SAMPLES,
    };
    if !steps.is_finite() || steps >= MAX_SAMPLES as f64 {
        return Err(too_many);
    }

    let count = if include_endpoint {
        ((steps + TIME_EPSILON).floor() as usize).checked_add(1)
    } else {
        Some((steps - TIME_EPSILON).ceil() as usize)
    };

    match count {
        Some(n) if n <= MAX_SAMPLES => Ok(n.max(1)),
        _ => Err(too_many),
    }
}

/// Point on the line through `a` and `b` at time `t`.
fn lerp_through(a: Keyframe, b: Keyframe, t: f64) -> f64 {
    let u = (t - a.time) / (b.time - a.time);
    a.angle + (b.angle - a.angle) * u
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn zigzag() -> MotionProfile {
        MotionProfile::from_pairs(&[(0.0, 90.0), (2.0, -75.0), (4.0, 90.0), (6.0, -75.0)])
            .unwrap()
    }

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len(), "{actual:?} vs {expected:?}");
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-9, "{actual:?} vs {expected:?}");
        }
    }

    // ---- Construction -------------------------------------------------------

    #[test]
    fn rejects_single_keyframe() {
        let err = MotionProfile::from_pairs(&[(0.0, 10.0)]).unwrap_err();
        assert_eq!(err, ProfileError::TooFewKeyframes(1));
    }

    #[test]
    fn rejects_repeated_timestamp() {
        let err = MotionProfile::from_pairs(&[(0.0, 0.0), (1.0, 5.0), (1.0, 6.0)]).unwrap_err();
        assert!(matches!(err, ProfileError::NonIncreasingTime { index: 2, .. }));
    }

    #[test]
    fn rejects_decreasing_timestamp() {
        let err = MotionProfile::from_pairs(&[(1.0, 0.0), (0.5, 5.0)]).unwrap_err();
        assert!(matches!(err, ProfileError::NonIncreasingTime { index: 1, .. }));
    }

    #[test]
    fn rejects_nan_angle() {
        let err = MotionProfile::from_pairs(&[(0.0, f64::NAN), (1.0, 5.0)]).unwrap_err();
        assert_eq!(err, ProfileError::NonFinite { index: 0 });
    }

    #[test]
    fn rejects_inverted_clamp() {
        let err = zigzag().with_clamp(10.0, -10.0).unwrap_err();
        assert!(matches!(err, ProfileError::InvalidClamp { .. }));
    }

    // ---- Resampling ---------------------------------------------------------

    #[test]
    fn zigzag_at_one_second_hits_midpoints() {
        let out = zigzag().resample(&ResampleOptions::every(1.0)).unwrap();
        assert_close(&out, &[90.0, 7.5, -75.0, 7.5, 90.0, 7.5, -75.0]);
    }

    #[test]
    fn inclusive_length_is_floor_plus_one() {
        let profile = zigzag();
        for &dt in &[0.005, 0.01, 0.1, 0.25, 0.4, 0.7, 1.0, 1.5, 2.5, 5.9] {
            let out = profile.resample(&ResampleOptions::every(dt)).unwrap();
            let expected = ((6.0 / dt) + 1e-9).floor() as usize + 1;
            assert_eq!(out.len(), expected, "dt = {dt}");
        }
    }

    #[test]
    fn exclusive_drops_the_endpoint() {
        let out = zigzag()
            .resample(&ResampleOptions::every(1.0).exclusive())
            .unwrap();
        assert_eq!(out.len(), 6);
        assert!((out[5] - 7.5).abs() < 1e-9);
    }

    #[test]
    fn keyframe_times_reproduce_keyframe_angles() {
        let profile = MotionProfile::from_pairs(&[
            (0.0, -12.5),
            (0.3, 40.0),
            (0.7, 33.3),
            (1.1, -80.0),
            (2.0, 0.1),
        ])
        .unwrap();

        for kf in profile.keyframes() {
            let v = profile.sample_at(kf.time).unwrap();
            assert!((v - kf.angle).abs() < 1e-9, "t={} got {v}", kf.time);
        }

        // The same holds on a grid that lands on every keyframe.
        let out = profile.resample(&ResampleOptions::every(0.1)).unwrap();
        assert!((out[3] - 40.0).abs() < 1e-9);
        assert!((out[7] - 33.3).abs() < 1e-9);
        assert!((out[11] - -80.0).abs() < 1e-9);
        assert!((out[20] - 0.1).abs() < 1e-9);
    }

    #[test]
    fn outputs_respect_clamp_range() {
        let profile = zigzag()
            .with_boundaries(BoundaryPolicy::Extrapolate, BoundaryPolicy::Extrapolate)
            .with_clamp(-60.0, 60.0)
            .unwrap();
        let out = profile
            .resample(&ResampleOptions::every(0.05).from(-3.0).until(9.0))
            .unwrap();
        assert!(out.iter().all(|v| (-60.0..=60.0).contains(v)));
        assert!(out.iter().any(|&v| v == 60.0));
        assert!(out.iter().any(|&v| v == -60.0));
    }

    #[test]
    fn degenerate_window_yields_single_sample() {
        let out = zigzag()
            .resample(&ResampleOptions::every(1.0).from(3.0).until(1.0))
            .unwrap();
        assert_close(&out, &[7.5]);

        let out = zigzag()
            .resample(&ResampleOptions::every(1.0).from(2.0).until(2.0).exclusive())
            .unwrap();
        assert_close(&out, &[-75.0]);
    }

    #[test]
    fn hold_repeats_outer_keyframes() {
        let out = zigzag()
            .resample(&ResampleOptions::every(1.0).from(-2.0).until(8.0))
            .unwrap();
        assert_eq!(out.len(), 11);
        assert_eq!(out[0], 90.0);
        assert_eq!(out[1], 90.0);
        assert_eq!(out[9], -75.0);
        assert_eq!(out[10], -75.0);
    }

    #[test]
    fn extrapolate_extends_outer_segments() {
        let profile = MotionProfile::from_pairs(&[(0.0, 0.0), (1.0, 10.0), (2.0, 0.0)])
            .unwrap()
            .with_boundaries(BoundaryPolicy::Extrapolate, BoundaryPolicy::Extrapolate);

        let out = profile
            .resample(&ResampleOptions::every(1.0).from(-1.0).until(3.0))
            .unwrap();
        assert_close(&out, &[-10.0, 0.0, 10.0, 0.0, -10.0]);
    }

    #[test]
    fn error_policy_rejects_only_its_own_side() {
        let profile =
            zigzag().with_boundaries(BoundaryPolicy::Hold, BoundaryPolicy::Error);

        let before = profile.resample(&ResampleOptions::every(1.0).from(-1.0));
        assert!(before.is_ok());

        let after = profile.resample(&ResampleOptions::every(1.0).until(7.0));
        assert!(matches!(after, Err(ProfileError::OutOfRange { .. })));
    }

    #[test]
    fn grid_drift_does_not_trip_error_policy() {
        let profile = MotionProfile::from_pairs(&[(0.0, 0.0), (1.0, 1.0)])
            .unwrap()
            .with_boundaries(BoundaryPolicy::Error, BoundaryPolicy::Error);
        // 0.1 is not exact in binary; the last grid point lands a hair past 1.0.
        let out = profile.resample(&ResampleOptions::every(0.1)).unwrap();
        assert_eq!(out.len(), 11);
        assert!((out[10] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn non_positive_tick_is_rejected() {
        for dt in [0.0, -0.01, f64::NAN, f64::INFINITY] {
            let err = zigzag().resample(&ResampleOptions::every(dt)).unwrap_err();
            assert!(matches!(err, ProfileError::NonPositiveTick(_)), "dt = {dt}");
        }
    }

    #[test]
    fn non_finite_window_is_rejected() {
        let err = zigzag()
            .resample(&ResampleOptions::every(1.0).until(f64::INFINITY))
            .unwrap_err();
        assert!(matches!(err, ProfileError::InvalidWindow { .. }));
    }

    #[test]
    fn tiny_tick_is_rejected_before_allocating() {
        let err = zigzag().resample(&ResampleOptions::every(1e-9)).unwrap_err();
        assert!(matches!(err, ProfileError::TooManySamples { .. }));
    }

    #[test]
    fn overflowing_sample_count_is_rejected() {
        for dt in [1e-300, f64::MIN_POSITIVE] {
            let err = zigzag().resample(&ResampleOptions::every(dt)).unwrap_err();
            assert!(matches!(err, ProfileError::TooManySamples { .. }), "dt = {dt}");
        }
        let err = zigzag()
            .resample(&ResampleOptions::every(1.0).from(-f64::MAX).until(f64::MAX))
            .unwrap_err();
        assert!(matches!(err, ProfileError::TooManySamples { .. }));
    }

    #[test]
    fn large_but_bounded_count_is_accepted() {
        let profile = MotionProfile::from_pairs(&[(0.0, 0.0), (1.0, 10.0)]).unwrap();
        let samples = profile
            .resample(&ResampleOptions::every(1.0 / 1_048_576.0))
            .unwrap();
        assert_eq!(samples.len(), 1_048_577);
    }
}
