//! Channel mixing and sample-rate conversion.
//!
//! Decoded clips are reduced to mono with [`downmix`], then converted to the
//! output device's native rate with [`resample_linear`] before playback.

// ---------------------------------------------------------------------------
// downmix
// ---------------------------------------------------------------------------

/// Average interleaved multi-channel audio down to mono.
///
/// `channels == 1` copies the input; `channels == 0` yields nothing.  A
/// trailing partial frame is dropped.
///
/// ```rust
/// use jellyfish::audio::downmix;
///
/// let stereo = vec![0.5_f32, -0.5, 0.2, 0.4]; // L R L R
/// let mono = downmix(&stereo, 2);
/// assert_eq!(mono.len(), 2);
/// assert!((mono[1] - 0.3).abs() < 1e-6);
/// ```
pub fn downmix(samples: &[f32], channels: usize) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => samples
            .chunks_exact(n)
            .map(|frame| frame.iter().sum::<f32>() / n as f32)
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// resample_linear
// ---------------------------------------------------------------------------

/// Resample mono `samples` from `from_rate` to `to_rate` Hz by linear
/// interpolation.  Output length is `ceil(len * to_rate / from_rate)`.
///
/// Equal rates copy the input.  A zero rate on either side yields nothing.
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate {
        return samples.to_vec();
    }
    if samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return Vec::new();
    }

    let (from, to) = (from_rate as u64, to_rate as u64);
    let output_len = ((samples.len() as u64 * to + from - 1) / from) as usize;
    let step = from_rate as f64 / to_rate as f64;
    let last = samples.len() - 1;

    (0..output_len)
        .map(|i| {
            let src = i as f64 * step;
            let idx = src as usize;
            if idx >= last {
                return samples[last];
            }
            let frac = (src - idx as f64) as f32;
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_mono_is_copy() {
        let input = vec![0.1_f32, 0.2, 0.3];
        assert_eq!(downmix(&input, 1), input);
    }

    #[test]
    fn downmix_stereo_averages_frames() {
        let out = downmix(&[1.0_f32, -1.0, 0.5, 0.5, 0.9], 2);
        assert_eq!(out.len(), 2);
        assert!(out[0].abs() < 1e-6);
        assert!((out[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn downmix_zero_channels() {
        assert!(downmix(&[1.0_f32, 2.0], 0).is_empty());
    }

    #[test]
    fn resample_same_rate_is_noop() {
        let input: Vec<f32> = (0..100).map(|i| i as f32 / 100.0).collect();
        assert_eq!(resample_linear(&input, 44_100, 44_100), input);
    }

    #[test]
    fn resample_empty_or_zero_rate() {
        assert!(resample_linear(&[], 22_050, 48_000).is_empty());
        assert!(resample_linear(&[0.5; 10], 0, 48_000).is_empty());
    }

    #[test]
    fn resample_lengths() {
        assert_eq!(resample_linear(&[0.0; 441], 44_100, 48_000).len(), 480);
        assert_eq!(resample_linear(&[0.0; 480], 48_000, 16_000).len(), 160);
        assert_eq!(resample_linear(&[0.0; 80], 8_000, 44_100).len(), 441);
    }

    #[test]
    fn resample_preserves_dc_level() {
        for &s in &resample_linear(&[0.25_f32; 300], 22_050, 48_000) {
            assert!((s - 0.25).abs() < 1e-6);
        }
    }

    #[test]
    fn upsampling_interpolates_between_neighbours() {
        let out = resample_linear(&[0.0, 1.0], 1, 2);
        assert_eq!(out, vec![0.0, 0.5, 1.0, 1.0]);
    }
}
