//! RGB / HSV color values and conversions.
//!
//! All components are `f32` in `[0.0, 1.0]`; hue is a fraction of a full
//! turn rather than degrees.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Rgb
// ---------------------------------------------------------------------------

/// A color as red, green and blue intensities.
///
/// Serialised as a three-element array (`[r, g, b]`) so it reads naturally
/// in `settings.toml`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f32; 3]", into = "[f32; 3]")]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0.0, 0.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Clamp every channel into `[0.0, 1.0]`.  NaN becomes `0.0`.
    pub fn clamped(self) -> Self {
        Self::new(unit(self.r), unit(self.g), unit(self.b))
    }

    pub fn is_black(&self) -> bool {
        self.r == 0.0 && self.g == 0.0 && self.b == 0.0
    }
}

impl From<[f32; 3]> for Rgb {
    fn from([r, g, b]: [f32; 3]) -> Self {
        Self::new(r, g, b)
    }
}

impl From<Rgb> for [f32; 3] {
    fn from(c: Rgb) -> Self {
        [c.r, c.g, c.b]
    }
}

// ---------------------------------------------------------------------------
// Hsv
// ---------------------------------------------------------------------------

/// A color as hue, saturation and value.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Hsv {
    pub h: f32,
    pub s: f32,
    pub v: f32,
}

impl Hsv {
    pub const fn new(h: f32, s: f32, v: f32) -> Self {
        Self { h, s, v }
    }

    /// Per-channel linear interpolation; `t` is clamped to `[0.0, 1.0]`.
    ///
    /// Hue is interpolated as a plain number, not around the wheel.
    pub fn lerp(self, other: Hsv, t: f32) -> Hsv {
        let t = unit(t);
        Hsv::new(
            self.h + (other.h - self.h) * t,
            self.s + (other.s - self.s) * t,
            self.v + (other.v - self.v) * t,
        )
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

/// Convert HSV to RGB using the six-sector formulation.
pub fn hsv_to_rgb(c: Hsv) -> Rgb {
    let (h, s, v) = (c.h, unit(c.s), unit(c.v));
    if s == 0.0 {
        return Rgb::new(v, v, v);
    }

    let h6 = h.rem_euclid(1.0) * 6.0;
    let sector = h6.floor();
    let f = h6 - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));

    match sector as u32 % 6 {
        0 => Rgb::new(v, t, p),
        1 => Rgb::new(q, v, p),
        2 => Rgb::new(p, v, t),
        3 => Rgb::new(p, q, v),
        4 => Rgb::new(t, p, v),
        _ => Rgb::new(v, p, q),
    }
}

/// Convert RGB to HSV.  Greys (including black) get hue and saturation `0`.
pub fn rgb_to_hsv(c: Rgb) -> Hsv {
    let c = c.clamped();
    let max = c.r.max(c.g).max(c.b);
    let min = c.r.min(c.g).min(c.b);
    let delta = max - min;

    if max == 0.0 {
        return Hsv::new(0.0, 0.0, 0.0);
    }
    if delta == 0.0 {
        return Hsv::new(0.0, 0.0, max);
    }

    let s = delta / max;
    let h = if max == c.r {
        ((c.g - c.b) / delta).rem_euclid(6.0)
    } else if max == c.g {
        (c.b - c.r) / delta + 2.0
    } else {
        (c.r - c.g) / delta + 4.0
    };

    Hsv::new(h / 6.0, s, max)
}

fn unit(x: f32) -> f32 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Rgb, b: Rgb) -> bool {
        (a.r - b.r).abs() < 1e-5 && (a.g - b.g).abs() < 1e-5 && (a.b - b.b).abs() < 1e-5
    }

    #[test]
    fn primaries_convert() {
        assert_eq!(hsv_to_rgb(Hsv::new(0.0, 1.0, 1.0)), Rgb::new(1.0, 0.0, 0.0));
        assert!(close(hsv_to_rgb(Hsv::new(1.0 / 3.0, 1.0, 1.0)), Rgb::new(0.0, 1.0, 0.0)));
        assert!(close(hsv_to_rgb(Hsv::new(2.0 / 3.0, 1.0, 1.0)), Rgb::new(0.0, 0.0, 1.0)));
    }

    #[test]
    fn zero_saturation_is_grey() {
        assert_eq!(hsv_to_rgb(Hsv::new(0.7, 0.0, 0.4)), Rgb::new(0.4, 0.4, 0.4));
    }

    #[test]
    fn full_turn_hue_wraps_to_red() {
        assert!(close(hsv_to_rgb(Hsv::new(1.0, 1.0, 1.0)), Rgb::new(1.0, 0.0, 0.0)));
    }

    #[test]
    fn rgb_hsv_round_trips_for_palette() {
        for c in [
            Rgb::new(0.2, 0.6, 1.0),
            Rgb::new(1.0, 0.5, 0.0),
            Rgb::new(0.3, 0.3, 0.3),
            Rgb::new(0.9, 0.1, 0.4),
        ] {
            let back = hsv_to_rgb(rgb_to_hsv(c));
            assert!(close(c, back), "{c:?} -> {back:?}");
        }
    }

    #[test]
    fn black_has_zero_value() {
        assert_eq!(rgb_to_hsv(Rgb::BLACK), Hsv::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn lerp_endpoints_and_midpoint() {
        let a = Hsv::new(0.0, 0.2, 0.0);
        let b = Hsv::new(0.5, 1.0, 1.0);
        assert_eq!(a.lerp(b, 0.0), a);
        assert_eq!(a.lerp(b, 1.0), b);
        assert_eq!(a.lerp(b, 0.5), Hsv::new(0.25, 0.6, 0.5));
        assert_eq!(a.lerp(b, 7.0), b);
    }

    #[test]
    fn rgb_serialises_as_array() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            color: Rgb,
        }
        let text = toml::to_string(&Wrapper {
            color: Rgb::new(0.25, 0.5, 1.0),
        })
        .unwrap();
        assert!(text.contains("[0.25, 0.5, 1.0]"), "{text}");
        let back: Wrapper = toml::from_str(&text).unwrap();
        assert_eq!(back.color, Rgb::new(0.25, 0.5, 1.0));
    }
}
