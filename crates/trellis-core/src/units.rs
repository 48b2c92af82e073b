//! Unit-aware lengths, display metrics and measure specs.
//!
//! Lengths come in three flavours: device-independent units (`dip`), absolute
//! device pixels (`px`) and fractions of the parent (`%`). Only `dip` values
//! are converted here, by multiplying with the display density. Percentages
//! are handed to the native layout container untouched; it owns the parent
//! size they are relative to.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum Length {
    #[default]
    Auto,
    Dip(f32),
    Px(f32),
    /// Fraction of the parent, `0.5` for `50%`.
    Percent(f32),
}

/// A length after density conversion, ready for a native setter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ResolvedLength {
    Auto,
    Px(f32),
    Percent(f32),
}

impl Length {
    /// Parses `auto`, `12`, `12dip`, `12px` and, when `allow_percent` is set, `50%`.
    pub fn parse(s: &str, allow_percent: bool) -> Option<Length> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Some(Length::Auto);
        }
        if let Some(v) = s.strip_suffix('%') {
            if !allow_percent {
                return None;
            }
            return v.trim().parse::<f32>().ok().map(|v| Length::Percent(v / 100.0));
        }
        if let Some(v) = s.strip_suffix("px") {
            return v.trim().parse::<f32>().ok().map(Length::Px);
        }
        let v = s.strip_suffix("dip").unwrap_or(s);
        v.trim().parse::<f32>().ok().map(Length::Dip)
    }

    pub fn is_percent(&self) -> bool {
        matches!(self, Length::Percent(_))
    }

    pub fn resolve(self, metrics: DisplayMetrics) -> ResolvedLength {
        match self {
            Length::Auto => ResolvedLength::Auto,
            Length::Dip(v) => ResolvedLength::Px(metrics.to_device_pixels(v)),
            Length::Px(v) => ResolvedLength::Px(v),
            Length::Percent(v) => ResolvedLength::Percent(v),
        }
    }
}

/// Display density, resolved once per tree and handed to every native accessor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayMetrics {
    /// dip → px multiplier
    pub density: f32,
}

impl Default for DisplayMetrics {
    fn default() -> Self {
        Self { density: 1.0 }
    }
}

impl DisplayMetrics {
    pub fn new(density: f32) -> Self {
        // non-positive or NaN densities are treated as 1.0
        let density = if density.is_finite() && density > 0.0 {
            density
        } else {
            1.0
        };
        Self { density }
    }

    pub fn to_device_pixels(&self, dip: f32) -> f32 {
        dip * self.density
    }

    pub fn to_device_independent(&self, px: f32) -> f32 {
        px / self.density
    }
}

pub const MEASURED_STATE_TOO_SMALL: u32 = 0x0100_0000;
pub const MEASURED_STATE_MASK: u32 = 0xff00_0000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MeasureMode {
    Unspecified,
    Exactly,
    AtMost,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MeasureSpec {
    pub mode: MeasureMode,
    /// Device pixels.
    pub size: u32,
}

impl MeasureSpec {
    pub fn unspecified() -> Self {
        Self {
            mode: MeasureMode::Unspecified,
            size: 0,
        }
    }

    pub fn exactly(size: u32) -> Self {
        Self {
            mode: MeasureMode::Exactly,
            size,
        }
    }

    pub fn at_most(size: u32) -> Self {
        Self {
            mode: MeasureMode::AtMost,
            size,
        }
    }

    /// Clamps a desired size to this spec, ignoring state bits.
    pub fn constrain(&self, desired: u32) -> u32 {
        resolve_size_and_state(desired, *self, 0) & !MEASURED_STATE_MASK
    }
}

/// Reconciles a desired size with a measure spec and folds in the child's
/// measured state bits.
pub fn resolve_size_and_state(size: u32, spec: MeasureSpec, child_measured_state: u32) -> u32 {
    let result = match spec.mode {
        MeasureMode::Unspecified => size,
        MeasureMode::AtMost if spec.size < size => spec.size | MEASURED_STATE_TOO_SMALL,
        MeasureMode::AtMost => size,
        MeasureMode::Exactly => spec.size,
    };
    result | (child_measured_state & MEASURED_STATE_MASK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_units() {
        assert_eq!(Length::parse("auto", false), Some(Length::Auto));
        assert_eq!(Length::parse("12", false), Some(Length::Dip(12.0)));
        assert_eq!(Length::parse("12dip", false), Some(Length::Dip(12.0)));
        assert_eq!(Length::parse(" 3px ", false), Some(Length::Px(3.0)));
        assert_eq!(Length::parse("50%", true), Some(Length::Percent(0.5)));
        assert_eq!(Length::parse("50%", false), None);
        assert_eq!(Length::parse("wide", true), None);
    }

    #[test]
    fn dip_scales_but_percent_passes_through() {
        let metrics = DisplayMetrics::new(2.0);
        assert_eq!(Length::Dip(10.0).resolve(metrics), ResolvedLength::Px(20.0));
        assert_eq!(Length::Px(10.0).resolve(metrics), ResolvedLength::Px(10.0));
        assert_eq!(
            Length::Percent(0.25).resolve(metrics),
            ResolvedLength::Percent(0.25)
        );
    }

    #[test]
    fn bogus_density_falls_back_to_one() {
        assert_eq!(DisplayMetrics::new(0.0).density, 1.0);
        assert_eq!(DisplayMetrics::new(f32::NAN).density, 1.0);
    }

    #[test]
    fn resolve_size_modes() {
        assert_eq!(resolve_size_and_state(80, MeasureSpec::unspecified(), 0), 80);
        assert_eq!(resolve_size_and_state(80, MeasureSpec::exactly(40), 0), 40);
        assert_eq!(resolve_size_and_state(30, MeasureSpec::at_most(40), 0), 30);
        assert_eq!(
            resolve_size_and_state(80, MeasureSpec::at_most(40), 0),
            40 | MEASURED_STATE_TOO_SMALL
        );
        assert_eq!(
            resolve_size_and_state(10, MeasureSpec::exactly(10), MEASURED_STATE_TOO_SMALL | 7),
            10 | MEASURED_STATE_TOO_SMALL
        );
        assert_eq!(MeasureSpec::at_most(40).constrain(80), 40);
    }
}
