//! Progress estimation for tiling workers
//!
//! The worker reports progress only as single characters on stdout; each
//! classified character is worth [`TICK_STEP`] raw points. [`ProgressCurve`]
//! maps the accumulated raw total onto a percentage with two linear slopes
//! around a breakpoint, so one externally reported number moves smoothly
//! across the worker's sequential phases (base tiles, then overview tiles).

use serde::{Deserialize, Serialize};

/// Raw progress points contributed by a single classified output character.
pub const TICK_STEP: f64 = 2.5;

/// Piecewise-linear progress policy.
///
/// For a raw total `x`: `x * slope_before` while `x <= breakpoint`, then
/// `breakpoint * slope_before + (x - breakpoint) * slope_after`. Continuous at
/// the breakpoint and monotone non-decreasing for non-negative slopes. No
/// upper clamp is applied; values past 100 are the caller's policy to
/// interpret.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressCurve {
    #[serde(default = "default_breakpoint")]
    pub breakpoint: f64,
    #[serde(default = "default_slope_before")]
    pub slope_before: f64,
    #[serde(default = "default_slope_after")]
    pub slope_after: f64,
}

fn default_breakpoint() -> f64 {
    100.0
}

fn default_slope_before() -> f64 {
    0.85
}

fn default_slope_after() -> f64 {
    0.15
}

impl Default for ProgressCurve {
    fn default() -> Self {
        Self {
            breakpoint: default_breakpoint(),
            slope_before: default_slope_before(),
            slope_after: default_slope_after(),
        }
    }
}

impl ProgressCurve {
    pub fn new(breakpoint: f64, slope_before: f64, slope_after: f64) -> Self {
        Self {
            breakpoint,
            slope_before,
            slope_after,
        }
    }

    /// Map an accumulated raw total onto a percentage.
    pub fn estimate(&self, raw: f64) -> f64 {
        if raw <= self.breakpoint {
            raw * self.slope_before
        } else {
            self.breakpoint * self.slope_before + (raw - self.breakpoint) * self.slope_after
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_below_breakpoint() {
        let curve = ProgressCurve::default();
        for x in [0.0, 2.5, 40.0, 100.0] {
            assert!((curve.estimate(x) - x * 0.85).abs() < 1e-9);
        }
    }

    #[test]
    fn test_second_slope_above_breakpoint() {
        let curve = ProgressCurve::default();
        let expected = 100.0 * 0.85 + 60.0 * 0.15;
        assert!((curve.estimate(160.0) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_continuous_at_breakpoint() {
        let curve = ProgressCurve::new(100.0, 0.8, 0.2);
        let below = curve.estimate(100.0);
        let above = curve.estimate(100.0 + 1e-9);
        assert!((above - below).abs() < 1e-6);
    }

    #[test]
    fn test_monotone_for_increasing_input() {
        let curve = ProgressCurve::default();
        let mut last = f64::MIN;
        for i in 0..200 {
            let pct = curve.estimate(f64::from(i) * TICK_STEP);
            assert!(pct >= last);
            last = pct;
        }
    }

    #[test]
    fn test_alternate_slope_pair() {
        let curve = ProgressCurve::new(100.0, 0.8, 0.2);
        assert!((curve.estimate(50.0) - 40.0).abs() < 1e-9);
        assert!((curve.estimate(150.0) - (80.0 + 10.0)).abs() < 1e-9);
    }

    #[test]
    fn test_config_overrides_individual_fields() {
        let curve: ProgressCurve = serde_json::from_str(r#"{"slope_after": 0.2}"#).unwrap();
        assert_eq!(curve.breakpoint, 100.0);
        assert_eq!(curve.slope_before, 0.85);
        assert_eq!(curve.slope_after, 0.2);
    }
}
