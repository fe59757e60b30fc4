// SPDX-License-Identifier: MIT OR Apache-2.0
//! Easing curves used to shape timing runs.

use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;

const NEWTON_ITERATIONS: usize = 8;
const NEWTON_MIN_SLOPE: f64 = 1e-6;
const SOLVE_EPSILON: f64 = 1e-7;
const BISECTION_ITERATIONS: usize = 20;

/// Cubic bezier easing curve anchored at (0, 0) and (1, 1).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CubicBezier {
    /// First control point x
    pub x1: f64,
    /// First control point y
    pub y1: f64,
    /// Second control point x
    pub x2: f64,
    /// Second control point y
    pub y2: f64,
}

impl CubicBezier {
    /// Create a curve from its two control points
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Evaluate the curve: find the parameter whose x equals `x` and return its y.
    pub fn ease(&self, x: f64) -> f64 {
        if self.x1 == self.y1 && self.x2 == self.y2 {
            return x;
        }
        if x <= 0.0 {
            return 0.0;
        }
        if x >= 1.0 {
            return 1.0;
        }
        let t = self.solve_x(x);
        Self::sample(self.y1, self.y2, t)
    }

    /// Bernstein form with implicit end points 0 and 1
    fn sample(p1: f64, p2: f64, t: f64) -> f64 {
        let mt = 1.0 - t;
        3.0 * p1 * mt * mt * t + 3.0 * p2 * mt * t * t + t * t * t
    }

    fn slope(p1: f64, p2: f64, t: f64) -> f64 {
        let mt = 1.0 - t;
        3.0 * p1 * mt * mt + 6.0 * (p2 - p1) * mt * t + 3.0 * (1.0 - p2) * t * t
    }

    fn solve_x(&self, x: f64) -> f64 {
        let mut t = x;
        for _ in 0..NEWTON_ITERATIONS {
            let error = Self::sample(self.x1, self.x2, t) - x;
            if error.abs() < SOLVE_EPSILON {
                return t;
            }
            let slope = Self::slope(self.x1, self.x2, t);
            if slope.abs() < NEWTON_MIN_SLOPE {
                break;
            }
            t -= error / slope;
        }

        // Newton did not converge; fall back to bisection on [0, 1].
        let (mut lo, mut hi) = (0.0, 1.0);
        t = x;
        for _ in 0..BISECTION_ITERATIONS {
            let value = Self::sample(self.x1, self.x2, t);
            if (value - x).abs() < SOLVE_EPSILON {
                break;
            }
            if value < x {
                lo = t;
            } else {
                hi = t;
            }
            t = (lo + hi) / 2.0;
        }
        t
    }
}

/// Easing applied to the normalized progress of a timing run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum Easing {
    /// No easing
    #[default]
    Linear,
    /// CSS `ease`
    Ease,
    /// CSS `ease-in`
    EaseIn,
    /// CSS `ease-out`
    EaseOut,
    /// CSS `ease-in-out`
    EaseInOut,
    /// t^2
    Quad,
    /// t^3
    Cubic,
    /// Quarter sine wave
    Sine,
    /// Quarter circle
    Circle,
    /// Exponential
    Exp,
    /// Custom cubic bezier
    Bezier(CubicBezier),
}

impl Easing {
    /// Evaluate the easing at progress `t` (0-1)
    pub fn ease(&self, t: f64) -> f64 {
        match self {
            Self::Linear => t,
            Self::Ease => CubicBezier::new(0.25, 0.1, 0.25, 1.0).ease(t),
            Self::EaseIn => CubicBezier::new(0.42, 0.0, 1.0, 1.0).ease(t),
            Self::EaseOut => CubicBezier::new(0.0, 0.0, 0.58, 1.0).ease(t),
            Self::EaseInOut => CubicBezier::new(0.42, 0.0, 0.58, 1.0).ease(t),
            Self::Quad => t * t,
            Self::Cubic => t * t * t,
            Self::Sine => 1.0 - (t * FRAC_PI_2).cos(),
            Self::Circle => 1.0 - (1.0 - t * t).sqrt(),
            Self::Exp => 2f64.powf(10.0 * (t - 1.0)),
            Self::Bezier(curve) => curve.ease(t),
        }
    }

    /// Sample the curve into a frame table: one entry per frame of
    /// `frame_interval_ms`, plus the final value at progress 1.
    ///
    /// Returns `None` when the table would exceed [`MAX_FRAMES`] entries.
    pub fn frames(&self, duration_ms: f64, frame_interval_ms: f64) -> Option<Vec<f64>> {
        let count = (duration_ms / frame_interval_ms).round();
        let count = if count.is_finite() && count > 0.0 { count } else { 0.0 };
        if count >= MAX_FRAMES as f64 {
            return None;
        }
        let count = count as usize;
        let mut frames: Vec<f64> = (0..count)
            .map(|frame| self.ease(frame as f64 / count as f64))
            .collect();
        frames.push(self.ease(1.0));
        Some(frames)
    }
}

/// Largest frame table [`Easing::frames`] expands (ten minutes at 60 fps)
pub const MAX_FRAMES: usize = 36_000;

/// Linear interpolation between two values
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_linear_bezier_is_identity() {
        let curve = CubicBezier::new(0.3, 0.3, 0.7, 0.7);
        assert_eq!(curve.ease(0.37), 0.37);
    }

    #[test]
    fn test_bezier_endpoints_and_symmetry() {
        let curve = CubicBezier::new(0.42, 0.0, 0.58, 1.0);
        assert_eq!(curve.ease(0.0), 0.0);
        assert_eq!(curve.ease(1.0), 1.0);
        assert!(approx(curve.ease(0.5), 0.5));
        assert!(approx(curve.ease(0.25) + curve.ease(0.75), 1.0));
    }

    #[test]
    fn test_ease_in_starts_slow() {
        assert!(Easing::EaseIn.ease(0.2) < 0.2);
        assert!(Easing::EaseOut.ease(0.2) > 0.2);
    }

    #[test]
    fn test_polynomial_easings() {
        assert_eq!(Easing::Quad.ease(0.5), 0.25);
        assert_eq!(Easing::Cubic.ease(0.5), 0.125);
        assert!(approx(Easing::Sine.ease(1.0), 1.0));
        assert!(approx(Easing::Circle.ease(1.0), 1.0));
        assert!(approx(Easing::Exp.ease(1.0), 1.0));
    }

    #[test]
    fn test_frame_table() {
        let frames = Easing::Linear.frames(1000.0, 1000.0 / 60.0).unwrap();
        assert_eq!(frames.len(), 61);
        assert_eq!(frames[0], 0.0);
        assert!(approx(frames[30], 0.5));
        assert_eq!(frames[60], 1.0);
    }

    #[test]
    fn test_zero_duration_frame_table() {
        assert_eq!(Easing::Quad.frames(0.0, 16.0), Some(vec![1.0]));
    }

    #[test]
    fn test_long_duration_has_no_frame_table() {
        assert_eq!(Easing::Linear.frames(1e13, 1000.0 / 60.0), None);
        let longest = Easing::Linear.frames((MAX_FRAMES - 1) as f64 * 10.0, 10.0).unwrap();
        assert_eq!(longest.len(), MAX_FRAMES);
    }
}
