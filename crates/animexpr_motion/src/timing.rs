// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timing runs: eased interpolation over a fixed duration.

use crate::easing::{lerp, Easing};
use crate::{finite, non_negative, positive, FrameTime, Integrator, Result, Sample};
use serde::{Deserialize, Serialize};

/// Default frame interval used to sample easing curves (60 fps)
pub const DEFAULT_FRAME_INTERVAL_MS: f64 = 1000.0 / 60.0;

/// Canonical timing configuration.
///
/// The easing is expanded into `frames`, one progress value per frame of
/// `frame_interval_ms`, so a consumer never needs the easing function itself.
/// Runs too long for a frame table keep `frames` empty and apply `easing`
/// directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingConfig {
    /// Value reached at the end of the run
    pub to_value: f64,
    /// Duration in milliseconds
    pub duration: f64,
    /// Eased progress per frame, ending with the progress at t = 1
    pub frames: Vec<f64>,
    /// Curve applied when `frames` is empty
    #[serde(default)]
    pub easing: Easing,
    /// Interval between two entries of `frames`
    pub frame_interval_ms: f64,
}

impl TimingConfig {
    /// Create a linear timing config at 60 fps
    pub fn new(to_value: f64, duration: f64) -> Self {
        Self::eased(to_value, duration, Easing::Linear, DEFAULT_FRAME_INTERVAL_MS)
    }

    /// Create a config by sampling `easing` every `frame_interval_ms`
    pub fn eased(to_value: f64, duration: f64, easing: Easing, frame_interval_ms: f64) -> Self {
        Self {
            to_value,
            duration,
            frames: easing.frames(duration, frame_interval_ms).unwrap_or_default(),
            easing,
            frame_interval_ms,
        }
    }

    /// Check every parameter
    pub fn validate(&self) -> Result<()> {
        finite("toValue", self.to_value)?;
        non_negative("duration", self.duration)?;
        positive("frameInterval", self.frame_interval_ms)?;
        for frame in &self.frames {
            finite("frames", *frame)?;
        }
        Ok(())
    }

    /// Progress at `elapsed_ms`, interpolated between neighbouring frames
    pub fn progress_at(&self, elapsed_ms: f64) -> f64 {
        let Some(last) = self.frames.last().copied() else {
            return if elapsed_ms >= self.duration {
                1.0
            } else {
                self.easing.ease((elapsed_ms / self.duration).max(0.0))
            };
        };
        let frame = (elapsed_ms / self.frame_interval_ms).max(0.0);
        let index = frame.floor() as usize;
        if index + 1 >= self.frames.len() {
            return last;
        }
        lerp(self.frames[index], self.frames[index + 1], frame - index as f64)
    }
}

/// Integrator for [`TimingConfig`]
#[derive(Debug, Clone)]
pub struct TimingIntegrator {
    config: TimingConfig,
    from: f64,
}

impl TimingIntegrator {
    /// Create an integrator moving from `from` to the configured value
    pub fn new(config: TimingConfig, from: f64) -> Self {
        Self { config, from }
    }
}

impl Integrator for TimingIntegrator {
    fn step(&mut self, frame: FrameTime) -> Sample {
        if frame.elapsed_ms >= self.config.duration {
            return Sample::done(self.config.to_value, None);
        }
        let progress = self.config.progress_at(frame.elapsed_ms);
        Sample::moving(lerp(self.from, self.config.to_value, progress), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(elapsed_ms: f64) -> FrameTime {
        FrameTime {
            now_ms: 1000.0 + elapsed_ms,
            elapsed_ms,
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_linear_timing_progression() {
        let mut timing = TimingIntegrator::new(TimingConfig::new(1.0, 1000.0), 0.0);
        assert!(approx(timing.step(at(0.0)).position, 0.0));
        assert!(approx(timing.step(at(250.0)).position, 0.25));
        assert!(approx(timing.step(at(500.0)).position, 0.5));
        let last = timing.step(at(1000.0));
        assert_eq!(last.position, 1.0);
        assert!(last.finished);
    }

    #[test]
    fn test_timing_from_nonzero_start() {
        let mut timing = TimingIntegrator::new(TimingConfig::new(10.0, 100.0), 20.0);
        let sample = timing.step(at(50.0));
        assert!(sample.position < 20.0 && sample.position > 10.0);
        assert!(!sample.finished);
    }

    #[test]
    fn test_zero_duration_finishes_immediately() {
        let mut timing = TimingIntegrator::new(TimingConfig::new(5.0, 0.0), 0.0);
        let sample = timing.step(at(0.0));
        assert_eq!(sample.position, 5.0);
        assert!(sample.finished);
    }

    #[test]
    fn test_long_run_eases_without_frame_table() {
        let config = TimingConfig::eased(1.0, 1e13, Easing::Quad, DEFAULT_FRAME_INTERVAL_MS);
        assert!(config.frames.is_empty());
        assert!(config.validate().is_ok());
        assert!(approx(config.progress_at(5e12), 0.25));

        let mut timing = TimingIntegrator::new(config, 0.0);
        assert!(approx(timing.step(at(5e12)).position, 0.25));
        let last = timing.step(at(1e13));
        assert_eq!(last.position, 1.0);
        assert!(last.finished);
    }

    #[test]
    fn test_negative_duration_rejected() {
        assert!(TimingConfig::new(1.0, -1.0).validate().is_err());
    }
}
