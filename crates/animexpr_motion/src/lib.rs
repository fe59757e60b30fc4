// SPDX-License-Identifier: MIT OR Apache-2.0
//! Motion integrators for animexpr animation runs.
//!
//! This crate provides the numeric side of animation runs:
//! - Easing curves (including cubic bezier)
//! - Timing runs driven by an eased frame table
//! - Damped spring runs
//! - Velocity decay runs
//! - Clock runs that publish the frame time
//!
//! ## Architecture
//!
//! Every run is described by a canonical [`MotionConfig`]: the normalized
//! parameter set independent of how a caller spelled its input. A config
//! produces an [`Integrator`], which turns elapsed time into a [`Sample`].
//! Integrators are closed-form in elapsed time so irregular or coalesced
//! frames do not drift.

pub mod clock;
pub mod decay;
pub mod easing;
pub mod spring;
pub mod timing;

pub use clock::ClockIntegrator;
pub use decay::{DecayConfig, DecayIntegrator, DEFAULT_DECELERATION};
pub use easing::{lerp, CubicBezier, Easing, MAX_FRAMES};
pub use spring::{SpringConfig, SpringIntegrator};
pub use timing::{TimingConfig, TimingIntegrator, DEFAULT_FRAME_INTERVAL_MS};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by invalid motion configurations
#[derive(Debug, Error, PartialEq)]
pub enum MotionError {
    /// A parameter is NaN or infinite
    #[error("{0} must be finite")]
    NotFinite(&'static str),

    /// A parameter that must be positive is zero or negative
    #[error("{0} must be positive")]
    NotPositive(&'static str),

    /// A parameter that must not be negative is negative
    #[error("{0} must not be negative")]
    Negative(&'static str),

    /// Deceleration outside the open interval (0, 1)
    #[error("deceleration must be between 0 and 1, got {0}")]
    Deceleration(f64),
}

/// Result type for motion operations
pub type Result<T> = std::result::Result<T, MotionError>;

/// Time of the frame being integrated
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTime {
    /// Absolute frame time in milliseconds
    pub now_ms: f64,
    /// Milliseconds since the run received its first frame
    pub elapsed_ms: f64,
}

/// One integrated sample of a run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Position to publish to the target
    pub position: f64,
    /// Velocity in units per second, for integrators that track it
    pub velocity: Option<f64>,
    /// Whether the run has come to rest
    pub finished: bool,
}

impl Sample {
    /// A sample still in flight
    pub fn moving(position: f64, velocity: Option<f64>) -> Self {
        Self {
            position,
            velocity,
            finished: false,
        }
    }

    /// A final sample
    pub fn done(position: f64, velocity: Option<f64>) -> Self {
        Self {
            position,
            velocity,
            finished: true,
        }
    }

    /// `finished` as the numeric flag used by graphs (0 or 1)
    pub fn finished_flag(&self) -> f64 {
        if self.finished {
            1.0
        } else {
            0.0
        }
    }
}

/// Turns elapsed time into position samples for a single run
pub trait Integrator: Send {
    /// Produce the sample for the given frame
    fn step(&mut self, frame: FrameTime) -> Sample;
}

/// Canonical configuration of an animation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MotionConfig {
    /// Eased interpolation towards a value over a fixed duration
    Timing(TimingConfig),
    /// Damped harmonic oscillator towards a value
    Spring(SpringConfig),
    /// Exponentially decaying velocity
    Decay(DecayConfig),
    /// Publishes the frame time until stopped
    Clock,
}

impl MotionConfig {
    /// Wire name of the run type
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Timing(_) => "timing",
            Self::Spring(_) => "spring",
            Self::Decay(_) => "decay",
            Self::Clock => "clock",
        }
    }

    /// Check every parameter
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Timing(config) => config.validate(),
            Self::Spring(config) => config.validate(),
            Self::Decay(config) => config.validate(),
            Self::Clock => Ok(()),
        }
    }

    /// Validate and build the integrator for a run starting at `from`
    pub fn integrator(&self, from: f64) -> Result<Box<dyn Integrator>> {
        self.validate()?;
        Ok(match self {
            Self::Timing(config) => Box::new(TimingIntegrator::new(config.clone(), from)),
            Self::Spring(config) => Box::new(SpringIntegrator::new(config.clone(), from)),
            Self::Decay(config) => Box::new(DecayIntegrator::new(config.clone(), from)),
            Self::Clock => Box::new(ClockIntegrator),
        })
    }
}

pub(crate) fn finite(name: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(MotionError::NotFinite(name))
    }
}

pub(crate) fn positive(name: &'static str, value: f64) -> Result<f64> {
    if finite(name, value)? > 0.0 {
        Ok(value)
    } else {
        Err(MotionError::NotPositive(name))
    }
}

pub(crate) fn non_negative(name: &'static str, value: f64) -> Result<f64> {
    if finite(name, value)? >= 0.0 {
        Ok(value)
    } else {
        Err(MotionError::Negative(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(MotionConfig::Clock.type_name(), "clock");
        assert_eq!(
            MotionConfig::Decay(DecayConfig::new(100.0)).type_name(),
            "decay"
        );
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = MotionConfig::Spring(SpringConfig::new(1.0).with_mass(0.0));
        assert_eq!(
            config.integrator(0.0).err(),
            Some(MotionError::NotPositive("mass"))
        );
    }

    #[test]
    fn test_finished_flag() {
        assert_eq!(Sample::done(1.0, None).finished_flag(), 1.0);
        assert_eq!(Sample::moving(0.5, None).finished_flag(), 0.0);
    }
}
