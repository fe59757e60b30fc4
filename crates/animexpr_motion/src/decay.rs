// SPDX-License-Identifier: MIT OR Apache-2.0
//! Decay runs: a velocity that bleeds off exponentially.

use crate::{finite, FrameTime, Integrator, MotionError, Result, Sample};
use serde::{Deserialize, Serialize};

/// Deceleration used when a caller does not give one
pub const DEFAULT_DECELERATION: f64 = 0.998;

/// Per-frame movement under which a decay run is considered at rest
const REST_DELTA: f64 = 0.1;

/// Canonical decay configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecayConfig {
    /// Initial velocity in units per second
    pub velocity: f64,
    /// Fraction of velocity kept per millisecond
    pub deceleration: f64,
}

impl DecayConfig {
    /// Create a config with the default deceleration
    pub fn new(velocity: f64) -> Self {
        Self {
            velocity,
            deceleration: DEFAULT_DECELERATION,
        }
    }

    /// Set deceleration
    pub fn with_deceleration(mut self, deceleration: f64) -> Self {
        self.deceleration = deceleration;
        self
    }

    /// Check every parameter
    pub fn validate(&self) -> Result<()> {
        finite("velocity", self.velocity)?;
        let deceleration = finite("deceleration", self.deceleration)?;
        if deceleration <= 0.0 || deceleration >= 1.0 {
            return Err(MotionError::Deceleration(deceleration));
        }
        Ok(())
    }

    /// Distance travelled after `elapsed_ms`
    pub fn distance_at(&self, elapsed_ms: f64) -> f64 {
        let per_ms = self.velocity / 1000.0;
        let k = 1.0 - self.deceleration;
        per_ms / k * (1.0 - (-k * elapsed_ms).exp())
    }

    /// Velocity in units per second after `elapsed_ms`
    pub fn velocity_at(&self, elapsed_ms: f64) -> f64 {
        self.velocity * (-(1.0 - self.deceleration) * elapsed_ms).exp()
    }
}

/// Integrator for [`DecayConfig`]
#[derive(Debug, Clone)]
pub struct DecayIntegrator {
    config: DecayConfig,
    from: f64,
    last_position: f64,
}

impl DecayIntegrator {
    /// Create an integrator starting at `from`
    pub fn new(config: DecayConfig, from: f64) -> Self {
        Self {
            config,
            from,
            last_position: from,
        }
    }
}

impl Integrator for DecayIntegrator {
    fn step(&mut self, frame: FrameTime) -> Sample {
        let position = self.from + self.config.distance_at(frame.elapsed_ms);
        let velocity = self.config.velocity_at(frame.elapsed_ms);
        let moved = (position - self.last_position).abs();
        self.last_position = position;
        if frame.elapsed_ms > 0.0 && moved < REST_DELTA {
            return Sample::done(position, Some(velocity));
        }
        Sample::moving(position, Some(velocity))
    }
}
