// SPDX-License-Identifier: MIT OR Apache-2.0
//! Damped spring runs.

use crate::{finite, non_negative, positive, FrameTime, Integrator, Result, Sample};
use serde::{Deserialize, Serialize};

/// Longest time step integrated in one frame; longer gaps are clamped.
pub const MAX_STEP_MS: f64 = 64.0;

/// Canonical spring configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpringConfig {
    /// Rest position
    pub to_value: f64,
    /// Spring stiffness (k)
    pub stiffness: f64,
    /// Damping coefficient (c)
    pub damping: f64,
    /// Attached mass (m)
    pub mass: f64,
    /// Initial velocity in units per second
    pub velocity: f64,
    /// Stop as soon as the spring crosses `to_value`
    pub overshoot_clamping: bool,
    /// Speed under which the spring may rest
    pub rest_speed_threshold: f64,
    /// Distance from `to_value` under which the spring may rest
    pub rest_displacement_threshold: f64,
}

impl SpringConfig {
    /// Default stiffness
    pub const DEFAULT_STIFFNESS: f64 = 100.0;
    /// Default damping
    pub const DEFAULT_DAMPING: f64 = 10.0;
    /// Default mass
    pub const DEFAULT_MASS: f64 = 1.0;
    /// Default rest thresholds
    pub const DEFAULT_REST_THRESHOLD: f64 = 0.001;

    /// Create a spring towards `to_value` with default physics
    pub fn new(to_value: f64) -> Self {
        Self {
            to_value,
            stiffness: Self::DEFAULT_STIFFNESS,
            damping: Self::DEFAULT_DAMPING,
            mass: Self::DEFAULT_MASS,
            velocity: 0.0,
            overshoot_clamping: false,
            rest_speed_threshold: Self::DEFAULT_REST_THRESHOLD,
            rest_displacement_threshold: Self::DEFAULT_REST_THRESHOLD,
        }
    }

    /// Set stiffness
    pub fn with_stiffness(mut self, stiffness: f64) -> Self {
        self.stiffness = stiffness;
        self
    }

    /// Set damping
    pub fn with_damping(mut self, damping: f64) -> Self {
        self.damping = damping;
        self
    }

    /// Set mass
    pub fn with_mass(mut self, mass: f64) -> Self {
        self.mass = mass;
        self
    }

    /// Set initial velocity
    pub fn with_velocity(mut self, velocity: f64) -> Self {
        self.velocity = velocity;
        self
    }

    /// Enable or disable overshoot clamping
    pub fn with_overshoot_clamping(mut self, clamp: bool) -> Self {
        self.overshoot_clamping = clamp;
        self
    }

    /// Check every parameter
    pub fn validate(&self) -> Result<()> {
        finite("toValue", self.to_value)?;
        positive("stiffness", self.stiffness)?;
        non_negative("damping", self.damping)?;
        positive("mass", self.mass)?;
        finite("velocity", self.velocity)?;
        non_negative("restSpeedThreshold", self.rest_speed_threshold)?;
        non_negative("restDisplacementThreshold", self.rest_displacement_threshold)?;
        Ok(())
    }

    /// Damping ratio (zeta)
    pub fn damping_ratio(&self) -> f64 {
        self.damping / (2.0 * (self.stiffness * self.mass).sqrt())
    }

    /// Undamped angular frequency (omega0), radians per second
    pub fn natural_frequency(&self) -> f64 {
        (self.stiffness / self.mass).sqrt()
    }

    /// Closed-form position and velocity `t` seconds after leaving
    /// `position` with `velocity`.
    pub fn advance(&self, position: f64, velocity: f64, t: f64) -> (f64, f64) {
        let zeta = self.damping_ratio();
        let omega0 = self.natural_frequency();
        let x0 = self.to_value - position;
        let v0 = -velocity;

        if zeta < 1.0 {
            let omega1 = omega0 * (1.0 - zeta * zeta).sqrt();
            let envelope = (-zeta * omega0 * t).exp();
            let (sin1, cos1) = (omega1 * t).sin_cos();
            let swing = (v0 + zeta * omega0 * x0) / omega1;
            let offset = envelope * (sin1 * swing + x0 * cos1);
            let next_position = self.to_value - offset;
            let next_velocity = zeta * omega0 * offset
                - envelope * (cos1 * (v0 + zeta * omega0 * x0) - omega1 * x0 * sin1);
            (next_position, next_velocity)
        } else {
            let envelope = (-omega0 * t).exp();
            let next_position = self.to_value - envelope * (x0 + (v0 + omega0 * x0) * t);
            let next_velocity = envelope * (v0 * (t * omega0 - 1.0) + t * x0 * omega0 * omega0);
            (next_position, next_velocity)
        }
    }

    /// Whether a spring at `position`/`velocity`, having left `previous`, may stop
    pub fn is_at_rest(&self, previous: f64, position: f64, velocity: f64) -> bool {
        let overshooting = self.overshoot_clamping
            && self.stiffness != 0.0
            && if previous < self.to_value {
                position > self.to_value
            } else {
                position < self.to_value
            };
        let slow = velocity.abs() <= self.rest_speed_threshold;
        let settled = self.stiffness == 0.0
            || (self.to_value - position).abs() <= self.rest_displacement_threshold;
        overshooting || (slow && settled)
    }
}

/// Integrator for [`SpringConfig`]
#[derive(Debug, Clone)]
pub struct SpringIntegrator {
    config: SpringConfig,
    position: f64,
    velocity: f64,
    last_elapsed_ms: f64,
}

impl SpringIntegrator {
    /// Create an integrator leaving `from` with the configured velocity
    pub fn new(config: SpringConfig, from: f64) -> Self {
        let velocity = config.velocity;
        Self {
            config,
            position: from,
            velocity,
            last_elapsed_ms: 0.0,
        }
    }
}

impl Integrator for SpringIntegrator {
    fn step(&mut self, frame: FrameTime) -> Sample {
        let delta_ms = (frame.elapsed_ms - self.last_elapsed_ms).clamp(0.0, MAX_STEP_MS);
        self.last_elapsed_ms = frame.elapsed_ms;

        let previous = self.position;
        let (position, velocity) =
            self.config
                .advance(self.position, self.velocity, delta_ms / 1000.0);
        self.position = position;
        self.velocity = velocity;

        if self.config.is_at_rest(previous, position, velocity) {
            if self.config.stiffness != 0.0 {
                self.position = self.config.to_value;
                self.velocity = 0.0;
            }
            return Sample::done(self.position, Some(self.velocity));
        }
        Sample::moving(self.position, Some(self.velocity))
    }
}
