// SPDX-License-Identifier: MIT OR Apache-2.0
//! Declarative parameters of animation-start nodes.
//!
//! Every parameter is a node, so a run can be configured from live cells
//! (e.g. a release velocity). Optional parameters fall back to the motion
//! defaults when the run is started or serialized.

use crate::config::RuntimeConfig;
use crate::error::Result;
use crate::factories::{resolve, Operand};
use crate::node::{truthy, Node};
use animexpr_motion::{DecayConfig, Easing, MotionConfig, SpringConfig, TimingConfig};

/// Parameters of a timing run
#[derive(Debug, Clone)]
pub struct TimingParams {
    /// Value reached at the end of the run
    pub to_value: Node,
    /// Duration in milliseconds
    pub duration: Node,
    /// Easing applied to progress
    pub easing: Easing,
}

impl TimingParams {
    /// Linear timing towards `to_value` over `duration` milliseconds
    pub fn new(to_value: impl Into<Operand>, duration: impl Into<Operand>) -> Self {
        Self {
            to_value: resolve(to_value),
            duration: resolve(duration),
            easing: Easing::Linear,
        }
    }

    /// Set the easing curve
    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }
}

/// Parameters of a spring run; unset values use the spring defaults
#[derive(Debug, Clone)]
pub struct SpringParams {
    /// Rest position
    pub to_value: Node,
    /// Spring constant
    pub stiffness: Option<Node>,
    /// Damping coefficient
    pub damping: Option<Node>,
    /// Mass
    pub mass: Option<Node>,
    /// Initial velocity in units per second
    pub velocity: Option<Node>,
    /// Non-zero to stop at the first crossing of `to_value`
    pub overshoot_clamping: Option<Node>,
    /// Speed under which the spring may rest
    pub rest_speed_threshold: Option<Node>,
    /// Displacement under which the spring may rest
    pub rest_displacement_threshold: Option<Node>,
}

impl SpringParams {
    /// Spring towards `to_value`
    pub fn new(to_value: impl Into<Operand>) -> Self {
        Self {
            to_value: resolve(to_value),
            stiffness: None,
            damping: None,
            mass: None,
            velocity: None,
            overshoot_clamping: None,
            rest_speed_threshold: None,
            rest_displacement_threshold: None,
        }
    }

    /// Set stiffness
    pub fn with_stiffness(mut self, stiffness: impl Into<Operand>) -> Self {
        self.stiffness = Some(resolve(stiffness));
        self
    }

    /// Set damping
    pub fn with_damping(mut self, damping: impl Into<Operand>) -> Self {
        self.damping = Some(resolve(damping));
        self
    }

    /// Set mass
    pub fn with_mass(mut self, mass: impl Into<Operand>) -> Self {
        self.mass = Some(resolve(mass));
        self
    }

    /// Set initial velocity
    pub fn with_velocity(mut self, velocity: impl Into<Operand>) -> Self {
        self.velocity = Some(resolve(velocity));
        self
    }

    /// Set overshoot clamping
    pub fn with_overshoot_clamping(mut self, clamp: impl Into<Operand>) -> Self {
        self.overshoot_clamping = Some(resolve(clamp));
        self
    }

    /// Set both rest thresholds
    pub fn with_rest_thresholds(
        mut self,
        speed: impl Into<Operand>,
        displacement: impl Into<Operand>,
    ) -> Self {
        self.rest_speed_threshold = Some(resolve(speed));
        self.rest_displacement_threshold = Some(resolve(displacement));
        self
    }
}

/// Parameters of a decay run
#[derive(Debug, Clone)]
pub struct DecayParams {
    /// Initial velocity in units per second
    pub velocity: Node,
    /// Fraction of velocity kept per millisecond; runtime default when unset
    pub deceleration: Option<Node>,
}

impl DecayParams {
    /// Decay from `velocity`
    pub fn new(velocity: impl Into<Operand>) -> Self {
        Self {
            velocity: resolve(velocity),
            deceleration: None,
        }
    }

    /// Set deceleration
    pub fn with_deceleration(mut self, deceleration: impl Into<Operand>) -> Self {
        self.deceleration = Some(resolve(deceleration));
        self
    }
}

/// Parameters of any animation-start node
#[derive(Debug, Clone)]
pub enum AnimationParams {
    /// Timing run
    Timing(TimingParams),
    /// Spring run
    Spring(SpringParams),
    /// Decay run
    Decay(DecayParams),
    /// Clock run
    Clock,
}

impl AnimationParams {
    /// Wire type name of the start node
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Timing(_) => "timing",
            Self::Spring(_) => "spring",
            Self::Decay(_) => "decay",
            Self::Clock => "clock",
        }
    }

    /// Parameter nodes that are set, in a fixed order
    pub fn nodes(&self) -> Vec<&Node> {
        match self {
            Self::Timing(p) => vec![&p.to_value, &p.duration],
            Self::Spring(p) => {
                let mut nodes = vec![&p.to_value];
                nodes.extend(
                    [
                        &p.stiffness,
                        &p.damping,
                        &p.mass,
                        &p.velocity,
                        &p.overshoot_clamping,
                        &p.rest_speed_threshold,
                        &p.rest_displacement_threshold,
                    ]
                    .into_iter()
                    .flatten(),
                );
                nodes
            }
            Self::Decay(p) => {
                let mut nodes = vec![&p.velocity];
                nodes.extend(p.deceleration.iter());
                nodes
            }
            Self::Clock => Vec::new(),
        }
    }

    /// Resolve every parameter through `value` and build the canonical config
    pub fn canonical<F>(&self, mut value: F, config: &RuntimeConfig) -> Result<MotionConfig>
    where
        F: FnMut(&Node) -> Result<f64>,
    {
        Ok(match self {
            Self::Timing(p) => MotionConfig::Timing(TimingConfig::eased(
                value(&p.to_value)?,
                value(&p.duration)?,
                p.easing,
                config.frame_interval_ms,
            )),
            Self::Spring(p) => {
                let mut spring = SpringConfig::new(value(&p.to_value)?);
                spring.stiffness = or_default(&mut value, &p.stiffness, spring.stiffness)?;
                spring.damping = or_default(&mut value, &p.damping, spring.damping)?;
                spring.mass = or_default(&mut value, &p.mass, spring.mass)?;
                spring.velocity = or_default(&mut value, &p.velocity, spring.velocity)?;
                spring.overshoot_clamping =
                    truthy(or_default(&mut value, &p.overshoot_clamping, 0.0)?);
                spring.rest_speed_threshold =
                    or_default(&mut value, &p.rest_speed_threshold, spring.rest_speed_threshold)?;
                spring.rest_displacement_threshold = or_default(
                    &mut value,
                    &p.rest_displacement_threshold,
                    spring.rest_displacement_threshold,
                )?;
                MotionConfig::Spring(spring)
            }
            Self::Decay(p) => {
                let velocity = value(&p.velocity)?;
                let deceleration =
                    or_default(&mut value, &p.deceleration, config.default_deceleration)?;
                MotionConfig::Decay(DecayConfig::new(velocity).with_deceleration(deceleration))
            }
            Self::Clock => MotionConfig::Clock,
        })
    }
}

fn or_default<F>(value: &mut F, node: &Option<Node>, default: f64) -> Result<f64>
where
    F: FnMut(&Node) -> Result<f64>,
{
    match node {
        Some(node) => value(node),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factories::number;

    fn literal(node: &Node) -> Result<f64> {
        match node.kind() {
            crate::node::NodeKind::Number(n) => Ok(*n),
            _ => Ok(f64::NAN),
        }
    }

    #[test]
    fn test_spring_defaults_fill_unset_values() {
        let params = AnimationParams::Spring(SpringParams::new(1).with_damping(12));
        let config = params.canonical(literal, &RuntimeConfig::default()).unwrap();
        let MotionConfig::Spring(spring) = config else {
            panic!("expected spring");
        };
        assert_eq!(spring.damping, 12.0);
        assert_eq!(spring.stiffness, SpringConfig::DEFAULT_STIFFNESS);
        assert!(!spring.overshoot_clamping);
    }

    #[test]
    fn test_decay_uses_runtime_deceleration() {
        let config = RuntimeConfig {
            default_deceleration: 0.9,
            ..RuntimeConfig::default()
        };
        let params = AnimationParams::Decay(DecayParams::new(number(100.0)));
        assert_eq!(params.nodes().len(), 1);
        let MotionConfig::Decay(decay) = params.canonical(literal, &config).unwrap() else {
            panic!("expected decay");
        };
        assert_eq!(decay.deceleration, 0.9);
    }
}
