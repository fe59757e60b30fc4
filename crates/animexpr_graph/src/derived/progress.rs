// SPDX-License-Identifier: MIT OR Apache-2.0
//! Clock-driven progression graphs.
//!
//! Each builder returns a block that advances its state cells from the
//! previous clock sample to the current one. Updates are closed-form in the
//! elapsed time, so the block may be evaluated at any cadence. A state whose
//! `time` cell is 0 has not been sampled yet; its first evaluation only
//! records the clock.

use super::control::ease_node;
use crate::cell::{AnimatedValue, CellHandle};
use crate::factories::{
    abs, add, and, block, cond, cond_if, cos, divide, eq, exp, greater_or_eq, greater_than,
    less_than, min, multiply, multiply_all, neq, number, or, pow, resolve, set, sin, sqrt, sub,
    value, Operand,
};
use crate::node::Node;
use crate::params::{SpringParams, TimingParams};
use animexpr_motion::spring::MAX_STEP_MS;
use animexpr_motion::SpringConfig;

/// Speed under which a decay finishes, in units per second
const DECAY_REST_SPEED: f64 = 5.0;

/// State cells of a [`timing`] progression
#[derive(Debug, Clone)]
pub struct TimingState {
    /// Clock sample of the last step
    pub time: CellHandle,
    /// Milliseconds of progress so far
    pub frame_time: CellHandle,
    /// Current position
    pub position: CellHandle,
    /// 1 once the duration has elapsed
    pub finished: CellHandle,
}

impl TimingState {
    /// Fresh state starting at `position`
    pub fn new(position: f64) -> Self {
        Self {
            time: AnimatedValue::handle(0.0),
            frame_time: AnimatedValue::handle(0.0),
            position: AnimatedValue::handle(position),
            finished: AnimatedValue::handle(0.0),
        }
    }
}

/// State cells of a [`spring`] progression
#[derive(Debug, Clone)]
pub struct SpringState {
    /// Clock sample of the last step
    pub time: CellHandle,
    /// Current velocity in units per second
    pub velocity: CellHandle,
    /// Current position
    pub position: CellHandle,
    /// 1 once the spring has come to rest
    pub finished: CellHandle,
}

impl SpringState {
    /// Fresh state at `position` moving with `velocity`
    pub fn new(position: f64, velocity: f64) -> Self {
        Self {
            time: AnimatedValue::handle(0.0),
            velocity: AnimatedValue::handle(velocity),
            position: AnimatedValue::handle(position),
            finished: AnimatedValue::handle(0.0),
        }
    }
}

/// State cells of a [`decay`] progression
#[derive(Debug, Clone)]
pub struct DecayState {
    /// Clock sample of the last step
    pub time: CellHandle,
    /// Current velocity in units per second
    pub velocity: CellHandle,
    /// Current position
    pub position: CellHandle,
    /// 1 once the velocity has dropped under the rest speed
    pub finished: CellHandle,
}

impl DecayState {
    /// Fresh state at `position` moving with `velocity`
    pub fn new(position: f64, velocity: f64) -> Self {
        Self {
            time: AnimatedValue::handle(0.0),
            velocity: AnimatedValue::handle(velocity),
            position: AnimatedValue::handle(position),
            finished: AnimatedValue::handle(0.0),
        }
    }
}

fn last_time(time: &Node, clock: &Node) -> Node {
    cond(time, time, clock)
}

/// Eased progression towards `params.to_value` over `params.duration`.
///
/// The start position is recovered from the current position and progress,
/// so the target may change while the progression runs.
pub fn timing(clock: impl Into<Operand>, state: &TimingState, params: &TimingParams) -> Node {
    let clock = resolve(clock);
    let time = value(state.time.clone());
    let frame_time = value(state.frame_time.clone());
    let position = value(state.position.clone());
    let to = &params.to_value;
    let duration = &params.duration;

    let new_frame_time = add(&frame_time, sub(&clock, last_time(&time, &clock)));
    let next_progress = ease_node(&params.easing, divide(&new_frame_time, duration));
    let progress = ease_node(&params.easing, divide(&frame_time, duration));

    let full_distance = divide(sub(to, &position), sub(1, progress));
    let start_position = sub(to, &full_distance);
    let next_position = add(start_position, multiply(&full_distance, next_progress));

    block(crate::operands![
        cond(
            greater_or_eq(&new_frame_time, duration),
            block(crate::operands![set(&position, to), set(&state.finished, 1)]),
            set(&position, next_position),
        ),
        set(&frame_time, &new_frame_time),
        set(&time, &clock),
    ])
}

/// Damped spring progression towards `params.to_value`.
///
/// The initial velocity is read from `state.velocity`; `params.velocity` is
/// ignored. Steps longer than 64 ms are truncated.
pub fn spring(clock: impl Into<Operand>, state: &SpringState, params: &SpringParams) -> Node {
    let or_default = |param: &Option<Node>, default: f64| {
        param.clone().unwrap_or_else(|| number(default))
    };
    let k = or_default(&params.stiffness, SpringConfig::DEFAULT_STIFFNESS);
    let c = or_default(&params.damping, SpringConfig::DEFAULT_DAMPING);
    let m = or_default(&params.mass, SpringConfig::DEFAULT_MASS);
    let clamp = or_default(&params.overshoot_clamping, 0.0);
    let rest_speed = or_default(
        &params.rest_speed_threshold,
        SpringConfig::DEFAULT_REST_THRESHOLD,
    );
    let rest_displacement = or_default(
        &params.rest_displacement_threshold,
        SpringConfig::DEFAULT_REST_THRESHOLD,
    );

    let clock = resolve(clock);
    let time = value(state.time.clone());
    let velocity = value(state.velocity.clone());
    let position = value(state.position.clone());
    let to = &params.to_value;

    // Private snapshots of the step's starting point.
    let prev_position = value(AnimatedValue::handle(0.0));
    let x0 = value(AnimatedValue::handle(0.0));
    let v0 = value(AnimatedValue::handle(0.0));

    let t = divide(min(sub(&clock, last_time(&time, &clock)), MAX_STEP_MS), 1000);
    let zeta = divide(&c, multiply(2, sqrt(multiply(&k, &m))));
    let omega0 = sqrt(divide(&k, &m));
    let omega1 = multiply(&omega0, sqrt(sub(1, multiply(&zeta, &zeta))));
    let zeta_omega0 = multiply(&zeta, &omega0);
    let sin1 = sin(multiply(&omega1, &t));
    let cos1 = cos(multiply(&omega1, &t));
    let lead = add(&v0, multiply(&zeta_omega0, &x0));

    let under_envelope = exp(multiply_all(crate::operands![-1, &zeta, &omega0, &t]));
    let under_frag = multiply(
        &under_envelope,
        add(multiply(&sin1, divide(&lead, &omega1)), multiply(&x0, &cos1)),
    );
    let under_position = sub(to, &under_frag);
    let under_velocity = sub(
        multiply(&zeta_omega0, &under_frag),
        multiply(
            &under_envelope,
            sub(
                multiply(&cos1, &lead),
                multiply_all(crate::operands![&omega1, &x0, &sin1]),
            ),
        ),
    );

    let critical_envelope = exp(multiply_all(crate::operands![-1, &omega0, &t]));
    let critical_position = sub(
        to,
        multiply(
            &critical_envelope,
            add(&x0, multiply(add(&v0, multiply(&omega0, &x0)), &t)),
        ),
    );
    let critical_velocity = multiply(
        &critical_envelope,
        add(
            multiply(&v0, sub(multiply(&t, &omega0), 1)),
            multiply_all(crate::operands![&t, &x0, &omega0, &omega0]),
        ),
    );

    let overshooting = cond_if(
        and(&clamp, neq(&k, 0)),
        cond(
            less_than(&prev_position, to),
            greater_than(&position, to),
            less_than(&position, to),
        ),
    );
    let at_rest_speed = less_than(abs(&velocity), &rest_speed);
    let at_rest_displacement = or(eq(&k, 0), less_than(abs(sub(to, &position)), &rest_displacement));

    block(crate::operands![
        set(&prev_position, &position),
        set(&x0, sub(to, &position)),
        set(&v0, multiply(-1, &velocity)),
        cond(
            less_than(&zeta, 1),
            block(crate::operands![
                set(&position, under_position),
                set(&velocity, under_velocity),
            ]),
            block(crate::operands![
                set(&position, critical_position),
                set(&velocity, critical_velocity),
            ]),
        ),
        set(&time, &clock),
        cond_if(
            or(overshooting, and(at_rest_speed, at_rest_displacement)),
            block(crate::operands![
                cond_if(
                    neq(&k, 0),
                    block(crate::operands![set(&velocity, 0), set(&position, to)]),
                ),
                set(&state.finished, 1),
            ]),
        ),
    ])
}

/// Exponential velocity decay.
///
/// `deceleration` is the fraction of velocity kept per millisecond.
pub fn decay(
    clock: impl Into<Operand>,
    state: &DecayState,
    deceleration: impl Into<Operand>,
) -> Node {
    let clock = resolve(clock);
    let deceleration = resolve(deceleration);
    let time = value(state.time.clone());
    let velocity = value(state.velocity.clone());
    let position = value(state.position.clone());

    let kv = pow(&deceleration, sub(&clock, last_time(&time, &clock)));
    let kx = divide(multiply(&deceleration, sub(1, &kv)), sub(1, &deceleration));
    let v0 = divide(&velocity, 1000);
    let v = multiply_all(crate::operands![&v0, &kv, 1000]);

    block(crate::operands![
        set(&position, add(&position, multiply(&v0, kx))),
        set(&velocity, &v),
        set(&time, &clock),
        cond_if(less_than(abs(&v), DECAY_REST_SPEED), set(&state.finished, 1)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::NumericCell;
    use crate::runtime::Runtime;
    use animexpr_motion::Easing;

    fn run_clock(clock: &CellHandle, graph: Node, from: f64, to: f64, step: f64) {
        let expr = Runtime::default().expression(graph);
        let mut now = from;
        while now <= to {
            clock.set_value(now);
            expr.evaluate().unwrap();
            now += step;
        }
    }

    #[test]
    fn test_timing_progression() {
        let clock = AnimatedValue::handle(0.0);
        let state = TimingState::new(0.0);
        let expr = Runtime::default().expression(timing(
            &clock,
            &state,
            &TimingParams::new(1, 1000),
        ));

        let mut positions = Vec::new();
        for now in [1000.0, 1250.0, 1500.0, 2000.0] {
            clock.set_value(now);
            expr.evaluate().unwrap();
            positions.push(state.position.value());
        }
        assert_eq!(positions, vec![0.0, 0.25, 0.5, 1.0]);
        assert_eq!(state.finished.value(), 1.0);
        assert_eq!(state.frame_time.value(), 1000.0);
        assert_eq!(state.time.value(), 2000.0);
    }

    #[test]
    fn test_eased_timing_ends_on_target() {
        let clock = AnimatedValue::handle(0.0);
        let state = TimingState::new(10.0);
        let params = TimingParams::new(20, 300).with_easing(Easing::EaseInOut);
        run_clock(&clock, timing(&clock, &state, &params), 1000.0, 1400.0, 16.0);
        assert_eq!(state.position.value(), 20.0);
        assert_eq!(state.finished.value(), 1.0);
    }

    #[test]
    fn test_underdamped_spring_settles() {
        let clock = AnimatedValue::handle(0.0);
        let state = SpringState::new(0.0, 0.0);
        let params = SpringParams::new(1)
            .with_damping(12)
            .with_mass(1)
            .with_stiffness(150);
        run_clock(&clock, spring(&clock, &state, &params), 1000.0, 6000.0, 16.0);
        assert_eq!(state.position.value(), 1.0);
        assert_eq!(state.velocity.value(), 0.0);
        assert_eq!(state.finished.value(), 1.0);
    }

    #[test]
    fn test_critically_damped_spring_settles() {
        let clock = AnimatedValue::handle(0.0);
        let state = SpringState::new(10.0, 0.0);
        let params = SpringParams::new(0).with_damping(20).with_stiffness(100);
        run_clock(&clock, spring(&clock, &state, &params), 1000.0, 6000.0, 16.0);
        assert_eq!(state.position.value(), 0.0);
        assert_eq!(state.finished.value(), 1.0);
    }

    #[test]
    fn test_clamped_spring_stops_at_crossing() {
        let clock = AnimatedValue::handle(0.0);
        let state = SpringState::new(0.0, 0.0);
        let params = SpringParams::new(1)
            .with_damping(2)
            .with_overshoot_clamping(1);
        let graph = spring(&clock, &state, &params);
        let expr = Runtime::default().expression(graph);
        let mut now = 1000.0;
        while state.finished.value() == 0.0 && now < 3000.0 {
            clock.set_value(now);
            expr.evaluate().unwrap();
            assert!(state.position.value() <= 1.0);
            now += 16.0;
        }
        assert_eq!(state.finished.value(), 1.0);
        assert_eq!(state.position.value(), 1.0);
        assert!(now < 3000.0);
    }

    #[test]
    fn test_decay_comes_to_rest() {
        let clock = AnimatedValue::handle(0.0);
        let state = DecayState::new(0.0, 1000.0);
        run_clock(&clock, decay(&clock, &state, 0.998), 1000.0, 5000.0, 16.0);
        let position = state.position.value();
        assert!(position > 490.0 && position < 499.0, "{position}");
        assert!(state.velocity.value().abs() < DECAY_REST_SPEED);
        assert_eq!(state.finished.value(), 1.0);
    }
}
