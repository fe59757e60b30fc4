// SPDX-License-Identifier: MIT OR Apache-2.0
//! Clock control and graph-level easing.

use crate::cell::{AnimatedValue, CellHandle};
use crate::factories::{
    bezier, block, cos, cond, eq, multiply, neq, pow, resolve, set, sqrt, start_clock, stop_clock,
    sub, Operand,
};
use crate::node::Node;
use animexpr_motion::Easing;
use std::f64::consts::FRAC_PI_2;

/// Start/stop graphs for a clock cell.
///
/// The id of the clock run is kept in `run`; 0 means stopped.
#[derive(Debug, Clone)]
pub struct ClockControl {
    /// Cell receiving the frame time
    pub clock: CellHandle,
    /// Id of the running clock run, or 0
    pub run: CellHandle,
}

impl ClockControl {
    /// Control `clock`, initially stopped
    pub fn new(clock: CellHandle) -> Self {
        Self {
            clock,
            run: AnimatedValue::handle(0.0),
        }
    }

    /// Start the clock unless it is running; yields the run id
    pub fn start(&self) -> Node {
        cond(
            eq(&self.run, 0),
            set(&self.run, start_clock(&self.clock)),
            &self.run,
        )
    }

    /// Stop the clock; yields 0
    pub fn stop(&self) -> Node {
        block(crate::operands![stop_clock(&self.run), set(&self.run, 0)])
    }

    /// 1 while the clock runs
    pub fn is_running(&self) -> Node {
        neq(&self.run, 0)
    }
}

/// Apply `easing` to the progress node `t` (0-1).
///
/// The graph computes the same curve as [`Easing::ease`].
pub fn ease_node(easing: &Easing, t: impl Into<Operand>) -> Node {
    let t = resolve(t);
    match easing {
        Easing::Linear => t,
        Easing::Ease => bezier(t, 0.25, 0.1, 0.25, 1.0),
        Easing::EaseIn => bezier(t, 0.42, 0.0, 1.0, 1.0),
        Easing::EaseOut => bezier(t, 0.0, 0.0, 0.58, 1.0),
        Easing::EaseInOut => bezier(t, 0.42, 0.0, 0.58, 1.0),
        Easing::Quad => multiply(&t, &t),
        Easing::Cubic => multiply(multiply(&t, &t), &t),
        Easing::Sine => sub(1, cos(multiply(&t, FRAC_PI_2))),
        Easing::Circle => sub(1, sqrt(sub(1, multiply(&t, &t)))),
        Easing::Exp => pow(2, multiply(10, sub(&t, 1))),
        Easing::Bezier(curve) => bezier(t, curve.x1, curve.y1, curve.x2, curve.y2),
    }
}
