// SPDX-License-Identifier: MIT OR Apache-2.0
//! Clock runs publish the frame time until stopped.

use crate::{FrameTime, Integrator, Sample};

/// Integrator that never finishes and reports the absolute frame time
#[derive(Debug, Clone, Copy, Default)]
pub struct ClockIntegrator;

impl Integrator for ClockIntegrator {
    fn step(&mut self, frame: FrameTime) -> Sample {
        Sample::moving(frame.now_ms, None)
    }
}
