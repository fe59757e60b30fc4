// SPDX-License-Identifier: MIT OR Apache-2.0
//! Piecewise-linear mapping between ranges.

use crate::error::{GraphError, Result};
use crate::factories::{
    add, cond, divide, eq, greater_than, less_or_eq, less_than, multiply, resolve, sub, Operand,
};
use crate::node::Node;
use serde::{Deserialize, Serialize};

/// Behaviour outside the input range
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Extrapolate {
    /// Continue the outermost segment
    #[default]
    Extend,
    /// Hold the outermost output
    Clamp,
    /// Pass the input through unchanged
    Identity,
}

/// Breakpoints and edge behaviour of an [`interpolate`] node
#[derive(Debug, Clone)]
pub struct InterpolateConfig {
    /// Input breakpoints, non-decreasing
    pub input_range: Vec<f64>,
    /// Output value at each input breakpoint
    pub output_range: Vec<Node>,
    /// Behaviour below the first breakpoint
    pub extrapolate_left: Extrapolate,
    /// Behaviour above the last breakpoint
    pub extrapolate_right: Extrapolate,
}

impl InterpolateConfig {
    /// Map `input_range` onto `output_range`, extending at both edges
    pub fn new<I>(input_range: impl IntoIterator<Item = f64>, output_range: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Operand>,
    {
        Self {
            input_range: input_range.into_iter().collect(),
            output_range: output_range.into_iter().map(resolve).collect(),
            extrapolate_left: Extrapolate::Extend,
            extrapolate_right: Extrapolate::Extend,
        }
    }

    /// Same behaviour at both edges
    pub fn with_extrapolate(self, mode: Extrapolate) -> Self {
        self.with_extrapolate_left(mode).with_extrapolate_right(mode)
    }

    /// Behaviour below the first breakpoint
    pub fn with_extrapolate_left(mut self, mode: Extrapolate) -> Self {
        self.extrapolate_left = mode;
        self
    }

    /// Behaviour above the last breakpoint
    pub fn with_extrapolate_right(mut self, mode: Extrapolate) -> Self {
        self.extrapolate_right = mode;
        self
    }
}

/// Map `value` through the ranges of `config`.
///
/// Segments are selected by a chain of conditionals scanning the breakpoints
/// left to right. A zero-width segment yields its start output at or below
/// the breakpoint and its end output above it.
pub fn interpolate(value: impl Into<Operand>, config: &InterpolateConfig) -> Result<Node> {
    let input = &config.input_range;
    let output = &config.output_range;
    if input.len() < 2 {
        return Err(GraphError::missing("inputRange", "interpolate"));
    }
    if output.len() != input.len() {
        return Err(GraphError::ArityMismatch {
            expected: input.len(),
            got: output.len(),
        });
    }

    let value = resolve(value);
    let last = input.len() - 1;
    let mut result = segment(&value, input, output, last - 1);
    for offset in (0..last - 1).rev() {
        result = cond(
            less_than(&value, input[offset + 1]),
            segment(&value, input, output, offset),
            result,
        );
    }

    result = match config.extrapolate_left {
        Extrapolate::Extend => result,
        Extrapolate::Clamp => cond(less_than(&value, input[0]), &output[0], result),
        Extrapolate::Identity => cond(less_than(&value, input[0]), &value, result),
    };
    Ok(match config.extrapolate_right {
        Extrapolate::Extend => result,
        Extrapolate::Clamp => cond(greater_than(&value, input[last]), &output[last], result),
        Extrapolate::Identity => cond(greater_than(&value, input[last]), &value, result),
    })
}

fn segment(value: &Node, input: &[f64], output: &[Node], offset: usize) -> Node {
    let (in_start, in_end) = (input[offset], input[offset + 1]);
    let (out_start, out_end) = (&output[offset], &output[offset + 1]);
    let progress = divide(sub(value, in_start), sub(in_end, in_start));
    cond(
        eq(in_start, in_end),
        cond(less_or_eq(value, in_start), out_start, out_end),
        add(out_start, multiply(progress, sub(out_end, out_start))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{AnimatedValue, NumericCell};
    use crate::runtime::Runtime;

    fn sample(config: &InterpolateConfig, inputs: &[f64]) -> Vec<f64> {
        let x = AnimatedValue::new(0.0);
        let expr = Runtime::default().expression(interpolate(&x, config).unwrap());
        inputs
            .iter()
            .map(|input| {
                x.set_value(*input);
                expr.evaluate().unwrap()
            })
            .collect()
    }

    #[test]
    fn test_segments() {
        let config = InterpolateConfig::new([0.0, 10.0, 20.0], [0.0, 100.0, 0.0]);
        assert_eq!(
            sample(&config, &[0.0, 5.0, 10.0, 15.0, 20.0]),
            vec![0.0, 50.0, 100.0, 50.0, 0.0]
        );
    }

    #[test]
    fn test_extend_and_clamp() {
        let extend = InterpolateConfig::new([0.0, 10.0], [0.0, 1.0]);
        assert_eq!(sample(&extend, &[-10.0, 20.0]), vec![-1.0, 2.0]);

        let clamp = extend.clone().with_extrapolate(Extrapolate::Clamp);
        assert_eq!(sample(&clamp, &[-10.0, 20.0]), vec![0.0, 1.0]);
    }

    #[test]
    fn test_identity_edges_are_independent() {
        let config = InterpolateConfig::new([0.0, 10.0], [100.0, 200.0])
            .with_extrapolate_left(Extrapolate::Identity)
            .with_extrapolate_right(Extrapolate::Clamp);
        assert_eq!(sample(&config, &[-3.0, 5.0, 50.0]), vec![-3.0, 150.0, 200.0]);
    }

    #[test]
    fn test_zero_width_segment() {
        let step = InterpolateConfig::new([0.0, 0.0], [1.0, 2.0]);
        assert_eq!(sample(&step, &[-1.0, 0.0, 1.0]), vec![1.0, 1.0, 2.0]);

        let chained = InterpolateConfig::new([0.0, 10.0, 10.0, 20.0], [0.0, 1.0, 5.0, 6.0]);
        assert_eq!(sample(&chained, &[9.0, 10.0, 15.0]), vec![0.9, 5.0, 5.5]);
    }

    #[test]
    fn test_invalid_ranges() {
        let short = InterpolateConfig::new([0.0], [1.0]);
        assert!(matches!(
            interpolate(0, &short),
            Err(GraphError::MissingField { field: "inputRange", .. })
        ));
        let uneven = InterpolateConfig::new([0.0, 1.0], [1.0]);
        assert!(matches!(
            interpolate(0, &uneven),
            Err(GraphError::ArityMismatch { expected: 2, got: 1 })
        ));
    }
}
