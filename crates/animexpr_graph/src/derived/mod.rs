// SPDX-License-Identifier: MIT OR Apache-2.0
//! Derived operators.
//!
//! Everything here is composed from the primitive factories. Operators that
//! need memory between evaluations allocate their own private cells when the
//! graph is built; a derived node therefore carries its state for as long as
//! the graph holding it is alive.

mod control;
mod interpolate;
mod progress;

pub use control::{ease_node, ClockControl};
pub use interpolate::{interpolate, Extrapolate, InterpolateConfig};
pub use progress::{decay, spring, timing, DecayState, SpringState, TimingState};

use crate::cell::{AnimatedValue, CellHandle};
use crate::factories::{add, block, call, cond_if, eq, format, neq, resolve, set, Operand};
use crate::node::Node;
use std::sync::Arc;

/// Initial content of the previous-value cell of [`on_change`]: the most
/// negative integer exactly representable as `f64`
pub const CHANGE_SENTINEL: f64 = -9_007_199_254_740_991.0;

/// Evaluate `action` whenever `value` differs from its previous sample.
///
/// The first evaluation only records the sample.
pub fn on_change(value: impl Into<Operand>, action: impl Into<Operand>) -> Node {
    let value = resolve(value);
    let previous = AnimatedValue::new(CHANGE_SENTINEL);
    block(crate::operands![
        cond_if(eq(&previous, CHANGE_SENTINEL), set(&previous, &value)),
        cond_if(
            neq(&previous, &value),
            block(crate::operands![resolve(action), set(&previous, &value)]),
        ),
    ])
}

/// Running total of every sample of `value`
pub fn accumulate(value: impl Into<Operand>) -> Node {
    let total = AnimatedValue::new(0.0);
    set(&total, add(&total, value))
}

/// Log `message` with the value of `node` at info level and yield that value
pub fn debug(message: impl Into<String>, node: impl Into<Operand>) -> Node {
    let message = message.into();
    let node = resolve(node);
    block(crate::operands![
        call([&node], move |values| {
            tracing::info!(value = ?values.first(), "{message}");
        }),
        &node,
    ])
}

/// Piece of a [`concat`] node
#[derive(Debug, Clone)]
pub enum ConcatPart {
    /// Literal text
    Text(String),
    /// Numeric operand printed in place
    Operand(Operand),
}

impl From<&str> for ConcatPart {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for ConcatPart {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<f64> for ConcatPart {
    fn from(value: f64) -> Self {
        Self::Operand(value.into())
    }
}

impl From<Node> for ConcatPart {
    fn from(node: Node) -> Self {
        Self::Operand(node.into())
    }
}

impl From<&Node> for ConcatPart {
    fn from(node: &Node) -> Self {
        Self::Operand(node.into())
    }
}

impl From<&CellHandle> for ConcatPart {
    fn from(cell: &CellHandle) -> Self {
        Self::Operand(cell.into())
    }
}

impl From<&Arc<AnimatedValue>> for ConcatPart {
    fn from(cell: &Arc<AnimatedValue>) -> Self {
        Self::Operand(cell.into())
    }
}

/// Format node joining text and numeric operands in order
pub fn concat<I>(parts: I) -> Node
where
    I: IntoIterator,
    I::Item: Into<ConcatPart>,
{
    let mut pattern = String::new();
    let mut args = Vec::new();
    for part in parts {
        match part.into() {
            ConcatPart::Text(text) => pattern.push_str(&text.replace('%', "%%")),
            ConcatPart::Operand(operand) => {
                pattern.push_str("%f");
                args.push(operand);
            }
        }
    }
    format(pattern, args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::NumericCell;
    use crate::expression::evaluate_once;
    use crate::factories::multiply;
    use crate::node::NodeKind;
    use crate::runtime::Runtime;

    #[test]
    fn test_on_change_skips_first_sample() {
        let x = AnimatedValue::new(5.0);
        let hits = AnimatedValue::new(0.0);
        let node = on_change(&x, set(&hits, add(&hits, 1)));
        let expr = Runtime::default().expression(node);

        expr.evaluate().unwrap();
        expr.evaluate().unwrap();
        assert_eq!(hits.value(), 0.0);

        x.set_value(6.0);
        expr.evaluate().unwrap();
        assert_eq!(hits.value(), 1.0);

        expr.evaluate().unwrap();
        assert_eq!(hits.value(), 1.0);
    }

    #[test]
    fn test_accumulate() {
        let x = AnimatedValue::new(2.0);
        let expr = Runtime::default().expression(accumulate(&x));
        assert_eq!(expr.evaluate().unwrap(), 2.0);
        x.set_value(3.0);
        assert_eq!(expr.evaluate().unwrap(), 5.0);
    }

    #[test]
    fn test_debug_yields_value() {
        assert_eq!(evaluate_once(&debug("x", multiply(3, 4))).unwrap(), 12.0);
    }

    #[test]
    fn test_concat_builds_pattern() {
        let x = AnimatedValue::new(45.0);
        let node = concat::<[ConcatPart; 3]>(["rotate(".into(), (&x).into(), "deg) 100%".into()]);
        match node.kind() {
            NodeKind::Format { format, args } => {
                assert_eq!(format, "rotate(%fdeg) 100%%");
                assert_eq!(args.len(), 1);
            }
            other => panic!("unexpected {}", other.type_name()),
        }
        let text = Runtime::default().expression(node).evaluate_text().unwrap();
        assert_eq!(text, "rotate(45deg) 100%");
    }
}
