// SPDX-License-Identifier: MIT OR Apache-2.0
//! Factory functions for building expression graphs.
//!
//! Every factory resolves its arguments through [`resolve`], so children are
//! always nodes. Construction never fails: structural defects such as an
//! n-ary node with fewer than two operands are reported when the graph is
//! first compiled or converted.
//!
//! ```ignore
//! let x = AnimatedValue::new(0.0);
//! let graph = cond(greater_than(&x, 10), set(&x, 0), add(&x, 1));
//! ```

use crate::cell::{AnimatedValue, CellHandle};
use crate::error::{GraphError, Result};
use crate::node::{CompareOp, HostCallback, MultiOp, Node, NodeKind, UnaryOp};
use crate::params::{AnimationParams, DecayParams, SpringParams, TimingParams};
use crate::procedure::Procedure;
use animexpr_motion::CubicBezier;
use std::sync::Arc;

/// Anything a factory accepts in a node position
#[derive(Debug, Clone)]
pub enum Operand {
    /// An existing node, shared as-is
    Node(Node),
    /// A literal number
    Number(f64),
    /// A cell, wrapped in a fresh value node
    Cell(CellHandle),
    /// A list, wrapped in an implicit block
    Sequence(Vec<Operand>),
}

impl From<f64> for Operand {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for Operand {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<Node> for Operand {
    fn from(node: Node) -> Self {
        Self::Node(node)
    }
}

impl From<&Node> for Operand {
    fn from(node: &Node) -> Self {
        Self::Node(node.clone())
    }
}

impl From<CellHandle> for Operand {
    fn from(cell: CellHandle) -> Self {
        Self::Cell(cell)
    }
}

impl From<&CellHandle> for Operand {
    fn from(cell: &CellHandle) -> Self {
        Self::Cell(cell.clone())
    }
}

impl From<Arc<AnimatedValue>> for Operand {
    fn from(cell: Arc<AnimatedValue>) -> Self {
        Self::Cell(cell)
    }
}

impl From<&Arc<AnimatedValue>> for Operand {
    fn from(cell: &Arc<AnimatedValue>) -> Self {
        Self::Cell(cell.clone())
    }
}

impl<T: Into<Operand>> From<Vec<T>> for Operand {
    fn from(items: Vec<T>) -> Self {
        Self::Sequence(items.into_iter().map(Into::into).collect())
    }
}

/// Build a `Vec<Operand>` from mixed operand types.
///
/// ```ignore
/// let sum = add_all(operands![1, &x, 2.5]);
/// ```
#[macro_export]
macro_rules! operands {
    ($($operand:expr),* $(,)?) => {
        vec![$($crate::factories::Operand::from($operand)),*]
    };
}

/// Turn an operand into a node
pub fn resolve(operand: impl Into<Operand>) -> Node {
    match operand.into() {
        Operand::Node(node) => node,
        Operand::Number(value) => Node::new(NodeKind::Number(value)),
        Operand::Cell(cell) => Node::new(NodeKind::Value(cell)),
        Operand::Sequence(items) => block(items),
    }
}

fn resolve_all<I>(operands: I) -> Vec<Node>
where
    I: IntoIterator,
    I::Item: Into<Operand>,
{
    operands.into_iter().map(resolve).collect()
}

/// Literal number node
pub fn number(value: f64) -> Node {
    Node::new(NodeKind::Number(value))
}

/// Value node reading and writing `cell`
pub fn value(cell: CellHandle) -> Node {
    Node::new(NodeKind::Value(cell))
}

/// N-ary node from an operator and its full operand list
pub fn multi<I>(op: MultiOp, operands: I) -> Node
where
    I: IntoIterator,
    I::Item: Into<Operand>,
{
    Node::new(NodeKind::Multi {
        op,
        operands: resolve_all(operands),
    })
}

/// Unary node
pub fn unary(op: UnaryOp, v: impl Into<Operand>) -> Node {
    Node::new(NodeKind::Unary { op, v: resolve(v) })
}

/// Comparison node
pub fn compare(op: CompareOp, left: impl Into<Operand>, right: impl Into<Operand>) -> Node {
    Node::new(NodeKind::Compare {
        op,
        left: resolve(left),
        right: resolve(right),
    })
}

macro_rules! multi_factories {
    ($($name:ident, $all:ident => $op:ident;)*) => {
        $(
            #[doc = concat!("`", stringify!($name), "` of two operands")]
            pub fn $name(a: impl Into<Operand>, b: impl Into<Operand>) -> Node {
                Node::new(NodeKind::Multi {
                    op: MultiOp::$op,
                    operands: vec![resolve(a), resolve(b)],
                })
            }

            #[doc = concat!("`", stringify!($name), "` folded left over every operand")]
            pub fn $all<I>(operands: I) -> Node
            where
                I: IntoIterator,
                I::Item: Into<Operand>,
            {
                multi(MultiOp::$op, operands)
            }
        )*
    };
}

multi_factories! {
    add, add_all => Add;
    sub, sub_all => Sub;
    multiply, multiply_all => Multiply;
    divide, divide_all => Divide;
    pow, pow_all => Pow;
    modulo, modulo_all => Modulo;
    max, max_all => Max;
    min, min_all => Min;
    and, and_all => And;
    or, or_all => Or;
}

macro_rules! unary_factories {
    ($($name:ident => $op:ident;)*) => {
        $(
            #[doc = concat!("`", stringify!($name), "` of one operand")]
            pub fn $name(v: impl Into<Operand>) -> Node {
                unary(UnaryOp::$op, v)
            }
        )*
    };
}

unary_factories! {
    abs => Abs;
    sqrt => Sqrt;
    log => Log;
    sin => Sin;
    cos => Cos;
    tan => Tan;
    acos => Acos;
    asin => Asin;
    atan => Atan;
    exp => Exp;
    round => Round;
    ceil => Ceil;
    floor => Floor;
    not => Not;
    diff => Diff;
}

macro_rules! compare_factories {
    ($($name:ident => $op:ident;)*) => {
        $(
            #[doc = concat!("`", stringify!($name), "` comparison, 0 or 1")]
            pub fn $name(left: impl Into<Operand>, right: impl Into<Operand>) -> Node {
                compare(CompareOp::$op, left, right)
            }
        )*
    };
}

compare_factories! {
    eq => Eq;
    neq => Neq;
    less_than => LessThan;
    greater_than => GreaterThan;
    less_or_eq => LessOrEq;
    greater_or_eq => GreaterOrEq;
}

/// Ease `v` along a cubic bezier curve
pub fn bezier(v: impl Into<Operand>, x1: f64, y1: f64, x2: f64, y2: f64) -> Node {
    unary(UnaryOp::Bezier(CubicBezier::new(x1, y1, x2, y2)), v)
}

/// Conditional
pub fn cond(
    expr: impl Into<Operand>,
    if_node: impl Into<Operand>,
    else_node: impl Into<Operand>,
) -> Node {
    Node::new(NodeKind::Cond {
        expr: resolve(expr),
        if_node: resolve(if_node),
        else_node: resolve(else_node),
    })
}

/// Conditional whose else branch yields 0
pub fn cond_if(expr: impl Into<Operand>, if_node: impl Into<Operand>) -> Node {
    cond(expr, if_node, 0)
}

/// Write `source` into the cell behind `target`
pub fn set(target: impl Into<Operand>, source: impl Into<Operand>) -> Node {
    Node::new(NodeKind::Set {
        target: resolve(target),
        source: resolve(source),
    })
}

/// Sequence yielding its last child
pub fn block<I>(nodes: I) -> Node
where
    I: IntoIterator,
    I::Item: Into<Operand>,
{
    Node::new(NodeKind::Block {
        nodes: resolve_all(nodes),
    })
}

/// Invoke `callback` with the values of `args`; yields 0
pub fn call<I>(args: I, callback: impl Fn(&[f64]) + Send + Sync + 'static) -> Node
where
    I: IntoIterator,
    I::Item: Into<Operand>,
{
    call_with(args, HostCallback::new(callback))
}

/// Like [`call`] with an existing callback handle
pub fn call_with<I>(args: I, callback: HostCallback) -> Node
where
    I: IntoIterator,
    I::Item: Into<Operand>,
{
    Node::new(NodeKind::Call {
        args: resolve_all(args),
        callback,
    })
}

/// Format node substituting `args` into `format`
pub fn format<I>(format: impl Into<String>, args: I) -> Node
where
    I: IntoIterator,
    I::Item: Into<Operand>,
{
    Node::new(NodeKind::Format {
        format: format.into(),
        args: resolve_all(args),
    })
}

/// Read `v` as a logical value (0 or 1)
pub fn cast_boolean(v: impl Into<Operand>) -> Node {
    Node::new(NodeKind::CastBoolean { v: resolve(v) })
}

/// Build a procedure with `arity` fresh parameter cells.
///
/// `body` receives one value node per parameter and returns the body graph.
pub fn proc_fn(arity: usize, body: impl FnOnce(&[Node]) -> Node) -> Procedure {
    let params: Vec<CellHandle> = (0..arity).map(|_| AnimatedValue::handle(0.0)).collect();
    let param_nodes: Vec<Node> = params.iter().map(|cell| value(cell.clone())).collect();
    Procedure::new(params, body(&param_nodes))
}

/// Start a run against `target`
pub fn start_animation(target: impl Into<Operand>, params: AnimationParams) -> Node {
    Node::new(NodeKind::Animation {
        target: resolve(target),
        params,
        on_finish: None,
    })
}

/// Start a run and evaluate `on_finish` when it completes on its own
pub fn start_animation_with(
    target: impl Into<Operand>,
    params: AnimationParams,
    on_finish: impl Into<Operand>,
) -> Node {
    Node::new(NodeKind::Animation {
        target: resolve(target),
        params,
        on_finish: Some(resolve(on_finish)),
    })
}

/// Start a timing run
pub fn start_timing(target: impl Into<Operand>, params: TimingParams) -> Node {
    start_animation(target, AnimationParams::Timing(params))
}

/// Start a spring run
pub fn start_spring(target: impl Into<Operand>, params: SpringParams) -> Node {
    start_animation(target, AnimationParams::Spring(params))
}

/// Start a decay run
pub fn start_decay(target: impl Into<Operand>, params: DecayParams) -> Node {
    start_animation(target, AnimationParams::Decay(params))
}

/// Start a clock run writing the frame time into `target`
pub fn start_clock(target: impl Into<Operand>) -> Node {
    start_animation(target, AnimationParams::Clock)
}

/// Stop the run whose id `run` evaluates to; yields 1 if it was running
pub fn stop_animation(run: impl Into<Operand>) -> Node {
    Node::new(NodeKind::StopAnimation { run: resolve(run) })
}

/// Stop a clock run
pub fn stop_clock(run: impl Into<Operand>) -> Node {
    stop_animation(run)
}

/// Build an operator node from its wire type name.
///
/// N-ary operators take every operand. Unary and comparison operators need
/// one and two operands; extra operands are ignored.
pub fn operator(type_name: &str, operands: Vec<Operand>) -> Result<Node> {
    if let Ok(op) = type_name.parse::<MultiOp>() {
        return Ok(multi(op, operands));
    }
    let mut operands = operands.into_iter();
    if let Ok(op) = type_name.parse::<CompareOp>() {
        let left = operands.next().ok_or_else(|| GraphError::missing("left", op.as_str()))?;
        let right = operands.next().ok_or_else(|| GraphError::missing("right", op.as_str()))?;
        return Ok(compare(op, left, right));
    }
    let op = type_name.parse::<UnaryOp>()?;
    let v = operands.next().ok_or_else(|| GraphError::missing("v", op.as_str()))?;
    Ok(unary(op, v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_preserves_nodes() {
        let shared = add(10, 10);
        let a1 = add(&shared, 10);
        let a2 = add(&shared, 20);
        let (NodeKind::Multi { operands: left, .. }, NodeKind::Multi { operands: right, .. }) =
            (a1.kind(), a2.kind())
        else {
            panic!("expected n-ary nodes");
        };
        assert!(left[0].ptr_eq(&shared));
        assert!(right[0].ptr_eq(&shared));
    }

    #[test]
    fn test_cells_get_fresh_value_nodes() {
        let cell = AnimatedValue::new(1.0);
        let a = resolve(&cell);
        let b = resolve(&cell);
        assert_eq!(a.type_name(), "value");
        assert_ne!(a.id(), b.id());
        assert_eq!(a.as_cell().map(|c| c.tag()), b.as_cell().map(|c| c.tag()));
    }

    #[test]
    fn test_vec_becomes_block() {
        let node = cond(1, vec![1, 2], 0);
        let NodeKind::Cond { if_node, .. } = node.kind() else {
            panic!("expected cond");
        };
        assert_eq!(if_node.type_name(), "block");
    }

    #[test]
    fn test_cond_if_defaults_else_to_zero() {
        let node = cond_if(1, 5);
        let NodeKind::Cond { else_node, .. } = node.kind() else {
            panic!("expected cond");
        };
        assert!(matches!(else_node.kind(), NodeKind::Number(n) if *n == 0.0));
    }

    #[test]
    fn test_operator_by_name() {
        assert_eq!(operator("pow", operands![2, 3]).unwrap().type_name(), "pow");
        assert_eq!(operator("lessThan", operands![2, 3]).unwrap().type_name(), "lessThan");
        assert_eq!(operator("sqrt", operands![4]).unwrap().type_name(), "sqrt");
        assert!(matches!(
            operator("eq", operands![1]),
            Err(GraphError::MissingField { field: "right", node_type: "eq" })
        ));
        assert!(matches!(
            operator("frobnicate", operands![1]),
            Err(GraphError::UnknownNodeType(_))
        ));
    }

    #[test]
    fn test_proc_fn_allocates_params() {
        let proc = proc_fn(2, |p| add(&p[0], &p[1]));
        assert_eq!(proc.arity(), 2);
        assert_eq!(proc.body().type_name(), "add");
    }
}
