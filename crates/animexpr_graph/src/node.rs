// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for expression graphs.
//!
//! A [`Node`] is an immutable, cheaply clonable handle. Cloning a node shares
//! it: the clone has the same [`NodeId`] and the same children, which is how
//! common sub-expressions are referenced from several parents.

use crate::cell::CellHandle;
use crate::error::GraphError;
use crate::params::AnimationParams;
use crate::procedure::Procedure;
use animexpr_motion::CubicBezier;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Id carried by nodes the serializer synthesises for defaulted values
    pub const SYNTHETIC: NodeId = NodeId(0);

    /// Allocate the next id
    pub fn next() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Restart node ids at 1.
///
/// Ids only identify nodes for serialization and debugging, so this is safe
/// for tests that want stable ids; live nodes built before the reset may share
/// ids with nodes built after it.
pub fn reset_node_ids() {
    NEXT_NODE_ID.store(1, Ordering::Relaxed);
}

/// Numeric truth: every value except zero is true
pub fn truthy(value: f64) -> bool {
    value != 0.0
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

/// Operators folded left over two or more operands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MultiOp {
    /// Sum
    Add,
    /// Difference
    Sub,
    /// Product
    Multiply,
    /// Quotient
    Divide,
    /// Power
    Pow,
    /// Non-negative remainder
    Modulo,
    /// Largest operand
    Max,
    /// Smallest operand
    Min,
    /// Logical and (0 or 1)
    And,
    /// Logical or (0 or 1)
    Or,
}

impl MultiOp {
    /// All operators, in declaration order
    pub const ALL: [MultiOp; 10] = [
        Self::Add,
        Self::Sub,
        Self::Multiply,
        Self::Divide,
        Self::Pow,
        Self::Modulo,
        Self::Max,
        Self::Min,
        Self::And,
        Self::Or,
    ];

    /// Wire type name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Multiply => "multiply",
            Self::Divide => "divide",
            Self::Pow => "pow",
            Self::Modulo => "modulo",
            Self::Max => "max",
            Self::Min => "min",
            Self::And => "and",
            Self::Or => "or",
        }
    }

    /// Combine the accumulator with the next operand
    pub fn apply(&self, acc: f64, next: f64) -> f64 {
        match self {
            Self::Add => acc + next,
            Self::Sub => acc - next,
            Self::Multiply => acc * next,
            Self::Divide => acc / next,
            Self::Pow => acc.powf(next),
            Self::Modulo => ((acc % next) + next) % next,
            Self::Max => {
                if next > acc {
                    next
                } else {
                    acc
                }
            }
            Self::Min => {
                if next < acc {
                    next
                } else {
                    acc
                }
            }
            Self::And => flag(truthy(acc) && truthy(next)),
            Self::Or => flag(truthy(acc) || truthy(next)),
        }
    }
}

impl FromStr for MultiOp {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| GraphError::UnknownNodeType(s.to_string()))
    }
}

/// Operators over a single operand
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnaryOp {
    /// Absolute value
    Abs,
    /// Square root
    Sqrt,
    /// Natural logarithm
    Log,
    /// Sine
    Sin,
    /// Cosine
    Cos,
    /// Tangent
    Tan,
    /// Arc cosine
    Acos,
    /// Arc sine
    Asin,
    /// Arc tangent
    Atan,
    /// e^v
    Exp,
    /// Round half up
    Round,
    /// Round towards +inf
    Ceil,
    /// Round towards -inf
    Floor,
    /// Logical not (0 or 1)
    Not,
    /// Change since the previous evaluation
    Diff,
    /// Cubic bezier easing of the operand
    Bezier(CubicBezier),
}

impl UnaryOp {
    /// Operators that carry no parameters
    pub const SIMPLE: [UnaryOp; 15] = [
        Self::Abs,
        Self::Sqrt,
        Self::Log,
        Self::Sin,
        Self::Cos,
        Self::Tan,
        Self::Acos,
        Self::Asin,
        Self::Atan,
        Self::Exp,
        Self::Round,
        Self::Ceil,
        Self::Floor,
        Self::Not,
        Self::Diff,
    ];

    /// Wire type name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Abs => "abs",
            Self::Sqrt => "sqrt",
            Self::Log => "log",
            Self::Sin => "sin",
            Self::Cos => "cos",
            Self::Tan => "tan",
            Self::Acos => "acos",
            Self::Asin => "asin",
            Self::Atan => "atan",
            Self::Exp => "exp",
            Self::Round => "round",
            Self::Ceil => "ceil",
            Self::Floor => "floor",
            Self::Not => "not",
            Self::Diff => "diff",
            Self::Bezier(_) => "bezier",
        }
    }

    /// Apply a stateless operator. `Diff` is stateful and handled by the
    /// evaluator; here it passes the value through.
    pub fn apply(&self, v: f64) -> f64 {
        match self {
            Self::Abs => v.abs(),
            Self::Sqrt => v.sqrt(),
            Self::Log => v.ln(),
            Self::Sin => v.sin(),
            Self::Cos => v.cos(),
            Self::Tan => v.tan(),
            Self::Acos => v.acos(),
            Self::Asin => v.asin(),
            Self::Atan => v.atan(),
            Self::Exp => v.exp(),
            Self::Round => {
                let floor = v.floor();
                if v - floor >= 0.5 {
                    floor + 1.0
                } else {
                    floor
                }
            }
            Self::Ceil => v.ceil(),
            Self::Floor => v.floor(),
            Self::Not => flag(!truthy(v)),
            Self::Diff => v,
            Self::Bezier(curve) => curve.ease(v),
        }
    }
}

impl FromStr for UnaryOp {
    type Err = GraphError;

    /// `"bezier"` parses to the identity curve.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "bezier" {
            return Ok(Self::Bezier(CubicBezier::new(0.0, 0.0, 1.0, 1.0)));
        }
        Self::SIMPLE
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| GraphError::UnknownNodeType(s.to_string()))
    }
}

/// Comparisons yielding 0 or 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CompareOp {
    /// left == right
    Eq,
    /// left != right
    Neq,
    /// left < right
    LessThan,
    /// left > right
    GreaterThan,
    /// left <= right
    LessOrEq,
    /// left >= right
    GreaterOrEq,
}

impl CompareOp {
    /// All comparisons
    pub const ALL: [CompareOp; 6] = [
        Self::Eq,
        Self::Neq,
        Self::LessThan,
        Self::GreaterThan,
        Self::LessOrEq,
        Self::GreaterOrEq,
    ];

    /// Wire type name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::LessThan => "lessThan",
            Self::GreaterThan => "greaterThan",
            Self::LessOrEq => "lessOrEq",
            Self::GreaterOrEq => "greaterOrEq",
        }
    }

    /// Compare, yielding exactly 0 or 1
    pub fn apply(&self, left: f64, right: f64) -> f64 {
        flag(match self {
            Self::Eq => left == right,
            Self::Neq => left != right,
            Self::LessThan => left < right,
            Self::GreaterThan => left > right,
            Self::LessOrEq => left <= right,
            Self::GreaterOrEq => left >= right,
        })
    }
}

impl FromStr for CompareOp {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| GraphError::UnknownNodeType(s.to_string()))
    }
}

/// Host function embedded in a call node
#[derive(Clone)]
pub struct HostCallback(Arc<dyn Fn(&[f64]) + Send + Sync>);

impl HostCallback {
    /// Wrap a closure
    pub fn new(callback: impl Fn(&[f64]) + Send + Sync + 'static) -> Self {
        Self(Arc::new(callback))
    }

    /// Invoke the callback. This is the only place host code is entered from
    /// evaluation.
    pub fn invoke(&self, values: &[f64]) {
        (self.0)(values);
    }

    /// Whether two handles wrap the same closure
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for HostCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HostCallback")
    }
}

/// Shape of a node, one variant per wire type family
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Literal number
    Number(f64),
    /// Reference to an external cell
    Value(CellHandle),
    /// Left fold over the full ordered operand list
    Multi {
        /// Operator
        op: MultiOp,
        /// Operands, first two required
        operands: Vec<Node>,
    },
    /// Single-operand operator
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand
        v: Node,
    },
    /// Comparison
    Compare {
        /// Operator
        op: CompareOp,
        /// Left operand
        left: Node,
        /// Right operand
        right: Node,
    },
    /// Conditional
    Cond {
        /// Condition
        expr: Node,
        /// Taken when the condition is non-zero
        if_node: Node,
        /// Taken when the condition is zero
        else_node: Node,
    },
    /// Assignment into a cell
    Set {
        /// Must be a value node
        target: Node,
        /// Value to write
        source: Node,
    },
    /// Sequence yielding its last child
    Block {
        /// Children, evaluated in order
        nodes: Vec<Node>,
    },
    /// Host callback invocation
    Call {
        /// Arguments passed to the callback
        args: Vec<Node>,
        /// Callback
        callback: HostCallback,
    },
    /// Procedure invocation
    CallProc {
        /// Procedure being called
        procedure: Procedure,
        /// Argument per parameter
        args: Vec<Node>,
    },
    /// Start an animation run against a cell
    Animation {
        /// Must be a value node
        target: Node,
        /// Run parameters
        params: AnimationParams,
        /// Evaluated when the run finishes on its own
        on_finish: Option<Node>,
    },
    /// Stop a run by id
    StopAnimation {
        /// Run id
        run: Node,
    },
    /// Positional string formatting
    Format {
        /// Format string with `%f`, `%d` or `%s` placeholders
        format: String,
        /// Substituted values
        args: Vec<Node>,
    },
    /// Logical view of a number
    CastBoolean {
        /// Operand
        v: Node,
    },
}

impl NodeKind {
    /// Wire type name
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::Value(_) => "value",
            Self::Multi { op, .. } => op.as_str(),
            Self::Unary { op, .. } => op.as_str(),
            Self::Compare { op, .. } => op.as_str(),
            Self::Cond { .. } => "cond",
            Self::Set { .. } => "set",
            Self::Block { .. } => "block",
            Self::Call { .. } => "call",
            Self::CallProc { .. } => "callProc",
            Self::Animation { params, .. } => params.type_name(),
            Self::StopAnimation { .. } => "stopAnimation",
            Self::Format { .. } => "format",
            Self::CastBoolean { .. } => "castBoolean",
        }
    }
}

struct NodeRecord {
    id: NodeId,
    kind: NodeKind,
}

/// Shared handle to an immutable graph node
#[derive(Clone)]
pub struct Node(Arc<NodeRecord>);

impl Node {
    /// Create a node with a fresh id
    pub fn new(kind: NodeKind) -> Self {
        Self(Arc::new(NodeRecord {
            id: NodeId::next(),
            kind,
        }))
    }

    /// Node carrying a given id, as after [`reset_node_ids`]
    #[cfg(test)]
    pub(crate) fn with_id(id: NodeId, kind: NodeKind) -> Self {
        Self(Arc::new(NodeRecord { id, kind }))
    }

    /// Wire id of this node
    pub fn id(&self) -> NodeId {
        self.0.id
    }

    /// Address of the shared record; equal exactly when [`Node::ptr_eq`]
    /// holds, as long as one handle is alive
    pub fn ptr_key(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    /// Shape of this node
    pub fn kind(&self) -> &NodeKind {
        &self.0.kind
    }

    /// Wire type name
    pub fn type_name(&self) -> &'static str {
        self.0.kind.type_name()
    }

    /// The referenced cell, if this is a value node
    pub fn as_cell(&self) -> Option<&CellHandle> {
        match &self.0.kind {
            NodeKind::Value(cell) => Some(cell),
            _ => None,
        }
    }

    /// Whether both handles point at the same node
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Direct children in slot order. Procedure bodies are not included.
    pub fn children(&self) -> Vec<&Node> {
        match &self.0.kind {
            NodeKind::Number(_) | NodeKind::Value(_) => Vec::new(),
            NodeKind::Multi { operands, .. } => operands.iter().collect(),
            NodeKind::Unary { v, .. } | NodeKind::CastBoolean { v } => vec![v],
            NodeKind::Compare { left, right, .. } => vec![left, right],
            NodeKind::Cond {
                expr,
                if_node,
                else_node,
            } => vec![expr, if_node, else_node],
            NodeKind::Set { target, source } => vec![target, source],
            NodeKind::Block { nodes } => nodes.iter().collect(),
            NodeKind::Call { args, .. }
            | NodeKind::CallProc { args, .. }
            | NodeKind::Format { args, .. } => args.iter().collect(),
            NodeKind::Animation {
                target,
                params,
                on_finish,
            } => {
                let mut children = vec![target];
                children.extend(params.nodes());
                children.extend(on_finish.iter());
                children
            }
            NodeKind::StopAnimation { run } => vec![run],
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.0.id)
            .field("type", &self.type_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_monotonic() {
        let a = Node::new(NodeKind::Number(1.0));
        let b = Node::new(NodeKind::Number(1.0));
        assert!(b.id() > a.id());
        assert_eq!(a.clone().id(), a.id());
        assert!(a.clone().ptr_eq(&a));
        assert!(!a.ptr_eq(&b));
    }

    #[test]
    fn test_modulo_is_non_negative() {
        assert_eq!(MultiOp::Modulo.apply(-1.0, 3.0), 2.0);
        assert_eq!(MultiOp::Modulo.apply(7.0, 3.0), 1.0);
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(UnaryOp::Round.apply(16.5), 17.0);
        assert_eq!(UnaryOp::Round.apply(-2.5), -2.0);
        assert_eq!(UnaryOp::Round.apply(0.49999999999999994), 0.0);
        assert_eq!(UnaryOp::Round.apply(-0.49999999999999994), 0.0);
        assert_eq!(UnaryOp::Round.apply(4503599627370497.0), 4503599627370497.0);
    }

    #[test]
    fn test_op_names_round_trip() {
        for op in MultiOp::ALL {
            assert_eq!(op.as_str().parse::<MultiOp>().ok(), Some(op));
        }
        for op in UnaryOp::SIMPLE {
            assert_eq!(op.as_str().parse::<UnaryOp>().ok(), Some(op));
        }
        for op in CompareOp::ALL {
            assert_eq!(op.as_str().parse::<CompareOp>().ok(), Some(op));
        }
        assert!(matches!(
            "bogus".parse::<MultiOp>(),
            Err(GraphError::UnknownNodeType(name)) if name == "bogus"
        ));
    }

    #[test]
    fn test_truthiness() {
        assert!(truthy(-1.0));
        assert!(truthy(f64::NAN));
        assert!(!truthy(0.0));
        assert!(!truthy(-0.0));
    }
}
