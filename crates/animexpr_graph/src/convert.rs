// SPDX-License-Identifier: MIT OR Apache-2.0
//! Conversion of graphs into plain trees for external runtimes.
//!
//! A plain tree has the same topology and node ids as the graph it came from.
//! Cells are replaced by their tags, call nodes keep only their node id (the
//! runtime reports invocations back through the callback router) and
//! animation parameters are canonicalized: defaults are filled in as
//! synthetic number nodes with id 0, and eased timing tables are expanded when
//! the duration is a literal.
//!
//! Conversion never evaluates anything, so it has no side effects.

use crate::cell::NumericCell;
use crate::config::RuntimeConfig;
use crate::error::{GraphError, Result};
use crate::node::{CompareOp, MultiOp, Node, NodeId, NodeKind, UnaryOp};
use crate::params::AnimationParams;
use animexpr_motion::{Easing, SpringConfig};
use serde::{Deserialize, Serialize};

/// A node of a plain tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlainNode {
    /// Id of the source node; 0 for synthesized defaults
    pub node_id: u64,
    /// Shape and children
    pub kind: PlainKind,
}

/// Shape of a plain node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub enum PlainKind {
    /// Literal
    Number {
        value: f64,
    },
    /// Cell reference by tag
    Value {
        tag: u64,
    },
    /// Left fold over every operand
    Multi {
        op: MultiOp,
        operands: Vec<PlainNode>,
    },
    /// Single-operand operator
    Unary {
        op: UnaryOp,
        v: Box<PlainNode>,
    },
    /// Comparison
    Compare {
        op: CompareOp,
        left: Box<PlainNode>,
        right: Box<PlainNode>,
    },
    /// Conditional
    #[serde(rename_all = "camelCase")]
    Cond {
        expr: Box<PlainNode>,
        if_node: Box<PlainNode>,
        else_node: Box<PlainNode>,
    },
    /// Write into the cell with tag `target`
    Set {
        target: u64,
        source: Box<PlainNode>,
    },
    /// Sequence
    Block {
        nodes: Vec<PlainNode>,
    },
    /// Host call, routed by `callback` (the call node id)
    Call {
        args: Vec<PlainNode>,
        callback: u64,
    },
    /// Procedure call; `params` are the tags of the parameter cells
    CallProc {
        params: Vec<u64>,
        body: Box<PlainNode>,
        args: Vec<PlainNode>,
    },
    /// Timing run; `frames` is set when the duration is a literal short
    /// enough for a frame table
    #[serde(rename_all = "camelCase")]
    Timing {
        target: u64,
        to_value: Box<PlainNode>,
        duration: Box<PlainNode>,
        easing: Easing,
        frames: Option<Vec<f64>>,
        frame_interval_ms: f64,
        on_finish: Option<Box<PlainNode>>,
    },
    /// Spring run
    #[serde(rename_all = "camelCase")]
    Spring {
        target: u64,
        to_value: Box<PlainNode>,
        stiffness: Box<PlainNode>,
        damping: Box<PlainNode>,
        mass: Box<PlainNode>,
        velocity: Box<PlainNode>,
        overshoot_clamping: Box<PlainNode>,
        rest_speed_threshold: Box<PlainNode>,
        rest_displacement_threshold: Box<PlainNode>,
        on_finish: Option<Box<PlainNode>>,
    },
    /// Decay run
    #[serde(rename_all = "camelCase")]
    Decay {
        target: u64,
        velocity: Box<PlainNode>,
        deceleration: Box<PlainNode>,
        on_finish: Option<Box<PlainNode>>,
    },
    /// Clock run
    #[serde(rename_all = "camelCase")]
    Clock {
        target: u64,
        on_finish: Option<Box<PlainNode>>,
    },
    /// Stop a run
    StopAnimation {
        run: Box<PlainNode>,
    },
    /// Positional formatting
    Format {
        format: String,
        args: Vec<PlainNode>,
    },
    /// Logical view of a number
    CastBoolean {
        v: Box<PlainNode>,
    },
}

impl PlainNode {
    /// Wire type name, identical to the source node's
    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            PlainKind::Number { .. } => "number",
            PlainKind::Value { .. } => "value",
            PlainKind::Multi { op, .. } => op.as_str(),
            PlainKind::Unary { op, .. } => op.as_str(),
            PlainKind::Compare { op, .. } => op.as_str(),
            PlainKind::Cond { .. } => "cond",
            PlainKind::Set { .. } => "set",
            PlainKind::Block { .. } => "block",
            PlainKind::Call { .. } => "call",
            PlainKind::CallProc { .. } => "callProc",
            PlainKind::Timing { .. } => "timing",
            PlainKind::Spring { .. } => "spring",
            PlainKind::Decay { .. } => "decay",
            PlainKind::Clock { .. } => "clock",
            PlainKind::StopAnimation { .. } => "stopAnimation",
            PlainKind::Format { .. } => "format",
            PlainKind::CastBoolean { .. } => "castBoolean",
        }
    }

    /// Encode as JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from JSON
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Encode as pretty RON
    pub fn to_ron(&self) -> Result<String> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    /// Decode from RON
    pub fn from_ron(text: &str) -> Result<Self> {
        Ok(ron::from_str(text)?)
    }

    /// Encode as bincode
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode from bincode
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    fn synthetic(value: f64) -> Box<Self> {
        Box::new(Self {
            node_id: NodeId::SYNTHETIC.0,
            kind: PlainKind::Number { value },
        })
    }
}

/// Convert the graph rooted at `node`
pub fn serialize(node: &Node, config: &RuntimeConfig) -> Result<PlainNode> {
    Converter { config }.convert(node)
}

/// Convert an optional root; a missing root is [`GraphError::ValueNotDefined`]
pub fn serialize_optional(node: Option<&Node>, config: &RuntimeConfig) -> Result<PlainNode> {
    serialize(node.ok_or(GraphError::ValueNotDefined)?, config)
}

struct Converter<'a> {
    config: &'a RuntimeConfig,
}

impl Converter<'_> {
    fn convert(&self, node: &Node) -> Result<PlainNode> {
        let kind = match node.kind() {
            NodeKind::Number(value) => PlainKind::Number { value: *value },
            NodeKind::Value(cell) => PlainKind::Value { tag: cell.tag().0 },
            NodeKind::Multi { op, operands } => {
                match operands.len() {
                    0 => return Err(GraphError::missing("a", op.as_str())),
                    1 => return Err(GraphError::missing("b", op.as_str())),
                    _ => {}
                }
                PlainKind::Multi {
                    op: *op,
                    operands: self.convert_all(operands)?,
                }
            }
            NodeKind::Unary { op, v } => PlainKind::Unary {
                op: *op,
                v: self.boxed(v)?,
            },
            NodeKind::Compare { op, left, right } => PlainKind::Compare {
                op: *op,
                left: self.boxed(left)?,
                right: self.boxed(right)?,
            },
            NodeKind::Cond {
                expr,
                if_node,
                else_node,
            } => PlainKind::Cond {
                expr: self.boxed(expr)?,
                if_node: self.boxed(if_node)?,
                else_node: self.boxed(else_node)?,
            },
            NodeKind::Set { target, source } => PlainKind::Set {
                target: target_tag(target, "set")?,
                source: self.boxed(source)?,
            },
            NodeKind::Block { nodes } => PlainKind::Block {
                nodes: self.convert_all(nodes)?,
            },
            NodeKind::Call { args, .. } => PlainKind::Call {
                args: self.convert_all(args)?,
                callback: node.id().0,
            },
            NodeKind::CallProc { procedure, args } => {
                if args.len() != procedure.arity() {
                    return Err(GraphError::ArityMismatch {
                        expected: procedure.arity(),
                        got: args.len(),
                    });
                }
                PlainKind::CallProc {
                    params: procedure.params().iter().map(|p| p.tag().0).collect(),
                    body: self.boxed(procedure.body())?,
                    args: self.convert_all(args)?,
                }
            }
            NodeKind::Animation {
                target,
                params,
                on_finish,
            } => self.animation(target, params, on_finish.as_ref())?,
            NodeKind::StopAnimation { run } => PlainKind::StopAnimation {
                run: self.boxed(run)?,
            },
            NodeKind::Format { format, args } => PlainKind::Format {
                format: format.clone(),
                args: self.convert_all(args)?,
            },
            NodeKind::CastBoolean { v } => PlainKind::CastBoolean { v: self.boxed(v)? },
        };
        Ok(PlainNode {
            node_id: node.id().0,
            kind,
        })
    }

    fn boxed(&self, node: &Node) -> Result<Box<PlainNode>> {
        self.convert(node).map(Box::new)
    }

    fn convert_all(&self, nodes: &[Node]) -> Result<Vec<PlainNode>> {
        nodes.iter().map(|node| self.convert(node)).collect()
    }

    fn or_default(&self, node: &Option<Node>, default: f64) -> Result<Box<PlainNode>> {
        match node {
            Some(node) => self.boxed(node),
            None => Ok(PlainNode::synthetic(default)),
        }
    }

    fn animation(
        &self,
        target: &Node,
        params: &AnimationParams,
        on_finish: Option<&Node>,
    ) -> Result<PlainKind> {
        let target = target_tag(target, params.type_name())?;
        let on_finish = on_finish.map(|node| self.boxed(node)).transpose()?;
        Ok(match params {
            AnimationParams::Timing(p) => {
                let frames = match p.duration.kind() {
                    NodeKind::Number(duration) => {
                        p.easing.frames(*duration, self.config.frame_interval_ms)
                    }
                    _ => None,
                };
                PlainKind::Timing {
                    target,
                    to_value: self.boxed(&p.to_value)?,
                    duration: self.boxed(&p.duration)?,
                    easing: p.easing,
                    frames,
                    frame_interval_ms: self.config.frame_interval_ms,
                    on_finish,
                }
            }
            AnimationParams::Spring(p) => PlainKind::Spring {
                target,
                to_value: self.boxed(&p.to_value)?,
                stiffness: self.or_default(&p.stiffness, SpringConfig::DEFAULT_STIFFNESS)?,
                damping: self.or_default(&p.damping, SpringConfig::DEFAULT_DAMPING)?,
                mass: self.or_default(&p.mass, SpringConfig::DEFAULT_MASS)?,
                velocity: self.or_default(&p.velocity, 0.0)?,
                overshoot_clamping: self.or_default(&p.overshoot_clamping, 0.0)?,
                rest_speed_threshold: self
                    .or_default(&p.rest_speed_threshold, SpringConfig::DEFAULT_REST_THRESHOLD)?,
                rest_displacement_threshold: self.or_default(
                    &p.rest_displacement_threshold,
                    SpringConfig::DEFAULT_REST_THRESHOLD,
                )?,
                on_finish,
            },
            AnimationParams::Decay(p) => PlainKind::Decay {
                target,
                velocity: self.boxed(&p.velocity)?,
                deceleration: self.or_default(&p.deceleration, self.config.default_deceleration)?,
                on_finish,
            },
            AnimationParams::Clock => PlainKind::Clock { target, on_finish },
        })
    }
}

fn target_tag(target: &Node, node_type: &'static str) -> Result<u64> {
    target
        .as_cell()
        .map(|cell| cell.tag().0)
        .ok_or(GraphError::InvalidTarget { node_type })
}
