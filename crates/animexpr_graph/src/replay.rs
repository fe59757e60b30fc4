// SPDX-License-Identifier: MIT OR Apache-2.0
//! Reference consumer of plain trees.
//!
//! [`PlainEvaluator`] interprets a [`PlainNode`] the way an external runtime
//! does: cells are looked up by tag, call nodes are routed through the
//! [`CallbackRouter`] and animation statements, which need a host scheduler,
//! are skipped. Evaluating the same graph through [`crate::Expression`] and
//! through its plain tree must give the same numbers.

use crate::callbacks::CallbackRouter;
use crate::cell::{CellHandle, NumericCell};
use crate::collect::Dependencies;
use crate::convert::{PlainKind, PlainNode};
use crate::error::{GraphError, Result};
use crate::evaluation::render_format;
use crate::node::{truthy, NodeId, UnaryOp};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;

/// Cells addressable by tag
#[derive(Debug, Default, Clone)]
pub struct CellRegistry {
    cells: IndexMap<u64, CellHandle>,
}

impl CellRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every cell of `deps`, including procedure parameters
    pub fn from_dependencies(deps: &Dependencies) -> Self {
        let mut registry = Self::new();
        for cell in deps.cells.values() {
            registry.register(cell.clone());
        }
        for procedure in deps.procedures.values() {
            for param in procedure.params() {
                registry.register(param.clone());
            }
        }
        registry
    }

    /// Register a cell under its tag
    pub fn register(&mut self, cell: CellHandle) {
        self.cells.insert(cell.tag().0, cell);
    }

    /// Look up a cell
    pub fn get(&self, tag: u64) -> Result<&CellHandle> {
        self.cells.get(&tag).ok_or(GraphError::UnknownCellTag(tag))
    }

    /// Number of registered cells
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether no cell is registered
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Interpreter over plain trees
#[derive(Debug)]
pub struct PlainEvaluator {
    cells: CellRegistry,
    router: Arc<CallbackRouter>,
    diffs: HashMap<u64, f64>,
}

impl PlainEvaluator {
    /// Create an evaluator resolving cells through `cells` and routing calls
    /// through `router`
    pub fn new(cells: CellRegistry, router: Arc<CallbackRouter>) -> Self {
        Self {
            cells,
            router,
            diffs: HashMap::new(),
        }
    }

    /// Evaluate `node`
    pub fn evaluate(&mut self, node: &PlainNode) -> Result<f64> {
        Ok(match &node.kind {
            PlainKind::Number { value } => *value,
            PlainKind::Value { tag } => self.cells.get(*tag)?.value(),
            PlainKind::Multi { op, operands } => {
                let Some((first, rest)) = operands.split_first() else {
                    return Err(GraphError::missing("a", op.as_str()));
                };
                if rest.is_empty() {
                    return Err(GraphError::missing("b", op.as_str()));
                }
                let mut acc = self.evaluate(first)?;
                for operand in rest {
                    acc = op.apply(acc, self.evaluate(operand)?);
                }
                acc
            }
            PlainKind::Unary {
                op: UnaryOp::Diff,
                v,
            } => {
                let current = self.evaluate(v)?;
                self.diffs
                    .insert(node.node_id, current)
                    .map_or(0.0, |last| current - last)
            }
            PlainKind::Unary { op, v } => op.apply(self.evaluate(v)?),
            PlainKind::Compare { op, left, right } => {
                let left = self.evaluate(left)?;
                op.apply(left, self.evaluate(right)?)
            }
            PlainKind::Cond {
                expr,
                if_node,
                else_node,
            } => {
                if truthy(self.evaluate(expr)?) {
                    self.evaluate(if_node)?
                } else {
                    self.evaluate(else_node)?
                }
            }
            PlainKind::Set { target, source } => {
                let value = self.evaluate(source)?;
                self.cells.get(*target)?.set_value(value);
                value
            }
            PlainKind::Block { nodes } => {
                let mut last = 0.0;
                for child in nodes {
                    last = self.evaluate(child)?;
                }
                last
            }
            PlainKind::Call { args, callback } => {
                let values = self.evaluate_all(args)?;
                self.router.dispatch(NodeId(*callback), &values);
                0.0
            }
            PlainKind::CallProc { params, body, args } => {
                if params.len() != args.len() {
                    return Err(GraphError::ArityMismatch {
                        expected: params.len(),
                        got: args.len(),
                    });
                }
                let values = self.evaluate_all(args)?;
                for (tag, value) in params.iter().zip(values) {
                    self.cells.get(*tag)?.store_silent(value);
                }
                self.evaluate(body)?
            }
            PlainKind::Timing { .. }
            | PlainKind::Spring { .. }
            | PlainKind::Decay { .. }
            | PlainKind::Clock { .. }
            | PlainKind::StopAnimation { .. } => {
                tracing::warn!(
                    node = node.node_id,
                    node_type = node.type_name(),
                    "animation statements are not replayed"
                );
                0.0
            }
            PlainKind::Format { args, .. } => {
                self.evaluate_all(args)?;
                0.0
            }
            PlainKind::CastBoolean { v } => {
                if truthy(self.evaluate(v)?) {
                    1.0
                } else {
                    0.0
                }
            }
        })
    }

    /// Evaluate and render `node`; format nodes produce their text
    pub fn evaluate_text(&mut self, node: &PlainNode) -> Result<String> {
        match &node.kind {
            PlainKind::Format { format, args } => {
                let values = self.evaluate_all(args)?;
                Ok(render_format(format, &values))
            }
            _ => Ok(format!("{}", self.evaluate(node)?)),
        }
    }

    fn evaluate_all(&mut self, nodes: &[PlainNode]) -> Result<Vec<f64>> {
        nodes.iter().map(|node| self.evaluate(node)).collect()
    }
}
