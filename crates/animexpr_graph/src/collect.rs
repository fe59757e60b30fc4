// SPDX-License-Identifier: MIT OR Apache-2.0
//! Dependency discovery for attach/detach.

use crate::cell::{CellHandle, CellTag, NumericCell};
use crate::node::{HostCallback, Node, NodeId, NodeKind};
use crate::procedure::Procedure;
use indexmap::IndexMap;
use std::collections::HashSet;

/// Everything a graph instance has to subscribe or register when attached
#[derive(Debug, Default, Clone)]
pub struct Dependencies {
    /// Cells read or written by the graph, keyed by tag
    pub cells: IndexMap<CellTag, CellHandle>,
    /// Host callbacks keyed by the id of their call node
    pub callbacks: IndexMap<NodeId, HostCallback>,
    /// Procedures called by the graph, keyed by [`Procedure::ptr_key`]
    pub procedures: IndexMap<usize, Procedure>,
}

impl Dependencies {
    /// Whether the graph depends on nothing
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty() && self.callbacks.is_empty() && self.procedures.is_empty()
    }
}

/// Collect the dependencies of the graph rooted at `root`.
///
/// Each node is visited once however many parents share it. Parameter cells of
/// called procedures are excluded: they belong to the procedure, while the
/// argument nodes and the rest of the body are dependencies of the caller.
pub fn collect(root: &Node) -> Dependencies {
    let mut collector = Collector::default();
    collector.visit(root);
    collector.deps
}

#[derive(Default)]
struct Collector {
    deps: Dependencies,
    visited: HashSet<usize>,
    params: HashSet<CellTag>,
}

impl Collector {
    fn visit(&mut self, root: &Node) {
        let mut stack = vec![root.clone()];
        while let Some(node) = stack.pop() {
            if !self.visited.insert(node.ptr_key()) {
                continue;
            }
            match node.kind() {
                NodeKind::Value(cell) => {
                    if !self.params.contains(&cell.tag()) {
                        self.deps.cells.entry(cell.tag()).or_insert_with(|| cell.clone());
                    }
                }
                NodeKind::Call { callback, .. } => {
                    self.deps.callbacks.insert(node.id(), callback.clone());
                }
                NodeKind::CallProc { procedure, .. } => {
                    if !self.deps.procedures.contains_key(&procedure.ptr_key()) {
                        self.deps.procedures.insert(procedure.ptr_key(), procedure.clone());
                        for param in procedure.params() {
                            self.params.insert(param.tag());
                            self.deps.cells.shift_remove(&param.tag());
                        }
                        stack.push(procedure.body().clone());
                    }
                }
                _ => {}
            }
            // Reverse so children are visited in slot order.
            stack.extend(node.children().into_iter().rev().cloned());
        }
    }
}
