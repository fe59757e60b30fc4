// SPDX-License-Identifier: MIT OR Apache-2.0
//! Optional per-instance evaluation trace.

use crate::node::NodeId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// One visited node: its inputs are the outputs of its traced children
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEntry {
    /// Node id
    pub node_id: NodeId,
    /// Wire type name
    pub node_type: String,
    /// Child outputs in evaluation order
    pub inputs: Vec<f64>,
    /// Node output
    pub output: f64,
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}(", self.node_type, self.node_id)?;
        for (i, input) in self.inputs.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{input}")?;
        }
        write!(f, ") = {}", self.output)
    }
}

/// Append-only log of trace entries, recorded post-order
#[derive(Debug, Default)]
pub struct TraceLog {
    enabled: AtomicBool,
    entries: Mutex<Vec<TraceEntry>>,
    frames: Mutex<Vec<Vec<f64>>>,
}

/// Marker returned by [`TraceLog::enter`] for an active frame
#[derive(Debug)]
pub(crate) struct TraceFrame(());

impl TraceLog {
    /// Create a log, recording or not
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            ..Self::default()
        }
    }

    /// Whether new evaluations are recorded
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Turn recording on or off
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Snapshot of every entry
    pub fn entries(&self) -> Vec<TraceEntry> {
        self.entries.lock().clone()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no entry was recorded
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Open a frame for a node about to be evaluated
    pub(crate) fn enter(&self) -> Option<TraceFrame> {
        if !self.is_enabled() {
            return None;
        }
        self.frames.lock().push(Vec::new());
        Some(TraceFrame(()))
    }

    /// Close the innermost frame and record the node
    pub(crate) fn exit(&self, _frame: TraceFrame, node_id: NodeId, node_type: &str, output: f64) {
        let inputs = {
            let mut frames = self.frames.lock();
            let inputs = frames.pop().unwrap_or_default();
            if let Some(parent) = frames.last_mut() {
                parent.push(output);
            }
            inputs
        };
        tracing::trace!(node = %node_id, node_type, ?inputs, output, "evaluated node");
        self.entries.lock().push(TraceEntry {
            node_id,
            node_type: node_type.to_string(),
            inputs,
            output,
        });
    }

    /// Close the innermost frame of a node whose evaluation failed
    pub(crate) fn abort(&self, _frame: TraceFrame) {
        self.frames.lock().pop();
    }
}
