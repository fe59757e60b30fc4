// SPDX-License-Identifier: MIT OR Apache-2.0
//! Run table for animations started by graph evaluation.
//!
//! Starting a run only registers it; positions are produced when the host
//! calls [`Animator::tick`] once per frame.

use crate::cell::{CellHandle, NumericCell};
use crate::error::Result;
use animexpr_motion::{FrameTime, Integrator, MotionConfig};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier of an animation run. Zero is never issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunId(pub u64);

impl RunId {
    /// Interpret a graph value as a run id
    pub fn from_value(value: f64) -> Option<Self> {
        if value >= 1.0 && value.fract() == 0.0 && value <= u64::MAX as f64 {
            Some(Self(value as u64))
        } else {
            None
        }
    }

    /// The id as a graph value
    pub fn as_value(&self) -> f64 {
        self.0 as f64
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

/// Callback fired when a run finishes on its own
pub type Completion = Box<dyn FnOnce() + Send>;

struct Run {
    kind: &'static str,
    target: CellHandle,
    integrator: Box<dyn Integrator>,
    started_at: Option<f64>,
    on_finish: Option<Completion>,
}

/// Registry of in-flight runs
pub struct Animator {
    next_id: AtomicU64,
    runs: Mutex<IndexMap<RunId, Run>>,
}

impl Animator {
    /// Create an empty animator
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            runs: Mutex::new(IndexMap::new()),
        }
    }

    /// Start a run from the target's current value
    pub fn start(
        &self,
        target: CellHandle,
        config: &MotionConfig,
        on_finish: Option<Completion>,
    ) -> Result<RunId> {
        let integrator = config.integrator(target.value())?;
        let id = RunId(self.next_id.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(run = %id, kind = config.type_name(), target = %target.tag(), "started run");
        self.runs.lock().insert(
            id,
            Run {
                kind: config.type_name(),
                target,
                integrator,
                started_at: None,
                on_finish,
            },
        );
        Ok(id)
    }

    /// Stop a run. Returns `false` for unknown or finished runs. The
    /// completion callback of a stopped run is dropped, not fired.
    pub fn stop(&self, id: RunId) -> bool {
        let removed = self.runs.lock().shift_remove(&id);
        match removed {
            Some(run) => {
                tracing::debug!(run = %id, kind = run.kind, "stopped run");
                true
            }
            None => false,
        }
    }

    /// Whether a run is in flight
    pub fn is_running(&self, id: RunId) -> bool {
        self.runs.lock().contains_key(&id)
    }

    /// Number of runs in flight
    pub fn len(&self) -> usize {
        self.runs.lock().len()
    }

    /// Whether no run is in flight
    pub fn is_empty(&self) -> bool {
        self.runs.lock().is_empty()
    }

    /// Step every run to `now_ms`, write positions into the targets and fire
    /// completions of runs that finished. Returns the number of runs stepped.
    pub fn tick(&self, now_ms: f64) -> usize {
        let mut writes = Vec::new();
        let mut completions = Vec::new();
        {
            let mut runs = self.runs.lock();
            let mut finished = Vec::new();
            for (id, run) in runs.iter_mut() {
                let started_at = *run.started_at.get_or_insert(now_ms);
                let sample = run.integrator.step(FrameTime {
                    now_ms,
                    elapsed_ms: now_ms - started_at,
                });
                writes.push((run.target.clone(), sample.position));
                if sample.finished {
                    finished.push(*id);
                }
            }
            for id in finished {
                if let Some(run) = runs.shift_remove(&id) {
                    tracing::debug!(run = %id, kind = run.kind, "run finished");
                    completions.extend(run.on_finish);
                }
            }
        }

        let stepped = writes.len();
        for (target, position) in writes {
            target.set_value(position);
        }
        for completion in completions {
            completion();
        }
        stepped
    }
}

impl Default for Animator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Animator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Animator").field("runs", &self.len()).finish()
    }
}
