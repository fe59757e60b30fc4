// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph instances: a root node plus its attach state and compiled cache.

use crate::cell::{CellHandle, NumericCell, SubscriptionId};
use crate::collect::{collect, Dependencies};
use crate::convert::{serialize, PlainNode};
use crate::error::Result;
use crate::evaluation::{CompiledGraph, Compiler};
use crate::node::Node;
use crate::runtime::Runtime;
use crate::trace::TraceLog;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Unique identifier for a graph instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub Uuid);

impl InstanceId {
    /// Create a new random instance ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct Attachment {
    deps: Dependencies,
    subscriptions: Vec<(CellHandle, SubscriptionId)>,
}

/// One graph instance.
///
/// Compiled closures and the private state of stateful operators belong to
/// the instance, so two instances over the same nodes never share `diff`
/// history.
pub struct Expression {
    id: InstanceId,
    root: Node,
    runtime: Runtime,
    compiled: Mutex<Option<CompiledGraph>>,
    attachment: Mutex<Option<Attachment>>,
    invalidated: Arc<AtomicBool>,
    trace: Arc<TraceLog>,
}

impl Expression {
    /// Create a detached instance over `root`
    pub fn new(runtime: Runtime, root: Node) -> Self {
        let trace = Arc::new(TraceLog::new(runtime.config().trace_enabled));
        Self {
            id: InstanceId::new(),
            root,
            runtime,
            compiled: Mutex::new(None),
            attachment: Mutex::new(None),
            invalidated: Arc::new(AtomicBool::new(false)),
            trace,
        }
    }

    /// Instance id
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// Root node
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Runtime this instance runs on
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Whether [`Expression::attach`] is in effect
    pub fn is_attached(&self) -> bool {
        self.attachment.lock().is_some()
    }

    /// Subscribe to every cell the graph uses, register its host callbacks
    /// and attach its procedures. Does nothing when already attached.
    pub fn attach(&self) {
        let mut attachment = self.attachment.lock();
        if attachment.is_some() {
            return;
        }
        let deps = collect(&self.root);
        let mut subscriptions = Vec::with_capacity(deps.cells.len());
        for cell in deps.cells.values() {
            let invalidated = self.invalidated.clone();
            let id = cell.subscribe(Arc::new(move |_| {
                invalidated.store(true, Ordering::Release);
            }));
            subscriptions.push((cell.clone(), id));
        }
        let router = self.runtime.callbacks();
        for (node_id, callback) in &deps.callbacks {
            router.register(self.id, *node_id, callback.clone());
        }
        for procedure in deps.procedures.values() {
            procedure.attach(self.id, self.invalidated.clone());
        }
        tracing::debug!(
            instance = %self.id,
            cells = deps.cells.len(),
            callbacks = deps.callbacks.len(),
            procedures = deps.procedures.len(),
            "attached expression"
        );
        *attachment = Some(Attachment {
            deps,
            subscriptions,
        });
    }

    /// Reverse [`Expression::attach`] and drop the compiled cache
    pub fn detach(&self) {
        let Some(attachment) = self.attachment.lock().take() else {
            return;
        };
        for (cell, id) in attachment.subscriptions {
            cell.unsubscribe(id);
        }
        self.runtime.callbacks().unregister_instance(self.id);
        for procedure in attachment.deps.procedures.values() {
            procedure.detach(self.id);
        }
        self.compiled.lock().take();
        tracing::debug!(instance = %self.id, "detached expression");
    }

    fn compiled(&self) -> Result<CompiledGraph> {
        let mut compiled = self.compiled.lock();
        if let Some(graph) = compiled.as_ref() {
            return Ok(graph.clone());
        }
        let graph = Compiler::new(&self.runtime, Some(self.trace.clone())).compile_graph(&self.root)?;
        *compiled = Some(graph.clone());
        Ok(graph)
    }

    /// Evaluate the graph. The first call compiles it; later calls reuse the
    /// compiled closures and read live cell values.
    pub fn evaluate(&self) -> Result<f64> {
        let graph = self.compiled()?;
        self.invalidated.store(false, Ordering::Release);
        graph.evaluate()
    }

    /// Evaluate and render the graph as text
    pub fn evaluate_text(&self) -> Result<String> {
        let graph = self.compiled()?;
        self.invalidated.store(false, Ordering::Release);
        graph.render()
    }

    /// Convert the graph to its plain form without evaluating anything
    pub fn serialize(&self) -> Result<PlainNode> {
        serialize(&self.root, self.runtime.config())
    }

    /// Whether a dependency changed since the last evaluation
    pub fn is_invalidated(&self) -> bool {
        self.invalidated.load(Ordering::Acquire)
    }

    /// Read and clear the invalidation flag
    pub fn take_invalidated(&self) -> bool {
        self.invalidated.swap(false, Ordering::AcqRel)
    }

    /// Debug trace of this instance
    pub fn trace(&self) -> &TraceLog {
        &self.trace
    }

    /// Turn the debug trace on or off
    pub fn set_trace_enabled(&self, enabled: bool) {
        self.trace.set_enabled(enabled);
    }
}

impl Drop for Expression {
    fn drop(&mut self) {
        self.detach();
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expression")
            .field("id", &self.id)
            .field("root", &self.root)
            .field("attached", &self.is_attached())
            .finish()
    }
}

/// Evaluate `node` once on a fresh default runtime
pub fn evaluate_once(node: &Node) -> Result<f64> {
    Runtime::default().expression(node.clone()).evaluate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::RunId;
    use crate::cell::AnimatedValue;
    use crate::factories::*;
    use crate::params::{SpringParams, TimingParams};
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_detach_reverses_attach() {
        let x = AnimatedValue::new(1.0);
        let y = AnimatedValue::new(2.0);
        let proc = proc_fn(1, |p| add(&p[0], 1));
        let root = block(crate::operands![set(&y, add(&x, &x)), proc.call([&y]), call([&x], |_| {})]);
        let runtime = Runtime::default();
        let expr = runtime.expression(root);

        expr.attach();
        expr.attach();
        assert_eq!(x.subscriber_count(), 1);
        assert_eq!(y.subscriber_count(), 1);
        assert_eq!(proc.params()[0].subscriber_count(), 1);
        assert_eq!(runtime.callbacks().len(), 1);

        expr.detach();
        assert_eq!(x.subscriber_count(), 0);
        assert_eq!(y.subscriber_count(), 0);
        assert_eq!(proc.params()[0].subscriber_count(), 0);
        assert!(runtime.callbacks().is_empty());
        assert!(!expr.is_attached());
    }

    #[test]
    fn test_drop_detaches() {
        let x = AnimatedValue::new(1.0);
        {
            let expr = Runtime::default().expression(add(&x, 1));
            expr.attach();
            assert_eq!(x.subscriber_count(), 1);
        }
        assert_eq!(x.subscriber_count(), 0);
    }

    #[test]
    fn test_cell_writes_invalidate() {
        let x = AnimatedValue::new(1.0);
        let expr = Runtime::default().expression(multiply(&x, 2));
        expr.attach();
        assert_eq!(expr.evaluate().unwrap(), 2.0);
        assert!(!expr.is_invalidated());

        x.set_value(4.0);
        assert!(expr.take_invalidated());
        assert!(!expr.is_invalidated());
        assert_eq!(expr.evaluate().unwrap(), 8.0);
    }

    #[test]
    fn test_diff_on_fresh_instance() {
        let x = AnimatedValue::new(42.0);
        let expr = Runtime::default().expression(diff(&x));
        expr.attach();
        assert_eq!(expr.evaluate().unwrap(), 0.0);
        x.set_value(52.0);
        assert_eq!(expr.evaluate().unwrap(), 10.0);

        // A second instance over the same node starts over.
        let other = Runtime::default().expression(expr.root().clone());
        assert_eq!(other.evaluate().unwrap(), 0.0);
    }

    #[test]
    fn test_timing_run_with_completion() {
        let runtime = Runtime::default();
        let target = AnimatedValue::new(0.0);
        let done = AnimatedValue::new(0.0);
        let root = start_animation_with(
            &target,
            crate::params::AnimationParams::Timing(TimingParams::new(100, 1000)),
            set(&done, 1),
        );
        let expr = runtime.expression(root);
        let run = expr.evaluate().unwrap();
        assert_eq!(RunId::from_value(run).map(|id| runtime.animator().is_running(id)), Some(true));

        runtime.tick(0.0);
        runtime.tick(500.0);
        assert!((target.value() - 50.0).abs() < 1e-6);
        assert_eq!(done.value(), 0.0);
        runtime.tick(1000.0);
        assert_eq!(target.value(), 100.0);
        assert_eq!(done.value(), 1.0);
        assert!(runtime.animator().is_empty());
    }

    #[test]
    fn test_stop_animation() {
        let runtime = Runtime::default();
        let clock = AnimatedValue::new(0.0);
        let run = AnimatedValue::new(0.0);
        let start = runtime.expression(set(&run, start_clock(&clock)));
        let stop = runtime.expression(stop_clock(&run));

        assert!(start.evaluate().unwrap() >= 1.0);
        runtime.tick(16.0);
        assert_eq!(clock.value(), 16.0);
        assert_eq!(stop.evaluate().unwrap(), 1.0);
        assert_eq!(stop.evaluate().unwrap(), 0.0);
        assert_eq!(evaluate_once(&stop_animation(12345)).unwrap(), 0.0);
    }

    #[test]
    fn test_spring_run_settles() {
        let runtime = Runtime::default();
        let target = AnimatedValue::new(0.0);
        let params = SpringParams::new(1)
            .with_damping(12)
            .with_mass(1)
            .with_stiffness(150);
        runtime.expression(start_spring(&target, params)).evaluate().unwrap();

        let mut now = 0.0;
        while !runtime.animator().is_empty() && now < 5000.0 {
            runtime.tick(now);
            now += 16.0;
        }
        assert!(runtime.animator().is_empty());
        assert_eq!(target.value(), 1.0);
    }

    #[test]
    fn test_invalid_motion_surfaces_from_evaluate() {
        let target = AnimatedValue::new(0.0);
        let node = start_spring(&target, SpringParams::new(1).with_mass(0));
        assert!(matches!(
            evaluate_once(&node),
            Err(crate::error::GraphError::Motion(_))
        ));
    }

    #[test]
    fn test_evaluate_text() {
        let x = AnimatedValue::new(2.5);
        let expr = Runtime::default().expression(format("x is %f", [&x]));
        assert_eq!(expr.evaluate().unwrap(), 0.0);
        assert_eq!(expr.evaluate_text().unwrap(), "x is 2.5");
        let plain = Runtime::default().expression(add(1, 2));
        assert_eq!(plain.evaluate_text().unwrap(), "3");
    }

    #[test]
    fn test_serialize_is_pure() {
        let x = AnimatedValue::new(1.0);
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let root = block(crate::operands![
            set(&x, 5),
            call([&x], move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            }),
        ]);
        let runtime = Runtime::default();
        let expr = runtime.expression(root);
        let first = expr.serialize().unwrap();
        let second = expr.serialize().unwrap();
        assert_eq!(first, second);
        assert_eq!(x.value(), 1.0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(runtime.animator().is_empty());
    }

    #[test]
    fn test_trace_toggle() {
        let expr = Runtime::default().expression(add(1, 2));
        expr.evaluate().unwrap();
        assert!(expr.trace().is_empty());

        expr.set_trace_enabled(true);
        expr.evaluate().unwrap();
        assert_eq!(expr.trace().len(), 3);
        assert_eq!(expr.trace().entries()[2].output, 3.0);
        expr.trace().clear();
        assert!(expr.trace().is_empty());
    }

    #[test]
    fn test_dispatch_through_router() {
        let runtime = Runtime::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let node = call([1], move |values| sink.lock().extend_from_slice(values));
        let expr = runtime.expression(node.clone());
        expr.attach();
        assert!(runtime.callbacks().dispatch(node.id(), &[7.0]));
        assert_eq!(*seen.lock(), vec![7.0]);
        expr.detach();
        assert!(!runtime.callbacks().dispatch(node.id(), &[8.0]));
    }
}
