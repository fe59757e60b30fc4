// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph compilation and evaluation.
//!
//! A graph is compiled once into a tree of thunks, closures that read live
//! cell values every time they run. Compilation is memoized by node identity
//! within one [`Compiler`], so a node shared by several parents is compiled once per
//! graph instance. Stateful operators (`diff`) keep their state inside the
//! compiled closure, which makes that state private to the instance.

use crate::animation::{Animator, Completion, RunId};
use crate::cell::NumericCell;
use crate::config::RuntimeConfig;
use crate::error::{GraphError, Result};
use crate::node::{truthy, Node, NodeKind, UnaryOp};
use crate::runtime::Runtime;
use crate::trace::TraceLog;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Zero-argument closure producing a node's current value
pub type Thunk = Arc<dyn Fn() -> Result<f64> + Send + Sync>;

/// Zero-argument closure rendering a format node
pub type TextThunk = Arc<dyn Fn() -> Result<String> + Send + Sync>;

/// A fully compiled graph
#[derive(Clone)]
pub struct CompiledGraph {
    root: Thunk,
    text: Option<TextThunk>,
}

impl CompiledGraph {
    /// Evaluate the root
    pub fn evaluate(&self) -> Result<f64> {
        (self.root)()
    }

    /// Render the root: format roots produce their text, any other root its
    /// numeric value
    pub fn render(&self) -> Result<String> {
        match &self.text {
            Some(text) => text(),
            None => Ok(format_number((self.root)()?)),
        }
    }
}

/// Compiles nodes into thunks, memoizing by node identity
pub struct Compiler {
    config: RuntimeConfig,
    animator: Arc<Animator>,
    trace: Option<Arc<TraceLog>>,
    // Keyed by `Node::ptr_key`; the node is kept so the key stays unique.
    memo: HashMap<usize, (Node, Thunk)>,
}

impl Compiler {
    /// Create a compiler for graphs running on `runtime`
    pub fn new(runtime: &Runtime, trace: Option<Arc<TraceLog>>) -> Self {
        Self {
            config: runtime.config().clone(),
            animator: runtime.animator().clone(),
            trace,
            memo: HashMap::new(),
        }
    }

    /// Compile a whole graph
    pub fn compile_graph(mut self, root: &Node) -> Result<CompiledGraph> {
        let thunk = self.compile(root)?;
        let text = match root.kind() {
            NodeKind::Format { format, args } => {
                let args = self.compile_all(args)?;
                let format = format.clone();
                let text: TextThunk = Arc::new(move || {
                    let values = args.iter().map(|arg| arg()).collect::<Result<Vec<_>>>()?;
                    Ok(render_format(&format, &values))
                });
                Some(text)
            }
            _ => None,
        };
        Ok(CompiledGraph { root: thunk, text })
    }

    /// Compile one node, reusing an earlier compilation of the same node
    pub fn compile(&mut self, node: &Node) -> Result<Thunk> {
        if let Some((_, thunk)) = self.memo.get(&node.ptr_key()) {
            return Ok(thunk.clone());
        }
        let thunk = self.build(node)?;
        let thunk = self.traced(node, thunk);
        self.memo.insert(node.ptr_key(), (node.clone(), thunk.clone()));
        Ok(thunk)
    }

    fn compile_all(&mut self, nodes: &[Node]) -> Result<Vec<Thunk>> {
        nodes.iter().map(|node| self.compile(node)).collect()
    }

    fn traced(&self, node: &Node, inner: Thunk) -> Thunk {
        let Some(log) = self.trace.clone() else {
            return inner;
        };
        let (node_id, node_type) = (node.id(), node.type_name());
        Arc::new(move || {
            let Some(frame) = log.enter() else {
                return inner();
            };
            match inner() {
                Ok(value) => {
                    log.exit(frame, node_id, node_type, value);
                    Ok(value)
                }
                Err(err) => {
                    log.abort(frame);
                    Err(err)
                }
            }
        })
    }

    fn build(&mut self, node: &Node) -> Result<Thunk> {
        let thunk: Thunk = match node.kind() {
            NodeKind::Number(value) => {
                let value = *value;
                Arc::new(move || Ok(value))
            }
            NodeKind::Value(cell) => {
                let cell = cell.clone();
                Arc::new(move || Ok(cell.value()))
            }
            NodeKind::Multi { op, operands } => {
                match operands.len() {
                    0 => return Err(GraphError::missing("a", op.as_str())),
                    1 => return Err(GraphError::missing("b", op.as_str())),
                    _ => {}
                }
                let operands = self.compile_all(operands)?;
                let op = *op;
                Arc::new(move || {
                    let mut acc = operands[0]()?;
                    for operand in &operands[1..] {
                        acc = op.apply(acc, operand()?);
                    }
                    Ok(acc)
                })
            }
            NodeKind::Unary {
                op: UnaryOp::Diff,
                v,
            } => {
                let v = self.compile(v)?;
                let previous: Mutex<Option<f64>> = Mutex::new(None);
                Arc::new(move || {
                    let current = v()?;
                    let mut previous = previous.lock();
                    let delta = (*previous).map_or(0.0, |last| current - last);
                    *previous = Some(current);
                    Ok(delta)
                })
            }
            NodeKind::Unary { op, v } => {
                let v = self.compile(v)?;
                let op = *op;
                Arc::new(move || Ok(op.apply(v()?)))
            }
            NodeKind::Compare { op, left, right } => {
                let (left, right) = (self.compile(left)?, self.compile(right)?);
                let op = *op;
                Arc::new(move || Ok(op.apply(left()?, right()?)))
            }
            NodeKind::Cond {
                expr,
                if_node,
                else_node,
            } => {
                let expr = self.compile(expr)?;
                let if_node = self.compile(if_node)?;
                let else_node = self.compile(else_node)?;
                Arc::new(move || {
                    if truthy(expr()?) {
                        if_node()
                    } else {
                        else_node()
                    }
                })
            }
            NodeKind::Set { target, source } => {
                let cell = target
                    .as_cell()
                    .cloned()
                    .ok_or(GraphError::InvalidTarget { node_type: "set" })?;
                let source = self.compile(source)?;
                Arc::new(move || {
                    let value = source()?;
                    cell.set_value(value);
                    Ok(value)
                })
            }
            NodeKind::Block { nodes } => {
                let nodes = self.compile_all(nodes)?;
                Arc::new(move || {
                    let mut last = 0.0;
                    for node in &nodes {
                        last = node()?;
                    }
                    Ok(last)
                })
            }
            NodeKind::Call { args, callback } => {
                let args = self.compile_all(args)?;
                let callback = callback.clone();
                Arc::new(move || {
                    let values = args.iter().map(|arg| arg()).collect::<Result<Vec<_>>>()?;
                    callback.invoke(&values);
                    Ok(0.0)
                })
            }
            NodeKind::CallProc { procedure, args } => {
                if args.len() != procedure.arity() {
                    return Err(GraphError::ArityMismatch {
                        expected: procedure.arity(),
                        got: args.len(),
                    });
                }
                let args = self.compile_all(args)?;
                let body = self.compile(procedure.body())?;
                let params = procedure.params().to_vec();
                Arc::new(move || {
                    let values = args.iter().map(|arg| arg()).collect::<Result<Vec<_>>>()?;
                    for (param, value) in params.iter().zip(values) {
                        param.store_silent(value);
                    }
                    body()
                })
            }
            NodeKind::Animation {
                target,
                params,
                on_finish,
            } => {
                let cell = target
                    .as_cell()
                    .cloned()
                    .ok_or(GraphError::InvalidTarget {
                        node_type: params.type_name(),
                    })?;
                let mut inputs = HashMap::new();
                for input in params.nodes() {
                    inputs.insert(input.ptr_key(), self.compile(input)?);
                }
                let on_finish = on_finish.as_ref().map(|n| self.compile(n)).transpose()?;
                let params = params.clone();
                let config = self.config.clone();
                let animator = self.animator.clone();
                Arc::new(move || {
                    let motion = params.canonical(
                        |input| match inputs.get(&input.ptr_key()) {
                            Some(thunk) => thunk(),
                            None => Err(GraphError::ValueNotDefined),
                        },
                        &config,
                    )?;
                    let completion = on_finish.clone().map(|thunk| -> Completion {
                        Box::new(move || {
                            if let Err(err) = thunk() {
                                tracing::error!(%err, "animation completion failed");
                            }
                        })
                    });
                    let run = animator.start(cell.clone(), &motion, completion)?;
                    Ok(run.as_value())
                })
            }
            NodeKind::StopAnimation { run } => {
                let run = self.compile(run)?;
                let animator = self.animator.clone();
                Arc::new(move || {
                    let stopped = RunId::from_value(run()?).is_some_and(|id| animator.stop(id));
                    Ok(if stopped { 1.0 } else { 0.0 })
                })
            }
            NodeKind::Format { args, .. } => {
                let args = self.compile_all(args)?;
                Arc::new(move || {
                    for arg in &args {
                        arg()?;
                    }
                    Ok(0.0)
                })
            }
            NodeKind::CastBoolean { v } => {
                let v = self.compile(v)?;
                Arc::new(move || Ok(if truthy(v()?) { 1.0 } else { 0.0 }))
            }
        };
        Ok(thunk)
    }
}

fn format_number(value: f64) -> String {
    format!("{value}")
}

/// Substitute `values` positionally into `format`.
///
/// `%f` and `%s` print the value, `%d` prints it truncated to an integer and
/// `%%` prints a percent sign. Placeholders without a value are kept as-is.
pub fn render_format(format: &str, values: &[f64]) -> String {
    let mut out = String::with_capacity(format.len());
    let mut values = values.iter();
    let mut chars = format.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('%') => {
                chars.next();
                out.push('%');
            }
            Some(placeholder @ ('f' | 's' | 'd')) => {
                chars.next();
                match values.next() {
                    Some(value) if placeholder == 'd' => {
                        out.push_str(&format_number(value.trunc() + 0.0));
                    }
                    Some(value) => out.push_str(&format_number(*value)),
                    None => {
                        out.push('%');
                        out.push(placeholder);
                    }
                }
            }
            _ => out.push('%'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::AnimatedValue;
    use crate::factories::*;
    use crate::node::NodeId;
    use crate::params::TimingParams;

    fn eval(node: &Node) -> f64 {
        let runtime = Runtime::default();
        Compiler::new(&runtime, None)
            .compile_graph(node)
            .unwrap()
            .evaluate()
            .unwrap()
    }

    #[test]
    fn test_literals() {
        for n in [0.0, -1.5, 42.0, 1e9] {
            assert_eq!(eval(&number(n)), n);
        }
    }

    #[test]
    fn test_left_fold_order() {
        assert_eq!(eval(&sub_all([100, 10, 10])), 80.0);
        assert_eq!(eval(&divide_all([100, 2, 2, 5])), 5.0);
        assert_eq!(eval(&pow_all([2, 2, 2])), 16.0);
        assert_eq!(eval(&modulo_all([20, 8, 3])), 1.0);
        assert_eq!(eval(&add(10, multiply(10, 10))), 110.0);
    }

    #[test]
    fn test_logic_yields_flags() {
        assert_eq!(eval(&and_all([20, 8, 3])), 1.0);
        assert_eq!(eval(&and_all([0, 8, 3])), 0.0);
        assert_eq!(eval(&or(0, 5)), 1.0);
        assert_eq!(eval(&not(5)), 0.0);
        assert_eq!(eval(&eq(1, 1)), 1.0);
        assert_eq!(eval(&eq(1, 200)), 0.0);
        assert_eq!(eval(&greater_or_eq(100, 100)), 1.0);
        assert_eq!(eval(&less_than(2, 1)), 0.0);
        assert_eq!(eval(&cast_boolean(-3)), 1.0);
    }

    #[test]
    fn test_cond_runs_selected_branch_only() {
        let cell = AnimatedValue::new(0.0);
        assert_eq!(eval(&cond(1, 100, set(&cell, 5))), 100.0);
        assert_eq!(cell.value(), 0.0);
        assert_eq!(eval(&cond(0, 100, 0)), 0.0);
        assert_eq!(eval(&cond_if(0, 100)), 0.0);
    }

    #[test]
    fn test_set_and_block() {
        let cell = AnimatedValue::new(0.0);
        assert_eq!(eval(&set(&cell, 100)), 100.0);
        assert_eq!(cell.value(), 100.0);
        assert_eq!(eval(&block([10, 100])), 100.0);
        assert_eq!(eval(&block(vec![vec![10, 100]])), 100.0);
        assert_eq!(eval(&block(Vec::<f64>::new())), 0.0);
    }

    #[test]
    fn test_call_passes_values_and_yields_zero() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let node = call([1, 2], move |values| sink.lock().extend_from_slice(values));
        assert_eq!(eval(&node), 0.0);
        assert_eq!(*seen.lock(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_shared_nodes_compile_once() {
        let shared = add(10, 10);
        let a1 = add(&shared, 10);
        let a2 = add(&shared, 20);
        let runtime = Runtime::default();
        let mut compiler = Compiler::new(&runtime, None);
        let t1 = compiler.compile(&a1).unwrap();
        let t2 = compiler.compile(&a2).unwrap();
        assert_eq!(compiler.memo.len(), 7);
        assert_eq!(t1().unwrap(), 30.0);
        assert_eq!(t2().unwrap(), 40.0);
    }

    #[test]
    fn test_nodes_with_equal_ids_compile_separately() {
        let a = Node::with_id(NodeId(1), NodeKind::Number(1.0));
        let b = Node::with_id(NodeId(1), NodeKind::Number(2.0));
        assert_eq!(eval(&add(&a, &b)), 3.0);

        let target = AnimatedValue::new(0.0);
        let to_value = Node::with_id(NodeId(2), NodeKind::Number(5.0));
        let duration = Node::with_id(NodeId(2), NodeKind::Number(0.0));
        let runtime = Runtime::default();
        let run = Compiler::new(&runtime, None)
            .compile_graph(&start_timing(&target, TimingParams::new(&to_value, &duration)))
            .unwrap()
            .evaluate()
            .unwrap();
        assert!(run >= 1.0);
        runtime.tick(0.0);
        assert_eq!(target.value(), 5.0);
    }

    #[test]
    fn test_long_timing_run_starts() {
        let target = AnimatedValue::new(0.0);
        let runtime = Runtime::default();
        let run = Compiler::new(&runtime, None)
            .compile_graph(&start_timing(&target, TimingParams::new(1, 1e13)))
            .unwrap()
            .evaluate()
            .unwrap();
        assert!(run >= 1.0);
        assert_eq!(runtime.animator().len(), 1);
    }

    #[test]
    fn test_diff_state_is_per_compilation() {
        let cell = AnimatedValue::new(5.0);
        let node = diff(&cell);
        let runtime = Runtime::default();
        let first = Compiler::new(&runtime, None).compile_graph(&node).unwrap();
        let second = Compiler::new(&runtime, None).compile_graph(&node).unwrap();

        assert_eq!(first.evaluate().unwrap(), 0.0);
        cell.set_value(15.0);
        assert_eq!(first.evaluate().unwrap(), 10.0);
        assert_eq!(second.evaluate().unwrap(), 0.0);
        assert_eq!(first.evaluate().unwrap(), 0.0);
    }

    #[test]
    fn test_procedures() {
        let proc = proc_fn(2, |p| add(&p[0], &p[1]));
        assert_eq!(eval(&proc.call([10, 20])), 30.0);

        let (a, b) = (AnimatedValue::new(10.0), AnimatedValue::new(20.0));
        assert_eq!(eval(&proc.call([&a, &b])), 30.0);

        let runtime = Runtime::default();
        let err = Compiler::new(&runtime, None)
            .compile_graph(&proc.call([1]))
            .err();
        assert!(matches!(
            err,
            Some(GraphError::ArityMismatch { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn test_structural_errors_name_field_and_type() {
        let runtime = Runtime::default();
        let compile = |node: &Node| Compiler::new(&runtime, None).compile_graph(node).err();

        let err = compile(&add_all([1])).map(|e| e.to_string());
        assert_eq!(err.as_deref(), Some("b missing in add"));
        assert!(matches!(
            compile(&set(5, 1)),
            Some(GraphError::InvalidTarget { node_type: "set" })
        ));
        assert!(matches!(
            compile(&start_clock(1)),
            Some(GraphError::InvalidTarget { node_type: "clock" })
        ));
    }

    #[test]
    fn test_render_format() {
        assert_eq!(render_format("x=%f y=%d", &[1.5, 2.7]), "x=1.5 y=2");
        assert_eq!(render_format("100%% %s %f", &[3.0]), "100% 3 %f");
        assert_eq!(render_format("%d %d %d", &[-0.5, 3.7, -3.7]), "0 3 -3");
    }

    #[test]
    fn test_trace_records_post_order() {
        let runtime = Runtime::default();
        let log = Arc::new(TraceLog::new(true));
        let node = add(1, multiply(2, 3));
        let compiled = Compiler::new(&runtime, Some(log.clone()))
            .compile_graph(&node)
            .unwrap();
        assert_eq!(compiled.evaluate().unwrap(), 7.0);

        let entries = log.entries();
        assert_eq!(entries.len(), 5);
        let last = entries.last().unwrap();
        assert_eq!(last.node_type, "add");
        assert_eq!(last.inputs, vec![1.0, 6.0]);
        assert_eq!(last.output, 7.0);
    }
}
