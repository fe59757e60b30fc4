// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared services for graph instances.

use crate::animation::Animator;
use crate::callbacks::CallbackRouter;
use crate::config::RuntimeConfig;
use crate::expression::Expression;
use crate::node::Node;
use std::sync::Arc;

struct RuntimeInner {
    config: RuntimeConfig,
    animator: Arc<Animator>,
    callbacks: Arc<CallbackRouter>,
}

/// Cheaply clonable handle to the run table, callback router and
/// configuration shared by a set of graph instances
#[derive(Clone)]
pub struct Runtime(Arc<RuntimeInner>);

impl Runtime {
    /// Create a runtime
    pub fn new(config: RuntimeConfig) -> Self {
        Self(Arc::new(RuntimeInner {
            config,
            animator: Arc::new(Animator::new()),
            callbacks: Arc::new(CallbackRouter::new()),
        }))
    }

    /// Configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.0.config
    }

    /// Run table
    pub fn animator(&self) -> &Arc<Animator> {
        &self.0.animator
    }

    /// Callback router
    pub fn callbacks(&self) -> &Arc<CallbackRouter> {
        &self.0.callbacks
    }

    /// Create a graph instance over `root`
    pub fn expression(&self, root: Node) -> Expression {
        Expression::new(self.clone(), root)
    }

    /// Advance every animation run to `now_ms`
    pub fn tick(&self, now_ms: f64) -> usize {
        self.0.animator.tick(now_ms)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.0.config)
            .field("runs", &self.0.animator.len())
            .field("routes", &self.0.callbacks.len())
            .finish()
    }
}
