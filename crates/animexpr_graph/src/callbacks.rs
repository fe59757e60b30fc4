// SPDX-License-Identifier: MIT OR Apache-2.0
//! Routing of host callbacks invoked from outside the interpreter.
//!
//! When a graph is evaluated by an external runtime, call nodes cannot run
//! their closures directly. The runtime reports `(node id, values)` instead
//! and the router hands the values to the callback registered for that call
//! node when its graph instance was attached.

use crate::expression::InstanceId;
use crate::node::{HostCallback, NodeId};
use indexmap::IndexMap;
use parking_lot::Mutex;

/// Maps call-node ids to the callbacks of attached instances
#[derive(Debug, Default)]
pub struct CallbackRouter {
    routes: Mutex<IndexMap<NodeId, IndexMap<InstanceId, HostCallback>>>,
}

impl CallbackRouter {
    /// Create an empty router
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the callback of call node `node_id` for `owner`
    pub fn register(&self, owner: InstanceId, node_id: NodeId, callback: HostCallback) {
        self.routes
            .lock()
            .entry(node_id)
            .or_default()
            .insert(owner, callback);
    }

    /// Drop every registration made by `owner`; returns how many were removed
    pub fn unregister_instance(&self, owner: InstanceId) -> usize {
        let mut routes = self.routes.lock();
        let mut removed = 0;
        routes.retain(|_, owners| {
            if owners.shift_remove(&owner).is_some() {
                removed += 1;
            }
            !owners.is_empty()
        });
        removed
    }

    /// Deliver values for call node `node_id`. Returns `false` when nothing
    /// is registered for it.
    pub fn dispatch(&self, node_id: NodeId, values: &[f64]) -> bool {
        // A shared call node has one callback however many instances attach it.
        let callback = self
            .routes
            .lock()
            .get(&node_id)
            .and_then(|owners| owners.values().next().cloned());
        match callback {
            Some(callback) => {
                callback.invoke(values);
                true
            }
            None => {
                tracing::warn!(node = %node_id, "no callback registered for call node");
                false
            }
        }
    }

    /// Number of routed call nodes
    pub fn len(&self) -> usize {
        self.routes.lock().len()
    }

    /// Whether no call node is routed
    pub fn is_empty(&self) -> bool {
        self.routes.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;
    use std::sync::Arc;

    #[test]
    fn test_dispatch_reaches_registered_callback() {
        let router = CallbackRouter::new();
        let seen = Arc::new(PlMutex::new(Vec::new()));
        let sink = seen.clone();
        let owner = InstanceId::new();
        let node = NodeId::next();
        router.register(
            owner,
            node,
            HostCallback::new(move |values| sink.lock().extend_from_slice(values)),
        );

        assert!(router.dispatch(node, &[1.0, 2.0]));
        assert_eq!(*seen.lock(), vec![1.0, 2.0]);
        assert!(!router.dispatch(NodeId::next(), &[3.0]));
    }

    #[test]
    fn test_unregister_keeps_other_owners() {
        let router = CallbackRouter::new();
        let node = NodeId::next();
        let (a, b) = (InstanceId::new(), InstanceId::new());
        let callback = HostCallback::new(|_| {});
        router.register(a, node, callback.clone());
        router.register(b, node, callback);

        assert_eq!(router.unregister_instance(a), 1);
        assert_eq!(router.len(), 1);
        assert_eq!(router.unregister_instance(b), 1);
        assert!(router.is_empty());
    }
}
