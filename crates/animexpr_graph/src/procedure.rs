// SPDX-License-Identifier: MIT OR Apache-2.0
//! Procedures: parameterised sub-graphs shared between call sites.
//!
//! A procedure owns its parameter cells. Calling it copies each argument into
//! the matching cell with [`NumericCell::store_silent`] and then evaluates the
//! body. The parameter cells have their own attach lifecycle, reference
//! counted across every graph instance that calls the procedure.

use crate::cell::{CellHandle, NumericCell, SubscriptionId};
use crate::expression::InstanceId;
use crate::factories::{resolve, Operand};
use crate::node::{Node, NodeId, NodeKind};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

#[derive(Default)]
struct ProcAttachment {
    owners: IndexMap<InstanceId, Arc<AtomicBool>>,
    subscriptions: Vec<(CellHandle, SubscriptionId)>,
}

struct ProcedureInner {
    params: Vec<CellHandle>,
    body: Node,
    attachment: Mutex<ProcAttachment>,
}

/// A parameterised body graph
#[derive(Clone)]
pub struct Procedure(Arc<ProcedureInner>);

impl Procedure {
    /// Create a procedure over existing parameter cells
    pub fn new(params: Vec<CellHandle>, body: Node) -> Self {
        Self(Arc::new(ProcedureInner {
            params,
            body,
            attachment: Mutex::new(ProcAttachment::default()),
        }))
    }

    /// Wire id of the procedure: the id of its body node
    pub fn id(&self) -> NodeId {
        self.0.body.id()
    }

    /// Address of the shared procedure, distinct for every live procedure
    pub fn ptr_key(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    /// Parameter cells, in declaration order
    pub fn params(&self) -> &[CellHandle] {
        &self.0.params
    }

    /// Number of parameters
    pub fn arity(&self) -> usize {
        self.0.params.len()
    }

    /// Body graph
    pub fn body(&self) -> &Node {
        &self.0.body
    }

    /// Whether both handles refer to the same procedure
    pub fn ptr_eq(&self, other: &Procedure) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Build a call node. The argument count is checked when the call is
    /// compiled.
    pub fn call<I>(&self, args: I) -> Node
    where
        I: IntoIterator,
        I::Item: Into<Operand>,
    {
        Node::new(NodeKind::CallProc {
            procedure: self.clone(),
            args: args.into_iter().map(resolve).collect(),
        })
    }

    /// Number of graph instances currently attached through this procedure
    pub fn attached_count(&self) -> usize {
        self.0.attachment.lock().owners.len()
    }

    /// Register `owner`. The first owner subscribes the parameter cells;
    /// notifying writes to them mark every owner invalidated.
    pub(crate) fn attach(&self, owner: InstanceId, invalidated: Arc<AtomicBool>) {
        let mut attachment = self.0.attachment.lock();
        if attachment.owners.insert(owner, invalidated).is_some() {
            return;
        }
        if attachment.owners.len() > 1 {
            return;
        }
        let weak: Weak<ProcedureInner> = Arc::downgrade(&self.0);
        for cell in &self.0.params {
            let weak = weak.clone();
            let id = cell.subscribe(Arc::new(move |_| {
                if let Some(inner) = weak.upgrade() {
                    for flag in inner.attachment.lock().owners.values() {
                        flag.store(true, Ordering::Release);
                    }
                }
            }));
            attachment.subscriptions.push((cell.clone(), id));
        }
        tracing::debug!(procedure = %self.id(), params = self.arity(), "attached procedure");
    }

    /// Unregister `owner`; the last owner unsubscribes the parameter cells
    pub(crate) fn detach(&self, owner: InstanceId) {
        let subscriptions = {
            let mut attachment = self.0.attachment.lock();
            if attachment.owners.shift_remove(&owner).is_none() || !attachment.owners.is_empty() {
                return;
            }
            std::mem::take(&mut attachment.subscriptions)
        };
        for (cell, id) in subscriptions {
            cell.unsubscribe(id);
        }
        tracing::debug!(procedure = %self.id(), "detached procedure");
    }
}

impl fmt::Debug for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Procedure")
            .field("id", &self.id())
            .field("arity", &self.arity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factories::{add, proc_fn};

    #[test]
    fn test_param_subscriptions_are_reference_counted() {
        let proc = proc_fn(2, |p| add(&p[0], &p[1]));
        let (a, b) = (InstanceId::new(), InstanceId::new());
        let flag = Arc::new(AtomicBool::new(false));

        proc.attach(a, flag.clone());
        proc.attach(b, flag.clone());
        assert_eq!(proc.attached_count(), 2);
        assert!(proc.params().iter().all(|p| p.subscriber_count() == 1));

        proc.detach(a);
        assert!(proc.params().iter().all(|p| p.subscriber_count() == 1));
        proc.detach(b);
        assert!(proc.params().iter().all(|p| p.subscriber_count() == 0));
        assert_eq!(proc.attached_count(), 0);
    }

    #[test]
    fn test_param_write_marks_owners() {
        let proc = proc_fn(1, |p| p[0].clone());
        let flag = Arc::new(AtomicBool::new(false));
        let owner = InstanceId::new();
        proc.attach(owner, flag.clone());

        proc.params()[0].store_silent(3.0);
        assert!(!flag.load(Ordering::Acquire));
        proc.params()[0].set_value(4.0);
        assert!(flag.load(Ordering::Acquire));
        proc.detach(owner);
    }
}
