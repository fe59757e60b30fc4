// SPDX-License-Identifier: MIT OR Apache-2.0
//! Observable numeric cells referenced by value nodes.
//!
//! A cell is owned by whoever created it (a UI layer, a derived operator, a
//! procedure). Graphs only hold handles to cells and never cache their value
//! between evaluations.

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_CELL_TAG: AtomicU64 = AtomicU64::new(1);
static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of a cell, used by serialized trees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellTag(pub u64);

impl CellTag {
    /// Allocate a fresh tag
    pub fn next() -> Self {
        Self(NEXT_CELL_TAG.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for CellTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle returned by [`NumericCell::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Allocate a fresh subscription id
    pub fn next() -> Self {
        Self(NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed))
    }
}

/// Listener invoked with the new value after a notifying write
pub type Listener = Arc<dyn Fn(f64) + Send + Sync>;

/// A mutable numeric container with change notification
pub trait NumericCell: Send + Sync + fmt::Debug {
    /// Current value
    fn value(&self) -> f64;

    /// Write a value and notify listeners
    fn set_value(&self, value: f64);

    /// Write a value without notifying anyone
    fn store_silent(&self, value: f64);

    /// Stable identity of this cell
    fn tag(&self) -> CellTag;

    /// Register a listener
    fn subscribe(&self, listener: Listener) -> SubscriptionId;

    /// Remove a listener; returns whether it was registered
    fn unsubscribe(&self, id: SubscriptionId) -> bool;

    /// Number of registered listeners
    fn subscriber_count(&self) -> usize;
}

/// Shared handle to any cell
pub type CellHandle = Arc<dyn NumericCell>;

/// The stock [`NumericCell`] implementation
pub struct AnimatedValue {
    tag: CellTag,
    value: RwLock<f64>,
    listeners: Mutex<IndexMap<SubscriptionId, Listener>>,
}

impl AnimatedValue {
    /// Create a cell holding `value`
    pub fn new(value: f64) -> Arc<Self> {
        Arc::new(Self {
            tag: CellTag::next(),
            value: RwLock::new(value),
            listeners: Mutex::new(IndexMap::new()),
        })
    }

    /// Create a cell and return it as a type-erased handle
    pub fn handle(value: f64) -> CellHandle {
        Self::new(value)
    }
}

impl fmt::Debug for AnimatedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimatedValue")
            .field("tag", &self.tag)
            .field("value", &*self.value.read())
            .field("listeners", &self.listeners.lock().len())
            .finish()
    }
}

impl NumericCell for AnimatedValue {
    fn value(&self) -> f64 {
        *self.value.read()
    }

    fn set_value(&self, value: f64) {
        *self.value.write() = value;
        // Listeners may read or write this cell again.
        let listeners: Vec<Listener> = self.listeners.lock().values().cloned().collect();
        for listener in listeners {
            listener(value);
        }
    }

    fn store_silent(&self, value: f64) {
        *self.value.write() = value;
    }

    fn tag(&self) -> CellTag {
        self.tag
    }

    fn subscribe(&self, listener: Listener) -> SubscriptionId {
        let id = SubscriptionId::next();
        self.listeners.lock().insert(id, listener);
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listeners.lock().shift_remove(&id).is_some()
    }

    fn subscriber_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_set_value_notifies() {
        let cell = AnimatedValue::new(0.0);
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let id = cell.subscribe(Arc::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        cell.set_value(3.0);
        assert_eq!(cell.value(), 3.0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(cell.unsubscribe(id));
        assert!(!cell.unsubscribe(id));
        cell.set_value(4.0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_store_silent_skips_listeners() {
        let cell = AnimatedValue::new(0.0);
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        cell.subscribe(Arc::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));
        cell.store_silent(9.0);
        assert_eq!(cell.value(), 9.0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_listener_may_write_back() {
        let cell = AnimatedValue::new(0.0);
        let inner = cell.clone();
        cell.subscribe(Arc::new(move |v| {
            if v < 10.0 {
                inner.set_value(v + 1.0);
            }
        }));
        cell.set_value(5.0);
        assert_eq!(cell.value(), 10.0);
    }

    #[test]
    fn test_tags_are_unique() {
        assert_ne!(AnimatedValue::new(0.0).tag(), AnimatedValue::new(0.0).tag());
    }
}
