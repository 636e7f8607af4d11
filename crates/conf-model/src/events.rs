//! Change notifications and batch-update scopes

use crate::Value;
use crate::node::NodeHandle;
use conf_store::ConfigPath;
use std::rc::Rc;

/// A change notification raised by a configuration object, collection or
/// dictionary, delivered to observers registered on that node.
#[derive(Debug, Clone)]
pub enum ChangeEvent {
    /// A scalar property on this object changed value.
    Property {
        /// Path of the owning object
        path: ConfigPath,
        property: String,
        old: Value,
        new: Value,
    },
    /// An element was added to or removed from this collection/dictionary.
    Structure { path: ConfigPath },
    /// Something below this node changed.
    Descendant { path: ConfigPath },
    /// Aggregate notification fired when a batch-update scope closes over
    /// a node touched during the scope.
    Batch { path: ConfigPath },
}

/// Identifies one observer registration for later unsubscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserverId(pub(crate) u64);

pub(crate) type Observer = Rc<dyn Fn(&ChangeEvent)>;

/// Observer registrations held by one node.
#[derive(Default)]
pub(crate) struct ObserverList {
    next_id: u64,
    observers: Vec<(u64, Observer)>,
}

impl ObserverList {
    pub(crate) fn subscribe(&mut self, observer: Observer) -> ObserverId {
        let id = self.next_id;
        self.next_id += 1;
        self.observers.push((id, observer));
        ObserverId(id)
    }

    pub(crate) fn unsubscribe(&mut self, id: ObserverId) {
        self.observers.retain(|(oid, _)| *oid != id.0);
    }

    pub(crate) fn clear(&mut self) {
        self.observers.clear();
    }

    /// Snapshot the observers so they can be invoked without holding any
    /// borrow on the owning node.
    pub(crate) fn snapshot(&self) -> Vec<Observer> {
        self.observers.iter().map(|(_, cb)| Rc::clone(cb)).collect()
    }
}

impl std::fmt::Debug for ObserverList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverList")
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// RAII guard for a batch-update scope.
///
/// While the guard is alive, changes anywhere in the subtree of the node it
/// was opened on are applied silently: dirty state still accumulates, but
/// no events fire. When the guard drops, every node touched during the
/// scope receives a single [`ChangeEvent::Batch`] notification.
///
/// Scopes nest; events fire when the outermost scope closes.
pub struct UpdateScope {
    pub(crate) node: NodeHandle,
}

impl Drop for UpdateScope {
    fn drop(&mut self) {
        self.node.end_update();
    }
}

impl std::fmt::Debug for UpdateScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateScope").finish()
    }
}
