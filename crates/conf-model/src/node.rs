//! Internal tree plumbing shared by objects, collections and dictionaries
//!
//! Every bound instance is a node: configuration objects, ordered
//! collections and keyed dictionaries all hang off the same parent-link
//! structure. Parents own their children through strong handles; children
//! refer back through weak links, so a tree is kept alive from its root.
//! Paths are resolved by walking this structure on every call, never
//! cached, so renumbered or rekeyed elements always resolve correctly.

use crate::collection::ListState;
use crate::dictionary::MapState;
use crate::events::ChangeEvent;
use crate::object::{ObjectState, Slot};
use crate::path::{element_index_path, element_key_path, resolve_path};
use crate::schema::PropertyDescriptor;
use crate::{Error, Result};
use conf_store::{ConfigPath, ConfigurationSource};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::Arc;

/// Non-owning link from a child node to the node that owns it.
pub(crate) enum ParentLink {
    Object(Weak<RefCell<ObjectState>>),
    List(Weak<RefCell<ListState>>),
    Map(Weak<RefCell<MapState>>),
}

impl ParentLink {
    pub(crate) fn upgrade(&self) -> Option<NodeHandle> {
        match self {
            Self::Object(weak) => weak.upgrade().map(NodeHandle::Object),
            Self::List(weak) => weak.upgrade().map(NodeHandle::List),
            Self::Map(weak) => weak.upgrade().map(NodeHandle::Map),
        }
    }
}

/// How a node is attached to the tree.
pub(crate) enum Attachment {
    /// A root instance bound directly to a base path in the store.
    Root { base: ConfigPath },
    /// A property value of an owning object.
    Property {
        parent: ParentLink,
        descriptor: Arc<PropertyDescriptor>,
    },
    /// An element of a collection or dictionary; the segment is the
    /// element's current index or key, asked of the parent on every
    /// resolution.
    Element { parent: ParentLink },
}

impl Attachment {
    pub(crate) fn parent(&self) -> Option<&ParentLink> {
        match self {
            Self::Root { .. } => None,
            Self::Property { parent, .. } | Self::Element { parent } => Some(parent),
        }
    }
}

/// Strong handle to any node in a tree.
#[derive(Clone)]
pub(crate) enum NodeHandle {
    Object(Rc<RefCell<ObjectState>>),
    List(Rc<RefCell<ListState>>),
    Map(Rc<RefCell<MapState>>),
}

impl NodeHandle {
    /// Stable identity of the node, used to find an element's position in
    /// its owning container.
    pub(crate) fn ptr_id(&self) -> usize {
        match self {
            Self::Object(rc) => Rc::as_ptr(rc) as usize,
            Self::List(rc) => Rc::as_ptr(rc) as usize,
            Self::Map(rc) => Rc::as_ptr(rc) as usize,
        }
    }

    fn with_attachment<R>(&self, f: impl FnOnce(&Attachment) -> R) -> R {
        match self {
            Self::Object(rc) => f(&rc.borrow().attachment),
            Self::List(rc) => f(&rc.borrow().attachment),
            Self::Map(rc) => f(&rc.borrow().attachment),
        }
    }

    pub(crate) fn parent(&self) -> Option<NodeHandle> {
        self.with_attachment(|attachment| attachment.parent().and_then(ParentLink::upgrade))
    }

    /// Resolve the node's current full path by walking up to the root.
    ///
    /// Fails with [`Error::ObjectDisposed`] when the node has been detached
    /// from a parent that no longer exists or no longer contains it.
    pub(crate) fn path(&self) -> Result<ConfigPath> {
        enum Step {
            Root(ConfigPath),
            Property(Arc<PropertyDescriptor>, NodeHandle),
            Element(NodeHandle),
            Detached,
        }

        let step = self.with_attachment(|attachment| match attachment {
            Attachment::Root { base } => Step::Root(base.clone()),
            Attachment::Property { parent, descriptor } => match parent.upgrade() {
                Some(handle) => Step::Property(Arc::clone(descriptor), handle),
                None => Step::Detached,
            },
            Attachment::Element { parent } => match parent.upgrade() {
                Some(handle) => Step::Element(handle),
                None => Step::Detached,
            },
        });

        match step {
            Step::Root(base) => Ok(base),
            Step::Property(descriptor, parent) => {
                let parent_path = parent.path()?;
                Ok(resolve_path(&parent_path, &descriptor))
            }
            Step::Element(parent) => {
                let parent_path = parent.path()?;
                let my_id = self.ptr_id();
                match &parent {
                    NodeHandle::List(rc) => {
                        let index = rc
                            .borrow()
                            .position_of(my_id)
                            .ok_or(Error::ObjectDisposed)?;
                        Ok(element_index_path(&parent_path, index))
                    }
                    NodeHandle::Map(rc) => {
                        let key = rc.borrow().key_of(my_id).ok_or(Error::ObjectDisposed)?;
                        Ok(element_key_path(&parent_path, &key))
                    }
                    NodeHandle::Object(_) => Err(Error::ObjectDisposed),
                }
            }
            Step::Detached => Err(Error::ObjectDisposed),
        }
    }

    fn suspend_count(&self) -> u32 {
        match self {
            Self::Object(rc) => rc.borrow().suspend,
            Self::List(rc) => rc.borrow().suspend,
            Self::Map(rc) => rc.borrow().suspend,
        }
    }

    pub(crate) fn begin_update(&self) {
        match self {
            Self::Object(rc) => rc.borrow_mut().suspend += 1,
            Self::List(rc) => rc.borrow_mut().suspend += 1,
            Self::Map(rc) => rc.borrow_mut().suspend += 1,
        }
    }

    fn set_pending(&self) {
        match self {
            Self::Object(rc) => rc.borrow_mut().pending = true,
            Self::List(rc) => rc.borrow_mut().pending = true,
            Self::Map(rc) => rc.borrow_mut().pending = true,
        }
    }

    fn take_pending(&self) -> bool {
        match self {
            Self::Object(rc) => std::mem::take(&mut rc.borrow_mut().pending),
            Self::List(rc) => std::mem::take(&mut rc.borrow_mut().pending),
            Self::Map(rc) => std::mem::take(&mut rc.borrow_mut().pending),
        }
    }

    /// Invoke the node's observers with `event`, outside of any borrow.
    pub(crate) fn fire(&self, event: &ChangeEvent) {
        let observers = match self {
            Self::Object(rc) => rc.borrow().observers.snapshot(),
            Self::List(rc) => rc.borrow().observers.snapshot(),
            Self::Map(rc) => rc.borrow().observers.snapshot(),
        };
        for observer in observers {
            observer(event);
        }
    }

    /// The node's directly owned child nodes.
    pub(crate) fn children(&self) -> Vec<NodeHandle> {
        match self {
            Self::Object(rc) => rc
                .borrow()
                .slots
                .values()
                .filter_map(|slot| match slot {
                    Slot::Object(child) => Some(NodeHandle::Object(Rc::clone(child.state()))),
                    Slot::List(child) => Some(NodeHandle::List(Rc::clone(child.state()))),
                    Slot::Map(child) => Some(NodeHandle::Map(Rc::clone(child.state()))),
                    Slot::Unloaded | Slot::Scalar(_) => None,
                })
                .collect(),
            Self::List(rc) => rc
                .borrow()
                .children
                .iter()
                .map(|child| NodeHandle::Object(Rc::clone(child.state())))
                .collect(),
            Self::Map(rc) => rc
                .borrow()
                .entries
                .iter()
                .map(|(_, child)| NodeHandle::Object(Rc::clone(child.state())))
                .collect(),
        }
    }

    /// Close one batch-update scope. When the outermost scope on the whole
    /// ancestor chain closes, flush pending aggregate notifications.
    pub(crate) fn end_update(&self) {
        let remaining = match self {
            Self::Object(rc) => {
                let mut st = rc.borrow_mut();
                st.suspend = st.suspend.saturating_sub(1);
                st.suspend
            }
            Self::List(rc) => {
                let mut st = rc.borrow_mut();
                st.suspend = st.suspend.saturating_sub(1);
                st.suspend
            }
            Self::Map(rc) => {
                let mut st = rc.borrow_mut();
                st.suspend = st.suspend.saturating_sub(1);
                st.suspend
            }
        };
        if remaining > 0 {
            return;
        }
        // Pending marks reach up to the root, so flush from the topmost
        // ancestor once no scope anywhere on the chain is still open.
        let mut top = self.clone();
        while let Some(parent) = top.parent() {
            if parent.suspend_count() > 0 {
                return;
            }
            top = parent;
        }
        top.flush_pending();
    }

    /// Aggregate dirty state: own unsaved changes or any descendant's.
    pub(crate) fn is_dirty(&self) -> bool {
        let own = match self {
            Self::Object(rc) => {
                let st = rc.borrow();
                !st.disposed && !st.dirty.is_empty()
            }
            Self::List(rc) => {
                let st = rc.borrow();
                !st.disposed && st.dirty
            }
            Self::Map(rc) => {
                let st = rc.borrow();
                !st.disposed && st.dirty
            }
        };
        own || self.children().iter().any(NodeHandle::is_dirty)
    }

    /// Mark the node and everything below it dirty so the next Save
    /// rewrites the whole subtree at its current paths.
    pub(crate) fn mark_all_dirty(&self) {
        match self {
            Self::Object(rc) => {
                crate::ConfigurationObject::from_state(Rc::clone(rc)).mark_all_dirty();
            }
            Self::List(rc) => {
                rc.borrow_mut().dirty = true;
                for child in self.children() {
                    child.mark_all_dirty();
                }
            }
            Self::Map(rc) => {
                rc.borrow_mut().dirty = true;
                for child in self.children() {
                    child.mark_all_dirty();
                }
            }
        }
    }

    /// Mark the whole subtree disposed and drop its subscriptions.
    /// Idempotent; never touches the store.
    pub(crate) fn dispose_tree(&self) {
        let children = self.children();
        let already_disposed = match self {
            Self::Object(rc) => {
                let mut st = rc.borrow_mut();
                if st.disposed {
                    true
                } else {
                    st.disposed = true;
                    st.watch = None;
                    st.observers.clear();
                    false
                }
            }
            Self::List(rc) => {
                let mut st = rc.borrow_mut();
                if st.disposed {
                    true
                } else {
                    st.disposed = true;
                    st.observers.clear();
                    false
                }
            }
            Self::Map(rc) => {
                let mut st = rc.borrow_mut();
                if st.disposed {
                    true
                } else {
                    st.disposed = true;
                    st.observers.clear();
                    false
                }
            }
        };
        if already_disposed {
            return;
        }
        for child in children {
            child.dispose_tree();
        }
    }

    fn flush_pending(&self) {
        for child in self.children() {
            child.flush_pending();
        }
        if self.take_pending() {
            if let Ok(path) = self.path() {
                self.fire(&ChangeEvent::Batch { path });
            }
        }
    }
}

/// Propagate a change from its origin node up to the root.
///
/// Outside a batch scope, the origin receives `event` and every ancestor a
/// [`ChangeEvent::Descendant`]. Inside a scope, the whole chain is marked
/// pending instead; the scope fires one aggregate per node on exit.
pub(crate) fn propagate_change(origin: &NodeHandle, event: ChangeEvent) {
    let mut chain = vec![origin.clone()];
    let mut cursor = origin.clone();
    while let Some(parent) = cursor.parent() {
        chain.push(parent.clone());
        cursor = parent;
    }

    if chain.iter().any(|node| node.suspend_count() > 0) {
        for node in &chain {
            node.set_pending();
        }
        return;
    }

    origin.fire(&event);
    for ancestor in chain.iter().skip(1) {
        if let Ok(path) = ancestor.path() {
            ancestor.fire(&ChangeEvent::Descendant { path });
        }
    }
}

/// Remove the entry at `path` and every entry below it from the store.
pub(crate) fn purge_subtree(
    source: &dyn ConfigurationSource,
    path: &ConfigPath,
) -> conf_store::Result<()> {
    source.remove(path)?;
    for key in source.child_keys(path) {
        purge_subtree(source, &path.join(&key))?;
    }
    Ok(())
}
