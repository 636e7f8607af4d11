//! Ordered collections of nested configuration objects
//!
//! Elements are addressed by their decimal index as a further path
//! segment. Removal compacts: remaining elements are renumbered down and
//! the vacated store paths are rewritten on the next Save, keeping
//! Save-then-Load idempotent for ordered collections.

use crate::events::{ChangeEvent, Observer, ObserverId, ObserverList};
use crate::node::{Attachment, NodeHandle, ParentLink, propagate_change, purge_subtree};
use crate::object::ConfigurationObject;
use crate::path::element_index_path;
use crate::schema::{PropertyDescriptor, Schema};
use crate::{Error, Result};
use conf_store::{ConfigPath, ConfigurationSource};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

pub(crate) struct ListState {
    pub(crate) element_schema: Arc<Schema>,
    pub(crate) attachment: Attachment,
    pub(crate) source: Rc<dyn ConfigurationSource>,
    pub(crate) children: Vec<ConfigurationObject>,
    /// Structural change (add/remove/renumber) since the last Load/Save
    pub(crate) dirty: bool,
    pub(crate) observers: ObserverList,
    pub(crate) suspend: u32,
    pub(crate) pending: bool,
    pub(crate) disposed: bool,
}

impl ListState {
    pub(crate) fn position_of(&self, ptr: usize) -> Option<usize> {
        self.children
            .iter()
            .position(|child| Rc::as_ptr(child.state()) as usize == ptr)
    }
}

/// An ordered, change-tracked collection of nested configuration objects.
///
/// Enumeration order is insertion order. Handles are cheap to clone and
/// share one underlying collection.
#[derive(Clone)]
pub struct ConfigurationList {
    state: Rc<RefCell<ListState>>,
}

impl ConfigurationList {
    pub(crate) fn construct(
        element_schema: &Arc<Schema>,
        descriptor: Arc<PropertyDescriptor>,
        parent: ParentLink,
        source: Rc<dyn ConfigurationSource>,
    ) -> Self {
        Self {
            state: Rc::new(RefCell::new(ListState {
                element_schema: Arc::clone(element_schema),
                attachment: Attachment::Property { parent, descriptor },
                source,
                children: Vec::new(),
                dirty: false,
                observers: ObserverList::default(),
                suspend: 0,
                pending: false,
                disposed: false,
            })),
        }
    }

    pub(crate) fn from_state(state: Rc<RefCell<ListState>>) -> Self {
        Self { state }
    }

    pub(crate) fn state(&self) -> &Rc<RefCell<ListState>> {
        &self.state
    }

    fn handle(&self) -> NodeHandle {
        NodeHandle::List(Rc::clone(&self.state))
    }

    fn ensure_active(&self) -> Result<()> {
        if self.state.borrow().disposed {
            return Err(Error::ObjectDisposed);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.state.borrow().children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().children.is_empty()
    }

    /// The element at `index`, if present.
    pub fn get(&self, index: usize) -> Option<ConfigurationObject> {
        self.state.borrow().children.get(index).cloned()
    }

    /// Snapshot of the elements in insertion order.
    pub fn elements(&self) -> Vec<ConfigurationObject> {
        self.state.borrow().children.clone()
    }

    /// Resolve the collection's current full path.
    pub fn calculate_path(&self) -> Result<ConfigPath> {
        self.handle().path()
    }

    /// Whether the collection or any element holds an unsaved change.
    pub fn is_dirty(&self) -> bool {
        self.handle().is_dirty()
    }

    pub fn is_disposed(&self) -> bool {
        self.state.borrow().disposed
    }

    /// Append a fresh element and mark the collection dirty.
    ///
    /// The element starts with its declared defaults; nothing is written
    /// to the store until Save.
    pub fn add(&self) -> Result<ConfigurationObject> {
        self.ensure_active()?;
        let (schema, source) = {
            let st = self.state.borrow();
            (Arc::clone(&st.element_schema), Rc::clone(&st.source))
        };
        let child = ConfigurationObject::construct(
            &schema,
            Attachment::Element {
                parent: ParentLink::List(Rc::downgrade(&self.state)),
            },
            source,
        );
        {
            let mut st = self.state.borrow_mut();
            st.children.push(child.clone());
            st.dirty = true;
        }
        let path = self.calculate_path()?;
        propagate_change(&self.handle(), ChangeEvent::Structure { path });
        Ok(child)
    }

    /// Delete the element at `index` from the store and the collection.
    ///
    /// Subsequent elements are renumbered down by one and rewritten at
    /// their new indices on the next Save.
    pub fn remove(&self, index: usize) -> Result<()> {
        self.ensure_active()?;
        let child = self.get(index).ok_or_else(|| Error::UnknownProperty {
            property: format!("element {index}"),
        })?;
        child.delete()
    }

    /// Detach an element by identity; called from the element's Delete.
    pub(crate) fn detach(&self, ptr: usize) {
        let shifted: Vec<ConfigurationObject> = {
            let mut st = self.state.borrow_mut();
            let Some(position) = st.position_of(ptr) else {
                return;
            };
            st.children.remove(position);
            st.dirty = true;
            st.children[position..].to_vec()
        };
        // Renumbered elements must be rewritten at their new paths.
        for child in shifted {
            child.mark_all_dirty();
        }
    }

    /// Rebuild the collection from the store.
    ///
    /// Stored indices are read in numeric order and compacted to
    /// `0..len`; non-numeric segments are skipped with a warning. Atomic:
    /// on any element failure the previous elements remain. Previous
    /// element handles are disposed on success.
    pub fn load(&self) -> Result<()> {
        self.ensure_active()?;
        let base = self.calculate_path()?;
        self.load_from_base(&base)
    }

    pub(crate) fn load_from_base(&self, base: &ConfigPath) -> Result<()> {
        let (schema, source) = {
            let st = self.state.borrow();
            (Arc::clone(&st.element_schema), Rc::clone(&st.source))
        };

        let mut indices: Vec<usize> = Vec::new();
        for key in source.child_keys(base) {
            match key.parse::<usize>() {
                Ok(index) => indices.push(index),
                Err(_) => {
                    tracing::warn!(path = %base, segment = %key, "Skipping non-numeric collection segment");
                }
            }
        }
        indices.sort_unstable();

        let mut staged = Vec::with_capacity(indices.len());
        for &stored_index in &indices {
            let child = ConfigurationObject::construct(
                &schema,
                Attachment::Element {
                    parent: ParentLink::List(Rc::downgrade(&self.state)),
                },
                Rc::clone(&source),
            );
            child.load_from_base(&element_index_path(base, stored_index))?;
            staged.push(child);
        }

        let compact = indices.iter().copied().eq(0..indices.len());
        let old: Vec<ConfigurationObject> = {
            let mut st = self.state.borrow_mut();
            let old = std::mem::replace(&mut st.children, staged);
            st.dirty = !compact;
            old
        };
        for child in old {
            child.dispose();
        }
        if !compact {
            // Gapped store layout: rewrite everything at compacted indices
            // on the next Save.
            for child in self.elements() {
                child.mark_all_dirty();
            }
        }
        Ok(())
    }

    /// Save every element depth-first, then drop vacated store indices.
    pub fn save(&self) -> Result<()> {
        self.ensure_active()?;
        let base = self.calculate_path()?;
        self.save_from_base(&base)
    }

    pub(crate) fn save_from_base(&self, base: &ConfigPath) -> Result<()> {
        let children = self.elements();
        for (index, child) in children.iter().enumerate() {
            child.save_from_base(&element_index_path(base, index))?;
        }

        if self.state.borrow().dirty {
            let source = Rc::clone(&self.state.borrow().source);
            for key in source.child_keys(base) {
                match key.parse::<usize>() {
                    Ok(index) if index < children.len() => {}
                    Ok(_) => purge_subtree(source.as_ref(), &base.join(&key))?,
                    Err(_) => {
                        tracing::warn!(path = %base, segment = %key, "Leaving non-numeric collection segment");
                    }
                }
            }
            self.state.borrow_mut().dirty = false;
        }
        Ok(())
    }

    /// Register a change observer on this collection.
    pub fn subscribe(&self, observer: impl Fn(&ChangeEvent) + 'static) -> ObserverId {
        let observer: Observer = Rc::new(observer);
        self.state.borrow_mut().observers.subscribe(observer)
    }

    /// Remove a previously registered observer.
    pub fn unsubscribe(&self, id: ObserverId) {
        self.state.borrow_mut().observers.unsubscribe(id);
    }

    /// Release subscriptions without touching the store. Idempotent.
    pub fn dispose(&self) {
        self.handle().dispose_tree();
    }
}

impl std::fmt::Debug for ConfigurationList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.state.borrow();
        f.debug_struct("ConfigurationList")
            .field("element_shape", &st.element_schema.name())
            .field("len", &st.children.len())
            .field("dirty", &st.dirty)
            .field("disposed", &st.disposed)
            .finish()
    }
}
