//! Keyed dictionaries of nested configuration objects
//!
//! Elements are addressed by their escaped string key as a further path
//! segment. Enumeration is insertion order; Save and Load visit keys in
//! sorted order so the store output is reproducible.

use crate::events::{ChangeEvent, Observer, ObserverId, ObserverList};
use crate::node::{Attachment, NodeHandle, ParentLink, propagate_change, purge_subtree};
use crate::object::ConfigurationObject;
use crate::path::element_key_path;
use crate::schema::{PropertyDescriptor, Schema};
use crate::{Error, Result};
use conf_store::{ConfigPath, ConfigurationSource, unescape_segment};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

pub(crate) struct MapState {
    pub(crate) element_schema: Arc<Schema>,
    pub(crate) attachment: Attachment,
    pub(crate) source: Rc<dyn ConfigurationSource>,
    /// Entries in insertion order; keys unique
    pub(crate) entries: Vec<(String, ConfigurationObject)>,
    /// Structural change (add/remove) since the last Load/Save
    pub(crate) dirty: bool,
    pub(crate) observers: ObserverList,
    pub(crate) suspend: u32,
    pub(crate) pending: bool,
    pub(crate) disposed: bool,
}

impl MapState {
    pub(crate) fn key_of(&self, ptr: usize) -> Option<String> {
        self.entries
            .iter()
            .find(|(_, child)| Rc::as_ptr(child.state()) as usize == ptr)
            .map(|(key, _)| key.clone())
    }
}

/// A keyed, change-tracked dictionary of nested configuration objects.
#[derive(Clone)]
pub struct ConfigurationMap {
    state: Rc<RefCell<MapState>>,
}

impl ConfigurationMap {
    pub(crate) fn construct(
        element_schema: &Arc<Schema>,
        descriptor: Arc<PropertyDescriptor>,
        parent: ParentLink,
        source: Rc<dyn ConfigurationSource>,
    ) -> Self {
        Self {
            state: Rc::new(RefCell::new(MapState {
                element_schema: Arc::clone(element_schema),
                attachment: Attachment::Property { parent, descriptor },
                source,
                entries: Vec::new(),
                dirty: false,
                observers: ObserverList::default(),
                suspend: 0,
                pending: false,
                disposed: false,
            })),
        }
    }

    pub(crate) fn from_state(state: Rc<RefCell<MapState>>) -> Self {
        Self { state }
    }

    pub(crate) fn state(&self) -> &Rc<RefCell<MapState>> {
        &self.state
    }

    fn handle(&self) -> NodeHandle {
        NodeHandle::Map(Rc::clone(&self.state))
    }

    fn ensure_active(&self) -> Result<()> {
        if self.state.borrow().disposed {
            return Err(Error::ObjectDisposed);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.state.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.state.borrow().entries.iter().any(|(k, _)| k == key)
    }

    /// The element under `key`, if present.
    pub fn get(&self, key: &str) -> Option<ConfigurationObject> {
        self.state
            .borrow()
            .entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, child)| child.clone())
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.state
            .borrow()
            .entries
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Snapshot of the entries in insertion order.
    pub fn entries(&self) -> Vec<(String, ConfigurationObject)> {
        self.state.borrow().entries.clone()
    }

    /// Resolve the dictionary's current full path.
    pub fn calculate_path(&self) -> Result<ConfigPath> {
        self.handle().path()
    }

    /// Whether the dictionary or any element holds an unsaved change.
    pub fn is_dirty(&self) -> bool {
        self.handle().is_dirty()
    }

    pub fn is_disposed(&self) -> bool {
        self.state.borrow().disposed
    }

    /// Insert a fresh element under `key` and mark the dictionary dirty.
    ///
    /// Fails with [`Error::DuplicateKey`] when the key is already present.
    pub fn add(&self, key: impl Into<String>) -> Result<ConfigurationObject> {
        self.ensure_active()?;
        let key = key.into();
        if self.contains_key(&key) {
            return Err(Error::DuplicateKey { key });
        }
        let (schema, source) = {
            let st = self.state.borrow();
            (Arc::clone(&st.element_schema), Rc::clone(&st.source))
        };
        let child = ConfigurationObject::construct(
            &schema,
            Attachment::Element {
                parent: ParentLink::Map(Rc::downgrade(&self.state)),
            },
            source,
        );
        {
            let mut st = self.state.borrow_mut();
            st.entries.push((key, child.clone()));
            st.dirty = true;
        }
        let path = self.calculate_path()?;
        propagate_change(&self.handle(), ChangeEvent::Structure { path });
        Ok(child)
    }

    /// Delete the element under `key` from the store and the dictionary.
    pub fn remove(&self, key: &str) -> Result<()> {
        self.ensure_active()?;
        let child = self.get(key).ok_or_else(|| Error::UnknownProperty {
            property: format!("key {key}"),
        })?;
        child.delete()
    }

    /// Detach an element by identity; called from the element's Delete.
    pub(crate) fn detach(&self, ptr: usize) {
        let mut st = self.state.borrow_mut();
        let before = st.entries.len();
        st.entries
            .retain(|(_, child)| Rc::as_ptr(child.state()) as usize != ptr);
        if st.entries.len() != before {
            st.dirty = true;
        }
    }

    /// Rebuild the dictionary from the store, visiting keys in sorted
    /// order. Atomic: on any element failure the previous entries remain.
    /// Previous element handles are disposed on success.
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

        let mut staged = Vec::new();
        for segment in source.child_keys(base) {
            let child = ConfigurationObject::construct(
                &schema,
                Attachment::Element {
                    parent: ParentLink::Map(Rc::downgrade(&self.state)),
                },
                Rc::clone(&source),
            );
            child.load_from_base(&base.join(&segment))?;
            staged.push((unescape_segment(&segment), child));
        }

        let old: Vec<(String, ConfigurationObject)> = {
            let mut st = self.state.borrow_mut();
            let old = std::mem::replace(&mut st.entries, staged);
            st.dirty = false;
            old
        };
        for (_, child) in old {
            child.dispose();
        }
        Ok(())
    }

    /// Save every element depth-first in sorted key order, then drop
    /// store keys no longer present in the dictionary.
    pub fn save(&self) -> Result<()> {
        self.ensure_active()?;
        let base = self.calculate_path()?;
        self.save_from_base(&base)
    }

    pub(crate) fn save_from_base(&self, base: &ConfigPath) -> Result<()> {
        let mut entries = self.entries();
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));
        for (key, child) in &entries {
            child.save_from_base(&element_key_path(base, key))?;
        }

        if self.state.borrow().dirty {
            let source = Rc::clone(&self.state.borrow().source);
            for segment in source.child_keys(base) {
                let key = unescape_segment(&segment);
                if !self.contains_key(&key) {
                    purge_subtree(source.as_ref(), &base.join(&segment))?;
                }
            }
            self.state.borrow_mut().dirty = false;
        }
        Ok(())
    }

    /// Register a change observer on this dictionary.
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

impl std::fmt::Debug for ConfigurationMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.state.borrow();
        f.debug_struct("ConfigurationMap")
            .field("element_shape", &st.element_schema.name())
            .field("len", &st.entries.len())
            .field("dirty", &st.dirty)
            .field("disposed", &st.disposed)
            .finish()
    }
}
