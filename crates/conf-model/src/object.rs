//! The configuration object engine
//!
//! A [`ConfigurationObject`] is one bound occurrence of a declared shape:
//! it owns the in-memory property values, tracks per-property dirty state,
//! raises change notifications and drives the Load/Save/Delete lifecycle
//! against the shared store handle.

use crate::convert::{check_assignable, from_store, to_store};
use crate::events::{ChangeEvent, Observer, ObserverId, ObserverList, UpdateScope};
use crate::node::{Attachment, NodeHandle, ParentLink, propagate_change, purge_subtree};
use crate::path::resolve_path;
use crate::schema::{PropertyDescriptor, Schema, ValueKind};
use crate::validate::Validator;
use crate::{ConfigurationList, ConfigurationMap, Error, Result, Value};
use conf_store::{ConfigPath, ConfigurationSource, WatchGuard};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::sync::Arc;

/// Current content of one property slot.
pub(crate) enum Slot {
    /// Loadable scalar that has not been read yet
    Unloaded,
    Scalar(Value),
    Object(ConfigurationObject),
    List(ConfigurationList),
    Map(ConfigurationMap),
}

pub(crate) struct ObjectState {
    pub(crate) schema: Arc<Schema>,
    pub(crate) attachment: Attachment,
    pub(crate) source: Rc<dyn ConfigurationSource>,
    pub(crate) slots: HashMap<String, Slot>,
    pub(crate) dirty: HashSet<String>,
    pub(crate) observers: ObserverList,
    pub(crate) suspend: u32,
    pub(crate) pending: bool,
    pub(crate) disposed: bool,
    pub(crate) validators: Vec<Rc<dyn Validator>>,
    pub(crate) watch: Option<WatchGuard>,
}

/// A live, change-tracked instance of a declared shape.
///
/// Handles are cheap to clone and share one underlying instance. The type
/// is single-threaded by design; a tree of instances shares one store
/// handle and must be confined to one thread.
#[derive(Clone)]
pub struct ConfigurationObject {
    state: Rc<RefCell<ObjectState>>,
}

impl ConfigurationObject {
    /// Bind a root instance of `schema` to the root of `source` and load it.
    ///
    /// Loadable properties are read eagerly; the instance then tracks
    /// external store changes and re-loads itself while it has no unsaved
    /// local changes.
    pub fn bind(schema: &Arc<Schema>, source: Rc<dyn ConfigurationSource>) -> Result<Self> {
        Self::bind_at(schema, source, ConfigPath::root())
    }

    /// Bind a root instance whose paths are prefixed by `base`.
    pub fn bind_at(
        schema: &Arc<Schema>,
        source: Rc<dyn ConfigurationSource>,
        base: ConfigPath,
    ) -> Result<Self> {
        let object = Self::construct(schema, Attachment::Root { base }, Rc::clone(&source));
        object.load()?;
        object.attach_watch(&source);
        Ok(object)
    }

    /// Build an instance and its child structure without touching the store.
    ///
    /// Loadable scalars start Unloaded; save-only and unpersisted scalars
    /// start at their declared default (or null). Structured properties are
    /// constructed recursively, empty.
    pub(crate) fn construct(
        schema: &Arc<Schema>,
        attachment: Attachment,
        source: Rc<dyn ConfigurationSource>,
    ) -> Self {
        let state = Rc::new(RefCell::new(ObjectState {
            schema: Arc::clone(schema),
            attachment,
            source,
            slots: HashMap::new(),
            dirty: HashSet::new(),
            observers: ObserverList::default(),
            suspend: 0,
            pending: false,
            disposed: false,
            validators: Vec::new(),
            watch: None,
        }));
        let object = Self { state };
        object.init_slots();
        object
    }

    fn init_slots(&self) {
        let schema = Arc::clone(&self.state.borrow().schema);
        let source = Rc::clone(&self.state.borrow().source);

        for descriptor in schema.properties() {
            let slot = match descriptor.kind() {
                ValueKind::Scalar(_) => {
                    if descriptor.persistence().loads() {
                        Slot::Unloaded
                    } else {
                        Slot::Scalar(
                            descriptor.default_value().cloned().unwrap_or(Value::Null),
                        )
                    }
                }
                ValueKind::Nested(child_schema) => Slot::Object(Self::construct(
                    child_schema,
                    Attachment::Property {
                        parent: ParentLink::Object(Rc::downgrade(&self.state)),
                        descriptor: Arc::clone(descriptor),
                    },
                    Rc::clone(&source),
                )),
                ValueKind::List(element) => Slot::List(ConfigurationList::construct(
                    element,
                    Arc::clone(descriptor),
                    ParentLink::Object(Rc::downgrade(&self.state)),
                    Rc::clone(&source),
                )),
                ValueKind::Map(element) => Slot::Map(ConfigurationMap::construct(
                    element,
                    Arc::clone(descriptor),
                    ParentLink::Object(Rc::downgrade(&self.state)),
                    Rc::clone(&source),
                )),
            };
            self.state
                .borrow_mut()
                .slots
                .insert(descriptor.name().to_string(), slot);
        }
    }

    fn attach_watch(&self, source: &Rc<dyn ConfigurationSource>) {
        let weak = Rc::downgrade(&self.state);
        let guard = source.subscribe(Rc::new(move || {
            if let Some(state) = weak.upgrade() {
                ConfigurationObject { state }.reload_after_external_change();
            }
        }));
        self.state.borrow_mut().watch = Some(guard);
    }

    fn reload_after_external_change(&self) {
        if self.state.borrow().disposed {
            return;
        }
        if self.is_dirty() {
            tracing::debug!(
                shape = %self.state.borrow().schema.name(),
                "Store changed externally; unsaved local changes win, skipping reload"
            );
            return;
        }
        if let Err(error) = self.load() {
            tracing::warn!(%error, "Reload after external store change failed");
        }
    }

    pub(crate) fn state(&self) -> &Rc<RefCell<ObjectState>> {
        &self.state
    }

    pub(crate) fn from_state(state: Rc<RefCell<ObjectState>>) -> Self {
        Self { state }
    }

    fn handle(&self) -> NodeHandle {
        NodeHandle::Object(Rc::clone(&self.state))
    }

    /// The shape this instance is bound to.
    pub fn schema(&self) -> Arc<Schema> {
        Arc::clone(&self.state.borrow().schema)
    }

    /// Resolve the instance's current full base path.
    pub fn calculate_path(&self) -> Result<ConfigPath> {
        self.handle().path()
    }

    /// Whether this instance has been deleted or disposed.
    pub fn is_disposed(&self) -> bool {
        self.state.borrow().disposed
    }

    /// Whether any property of this instance, or of any descendant, holds
    /// an unsaved change.
    pub fn is_dirty(&self) -> bool {
        self.handle().is_dirty()
    }

    fn ensure_active(&self) -> Result<()> {
        if self.state.borrow().disposed {
            return Err(Error::ObjectDisposed);
        }
        Ok(())
    }

    fn descriptor(&self, name: &str) -> Result<Arc<PropertyDescriptor>> {
        self.state
            .borrow()
            .schema
            .property(name)
            .cloned()
            .ok_or_else(|| Error::UnknownProperty {
                property: name.to_string(),
            })
    }

    fn property_path(&self, descriptor: &PropertyDescriptor) -> Result<ConfigPath> {
        Ok(resolve_path(&self.calculate_path()?, descriptor))
    }

    /// Read the current value of a scalar property.
    ///
    /// An Unloaded property whose persistence policy permits loading is
    /// loaded implicitly first.
    pub fn get(&self, name: &str) -> Result<Value> {
        self.ensure_active()?;
        let descriptor = self.descriptor(name)?;
        if !matches!(descriptor.kind(), ValueKind::Scalar(_)) {
            return Err(Error::type_mismatch(
                &self.property_path(&descriptor)?,
                descriptor.kind().describe(),
                "use get_object/get_list/get_map for structured properties",
            ));
        }

        let unloaded = matches!(self.state.borrow().slots.get(name), Some(Slot::Unloaded));
        if unloaded {
            if descriptor.persistence().loads() {
                self.load_one_scalar(&descriptor)?;
            } else {
                let initial = descriptor.default_value().cloned().unwrap_or(Value::Null);
                self.state
                    .borrow_mut()
                    .slots
                    .insert(name.to_string(), Slot::Scalar(initial));
            }
        }

        match self.state.borrow().slots.get(name) {
            Some(Slot::Scalar(value)) => Ok(value.clone()),
            _ => Err(Error::UnknownProperty {
                property: name.to_string(),
            }),
        }
    }

    fn load_one_scalar(&self, descriptor: &Arc<PropertyDescriptor>) -> Result<()> {
        let path = self.property_path(descriptor)?;
        let source = Rc::clone(&self.state.borrow().source);
        let raw = source.get(&path);
        let value = from_store(raw.as_deref(), descriptor, &path)?;
        self.state
            .borrow_mut()
            .slots
            .insert(descriptor.name().to_string(), Slot::Scalar(value));
        Ok(())
    }

    /// Assign a new value to a scalar property.
    ///
    /// Marks the property and the instance dirty and raises a change
    /// notification that bubbles to the root, unless a batch-update scope
    /// is open over this subtree.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.ensure_active()?;
        let descriptor = self.descriptor(name)?;
        if descriptor.is_read_only() {
            return Err(Error::ReadOnlyProperty {
                property: name.to_string(),
            });
        }
        let base = self.calculate_path()?;
        let path = resolve_path(&base, &descriptor);
        check_assignable(&value, &descriptor, &path)?;

        let old = {
            let mut st = self.state.borrow_mut();
            let slot = st.slots.entry(name.to_string()).or_insert(Slot::Unloaded);
            let old = match slot {
                Slot::Scalar(current) => current.clone(),
                _ => Value::Null,
            };
            *slot = Slot::Scalar(value.clone());
            st.dirty.insert(name.to_string());
            old
        };

        propagate_change(
            &self.handle(),
            ChangeEvent::Property {
                path: base,
                property: name.to_string(),
                old,
                new: value,
            },
        );
        Ok(())
    }

    /// Borrow the nested object bound to a `Nested` property.
    ///
    /// After the previous child was deleted, a fresh empty child is
    /// constructed in its place.
    pub fn get_object(&self, name: &str) -> Result<ConfigurationObject> {
        self.ensure_active()?;
        let descriptor = self.descriptor(name)?;
        let ValueKind::Nested(child_schema) = descriptor.kind() else {
            return Err(Error::type_mismatch(
                &self.property_path(&descriptor)?,
                descriptor.kind().describe(),
                "property is not a nested object",
            ));
        };

        let existing = match self.state.borrow().slots.get(name) {
            Some(Slot::Object(child)) if !child.is_disposed() => Some(child.clone()),
            _ => None,
        };
        if let Some(child) = existing {
            return Ok(child);
        }

        let child = Self::construct(
            child_schema,
            Attachment::Property {
                parent: ParentLink::Object(Rc::downgrade(&self.state)),
                descriptor: Arc::clone(&descriptor),
            },
            Rc::clone(&self.state.borrow().source),
        );
        self.state
            .borrow_mut()
            .slots
            .insert(name.to_string(), Slot::Object(child.clone()));
        Ok(child)
    }

    /// Borrow the collection bound to a `List` property.
    pub fn get_list(&self, name: &str) -> Result<ConfigurationList> {
        self.ensure_active()?;
        let descriptor = self.descriptor(name)?;
        match self.state.borrow().slots.get(name) {
            Some(Slot::List(list)) => Ok(list.clone()),
            _ => Err(Error::type_mismatch(
                &self.property_path(&descriptor)?,
                descriptor.kind().describe(),
                "property is not a collection",
            )),
        }
    }

    /// Borrow the dictionary bound to a `Map` property.
    pub fn get_map(&self, name: &str) -> Result<ConfigurationMap> {
        self.ensure_active()?;
        let descriptor = self.descriptor(name)?;
        match self.state.borrow().slots.get(name) {
            Some(Slot::Map(map)) => Ok(map.clone()),
            _ => Err(Error::type_mismatch(
                &self.property_path(&descriptor)?,
                descriptor.kind().describe(),
                "property is not a dictionary",
            )),
        }
    }

    /// Re-read every loadable property from the store.
    ///
    /// Atomic per instance: scalar conversions are staged first and applied
    /// only when all of them succeed, so a conversion failure leaves the
    /// instance in its pre-Load state. Registered validators run after a
    /// successful load.
    pub fn load(&self) -> Result<()> {
        self.ensure_active()?;
        let base = self.calculate_path()?;
        self.load_from_base(&base)
    }

    /// Load against an explicit base path.
    ///
    /// The base is threaded down instead of re-resolved from the tree so
    /// that collection elements can be read from the store index they
    /// actually occupy, even when the stored indices have gaps.
    pub(crate) fn load_from_base(&self, base: &ConfigPath) -> Result<()> {
        let schema = Arc::clone(&self.state.borrow().schema);
        let source = Rc::clone(&self.state.borrow().source);
        tracing::debug!(path = %base, shape = %schema.name(), "Loading configuration object");

        let mut staged: Vec<(String, Value)> = Vec::new();
        for descriptor in schema.properties() {
            if !descriptor.persistence().loads() {
                continue;
            }
            if matches!(descriptor.kind(), ValueKind::Scalar(_)) {
                let path = resolve_path(base, descriptor);
                let raw = source.get(&path);
                let value = from_store(raw.as_deref(), descriptor, &path)?;
                staged.push((descriptor.name().to_string(), value));
            }
        }

        for descriptor in schema.properties() {
            if !descriptor.persistence().loads() {
                continue;
            }
            let child_base = resolve_path(base, descriptor);
            match descriptor.kind() {
                ValueKind::Scalar(_) => {}
                ValueKind::Nested(_) => self
                    .get_object(descriptor.name())?
                    .load_from_base(&child_base)?,
                ValueKind::List(_) => self
                    .get_list(descriptor.name())?
                    .load_from_base(&child_base)?,
                ValueKind::Map(_) => self
                    .get_map(descriptor.name())?
                    .load_from_base(&child_base)?,
            }
        }

        {
            let mut st = self.state.borrow_mut();
            for (name, value) in staged {
                st.slots.insert(name, Slot::Scalar(value));
            }
            st.dirty.clear();
        }
        self.run_validators()
    }

    /// Write every dirty savable property back to the store.
    ///
    /// Validators run before anything is written. Children are saved
    /// depth-first, before this instance's own scalars, so a concurrent
    /// Load of the subtree never sees a parent without its children.
    /// Dirty flags clear per instance on that instance's full success;
    /// there is no rollback of children already written when a later write
    /// fails.
    pub fn save(&self) -> Result<()> {
        self.ensure_active()?;
        let base = self.calculate_path()?;
        self.save_from_base(&base)
    }

    pub(crate) fn save_from_base(&self, base: &ConfigPath) -> Result<()> {
        self.run_validators()?;
        let schema = Arc::clone(&self.state.borrow().schema);
        let source = Rc::clone(&self.state.borrow().source);
        tracing::debug!(path = %base, shape = %schema.name(), "Saving configuration object");

        for descriptor in schema.properties() {
            if !descriptor.persistence().saves() {
                continue;
            }
            let child_base = resolve_path(base, descriptor);
            match descriptor.kind() {
                ValueKind::Scalar(_) => {}
                ValueKind::Nested(_) => {
                    let keep = match self.state.borrow().slots.get(descriptor.name()) {
                        Some(Slot::Object(child)) if !child.is_disposed() => Some(child.clone()),
                        _ => None,
                    };
                    if let Some(child) = keep {
                        child.save_from_base(&child_base)?;
                    }
                }
                ValueKind::List(_) => self
                    .get_list(descriptor.name())?
                    .save_from_base(&child_base)?,
                ValueKind::Map(_) => self
                    .get_map(descriptor.name())?
                    .save_from_base(&child_base)?,
            }
        }

        for descriptor in schema.properties() {
            if !descriptor.persistence().saves()
                || !matches!(descriptor.kind(), ValueKind::Scalar(_))
            {
                continue;
            }
            let value = {
                let st = self.state.borrow();
                if !st.dirty.contains(descriptor.name()) {
                    continue;
                }
                match st.slots.get(descriptor.name()) {
                    Some(Slot::Scalar(value)) => value.clone(),
                    _ => continue,
                }
            };
            let path = resolve_path(base, descriptor);
            match to_store(&value) {
                Some(stored) => source.set(&path, &stored)?,
                None => source.remove(&path)?,
            }
        }

        self.state.borrow_mut().dirty.clear();
        Ok(())
    }

    /// Remove every path owned by this instance from the store, detach it
    /// from its parent and dispose it. Subsequent access fails with
    /// [`Error::ObjectDisposed`].
    pub fn delete(&self) -> Result<()> {
        self.ensure_active()?;
        let base = self.calculate_path()?;
        tracing::debug!(path = %base, "Deleting configuration object");
        self.delete_store_contents(&base)?;

        let parent = self.handle().parent();
        if let Some(parent_handle) = &parent {
            match parent_handle {
                NodeHandle::List(list) => {
                    ConfigurationList::from_state(Rc::clone(list)).detach(self.handle().ptr_id());
                }
                NodeHandle::Map(map) => {
                    ConfigurationMap::from_state(Rc::clone(map)).detach(self.handle().ptr_id());
                }
                NodeHandle::Object(_) => {
                    // A nested property child: the parent keeps the slot and
                    // reconstructs a fresh child on next access.
                }
            }
        }

        self.handle().dispose_tree();
        if let Some(parent_handle) = parent {
            if let Ok(path) = parent_handle.path() {
                propagate_change(&parent_handle, ChangeEvent::Structure { path });
            }
        }
        Ok(())
    }

    fn delete_store_contents(&self, base: &ConfigPath) -> Result<()> {
        let schema = Arc::clone(&self.state.borrow().schema);
        let source = Rc::clone(&self.state.borrow().source);
        for descriptor in schema.properties() {
            let path = resolve_path(base, descriptor);
            match descriptor.kind() {
                ValueKind::Scalar(_) => source.remove(&path)?,
                _ => purge_subtree(source.as_ref(), &path)?,
            }
        }
        // Sweep stray entries under our prefix; never from the store root.
        if !base.is_root() {
            purge_subtree(source.as_ref(), base)?;
        }
        Ok(())
    }

    /// Release subscriptions without touching the store. Idempotent.
    pub fn dispose(&self) {
        self.handle().dispose_tree();
    }

    /// Register a change observer on this instance.
    pub fn subscribe(&self, observer: impl Fn(&ChangeEvent) + 'static) -> ObserverId {
        let observer: Observer = Rc::new(observer);
        self.state.borrow_mut().observers.subscribe(observer)
    }

    /// Remove a previously registered observer.
    pub fn unsubscribe(&self, id: ObserverId) {
        self.state.borrow_mut().observers.unsubscribe(id);
    }

    /// Open a batch-update scope over this instance's subtree.
    ///
    /// While the returned guard lives, change notifications are suspended;
    /// on drop each touched node fires a single aggregate notification.
    pub fn begin_update(&self) -> UpdateScope {
        let node = self.handle();
        node.begin_update();
        UpdateScope { node }
    }

    /// Register a validation hook, run after Load and before Save commits.
    pub fn add_validator(&self, validator: Rc<dyn Validator>) {
        self.state.borrow_mut().validators.push(validator);
    }

    fn run_validators(&self) -> Result<()> {
        let validators = self.state.borrow().validators.clone();
        for validator in validators {
            validator.validate(self).map_err(|failure| Error::Validation {
                rule: validator.name().to_string(),
                property: failure.property,
                message: failure.message,
            })?;
        }
        Ok(())
    }

    /// Mark every loaded scalar, recursively, as dirty so the next Save
    /// rewrites the whole subtree. Used when collection elements move to a
    /// new index or key.
    pub(crate) fn mark_all_dirty(&self) {
        let schema = Arc::clone(&self.state.borrow().schema);
        {
            let mut st = self.state.borrow_mut();
            for descriptor in schema.properties() {
                if matches!(descriptor.kind(), ValueKind::Scalar(_))
                    && matches!(st.slots.get(descriptor.name()), Some(Slot::Scalar(_)))
                {
                    st.dirty.insert(descriptor.name().to_string());
                }
            }
        }
        for child in self.handle().children() {
            child.mark_all_dirty();
        }
    }

    // Typed accessor wrappers over the uniform get/set API.

    /// Get a string property; `None` when the value is null.
    pub fn get_str(&self, name: &str) -> Result<Option<String>> {
        match self.get(name)? {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s)),
            other => Err(self.accessor_mismatch(name, "string", &other)),
        }
    }

    /// Get an integer property; `None` when the value is null.
    pub fn get_i64(&self, name: &str) -> Result<Option<i64>> {
        match self.get(name)? {
            Value::Null => Ok(None),
            Value::Integer(i) => Ok(Some(i)),
            other => Err(self.accessor_mismatch(name, "integer", &other)),
        }
    }

    /// Get a float property; `None` when the value is null.
    pub fn get_f64(&self, name: &str) -> Result<Option<f64>> {
        match self.get(name)? {
            Value::Null => Ok(None),
            Value::Float(f) => Ok(Some(f)),
            other => Err(self.accessor_mismatch(name, "float", &other)),
        }
    }

    /// Get a boolean property; `None` when the value is null.
    pub fn get_bool(&self, name: &str) -> Result<Option<bool>> {
        match self.get(name)? {
            Value::Null => Ok(None),
            Value::Boolean(b) => Ok(Some(b)),
            other => Err(self.accessor_mismatch(name, "boolean", &other)),
        }
    }

    pub fn set_str(&self, name: &str, value: impl Into<String>) -> Result<()> {
        self.set(name, Value::String(value.into()))
    }

    pub fn set_i64(&self, name: &str, value: i64) -> Result<()> {
        self.set(name, Value::Integer(value))
    }

    pub fn set_f64(&self, name: &str, value: f64) -> Result<()> {
        self.set(name, Value::Float(value))
    }

    pub fn set_bool(&self, name: &str, value: bool) -> Result<()> {
        self.set(name, Value::Boolean(value))
    }

    /// Set a nullable property to null.
    pub fn set_null(&self, name: &str) -> Result<()> {
        self.set(name, Value::Null)
    }

    fn accessor_mismatch(&self, name: &str, expected: &str, actual: &Value) -> Error {
        let path = self
            .descriptor(name)
            .and_then(|d| self.property_path(&d))
            .map(|p| p.as_str().to_string())
            .unwrap_or_else(|_| name.to_string());
        Error::TypeMismatch {
            path,
            expected: expected.to_string(),
            message: format!("holds {actual:?}"),
        }
    }
}

impl std::fmt::Debug for ConfigurationObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.state.borrow();
        f.debug_struct("ConfigurationObject")
            .field("shape", &st.schema.name())
            .field("dirty", &st.dirty)
            .field("disposed", &st.disposed)
            .finish()
    }
}
