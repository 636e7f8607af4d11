//! Declared configuration shapes and their property descriptors
//!
//! A [`Schema`] is the explicit, engine-neutral description of one
//! configuration shape: an ordered list of immutable
//! [`PropertyDescriptor`]s. Schemas are built once through
//! [`SchemaBuilder`], validated at build time, and shared via `Arc`.
//! The [`SchemaRegistry`] caches build outcomes so a malformed shape
//! fails fast with the same error on every later instantiation.

use crate::{Error, Result, ScalarKind, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

/// How a property's store path is composed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathKind {
    /// The segment is an absolute path from the store root; any inherited
    /// parent path is ignored.
    Root(String),
    /// The segment is appended to the owning instance's path.
    Suffix(String),
}

/// Which persistence operations include a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Persistence {
    /// Never read from or written to the store
    None,
    /// Read during Load, never written
    LoadOnly,
    /// Written during Save, never read
    SaveOnly,
    /// Both read and written
    #[default]
    LoadAndSave,
}

impl Persistence {
    /// Whether Load reads this property from the store.
    pub fn loads(self) -> bool {
        matches!(self, Self::LoadOnly | Self::LoadAndSave)
    }

    /// Whether Save writes this property to the store.
    pub fn saves(self) -> bool {
        matches!(self, Self::SaveOnly | Self::LoadAndSave)
    }
}

/// The declared kind of a property's value.
#[derive(Debug, Clone)]
pub enum ValueKind {
    /// A leaf string-convertible value
    Scalar(ScalarKind),
    /// A nested configuration object of the given shape
    Nested(Arc<Schema>),
    /// An ordered collection of objects of the given shape
    List(Arc<Schema>),
    /// A keyed dictionary of objects of the given shape
    Map(Arc<Schema>),
}

impl ValueKind {
    /// Short human-readable description, used in error messages.
    pub fn describe(&self) -> String {
        match self {
            Self::Scalar(kind) => format!("{kind} scalar"),
            Self::Nested(schema) => format!("nested {}", schema.name()),
            Self::List(schema) => format!("collection of {}", schema.name()),
            Self::Map(schema) => format!("dictionary of {}", schema.name()),
        }
    }
}

/// Immutable metadata for one declared property.
///
/// Built through the constructor methods plus chained modifiers, then
/// frozen inside a [`Schema`]:
///
/// ```
/// use conf_model::{PropertyDescriptor, ScalarKind, Value};
///
/// let retries = PropertyDescriptor::scalar("RetryCount", ScalarKind::Integer)
///     .with_default(Value::Integer(5))
///     .read_only();
/// assert!(retries.is_read_only());
/// ```
#[derive(Debug, Clone)]
pub struct PropertyDescriptor {
    name: String,
    kind: ValueKind,
    path: PathKind,
    persistence: Persistence,
    default: Option<Value>,
    read_only: bool,
    nullable: bool,
}

impl PropertyDescriptor {
    /// Declare a scalar property. Path defaults to `Suffix(name)`,
    /// persistence to `LoadAndSave`, no default, writable, non-nullable.
    pub fn scalar(name: impl Into<String>, kind: ScalarKind) -> Self {
        let name = name.into();
        Self {
            path: PathKind::Suffix(name.clone()),
            name,
            kind: ValueKind::Scalar(kind),
            persistence: Persistence::default(),
            default: None,
            read_only: false,
            nullable: false,
        }
    }

    /// Declare a nested object property of the given shape.
    pub fn nested(name: impl Into<String>, schema: Arc<Schema>) -> Self {
        let name = name.into();
        Self {
            path: PathKind::Suffix(name.clone()),
            name,
            kind: ValueKind::Nested(schema),
            persistence: Persistence::default(),
            default: None,
            read_only: false,
            nullable: false,
        }
    }

    /// Declare an ordered collection property of the given element shape.
    pub fn list(name: impl Into<String>, element: Arc<Schema>) -> Self {
        let name = name.into();
        Self {
            path: PathKind::Suffix(name.clone()),
            name,
            kind: ValueKind::List(element),
            persistence: Persistence::default(),
            default: None,
            read_only: false,
            nullable: false,
        }
    }

    /// Declare a keyed dictionary property of the given element shape.
    pub fn map(name: impl Into<String>, element: Arc<Schema>) -> Self {
        let name = name.into();
        Self {
            path: PathKind::Suffix(name.clone()),
            name,
            kind: ValueKind::Map(element),
            persistence: Persistence::default(),
            default: None,
            read_only: false,
            nullable: false,
        }
    }

    /// Use a different path segment than the property name.
    pub fn with_segment(mut self, segment: impl Into<String>) -> Self {
        self.path = PathKind::Suffix(segment.into());
        self
    }

    /// Anchor the property at an absolute path from the store root.
    pub fn at_root(mut self, segment: impl Into<String>) -> Self {
        self.path = PathKind::Root(segment.into());
        self
    }

    /// Override the persistence policy.
    pub fn with_persistence(mut self, persistence: Persistence) -> Self {
        self.persistence = persistence;
        self
    }

    /// Declare a default value, used when the store entry is absent.
    ///
    /// `with_default(Value::Null)` is an explicit "defaults to null" and is
    /// distinct from declaring no default at all.
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Reject writes through `set`.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Allow the property to hold `Value::Null`.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }

    pub fn path(&self) -> &PathKind {
        &self.path
    }

    pub fn persistence(&self) -> Persistence {
        self.persistence
    }

    /// The declared default, with `None` meaning "no default was set".
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }
}

/// A validated, immutable declared shape.
#[derive(Debug)]
pub struct Schema {
    name: String,
    properties: Vec<Arc<PropertyDescriptor>>,
    by_name: HashMap<String, usize>,
}

impl Schema {
    /// Start building a shape with the given name.
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            name: name.into(),
            properties: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The properties in declaration order.
    pub fn properties(&self) -> &[Arc<PropertyDescriptor>] {
        &self.properties
    }

    /// Look up a property by name.
    pub fn property(&self, name: &str) -> Option<&Arc<PropertyDescriptor>> {
        self.by_name.get(name).map(|&idx| &self.properties[idx])
    }

    /// Whether any property of this shape, or of a shape nested anywhere
    /// below it, declares a Root path.
    fn contains_root_path(&self) -> bool {
        self.properties.iter().any(|p| {
            matches!(p.path(), PathKind::Root(_))
                || match p.kind() {
                    ValueKind::Scalar(_) => false,
                    ValueKind::Nested(s) | ValueKind::List(s) | ValueKind::Map(s) => {
                        s.contains_root_path()
                    }
                }
        })
    }
}

/// Builder for [`Schema`]; `build` performs all shape validation.
pub struct SchemaBuilder {
    name: String,
    properties: Vec<PropertyDescriptor>,
}

impl SchemaBuilder {
    /// Add a property declaration.
    pub fn property(mut self, descriptor: PropertyDescriptor) -> Self {
        self.properties.push(descriptor);
        self
    }

    /// Validate and freeze the shape.
    ///
    /// Fails with [`Error::Schema`] when:
    /// - two properties share a name,
    /// - two properties resolve to the same full path,
    /// - a path segment is empty,
    /// - a nested shape (at any depth) declares a Root-path property, which
    ///   would be ambiguous under a non-root parent.
    pub fn build(self) -> Result<Arc<Schema>> {
        let mut by_name = HashMap::new();
        let mut seen_paths: HashMap<(bool, &str), &str> = HashMap::new();

        for (idx, prop) in self.properties.iter().enumerate() {
            if by_name.insert(prop.name().to_string(), idx).is_some() {
                return Err(Error::schema(
                    &self.name,
                    format!("duplicate property name {}", prop.name()),
                ));
            }

            let (is_root, segment) = match prop.path() {
                PathKind::Root(segment) => (true, segment.as_str()),
                PathKind::Suffix(segment) => (false, segment.as_str()),
            };
            if segment.is_empty() {
                return Err(Error::schema(
                    &self.name,
                    format!("property {} has an empty path segment", prop.name()),
                ));
            }
            if let Some(other) = seen_paths.insert((is_root, segment), prop.name()) {
                return Err(Error::schema(
                    &self.name,
                    format!(
                        "properties {other} and {} resolve to the same path {segment}",
                        prop.name()
                    ),
                ));
            }

            match prop.kind() {
                ValueKind::Scalar(_) => {}
                ValueKind::Nested(child) | ValueKind::List(child) | ValueKind::Map(child) => {
                    if child.contains_root_path() {
                        return Err(Error::schema(
                            &self.name,
                            format!(
                                "property {} nests shape {} which declares a Root path",
                                prop.name(),
                                child.name()
                            ),
                        ));
                    }
                }
            }
        }

        Ok(Arc::new(Schema {
            name: self.name,
            properties: self.properties.into_iter().map(Arc::new).collect(),
            by_name,
        }))
    }
}

enum BuildOutcome {
    Built(Arc<Schema>),
    Failed { shape: String, message: String },
}

/// Cache of schema build outcomes keyed by shape name.
///
/// Build errors are cached too, so every later instantiation of the same
/// shape fails fast with the same error instead of re-running validation.
#[derive(Default)]
pub struct SchemaRegistry {
    outcomes: RefCell<HashMap<String, BuildOutcome>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the cached outcome for `name`, building it on first use.
    pub fn get_or_build<F>(&self, name: &str, build: F) -> Result<Arc<Schema>>
    where
        F: FnOnce() -> Result<Arc<Schema>>,
    {
        if let Some(outcome) = self.outcomes.borrow().get(name) {
            return match outcome {
                BuildOutcome::Built(schema) => Ok(Arc::clone(schema)),
                BuildOutcome::Failed { shape, message } => {
                    Err(Error::schema(shape.clone(), message.clone()))
                }
            };
        }

        let result = build();
        let outcome = match &result {
            Ok(schema) => BuildOutcome::Built(Arc::clone(schema)),
            Err(Error::Schema { shape, message }) => BuildOutcome::Failed {
                shape: shape.clone(),
                message: message.clone(),
            },
            Err(other) => BuildOutcome::Failed {
                shape: name.to_string(),
                message: other.to_string(),
            },
        };
        self.outcomes
            .borrow_mut()
            .insert(name.to_string(), outcome);
        result
    }

    /// Shape names with a cached outcome, sorted.
    pub fn list_shapes(&self) -> Vec<String> {
        let mut shapes: Vec<String> = self.outcomes.borrow().keys().cloned().collect();
        shapes.sort();
        shapes
    }

    pub fn len(&self) -> usize {
        self.outcomes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.borrow().is_empty()
    }
}
