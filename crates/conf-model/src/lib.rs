//! Typed, change-tracked configuration object model
//!
//! Binds declared shapes ([`Schema`]) to a hierarchical key/value store
//! ([`conf_store::ConfigurationSource`]) and hands out live instances:
//!
//! - [`ConfigurationObject`] — property values, dirty tracking, change
//!   events, Load/Save/Delete lifecycle
//! - [`ConfigurationList`] / [`ConfigurationMap`] — ordered and keyed
//!   containers of nested objects
//!
//! # Example
//!
//! ```
//! use conf_model::{ConfigurationObject, PropertyDescriptor, ScalarKind, Schema, Value};
//! use conf_store::MemoryStore;
//! use std::rc::Rc;
//!
//! let schema = Schema::builder("App")
//!     .property(
//!         PropertyDescriptor::scalar("RetryCount", ScalarKind::Integer)
//!             .with_default(Value::Integer(5)),
//!     )
//!     .property(PropertyDescriptor::scalar("Name", ScalarKind::String).nullable())
//!     .build()
//!     .unwrap();
//!
//! let store = Rc::new(MemoryStore::new());
//! let app = ConfigurationObject::bind(&schema, store).unwrap();
//! assert_eq!(app.get_i64("RetryCount").unwrap(), Some(5));
//! assert_eq!(app.get_str("Name").unwrap(), None);
//!
//! app.set_str("Name", "demo").unwrap();
//! assert!(app.is_dirty());
//! app.save().unwrap();
//! assert!(!app.is_dirty());
//! ```

pub mod collection;
pub mod convert;
pub mod dictionary;
pub mod error;
pub mod events;
mod node;
pub mod object;
pub mod path;
pub mod schema;
pub mod validate;
pub mod value;

pub use collection::ConfigurationList;
pub use convert::{check_assignable, from_store, to_store};
pub use dictionary::ConfigurationMap;
pub use error::{Error, Result};
pub use events::{ChangeEvent, ObserverId, UpdateScope};
pub use object::ConfigurationObject;
pub use path::{element_index_path, element_key_path, resolve_path};
pub use schema::{
    PathKind, Persistence, PropertyDescriptor, Schema, SchemaBuilder, SchemaRegistry, ValueKind,
};
pub use validate::{FnValidator, ValidationFailure, Validator};
pub use value::{ScalarKind, Value};
