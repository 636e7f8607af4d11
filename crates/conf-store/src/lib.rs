//! Hierarchical key/value configuration store abstraction
//!
//! Provides the colon-delimited path type, the `ConfigurationSource`
//! boundary the object model binds to, and an in-memory store with
//! document flattening and a coalescing change token.

pub mod error;
pub mod flatten;
pub mod path;
pub mod store;
pub mod watch;

pub use error::{Error, Result};
pub use flatten::{flatten_json, flatten_toml};
pub use path::{ConfigPath, escape_segment, unescape_segment};
pub use store::{ConfigurationSource, MemoryStore};
pub use watch::{ChangeNotifier, WatchGuard};
