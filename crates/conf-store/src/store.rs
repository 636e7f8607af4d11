//! The configuration source boundary and its in-memory implementation

use crate::{ChangeNotifier, ConfigPath, Result, WatchGuard, path::SEPARATOR};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

/// An already-merged hierarchical key/value configuration source.
///
/// The store is a flat mapping from colon-delimited path strings to string
/// values; subtrees exist only implicitly as shared path prefixes. One store
/// handle is shared read-mostly across a whole tree of configuration
/// objects, so every method takes `&self` and implementations use interior
/// mutability. The model is single-threaded per tree.
pub trait ConfigurationSource {
    /// Read the raw string value at an exact path, or `None` if unset.
    fn get(&self, path: &ConfigPath) -> Option<String>;

    /// Write the value at an exact path. Used only during Save.
    fn set(&self, path: &ConfigPath, value: &str) -> Result<()>;

    /// Remove the entry at an exact path. Used only during Delete/Save.
    fn remove(&self, path: &ConfigPath) -> Result<()>;

    /// Enumerate the immediate child segment names under a path.
    ///
    /// Returns each distinct next segment of entries living below `path`,
    /// in sorted order. Used to discover collection and dictionary elements
    /// whose keys are unknown until Load.
    fn child_keys(&self, path: &ConfigPath) -> Vec<String>;

    /// Register for coalesced "store changed externally" notifications.
    fn subscribe(&self, observer: Rc<dyn Fn()>) -> WatchGuard;
}

/// In-memory [`ConfigurationSource`] backed by a sorted map.
///
/// Writes performed through the trait (`set`/`remove`) do not fire the
/// change token; they are the object model's own Save/Delete traffic.
/// External mutation goes through [`MemoryStore::apply`] or the document
/// loaders, which notify subscribers once per batch.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<BTreeMap<String, String>>,
    notifier: ChangeNotifier,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated from `(path, value)` pairs.
    pub fn with_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (ConfigPath, String)>,
    {
        let store = Self::new();
        store.entries.borrow_mut().extend(
            entries
                .into_iter()
                .map(|(path, value)| (path.as_str().to_string(), value)),
        );
        store
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Snapshot every entry in path order.
    pub fn snapshot(&self) -> Vec<(ConfigPath, String)> {
        self.entries
            .borrow()
            .iter()
            .map(|(path, value)| (ConfigPath::new(path.clone()), value.clone()))
            .collect()
    }

    /// Apply a batch of external mutations, then notify subscribers once.
    ///
    /// A `None` value removes the entry. This is the "store changed
    /// externally" entry point; the object model re-Loads in response.
    pub fn apply<I>(&self, changes: I)
    where
        I: IntoIterator<Item = (ConfigPath, Option<String>)>,
    {
        {
            let mut entries = self.entries.borrow_mut();
            for (path, value) in changes {
                match value {
                    Some(value) => {
                        entries.insert(path.as_str().to_string(), value);
                    }
                    None => {
                        entries.remove(path.as_str());
                    }
                }
            }
        }
        tracing::debug!(entries = self.len(), "External store mutation applied");
        self.notifier.notify();
    }
}

impl ConfigurationSource for MemoryStore {
    fn get(&self, path: &ConfigPath) -> Option<String> {
        self.entries.borrow().get(path.as_str()).cloned()
    }

    fn set(&self, path: &ConfigPath, value: &str) -> Result<()> {
        self.entries
            .borrow_mut()
            .insert(path.as_str().to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, path: &ConfigPath) -> Result<()> {
        self.entries.borrow_mut().remove(path.as_str());
        Ok(())
    }

    fn child_keys(&self, path: &ConfigPath) -> Vec<String> {
        let entries = self.entries.borrow();
        let prefix = if path.is_root() {
            String::new()
        } else {
            format!("{}{}", path.as_str(), SEPARATOR)
        };

        let mut keys = BTreeSet::new();
        for full in entries.range(prefix.clone()..) {
            let (full, _) = full;
            if !full.starts_with(&prefix) {
                break;
            }
            let rest = &full[prefix.len()..];
            let segment = rest.split(SEPARATOR).next().unwrap_or(rest);
            if !segment.is_empty() {
                keys.insert(segment.to_string());
            }
        }
        keys.into_iter().collect()
    }

    fn subscribe(&self, observer: Rc<dyn Fn()>) -> WatchGuard {
        self.notifier.subscribe(observer)
    }
}
