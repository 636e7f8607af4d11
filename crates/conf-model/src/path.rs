//! Pure path resolution for properties and container elements
//!
//! Resolution is invoked on every read, write, load and save rather than
//! cached, so a renumbered collection element or rekeyed dictionary entry
//! always resolves to its current path.

use crate::schema::{PathKind, PropertyDescriptor};
use conf_store::ConfigPath;

/// Compose the full store path for a property under `parent`.
///
/// Root-path properties ignore the parent entirely; suffix-path properties
/// append their segment with the colon separator.
pub fn resolve_path(parent: &ConfigPath, descriptor: &PropertyDescriptor) -> ConfigPath {
    match descriptor.path() {
        PathKind::Root(segment) => ConfigPath::new(segment.clone()),
        PathKind::Suffix(segment) => parent.join(segment),
    }
}

/// Path of an ordered-collection element: the decimal, unpadded index
/// appended to the collection path.
pub fn element_index_path(collection: &ConfigPath, index: usize) -> ConfigPath {
    collection.join_index(index)
}

/// Path of a dictionary element: the escaped key appended to the
/// dictionary path.
pub fn element_key_path(dictionary: &ConfigPath, key: &str) -> ConfigPath {
    dictionary.join_key(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScalarKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn suffix_appends_to_parent() {
        let desc = PropertyDescriptor::scalar("Key", ScalarKind::String);
        let path = resolve_path(&ConfigPath::new("Section:Sub"), &desc);
        assert_eq!(path.as_str(), "Section:Sub:Key");
    }

    #[test]
    fn suffix_under_empty_parent_is_bare_segment() {
        let desc = PropertyDescriptor::scalar("Key", ScalarKind::String);
        let path = resolve_path(&ConfigPath::root(), &desc);
        assert_eq!(path.as_str(), "Key");
    }

    #[test]
    fn root_ignores_parent() {
        let desc = PropertyDescriptor::scalar("Key", ScalarKind::String).at_root("Global:Key");
        let path = resolve_path(&ConfigPath::new("Section:Sub"), &desc);
        assert_eq!(path.as_str(), "Global:Key");
    }

    #[test]
    fn custom_segment_overrides_property_name() {
        let desc = PropertyDescriptor::scalar("Key", ScalarKind::String).with_segment("k");
        let path = resolve_path(&ConfigPath::new("S"), &desc);
        assert_eq!(path.as_str(), "S:k");
    }

    #[test]
    fn element_paths_append_index_and_escaped_key() {
        let base = ConfigPath::new("Items");
        assert_eq!(element_index_path(&base, 10).as_str(), "Items:10");
        assert_eq!(element_key_path(&base, "a:b").as_str(), "Items:a%3Ab");
    }

    #[test]
    fn resolution_is_pure() {
        let desc = PropertyDescriptor::scalar("Key", ScalarKind::String);
        let parent = ConfigPath::new("P");
        assert_eq!(resolve_path(&parent, &desc), resolve_path(&parent, &desc));
    }
}
