//! Colon-delimited hierarchical path handling

/// Separator between path segments in the store.
pub const SEPARATOR: char = ':';

/// A normalized colon-delimited path into the hierarchical store.
///
/// Paths identify either one scalar entry or the root of a subtree.
/// The empty path is the store root. Segments that may contain the
/// separator character must be escaped with [`escape_segment`] before
/// being joined.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigPath {
    /// Internal representation; segments joined by `:`
    inner: String,
}

impl ConfigPath {
    /// Create a path from an already-delimited string.
    pub fn new(path: impl Into<String>) -> Self {
        Self { inner: path.into() }
    }

    /// The empty root path.
    pub fn root() -> Self {
        Self::default()
    }

    /// Whether this is the empty root path.
    pub fn is_root(&self) -> bool {
        self.inner.is_empty()
    }

    /// Get the delimited string representation.
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Join this path with a raw segment.
    ///
    /// The segment is used verbatim; callers holding arbitrary keys must
    /// escape them first.
    pub fn join(&self, segment: &str) -> Self {
        if self.inner.is_empty() {
            Self::new(segment)
        } else {
            Self::new(format!("{}{}{}", self.inner, SEPARATOR, segment))
        }
    }

    /// Join this path with a collection element index.
    pub fn join_index(&self, index: usize) -> Self {
        self.join(&index.to_string())
    }

    /// Join this path with an arbitrary dictionary key, escaping it.
    pub fn join_key(&self, key: &str) -> Self {
        self.join(&escape_segment(key))
    }

    /// Get the parent path, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.inner.is_empty() {
            return None;
        }
        match self.inner.rfind(SEPARATOR) {
            Some(idx) => Some(Self::new(&self.inner[..idx])),
            None => Some(Self::root()),
        }
    }

    /// Get the final segment, or `None` for the root.
    pub fn last_segment(&self) -> Option<&str> {
        if self.inner.is_empty() {
            return None;
        }
        self.inner.rsplit(SEPARATOR).next()
    }

    /// Iterate the segments of this path.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.inner.split(SEPARATOR).filter(|s| !s.is_empty())
    }

    /// Whether this path equals `prefix` or lies inside its subtree.
    ///
    /// Respects segment boundaries: `"ab:c"` is not under `"a"`.
    pub fn is_under(&self, prefix: &ConfigPath) -> bool {
        if prefix.is_root() {
            return true;
        }
        if !self.inner.starts_with(&prefix.inner) {
            return false;
        }
        self.inner.len() == prefix.inner.len()
            || self.inner[prefix.inner.len()..].starts_with(SEPARATOR)
    }
}

impl std::fmt::Display for ConfigPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl From<&str> for ConfigPath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ConfigPath {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Escape a segment so it cannot collide with the separator.
///
/// `%` becomes `%25` and `:` becomes `%3A`.
pub fn escape_segment(segment: &str) -> String {
    segment.replace('%', "%25").replace(SEPARATOR, "%3A")
}

/// Reverse [`escape_segment`].
pub fn unescape_segment(segment: &str) -> String {
    segment.replace("%3A", ":").replace("%25", "%")
}
