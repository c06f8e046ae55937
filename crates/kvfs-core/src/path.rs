//! Mapping between filesystem paths and store keys.
//!
//! The store has one flat keyspace. A key ending in `/` is a directory
//! marker; any other key is a file. [`is_directory_key`] is the only place
//! that convention is checked.

use crate::attr::EntryKind;

/// Strip a single leading `/` from a filesystem path.
///
/// Case and segments are left untouched: `/a/B` becomes `a/B`.
pub fn to_store_key(path: &str) -> &str {
    path.strip_prefix('/').unwrap_or(path)
}

/// True iff `key` is empty or ends with `/`.
pub fn is_directory_key(key: &str) -> bool {
    key.is_empty() || key.ends_with('/')
}

/// A direct child derived from one key of a prefix listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Display name, without any trailing `/`.
    pub name: String,
    pub kind: EntryKind,
}

/// Classify a key returned by `list(list_prefix)`.
///
/// `list_prefix` is the listed directory's own marker form (`a/b/`, or the
/// empty string for the whole keyspace). Returns `None` for the directory's
/// own marker and for anything nested deeper than one segment.
pub fn split_entry(key: &str, list_prefix: &str) -> Option<DirEntry> {
    let rest = key.strip_prefix(list_prefix)?;
    if rest.is_empty() {
        return None;
    }

    let kind = EntryKind::from_key(rest);
    let name = match kind {
        EntryKind::Directory => &rest[..rest.len() - 1],
        EntryKind::File => rest,
    };

    if name.is_empty() || name.contains('/') {
        return None;
    }

    Some(DirEntry {
        name: name.to_string(),
        kind,
    })
}

/// Key construction under a normalized root prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyspace {
    root: String,
}

impl Keyspace {
    /// `root` must already be normalized (see `kvfs_config::normalize_root`).
    pub fn new(root: impl Into<String>) -> Self {
        Keyspace { root: root.into() }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// True when `path` names the mount root.
    pub fn is_root(path: &str) -> bool {
        to_store_key(path).is_empty()
    }

    /// File key for `path`.
    pub fn key(&self, path: &str) -> String {
        format!("{}{}", self.root, to_store_key(path))
    }

    /// Directory marker (and listing prefix) for `path`.
    pub fn dir_key(&self, path: &str) -> String {
        if Self::is_root(path) {
            self.root.clone()
        } else {
            format!("{}{}/", self.root, to_store_key(path))
        }
    }
}
