//! Inode management for the FUSE filesystem.
//!
//! The store has no inode numbers, so they are handed out on first sight of
//! a path and kept until the path is removed or renamed away.

use std::collections::HashMap;

use parking_lot::RwLock;

/// Reserved inode for the root directory.
pub const ROOT_INO: u64 = 1;

struct Maps {
    path_to_ino: HashMap<String, u64>,
    ino_to_path: HashMap<u64, String>,
    next_ino: u64,
}

/// Bidirectional inode/path table.
pub struct InodeTable {
    maps: RwLock<Maps>,
}

impl InodeTable {
    /// Create a table holding only the root directory.
    pub fn new() -> Self {
        let mut maps = Maps {
            path_to_ino: HashMap::new(),
            ino_to_path: HashMap::new(),
            next_ino: ROOT_INO + 1,
        };
        maps.path_to_ino.insert("/".to_string(), ROOT_INO);
        maps.ino_to_path.insert(ROOT_INO, "/".to_string());

        InodeTable {
            maps: RwLock::new(maps),
        }
    }

    /// Get or allocate the inode for `path`.
    pub fn get_or_create(&self, path: &str) -> u64 {
        let normalized = normalize_path(path);

        if let Some(&ino) = self.maps.read().path_to_ino.get(&normalized) {
            return ino;
        }

        let mut maps = self.maps.write();
        // Another caller may have won the race between the two locks.
        if let Some(&ino) = maps.path_to_ino.get(&normalized) {
            return ino;
        }
        let ino = maps.next_ino;
        maps.next_ino += 1;
        maps.path_to_ino.insert(normalized.clone(), ino);
        maps.ino_to_path.insert(ino, normalized);
        ino
    }

    pub fn get_ino(&self, path: &str) -> Option<u64> {
        self.maps
            .read()
            .path_to_ino
            .get(&normalize_path(path))
            .copied()
    }

    pub fn get_path(&self, ino: u64) -> Option<String> {
        self.maps.read().ino_to_path.get(&ino).cloned()
    }

    /// Child path of `parent_ino`, if the parent is known.
    pub fn resolve_child(&self, parent_ino: u64, name: &str) -> Option<String> {
        let parent_path = self.get_path(parent_ino)?;
        Some(child_path(&parent_path, name))
    }

    /// Inode of the directory containing `path`.
    pub fn parent_ino(&self, path: &str) -> u64 {
        let normalized = normalize_path(path);
        match normalized.rfind('/') {
            Some(0) | None => ROOT_INO,
            Some(idx) => self.get_ino(&normalized[..idx]).unwrap_or(ROOT_INO),
        }
    }

    /// Forget a single path.
    pub fn remove_path(&self, path: &str) {
        let normalized = normalize_path(path);
        if normalized == "/" {
            return;
        }
        let mut maps = self.maps.write();
        if let Some(ino) = maps.path_to_ino.remove(&normalized) {
            maps.ino_to_path.remove(&ino);
        }
    }

    /// Forget `path` and everything beneath it.
    pub fn remove_subtree(&self, path: &str) {
        let normalized = normalize_path(path);
        if normalized == "/" {
            return;
        }
        let nested = format!("{}/", normalized);

        let mut maps = self.maps.write();
        let doomed: Vec<(String, u64)> = maps
            .path_to_ino
            .iter()
            .filter(|(p, _)| **p == normalized || p.starts_with(&nested))
            .map(|(p, &ino)| (p.clone(), ino))
            .collect();
        for (p, ino) in doomed {
            maps.path_to_ino.remove(&p);
            maps.ino_to_path.remove(&ino);
        }
    }

    /// Re-point the inode of `from` (and anything beneath it) at `to`.
    ///
    /// Whatever `to` mapped to before is forgotten. The kernel keeps the
    /// moved inode number, so it has to stay resolvable.
    pub fn rename(&self, from: &str, to: &str) {
        let from = normalize_path(from);
        let to = normalize_path(to);
        if from == "/" || to == "/" || from == to {
            return;
        }

        let mut maps = self.maps.write();
        let stale_prefix = format!("{}/", to);
        let stale: Vec<String> = maps
            .path_to_ino
            .keys()
            .filter(|p| **p == to || p.starts_with(&stale_prefix))
            .cloned()
            .collect();
        for p in stale {
            if let Some(ino) = maps.path_to_ino.remove(&p) {
                maps.ino_to_path.remove(&ino);
            }
        }

        let nested = format!("{}/", from);
        let moved: Vec<(String, u64)> = maps
            .path_to_ino
            .iter()
            .filter(|(p, _)| **p == from || p.starts_with(&nested))
            .map(|(p, &ino)| (p.clone(), ino))
            .collect();
        for (old_path, ino) in moved {
            let new_path = format!("{}{}", to, &old_path[from.len()..]);
            maps.path_to_ino.remove(&old_path);
            maps.path_to_ino.insert(new_path.clone(), ino);
            maps.ino_to_path.insert(ino, new_path);
        }
    }

    pub fn len(&self) -> usize {
        self.maps.read().path_to_ino.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Leading slash, no trailing slash except for the root.
fn normalize_path(path: &str) -> String {
    let mut normalized = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };
    if normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }
    normalized
}

pub(crate) fn child_path(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent, name)
    }
}
