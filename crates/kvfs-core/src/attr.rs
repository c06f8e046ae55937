//! Synthesized attributes.
//!
//! Nothing but the value bytes is stored, so type comes from the key and
//! every timestamp is the wall-clock time of the query.

use std::time::SystemTime;

use kvfs_store::KvPair;

use crate::path::is_directory_key;

/// Permission bits reported for directories.
pub const DIR_PERM: u16 = 0o755;
/// Permission bits reported for files.
pub const FILE_PERM: u16 = 0o644;

/// Type of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

impl EntryKind {
    /// Kind implied by a store key.
    pub fn from_key(key: &str) -> Self {
        if is_directory_key(key) {
            EntryKind::Directory
        } else {
            EntryKind::File
        }
    }
}

/// Attributes reported for an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attributes {
    pub kind: EntryKind,
    /// Value length for files, zero for directories.
    pub size: u64,
    pub perm: u16,
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub ctime: SystemTime,
}

impl Attributes {
    /// Create attributes for a directory.
    pub fn directory() -> Self {
        let now = SystemTime::now();
        Attributes {
            kind: EntryKind::Directory,
            size: 0,
            perm: DIR_PERM,
            atime: now,
            mtime: now,
            ctime: now,
        }
    }

    /// Create attributes for a regular file.
    pub fn file(size: u64) -> Self {
        let now = SystemTime::now();
        Attributes {
            kind: EntryKind::File,
            size,
            perm: FILE_PERM,
            atime: now,
            mtime: now,
            ctime: now,
        }
    }

    /// Attributes for a fetched entry.
    pub fn for_entry(entry: &KvPair) -> Self {
        match EntryKind::from_key(&entry.key) {
            EntryKind::Directory => Self::directory(),
            EntryKind::File => Self::file(entry.value.len() as u64),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}
