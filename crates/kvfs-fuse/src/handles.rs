//! Open file handles keyed by FUSE `fh`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use kvfs_core::OpenFileHandle;
use parking_lot::Mutex;

pub type SharedHandle = Arc<tokio::sync::Mutex<OpenFileHandle>>;

/// Handles live from open/create until release.
pub struct HandleTable {
    handles: Mutex<HashMap<u64, SharedHandle>>,
    next_fh: AtomicU64,
}

impl HandleTable {
    pub fn new() -> Self {
        HandleTable {
            handles: Mutex::new(HashMap::new()),
            next_fh: AtomicU64::new(1),
        }
    }

    /// Register `handle` and return its fh.
    pub fn insert(&self, handle: OpenFileHandle) -> u64 {
        let fh = self.next_fh.fetch_add(1, Ordering::Relaxed);
        self.handles
            .lock()
            .insert(fh, Arc::new(tokio::sync::Mutex::new(handle)));
        fh
    }

    pub fn get(&self, fh: u64) -> Option<SharedHandle> {
        self.handles.lock().get(&fh).cloned()
    }

    pub fn remove(&self, fh: u64) -> Option<SharedHandle> {
        self.handles.lock().remove(&fh)
    }

    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.lock().is_empty()
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}
